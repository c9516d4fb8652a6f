use std::{sync::Arc, time::Duration};

use courier_service::{
	BulkFeedbackRequest, FilterAction, FilterPreviewRequest, FilterSpec, SearchMode,
};
use courier_testkit::MemoryIndex;

use super::{StubFeedback, build_service, email, request, result_ids, test_config};

fn index() -> Arc<MemoryIndex> {
	Arc::new(MemoryIndex::with_emails(vec![
		email("p-1", "mb-1", "Publicidad de verano", "Descuentos en publicidad."),
		email("p-2", "mb-1", "Publicidad", "Nueva campaña."),
		email("p-3", "mb-1", "Boletín", "Publicidad semanal."),
		email("p-4", "mb-1", "Oferta", "Publicidad y cupones."),
		email("p-5", "mb-1", "Publicidad local", "Folletos."),
		email("k-1", "mb-1", "Reunión", "Agenda del lunes."),
	]))
}

fn bulk(terms: &[&str]) -> BulkFeedbackRequest {
	BulkFeedbackRequest {
		query: "publicidad".to_string(),
		intent: "general".to_string(),
		filter: FilterSpec::new(FilterAction::Remove, terms),
		mailbox_scope: vec!["mb-1".to_string()],
	}
}

#[tokio::test]
async fn per_document_write_failures_are_skipped() {
	let feedback = Arc::new(StubFeedback::failing_on(&["p-3"]));
	let service = build_service(test_config(), index(), feedback.clone());
	let applied =
		service.submit_bulk_feedback(bulk(&["publicidad"])).await.expect("Bulk feedback failed.");

	assert_eq!(applied.matched, 5);
	assert_eq!(applied.affected, 4);
	assert_eq!(feedback.saved_ids(), vec!["p-1", "p-2", "p-4", "p-5"]);
	assert!(
		feedback
			.saved
			.lock()
			.expect("Lock must not be poisoned.")
			.iter()
			.all(|record| !record.is_relevant && record.query == "publicidad")
	);
}

#[tokio::test]
async fn feedback_invalidates_cached_rankings() {
	let service = build_service(test_config(), index(), Arc::new(StubFeedback::default()));
	let req = request(&["mb-1"], &[&["publicidad"]]);
	let before = service.search(req.clone()).await.expect("Search failed.");

	assert_eq!(before.results.len(), 5);

	service.submit_bulk_feedback(bulk(&["folletos"])).await.expect("Bulk feedback failed.");

	let after = service.search(req).await.expect("Search failed.");

	assert_eq!(after.mode, SearchMode::Light);
	assert!(!result_ids(&after).contains(&"p-5".to_string()));
	assert_eq!(after.results.len(), 4);
}

#[tokio::test]
async fn full_mode_penalizes_without_dropping() {
	let feedback = Arc::new(StubFeedback::default().with_weight("mb-1", "p-2", 0.5));
	let index = Arc::new(MemoryIndex::with_emails(vec![
		email("p-1", "mb-1", "Publicidad", "Nueva campaña."),
		email("p-2", "mb-1", "Publicidad", "Nueva campaña."),
	]));
	let service = build_service(test_config(), index, feedback);
	let mut req = request(&["mb-1"], &[&["publicidad"]]);

	req.query_embedding = Some(serde_json::json!([0.2, 0.8]));

	let response = service.search(req).await.expect("Search failed.");

	assert_eq!(response.mode, SearchMode::Full);
	assert_eq!(result_ids(&response), vec!["p-1", "p-2"]);
	assert!(response.results[0].relevance > response.results[1].relevance);
	assert_eq!(response.results[0].score, response.results[1].score);
}

#[tokio::test]
async fn domain_intents_never_widen_the_bulk_match() {
	let mut tagged = email("t-1", "mb-1", "Aviso", "Sin texto relevante.");

	tagged.fields.domain_tags = vec!["promocion".to_string()];

	let index = index();

	index.insert(tagged);

	let feedback = Arc::new(StubFeedback::default());
	let service = build_service(test_config(), index, feedback.clone());
	let preview = service
		.get_filter_preview(FilterPreviewRequest {
			filter: FilterSpec::new(FilterAction::Remove, &["folletos"]),
			mailbox_scope: vec!["mb-1".to_string()],
			page: 1,
		})
		.await
		.expect("Preview failed.");
	let mut req = bulk(&["folletos"]);

	req.intent = "marketing".to_string();

	let applied = service.submit_bulk_feedback(req).await.expect("Bulk feedback failed.");
	let previewed: Vec<String> = preview.results.iter().map(|item| item.id.clone()).collect();

	assert_eq!(applied.matched, 1);
	assert_eq!(applied.affected, 1);
	assert_eq!(feedback.saved_ids(), previewed);
	assert_eq!(feedback.saved_ids(), vec!["p-5"]);
}

#[tokio::test]
async fn domain_tags_pick_which_matches_fit_under_the_cap() {
	let mut tagged = email("t-2", "mb-1", "Aviso", "Publicidad.");

	tagged.fields.domain_tags = vec!["promocion".to_string()];

	let index = index();

	index.insert(tagged);

	let mut cfg = test_config();

	cfg.feedback.bulk_max_ids = 1;

	let feedback = Arc::new(StubFeedback::default());
	let service = build_service(cfg, index, feedback.clone());
	let mut req = bulk(&["publicidad"]);

	req.intent = "marketing".to_string();

	let applied = service.submit_bulk_feedback(req).await.expect("Bulk feedback failed.");

	assert_eq!(applied.matched, 1);
	assert_eq!(feedback.saved_ids(), vec!["t-2"]);
}

#[tokio::test]
async fn hung_feedback_writes_time_out_and_are_skipped() {
	let mut cfg = test_config();

	cfg.backend.timeout_ms = 50;

	let feedback = Arc::new(StubFeedback { hung_writes: true, ..StubFeedback::default() });
	let service = build_service(cfg, index(), feedback.clone());
	let applied = tokio::time::timeout(
		Duration::from_secs(2),
		service.submit_bulk_feedback(bulk(&["publicidad"])),
	)
	.await
	.expect("Bulk feedback must not hang on the feedback store.")
	.expect("Bulk feedback failed.");

	assert_eq!(applied.matched, 5);
	assert_eq!(applied.affected, 0);
	assert!(feedback.saved_ids().is_empty());
}

#[tokio::test]
async fn an_unavailable_index_affects_nothing() {
	let index = index();

	index.set_unavailable(true);

	let service = build_service(test_config(), index, Arc::new(StubFeedback::default()));
	let applied =
		service.submit_bulk_feedback(bulk(&["publicidad"])).await.expect("Bulk feedback failed.");

	assert_eq!(applied.affected, 0);
}
