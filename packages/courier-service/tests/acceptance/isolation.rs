use std::sync::Arc;

use courier_service::{BulkFeedbackRequest, FilterAction, FilterPreviewRequest, FilterSpec};
use courier_testkit::MemoryIndex;

use super::{StubFeedback, build_service, email, request, test_config};

fn index() -> Arc<MemoryIndex> {
	Arc::new(MemoryIndex::with_emails(vec![
		email("a-1", "mb-a", "Factura de luz", "Factura mensual."),
		email("a-2", "mb-a", "Factura de agua", "Factura trimestral."),
		email("b-1", "mb-b", "Factura de gas", "Factura mensual."),
		email("c-1", "mb-c", "Factura de internet", "Factura anual."),
	]))
}

#[tokio::test]
async fn searches_only_return_scoped_mailboxes() {
	let service = build_service(test_config(), index(), Arc::new(StubFeedback::default()));
	let mut full = request(&["mb-a", "mb-b"], &[&["factura"]]);

	full.query_embedding = Some(serde_json::json!([1.0, 0.0]));
	full.get_all_ids = true;

	for req in [request(&["mb-a", "mb-b"], &[&["factura"]]), full] {
		let response = service.search(req).await.expect("Search failed.");

		assert_eq!(response.results.len(), 3);
		assert!(response.results.iter().all(|result| result.mailbox_id != "mb-c"));
		assert!(
			response
				.all_email_ids
				.iter()
				.flatten()
				.all(|id| id.as_str() != "c-1")
		);
	}
}

#[tokio::test]
async fn previews_and_bulk_feedback_stay_in_scope() {
	let feedback = Arc::new(StubFeedback::default());
	let service = build_service(test_config(), index(), feedback.clone());
	let preview = service
		.get_filter_preview(FilterPreviewRequest {
			filter: FilterSpec::new(FilterAction::Remove, &["factura"]),
			mailbox_scope: vec!["mb-b".to_string()],
			page: 1,
		})
		.await
		.expect("Preview failed.");

	assert_eq!(preview.total_results, 1);
	assert_eq!(preview.results[0].id, "b-1");

	let applied = service
		.submit_bulk_feedback(BulkFeedbackRequest {
			query: "factura".to_string(),
			intent: "general".to_string(),
			filter: FilterSpec::new(FilterAction::Remove, &["factura"]),
			mailbox_scope: vec!["mb-a".to_string()],
		})
		.await
		.expect("Bulk feedback failed.");

	assert_eq!(applied.affected, 2);
	assert_eq!(feedback.saved_ids(), vec!["a-1".to_string(), "a-2".to_string()]);
}

#[tokio::test]
async fn an_empty_scope_is_rejected() {
	let service = build_service(test_config(), index(), Arc::new(StubFeedback::default()));
	let err = service.search(request(&[], &[&["factura"]])).await.expect_err("Expected error.");

	assert!(matches!(err, courier_service::Error::InvalidRequest { .. }));

	let err = service
		.search(request(&[" "], &[&["factura"]]))
		.await
		.expect_err("Expected error.");

	assert!(matches!(err, courier_service::Error::InvalidRequest { .. }));
}
