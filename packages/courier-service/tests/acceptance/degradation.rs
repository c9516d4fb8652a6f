use std::{sync::Arc, time::Duration};

use courier_service::{Error, FilterAction, FilterSpec, SearchMode, SearchOutcome};
use courier_testkit::MemoryIndex;

use super::{StubFeedback, build_service, email, request, result_ids, test_config};

fn index() -> Arc<MemoryIndex> {
	Arc::new(MemoryIndex::with_emails(vec![
		email("e-1", "mb-1", "Entrega del pedido", "El pedido llega el lunes."),
		email("e-2", "mb-1", "Pedido cancelado", "Reembolso del pedido."),
	]))
}

#[tokio::test]
async fn an_unavailable_index_yields_an_empty_response() {
	let index = index();

	index.set_unavailable(true);

	let service = build_service(test_config(), index, Arc::new(StubFeedback::default()));
	let mut req = request(&["mb-1"], &[&["pedido"]]);

	req.filters = vec![FilterSpec::new(FilterAction::Add, &["reembolso"])];

	let response = service.search(req).await.expect("Search must degrade, not fail.");

	assert!(response.results.is_empty());
	assert_eq!(response.total_results, 0);
	assert_eq!(response.outcome, SearchOutcome::BackendUnavailable);
	assert_eq!(response.filter_counts.add.get("reembolso"), Some(&0));
}

#[tokio::test]
async fn slow_backends_time_out_as_unavailable() {
	let index = index();
	let mut cfg = test_config();

	cfg.backend.timeout_ms = 20;
	index.set_latency(Duration::from_millis(500));

	let service = build_service(cfg, index, Arc::new(StubFeedback::default()));
	let response =
		service.search(request(&["mb-1"], &[&["pedido"]])).await.expect("Search failed.");

	assert_eq!(response.outcome, SearchOutcome::BackendUnavailable);
}

#[tokio::test]
async fn unavailable_responses_are_not_cached() {
	let index = index();
	let service = build_service(test_config(), index.clone(), Arc::new(StubFeedback::default()));
	let req = request(&["mb-1"], &[&["pedido"]]);

	index.set_unavailable(true);

	let degraded = service.search(req.clone()).await.expect("Search failed.");

	index.set_unavailable(false);

	let recovered = service.search(req).await.expect("Search failed.");

	assert_eq!(degraded.outcome, SearchOutcome::BackendUnavailable);
	assert_eq!(recovered.outcome, SearchOutcome::Ranked);
	assert_eq!(recovered.results.len(), 2);
}

#[tokio::test]
async fn repeated_requests_are_served_from_the_cache() {
	let index = index();
	let service = build_service(test_config(), index.clone(), Arc::new(StubFeedback::default()));
	let req = request(&["mb-1"], &[&["pedido"]]);
	let first = service.search(req.clone()).await.expect("Search failed.");
	let calls = index.search_calls();
	let second = service.search(req).await.expect("Search failed.");

	assert_eq!(index.search_calls(), calls);
	assert_eq!(result_ids(&first), result_ids(&second));
}

#[tokio::test]
async fn feedback_store_outages_use_neutral_weights() {
	let feedback = StubFeedback { failing_reads: true, ..StubFeedback::default() };
	let service = build_service(test_config(), index(), Arc::new(feedback));
	let response =
		service.search(request(&["mb-1"], &[&["pedido"]])).await.expect("Search failed.");

	assert_eq!(response.outcome, SearchOutcome::Ranked);
	assert_eq!(response.results.len(), 2);
}

#[tokio::test]
async fn hung_feedback_reads_time_out_to_neutral_weights() {
	let mut cfg = test_config();

	cfg.backend.timeout_ms = 50;

	let feedback = StubFeedback { hung_reads: true, ..StubFeedback::default() };
	let service = build_service(cfg, index(), Arc::new(feedback));
	let response = tokio::time::timeout(
		Duration::from_secs(2),
		service.search(request(&["mb-1"], &[&["pedido"]])),
	)
	.await
	.expect("Search must not hang on the feedback store.")
	.expect("Search failed.");

	assert_eq!(response.outcome, SearchOutcome::Ranked);
	assert_eq!(response.results.len(), 2);
}

#[tokio::test]
async fn unparseable_explanations_fall_back_to_the_generic_sentence() {
	let index = index();

	index.set_malformed_explanations(true);

	let service = build_service(test_config(), index, Arc::new(StubFeedback::default()));
	let mut req = request(&["mb-1"], &[&["pedido"]]);

	req.intent = "compras".to_string();

	let response = service.search(req).await.expect("Search failed.");

	assert_eq!(response.mode, SearchMode::Full);
	assert_eq!(response.outcome, SearchOutcome::Ranked);
	assert_eq!(response.results.len(), 2);

	for result in &response.results {
		assert_eq!(result.explanation, "no specific contributing factors identified.");
		assert!(result.breakdown.is_none());
		assert!(result.relevance <= 100);
	}
}

#[tokio::test]
async fn malformed_requests_are_rejected() {
	let service = build_service(test_config(), index(), Arc::new(StubFeedback::default()));
	let mut zero_page = request(&["mb-1"], &[&["pedido"]]);

	zero_page.page = 0;

	let mut huge_page = request(&["mb-1"], &[&["pedido"]]);

	huge_page.results_per_page = 5_000;

	let mut high_threshold = request(&["mb-1"], &[&["pedido"]]);

	high_threshold.min_relevance = 101;

	let empty_group = request(&["mb-1"], &[&["  "]]);
	let mut empty_filter = request(&["mb-1"], &[&["pedido"]]);

	empty_filter.filters = vec![FilterSpec::new::<&str>(FilterAction::Remove, &[])];

	for req in [zero_page, huge_page, high_threshold, empty_group, empty_filter] {
		let err = service.search(req).await.expect_err("Expected validation error.");

		assert!(matches!(err, Error::InvalidRequest { .. }));
	}
}
