use std::sync::Arc;

use courier_service::{
	Backends, CourierService, NoopResponseCache, SearchMode, SearchOutcome, SearchRequest,
};
use courier_testkit::MemoryIndex;

use super::{StubFeedback, build_service, email, request, result_ids, test_config};

fn varied_index() -> Arc<MemoryIndex> {
	Arc::new(MemoryIndex::with_emails(vec![
		email("e-1", "mb-1", "Informe trimestral", "Informe de ventas. Informe anexo."),
		email("e-2", "mb-1", "Informe", "Resumen del informe."),
		email("e-3", "mb-1", "Ventas", "Informe breve."),
		email("e-4", "mb-1", "Informe de gastos", "Sin comentarios."),
		email("e-5", "mb-1", "Notas", "Informe final del informe de informe."),
		email("e-6", "mb-1", "Informe semanal", "Informe."),
		email("e-7", "mb-1", "Recordatorio", "Enviar el informe."),
	]))
}

fn full(mut req: SearchRequest) -> SearchRequest {
	req.query_embedding = Some(serde_json::json!([0.3, 0.4]));

	req
}

#[tokio::test]
async fn relevance_stays_within_bounds() {
	let service = build_service(test_config(), varied_index(), Arc::new(StubFeedback::default()));

	for req in [request(&["mb-1"], &[&["informe"]]), full(request(&["mb-1"], &[&["informe"]]))] {
		let response = service.search(req).await.expect("Search failed.");

		assert_eq!(response.results.len(), 7);
		assert!(response.results.iter().all(|result| result.relevance <= 100));
		assert!(response.results.windows(2).all(|pair| pair[0].relevance >= pair[1].relevance));
	}
}

#[tokio::test]
async fn breakdowns_add_up_to_the_score() {
	let service = build_service(test_config(), varied_index(), Arc::new(StubFeedback::default()));
	let mut req = full(request(&["mb-1"], &[&["informe", "reporte"], &["ventas"]]));

	req.intent = "compras".to_string();

	let response = service.search(req).await.expect("Search failed.");

	assert_eq!(response.mode, SearchMode::Full);
	assert!(!response.results.is_empty());

	for result in &response.results {
		let breakdown = result.breakdown.as_ref().expect("Breakdown must exist.");

		assert!((breakdown.reported_sum() - f64::from(result.score)).abs() < 1e-6);
		assert!(result.explanation.starts_with("Score "));
	}
}

#[tokio::test]
async fn identical_requests_rank_identically() {
	let cfg = test_config();
	let backends = Backends::new(varied_index(), Arc::new(StubFeedback::default()));
	let service = CourierService::with_cache(cfg, backends, Arc::new(NoopResponseCache));
	let req = full(request(&["mb-1"], &[&["informe"]]));
	let first = service.search(req.clone()).await.expect("Search failed.");
	let second = service.search(req).await.expect("Search failed.");
	let relevances = |response: &courier_service::SearchResponse| {
		response.results.iter().map(|result| result.relevance).collect::<Vec<_>>()
	};

	assert_eq!(result_ids(&first), result_ids(&second));
	assert_eq!(relevances(&first), relevances(&second));
}

#[tokio::test]
async fn pages_partition_the_full_result_list() {
	let service = build_service(test_config(), varied_index(), Arc::new(StubFeedback::default()));
	let mut all = request(&["mb-1"], &[&["informe"]]);

	all.results_per_page = 3;
	all.get_all_ids = true;

	let expected = service
		.search(all.clone())
		.await
		.expect("Search failed.")
		.all_email_ids
		.expect("Ids were requested.");
	let mut paged = Vec::new();

	for page in 1..=3 {
		let mut req = all.clone();

		req.page = page;
		req.get_all_ids = false;

		let response = service.search(req).await.expect("Search failed.");

		assert_eq!(response.total_results, 7);

		paged.extend(result_ids(&response));
	}

	assert_eq!(expected.len(), 7);
	assert_eq!(paged, expected);
}

#[tokio::test]
async fn near_identical_scores_fall_below_a_high_threshold() {
	let index = Arc::new(MemoryIndex::with_emails(vec![
		email("e-1", "mb-1", "Informe trimestral", "Adjunto."),
		email("e-2", "mb-1", "Informe trimestral", "Adjunto."),
		email("e-3", "mb-1", "Informe trimestral", "Adjunto."),
	]));
	let service = build_service(test_config(), index, Arc::new(StubFeedback::default()));
	let mut req = request(&["mb-1"], &[&["informe"]]);

	req.min_relevance = 80;

	let response = service.search(req.clone()).await.expect("Search failed.");

	assert!(response.results.is_empty());
	assert_eq!(response.total_results, 0);
	assert_eq!(response.outcome, SearchOutcome::BelowMinRelevance);

	req.min_relevance = 0;

	let response = service.search(req).await.expect("Search failed.");

	assert!(response.results.iter().all(|result| result.relevance == 50));
}

#[tokio::test]
async fn filter_only_keeps_low_relevance_documents() {
	let service = build_service(test_config(), varied_index(), Arc::new(StubFeedback::default()));
	let mut req = request(&["mb-1"], &[&["informe"]]);

	req.min_relevance = 100;
	req.filter_only = true;

	let response = service.search(req).await.expect("Search failed.");

	assert_eq!(response.total_results, 7);
}

#[tokio::test]
async fn unmatched_queries_report_no_candidates() {
	let service = build_service(test_config(), varied_index(), Arc::new(StubFeedback::default()));
	let response =
		service.search(request(&["mb-1"], &[&["vacaciones"]])).await.expect("Search failed.");

	assert!(response.results.is_empty());
	assert_eq!(response.outcome, SearchOutcome::NoCandidates);
}
