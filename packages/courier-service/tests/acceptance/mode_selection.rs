use std::sync::Arc;

use courier_service::{MetadataFilters, SearchMode, SearchOutcome};
use courier_testkit::MemoryIndex;

use super::{StubFeedback, build_service, email, request, test_config};

fn index() -> Arc<MemoryIndex> {
	Arc::new(MemoryIndex::with_emails(vec![
		email("e-1", "mb-1", "Reunión del proyecto Atlas", "Agenda de la reunión semanal."),
		email("e-2", "mb-1", "Proyecto Atlas: presupuesto", "Revisión del presupuesto."),
		email("e-3", "mb-1", "Vacaciones", "Plan de vacaciones de verano."),
	]))
}

#[tokio::test]
async fn two_general_terms_use_the_light_path() {
	let service = build_service(test_config(), index(), Arc::new(StubFeedback::default()));
	let req = request(&["mb-1"], &[&["reunión"], &["proyecto"]]);
	let response = service.search(req).await.expect("Search failed.");

	assert_eq!(response.mode, SearchMode::Light);
	assert_eq!(response.outcome, SearchOutcome::Ranked);
	assert_eq!(response.results[0].id, "e-1");
	assert!(response.results.iter().all(|result| result.id != "e-3"));
}

#[tokio::test]
async fn an_embedding_switches_to_the_full_path() {
	let service = build_service(test_config(), index(), Arc::new(StubFeedback::default()));
	let mut req = request(&["mb-1"], &[&["reunión"], &["proyecto"]]);

	req.query_embedding = Some(serde_json::json!([0.1, 0.2, 0.3]));

	let response = service.search(req).await.expect("Search failed.");

	assert_eq!(response.mode, SearchMode::Full);
	assert!(response.results.iter().all(|result| result.breakdown.is_some()));
}

#[tokio::test]
async fn intents_metadata_and_long_queries_use_the_full_path() {
	let service = build_service(test_config(), index(), Arc::new(StubFeedback::default()));
	let mut with_intent = request(&["mb-1"], &[&["proyecto"]]);

	with_intent.intent = "proyectos".to_string();

	let mut with_metadata = request(&["mb-1"], &[&["proyecto"]]);

	with_metadata.metadata_filters =
		MetadataFilters { subject: Some("atlas".to_string()), ..MetadataFilters::default() };

	let long = request(&["mb-1"], &[&["reunión", "junta"], &["proyecto", "iniciativa"]]);

	for req in [with_intent, with_metadata, long] {
		let response = service.search(req).await.expect("Search failed.");

		assert_eq!(response.mode, SearchMode::Full);
	}
}

#[tokio::test]
async fn an_undecodable_embedding_keeps_the_full_path_without_semantic_scoring() {
	let service = build_service(test_config(), index(), Arc::new(StubFeedback::default()));
	let mut req = request(&["mb-1"], &[&["proyecto"]]);

	req.query_embedding = Some(serde_json::json!("not a vector"));

	let response = service.search(req).await.expect("Search failed.");

	assert_eq!(response.mode, SearchMode::Full);
	assert!(!response.results.is_empty());

	for result in &response.results {
		let breakdown = result.breakdown.as_ref().expect("Breakdown must exist.");

		assert!(breakdown.terms.iter().all(|term| term.name != "semantic"));
	}
}
