use std::sync::Arc;

use courier_service::{FilterAction, FilterSpec, SearchMode, SearchOutcome};
use courier_testkit::MemoryIndex;

use super::{StubFeedback, build_service, email, request, result_ids, test_config};

fn index() -> Arc<MemoryIndex> {
	Arc::new(MemoryIndex::with_emails(vec![
		email("e-1", "mb-1", "Oferta de publicidad", "Campaña de publicidad con descuento."),
		email("e-2", "mb-1", "Oferta del proveedor", "Nueva oferta de servidores."),
		email("e-3", "mb-1", "Oferta de hosting", "Oferta anual con factura incluida."),
		email("e-4", "mb-1", "Factura de marzo", "Factura pendiente de pago."),
	]))
}

#[tokio::test]
async fn removed_documents_stay_countable() {
	let service = build_service(test_config(), index(), Arc::new(StubFeedback::default()));
	let mut req = request(&["mb-1"], &[&["oferta"]]);

	req.query_embedding = Some(serde_json::json!([0.5, 0.5]));
	req.filters = vec![FilterSpec::new(FilterAction::Remove, &["publicidad"])];

	let response = service.search(req).await.expect("Search failed.");

	assert_eq!(response.mode, SearchMode::Full);
	assert!(!result_ids(&response).contains(&"e-1".to_string()));
	assert_eq!(response.filter_counts.remove.get("publicidad"), Some(&1));
}

#[tokio::test]
async fn add_filters_pull_in_documents_outside_the_terms() {
	let service = build_service(test_config(), index(), Arc::new(StubFeedback::default()));
	let mut req = request(&["mb-1"], &[&["proveedor"]]);

	req.intent = "compras".to_string();
	req.filters = vec![FilterSpec::new(FilterAction::Add, &["factura"])];

	let response = service.search(req).await.expect("Search failed.");
	let ids = result_ids(&response);

	assert_eq!(response.mode, SearchMode::Full);
	assert!(ids.contains(&"e-2".to_string()));
	assert!(ids.contains(&"e-4".to_string()));
	assert_eq!(response.filter_counts.add.get("factura"), Some(&2));
}

#[tokio::test]
async fn counts_do_not_depend_on_other_filters() {
	let service = build_service(test_config(), index(), Arc::new(StubFeedback::default()));
	let mut alone = request(&["mb-1"], &[&["oferta"]]);

	alone.filters = vec![FilterSpec::new(FilterAction::Remove, &["publicidad"])];

	let mut combined = alone.clone();

	combined.filters.push(FilterSpec::new(FilterAction::Remove, &["hosting"]));
	combined.filters.push(FilterSpec::new(FilterAction::Add, &["factura"]));

	let alone = service.search(alone).await.expect("Search failed.");
	let combined = service.search(combined).await.expect("Search failed.");

	assert_eq!(
		alone.filter_counts.remove.get("publicidad"),
		combined.filter_counts.remove.get("publicidad")
	);
	assert_eq!(combined.filter_counts.remove.get("hosting"), Some(&1));
	assert_eq!(combined.filter_counts.add.get("factura"), Some(&2));
}

#[tokio::test]
async fn failed_counts_report_zero_without_failing_the_search() {
	let index = index();

	index.set_failing_counts(true);

	let service = build_service(test_config(), index, Arc::new(StubFeedback::default()));
	let mut req = request(&["mb-1"], &[&["oferta"]]);

	req.filters = vec![FilterSpec::new(FilterAction::Remove, &["Publicidad", " publicidad "])];

	let response = service.search(req).await.expect("Search failed.");

	assert_eq!(response.outcome, SearchOutcome::Ranked);
	assert!(!response.results.is_empty());
	assert_eq!(response.filter_counts.remove.get("publicidad"), Some(&0));
}
