use courier_service::{FeedbackRecord, FeedbackStore, PostgresFeedbackStore};
use courier_storage::db::Db;
use courier_testkit::TestDatabase;

fn record(document_id: &str, is_relevant: bool) -> FeedbackRecord {
	FeedbackRecord {
		mailbox_id: "mb-1".to_string(),
		query: "factura".to_string(),
		document_id: document_id.to_string(),
		is_relevant,
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set COURIER_PG_DSN to run."]
async fn stored_feedback_becomes_document_weights() {
	let Some(base_dsn) = courier_testkit::env_dsn() else {
		eprintln!("Skipping stored_feedback_becomes_document_weights; set COURIER_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = test_db.connect().await.expect("Failed to prepare test database.");
	let store = PostgresFeedbackStore::new(Db { pool: db.pool.clone() });

	for record in [record("doc-1", false), record("doc-1", true), record("doc-2", false)] {
		store.save(&record).await.expect("Failed to save feedback.");
	}

	let weights = store.get_weights("mb-1").await.expect("Failed to load weights.");
	let other = store.get_weights("mb-2").await.expect("Failed to load weights.");

	assert!((weights["doc-1"] - 0.75).abs() < 1e-6);
	assert!((weights["doc-2"] - 0.5).abs() < 1e-6);
	assert!(other.is_empty());

	let stored = courier_storage::feedback::list_feedback(&db, "mb-1")
		.await
		.expect("Failed to list feedback.");

	assert_eq!(stored.len(), 3);
	assert!(stored.iter().all(|row| row.query == "factura"));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
