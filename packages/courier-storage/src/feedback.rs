use std::collections::HashMap;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Result, db::Db, models::FeedbackRecord};

/// Per-document weights for one mailbox.
///
/// A document with only negative feedback weighs 0.5, one with only positive feedback weighs 1.0.
pub async fn load_weights(db: &Db, mailbox_id: &str) -> Result<HashMap<String, f32>> {
	let rows: Vec<(String, f32)> = sqlx::query_as(
		"\
SELECT
	document_id,
	(1.0 - 0.5 * (count(*) FILTER (WHERE NOT is_relevant))::real / count(*)::real)::real AS weight
FROM relevance_feedback
WHERE mailbox_id = $1
GROUP BY document_id",
	)
	.bind(mailbox_id)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows.into_iter().collect())
}

pub async fn insert_feedback(
	db: &Db,
	mailbox_id: &str,
	query: &str,
	document_id: &str,
	is_relevant: bool,
) -> Result<Uuid> {
	let feedback_id = Uuid::new_v4();

	sqlx::query(
		"\
INSERT INTO relevance_feedback (
	feedback_id,
	mailbox_id,
	query,
	document_id,
	is_relevant,
	created_at
)
VALUES ($1, $2, $3, $4, $5, $6)",
	)
	.bind(feedback_id)
	.bind(mailbox_id)
	.bind(query)
	.bind(document_id)
	.bind(is_relevant)
	.bind(OffsetDateTime::now_utc())
	.execute(&db.pool)
	.await?;

	Ok(feedback_id)
}

pub async fn list_feedback(db: &Db, mailbox_id: &str) -> Result<Vec<FeedbackRecord>> {
	let rows = sqlx::query_as::<_, FeedbackRecord>(
		"\
SELECT feedback_id, mailbox_id, query, document_id, is_relevant, created_at
FROM relevance_feedback
WHERE mailbox_id = $1
ORDER BY created_at ASC, feedback_id ASC",
	)
	.bind(mailbox_id)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}
