use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

/// Stored fields of an indexed e-mail as returned in hit sources.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailFields {
	pub mailbox_id: String,
	#[serde(default)]
	pub from: String,
	#[serde(default)]
	pub to: String,
	#[serde(default)]
	pub subject: String,
	#[serde(default, with = "crate::date_serde")]
	pub date: Option<OffsetDateTime>,
	#[serde(default)]
	pub summary: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub body: String,
	#[serde(default)]
	pub relevant_terms: Vec<String>,
	#[serde(default)]
	pub domain_tags: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct IndexHit {
	pub id: String,
	/// Backend score; zero when the query was not sorted by score.
	pub score: f32,
	pub source: EmailFields,
	/// Backend score explanation, present only when the query asked for it.
	pub explanation: Option<Value>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct FeedbackRecord {
	pub feedback_id: Uuid,
	pub mailbox_id: String,
	pub query: String,
	pub document_id: String,
	pub is_relevant: bool,
	pub created_at: OffsetDateTime,
}
