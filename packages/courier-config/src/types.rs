use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub backend: Backend,
	pub search: Search,
	pub ranking: Ranking,
	pub cache: Cache,
	pub feedback: Feedback,
	pub preview: Preview,
	/// Optional. Intent tag to domain tags; entries replace the built-in table per intent.
	#[serde(default)]
	pub domains: BTreeMap<String, Vec<String>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub index: Index,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Index {
	pub url: String,
	pub index: String,
	pub api_key: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Backend {
	/// Applied to every index call; an elapsed timeout is treated as an unavailable backend.
	pub timeout_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Search {
	pub light: SearchLight,
	pub full: SearchFull,
	pub fields: SearchFields,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SearchLight {
	/// Requests with more terms than this across all groups use the full path.
	pub max_terms: u32,
	pub overfetch_factor: u32,
}

/// Default result window of the index backend; deeper pages are rejected by the backend.
pub const MAX_RESULT_WINDOW: u32 = 10_000;

#[derive(Clone, Debug, Deserialize)]
pub struct SearchFull {
	/// Upper bound on raw hits considered for ranking.
	///
	/// Full-mode searches rank only the top `max_hits` backend hits. Documents the backend ranks
	/// past this bound are never considered, cannot be paged to, and are missing from
	/// `all_email_ids`. Capped at [`MAX_RESULT_WINDOW`].
	pub max_hits: u32,
	pub primary_term_boost: f32,
	pub semantic_boost: f32,
	pub domain_boost: f32,
	pub date_range_boost: f32,
	/// Optional. Expected embedding length; vectors of any other length are discarded.
	pub embedding_dims: Option<u32>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SearchFields {
	pub subject: f32,
	pub body: f32,
	pub summary: f32,
	pub relevant_terms: f32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Ranking {
	pub sigmoid_slope: f32,
	pub feedback_floor: f32,
	/// Full mode: additive shift per unit of negative feedback.
	pub feedback_boost: f32,
	/// Light mode: candidates at or below this weight are screened out.
	pub light_screen_weight: f32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Cache {
	pub enabled: bool,
	pub response_ttl_secs: u64,
	pub weights_ttl_secs: u64,
	pub max_entries: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Feedback {
	pub bulk_max_ids: u32,
	pub write_concurrency: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Preview {
	pub page_size: u32,
}
