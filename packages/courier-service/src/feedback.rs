use std::{
	collections::{BTreeSet, HashMap},
	sync::{Arc, Mutex},
	time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use tokio::{sync::Semaphore, task::JoinSet};

use crate::{
	CourierService, Error, FeedbackRecord, FeedbackStore, Result,
	search::{FilterSpec, planner, retrieval},
};
use courier_config::Config;
use courier_domain::terms;
use courier_storage::index::{BoolQuery, Clause, Field, IndexQuery, MailboxScope};

const NEUTRAL_WEIGHT: f32 = 1.0;

/// Immutable per-request view of feedback weights across the mailbox scope.
#[derive(Clone, Debug, Default)]
pub struct FeedbackWeightMap {
	mailboxes: HashMap<String, Arc<HashMap<String, f32>>>,
	floor: f32,
}
impl FeedbackWeightMap {
	pub fn empty(floor: f32) -> Self {
		Self { mailboxes: HashMap::new(), floor }
	}

	pub fn single(mailbox_id: &str, weights: HashMap<String, f32>, floor: f32) -> Self {
		let mut map = Self::empty(floor);

		map.mailboxes.insert(mailbox_id.to_string(), Arc::new(weights));

		map
	}

	fn insert(&mut self, mailbox_id: &str, weights: Arc<HashMap<String, f32>>) {
		self.mailboxes.insert(mailbox_id.to_string(), weights);
	}

	/// Documents without feedback weigh 1.0; stored weights are clamped to `[floor, 1.0]`.
	pub fn weight(&self, mailbox_id: &str, document_id: &str) -> f32 {
		let Some(raw) = self.mailboxes.get(mailbox_id).and_then(|weights| weights.get(document_id))
		else {
			return NEUTRAL_WEIGHT;
		};

		if !raw.is_finite() {
			return NEUTRAL_WEIGHT;
		}

		raw.clamp(self.floor.min(NEUTRAL_WEIGHT), NEUTRAL_WEIGHT)
	}
}

struct CachedWeights {
	loaded_at: Instant,
	weights: Arc<HashMap<String, f32>>,
}

/// Read-through cache over `FeedbackStore::get_weights`, one entry per mailbox.
///
/// Every store read is bounded by `timeout`; a read that errors or elapses yields neutral weights
/// for that mailbox and is not cached.
pub struct FeedbackWeightCache {
	enabled: bool,
	ttl: Duration,
	floor: f32,
	timeout: Duration,
	entries: Mutex<HashMap<String, CachedWeights>>,
}
impl FeedbackWeightCache {
	pub fn new(enabled: bool, ttl: Duration, floor: f32, timeout: Duration) -> Self {
		Self { enabled, ttl, floor, timeout, entries: Mutex::new(HashMap::new()) }
	}

	pub fn from_config(cfg: &Config) -> Self {
		Self::new(
			cfg.cache.enabled,
			Duration::from_secs(cfg.cache.weights_ttl_secs),
			cfg.ranking.feedback_floor,
			Duration::from_millis(cfg.backend.timeout_ms),
		)
	}

	pub async fn snapshot(
		&self,
		store: &dyn FeedbackStore,
		scope: &MailboxScope,
	) -> FeedbackWeightMap {
		let mut map = FeedbackWeightMap::empty(self.floor);

		for mailbox_id in scope.ids() {
			if let Some(cached) = self.cached(mailbox_id) {
				map.insert(mailbox_id, cached);

				continue;
			}

			match self.load(store, mailbox_id).await {
				Ok(weights) => {
					let weights = Arc::new(weights);

					self.store(mailbox_id, weights.clone());
					map.insert(mailbox_id, weights);
				},
				Err(err) => {
					tracing::warn!(
						error = %err,
						mailbox_id = mailbox_id.as_str(),
						"Feedback weights unavailable; using neutral weights."
					);
				},
			}
		}

		map
	}

	async fn load(
		&self,
		store: &dyn FeedbackStore,
		mailbox_id: &str,
	) -> Result<HashMap<String, f32>> {
		match tokio::time::timeout(self.timeout, store.get_weights(mailbox_id)).await {
			Ok(result) => result,
			Err(_) => Err(Error::BackendUnavailable {
				message: format!(
					"Feedback weights read timed out after {} ms.",
					self.timeout.as_millis()
				),
			}),
		}
	}

	pub fn invalidate(&self, mailbox_id: &str) {
		self.entries.lock().unwrap_or_else(|err| err.into_inner()).remove(mailbox_id);
	}

	fn cached(&self, mailbox_id: &str) -> Option<Arc<HashMap<String, f32>>> {
		if !self.enabled {
			return None;
		}

		let entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());
		let entry = entries.get(mailbox_id)?;

		(entry.loaded_at.elapsed() < self.ttl).then(|| entry.weights.clone())
	}

	fn store(&self, mailbox_id: &str, weights: Arc<HashMap<String, f32>>) {
		if !self.enabled {
			return;
		}

		self.entries
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.insert(mailbox_id.to_string(), CachedWeights { loaded_at: Instant::now(), weights });
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BulkFeedbackRequest {
	#[serde(default)]
	pub query: String,
	#[serde(default = "default_intent")]
	pub intent: String,
	pub filter: FilterSpec,
	pub mailbox_scope: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkFeedbackResponse {
	/// Negative records written.
	pub affected: u64,
	/// Documents the filter matched, capped at `feedback.bulk_max_ids`.
	pub matched: u64,
}

impl CourierService {
	/// Marks every document matching the filter as not relevant.
	pub async fn submit_bulk_feedback(
		&self,
		req: BulkFeedbackRequest,
	) -> Result<BulkFeedbackResponse> {
		let scope = MailboxScope::new(&req.mailbox_scope)?;
		let filter_terms = terms::clean_terms(&req.filter.terms);

		if filter_terms.is_empty() {
			return Err(Error::InvalidRequest {
				message: "filter.terms must contain at least one term.".to_string(),
			});
		}

		let query = bulk_query(scope, &filter_terms, self.domains.tags_for(&req.intent))
			.with_size(self.cfg.feedback.bulk_max_ids);
		let timeout = Duration::from_millis(self.cfg.backend.timeout_ms);
		let page = match retrieval::search(self.backends.index.as_ref(), &query, timeout).await {
			Ok(page) => page,
			Err(err) => {
				tracing::warn!(
					cause = "backend_unavailable",
					error = %err,
					filter_key = req.filter.key().as_str(),
					"Bulk feedback matched nothing because the index is unavailable."
				);

				return Ok(BulkFeedbackResponse::default());
			},
		};
		let matched = page.hits.len() as u64;
		let records = page
			.hits
			.into_iter()
			.map(|hit| FeedbackRecord {
				mailbox_id: hit.source.mailbox_id,
				query: req.query.clone(),
				document_id: hit.id,
				is_relevant: false,
			})
			.collect();
		let written = self.write_records(records).await;
		let affected = written.len() as u64;
		let touched: BTreeSet<&str> = written.iter().map(String::as_str).collect();

		for mailbox_id in touched {
			self.weights.invalidate(mailbox_id);
			self.cache.invalidate_mailbox(mailbox_id);
		}

		tracing::info!(
			affected,
			matched,
			filter_key = req.filter.key().as_str(),
			"Bulk feedback applied."
		);

		Ok(BulkFeedbackResponse { affected, matched })
	}

	/// Writes with bounded concurrency; returns the mailbox id of every successful write.
	async fn write_records(&self, records: Vec<FeedbackRecord>) -> Vec<String> {
		let permits = Arc::new(Semaphore::new(self.cfg.feedback.write_concurrency.max(1)));
		let timeout = Duration::from_millis(self.cfg.backend.timeout_ms);
		let mut tasks = JoinSet::new();

		for record in records {
			let store = self.backends.feedback.clone();
			let permits = permits.clone();

			tasks.spawn(async move {
				let _permit = permits.acquire_owned().await;
				let result = match tokio::time::timeout(timeout, store.save(&record)).await {
					Ok(result) => result,
					Err(_) => Err(Error::FeedbackWrite {
						message: format!(
							"Feedback write timed out after {} ms.",
							timeout.as_millis()
						),
					}),
				};

				(record, result)
			});
		}

		let mut written = Vec::new();

		while let Some(joined) = tasks.join_next().await {
			match joined {
				Ok((record, Ok(()))) => written.push(record.mailbox_id),
				Ok((record, Err(err))) => {
					tracing::warn!(
						error = %err,
						document_id = record.document_id.as_str(),
						mailbox_id = record.mailbox_id.as_str(),
						"Feedback write failed; skipping document."
					);
				},
				Err(err) => {
					tracing::warn!(error = %err, "Feedback write task failed.");
				},
			}
		}

		written
	}
}

/// Documents matching the filter terms, the same set the preview shows.
///
/// The intent's domain tags only rank tagged documents first under the `bulk_max_ids` cap.
fn bulk_query(scope: MailboxScope, filter_terms: &[String], domain_tags: &[String]) -> IndexQuery {
	let mut root =
		BoolQuery { must: vec![planner::filter_clause(filter_terms)], ..BoolQuery::default() };

	if !domain_tags.is_empty() {
		root.should.push(Clause::Terms {
			field: Field::DomainTags,
			values: domain_tags.to_vec(),
			boost: 1.0,
		});
	}

	IndexQuery::new(scope, root)
}

fn default_intent() -> String {
	courier_domain::GENERAL_INTENT.to_string()
}
