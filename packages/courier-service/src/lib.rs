pub mod feedback;
pub mod preview;
pub mod search;

mod error;

use std::{collections::HashMap, sync::Arc};

pub use courier_storage::BoxFuture;
pub use error::{Error, Result};
pub use feedback::{
	BulkFeedbackRequest, BulkFeedbackResponse, FeedbackWeightCache, FeedbackWeightMap,
};
pub use preview::{FilterPreviewRequest, FilterPreviewResponse, PreviewItem};
pub use search::{
	DateRange, FilterAction, FilterCounts, FilterSpec, MetadataFilters, RankedResult,
	ScoreBreakdown, SearchMode, SearchOutcome, SearchRequest, SearchResponse,
	cache::{MemoryResponseCache, NoopResponseCache, ResponseCache},
};

use courier_config::Config;
use courier_domain::DomainTable;
use courier_storage::{db::Db, index::IndexBackend};

/// One feedback judgement about a document, scoped to the mailbox that owns it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedbackRecord {
	pub mailbox_id: String,
	pub query: String,
	pub document_id: String,
	pub is_relevant: bool,
}

pub trait FeedbackStore
where
	Self: Send + Sync,
{
	/// Raw per-document weights for one mailbox; documents without feedback are absent.
	fn get_weights<'a>(
		&'a self,
		mailbox_id: &'a str,
	) -> BoxFuture<'a, Result<HashMap<String, f32>>>;

	fn save<'a>(&'a self, record: &'a FeedbackRecord) -> BoxFuture<'a, Result<()>>;
}

pub struct PostgresFeedbackStore {
	db: Db,
}
impl PostgresFeedbackStore {
	pub fn new(db: Db) -> Self {
		Self { db }
	}

	async fn load(&self, mailbox_id: &str) -> Result<HashMap<String, f32>> {
		Ok(courier_storage::feedback::load_weights(&self.db, mailbox_id).await?)
	}

	async fn insert(&self, record: &FeedbackRecord) -> Result<()> {
		courier_storage::feedback::insert_feedback(
			&self.db,
			&record.mailbox_id,
			&record.query,
			&record.document_id,
			record.is_relevant,
		)
		.await
		.map_err(|err| Error::FeedbackWrite { message: err.to_string() })?;

		Ok(())
	}
}
impl FeedbackStore for PostgresFeedbackStore {
	fn get_weights<'a>(
		&'a self,
		mailbox_id: &'a str,
	) -> BoxFuture<'a, Result<HashMap<String, f32>>> {
		Box::pin(self.load(mailbox_id))
	}

	fn save<'a>(&'a self, record: &'a FeedbackRecord) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.insert(record))
	}
}

#[derive(Clone)]
pub struct Backends {
	pub index: Arc<dyn IndexBackend>,
	pub feedback: Arc<dyn FeedbackStore>,
}
impl Backends {
	pub fn new(index: Arc<dyn IndexBackend>, feedback: Arc<dyn FeedbackStore>) -> Self {
		Self { index, feedback }
	}
}

pub struct CourierService {
	pub cfg: Config,
	pub backends: Backends,
	pub cache: Arc<dyn ResponseCache>,
	pub weights: FeedbackWeightCache,
	pub domains: Arc<DomainTable>,
}
impl CourierService {
	/// Uses the in-memory response cache when `cache.enabled`, otherwise no response caching.
	pub fn new(cfg: Config, backends: Backends) -> Self {
		let cache: Arc<dyn ResponseCache> = if cfg.cache.enabled {
			Arc::new(MemoryResponseCache::from_config(&cfg.cache))
		} else {
			Arc::new(NoopResponseCache)
		};

		Self::with_cache(cfg, backends, cache)
	}

	pub fn with_cache(cfg: Config, backends: Backends, cache: Arc<dyn ResponseCache>) -> Self {
		let weights = FeedbackWeightCache::from_config(&cfg);
		let domains = Arc::new(DomainTable::from_config(&cfg));

		Self { cfg, backends, cache, weights, domains }
	}
}
