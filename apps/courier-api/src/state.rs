use std::sync::Arc;

use courier_service::{Backends, CourierService, PostgresFeedbackStore};
use courier_storage::{db::Db, elastic::ElasticIndex};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<CourierService>,
}
impl AppState {
	pub fn new(service: CourierService) -> Self {
		Self { service: Arc::new(service) }
	}

	/// Production wiring: Postgres feedback store plus the HTTP index client.
	pub async fn connect(config: courier_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let index = ElasticIndex::new(&config.storage.index, config.backend.timeout_ms)?;
		let backends = Backends::new(Arc::new(index), Arc::new(PostgresFeedbackStore::new(db)));

		Ok(Self::new(CourierService::new(config, backends)))
	}
}
