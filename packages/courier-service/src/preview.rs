use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
	CourierService, Error, Result,
	search::{FilterSpec, planner, retrieval},
};
use courier_domain::terms;
use courier_storage::{
	index::{BoolQuery, IndexQuery, MailboxScope, Sort},
	models::IndexHit,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilterPreviewRequest {
	pub filter: FilterSpec,
	pub mailbox_scope: Vec<String>,
	#[serde(default = "default_page")]
	pub page: u32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FilterPreviewResponse {
	pub results: Vec<PreviewItem>,
	#[serde(rename = "totalResults")]
	pub total_results: u64,
}

/// Display fields of a document a filter would touch; previews carry no score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreviewItem {
	pub id: String,
	pub mailbox_id: String,
	pub from: String,
	pub to: String,
	pub subject: String,
	#[serde(default, with = "courier_storage::date_serde")]
	pub date: Option<OffsetDateTime>,
	pub summary: String,
}
impl From<IndexHit> for PreviewItem {
	fn from(hit: IndexHit) -> Self {
		let source = hit.source;

		Self {
			id: hit.id,
			mailbox_id: source.mailbox_id,
			from: source.from,
			to: source.to,
			subject: source.subject,
			date: source.date,
			summary: source.summary,
		}
	}
}

impl CourierService {
	/// Pages through the documents a filter matches, newest first.
	pub async fn get_filter_preview(
		&self,
		req: FilterPreviewRequest,
	) -> Result<FilterPreviewResponse> {
		let scope = MailboxScope::new(&req.mailbox_scope)?;
		let filter_terms = terms::clean_terms(&req.filter.terms);

		if filter_terms.is_empty() {
			return Err(Error::InvalidRequest {
				message: "filter.terms must contain at least one term.".to_string(),
			});
		}
		if req.page == 0 {
			return Err(Error::InvalidRequest {
				message: "page must be 1 or greater.".to_string(),
			});
		}

		let page_size = self.cfg.preview.page_size;
		let query = preview_query(scope, &filter_terms)
			.with_size(page_size)
			.with_from((req.page - 1).saturating_mul(page_size));
		let timeout = Duration::from_millis(self.cfg.backend.timeout_ms);

		match retrieval::search(self.backends.index.as_ref(), &query, timeout).await {
			Ok(page) => Ok(FilterPreviewResponse {
				results: page.hits.into_iter().map(PreviewItem::from).collect(),
				total_results: page.total,
			}),
			Err(err) => {
				tracing::warn!(
					cause = "backend_unavailable",
					error = %err,
					filter_key = req.filter.key().as_str(),
					"Filter preview degraded to an empty response."
				);

				Ok(FilterPreviewResponse::default())
			},
		}
	}
}

fn preview_query(scope: MailboxScope, filter_terms: &[String]) -> IndexQuery {
	let root =
		BoolQuery { must: vec![planner::filter_clause(filter_terms)], ..BoolQuery::default() };

	IndexQuery::new(scope, root).with_sort(Sort::DateDesc)
}

fn default_page() -> u32 {
	1
}
