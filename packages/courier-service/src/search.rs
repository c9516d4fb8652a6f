pub mod assemble;
pub mod cache;
pub mod decompose;
pub mod explain;
pub mod normalize;
pub mod planner;
pub mod retrieval;

use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::{CourierService, Result, feedback::FeedbackWeightMap};
use courier_storage::models::IndexHit;
use planner::{CountQuery, Plan};

pub use explain::ScoreBreakdown;

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_RESULTS_PER_PAGE: u32 = 20;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchRequest {
	#[serde(default)]
	pub query: String,
	#[serde(default = "default_intent")]
	pub intent: String,
	/// Synonym groups; the first term of each group is its primary term.
	#[serde(default)]
	pub term_groups: Vec<Vec<String>>,
	#[serde(default)]
	pub metadata_filters: MetadataFilters,
	/// Decoded leniently; an undecodable vector only disables semantic scoring.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub query_embedding: Option<Value>,
	#[serde(default)]
	pub filters: Vec<FilterSpec>,
	#[serde(default)]
	pub min_relevance: u32,
	#[serde(default = "default_page")]
	pub page: u32,
	#[serde(default = "default_results_per_page")]
	pub results_per_page: u32,
	#[serde(default)]
	pub filter_only: bool,
	pub mailbox_scope: Vec<String>,
	#[serde(default)]
	pub get_all_ids: bool,
}
impl SearchRequest {
	pub fn new(mailbox_scope: Vec<String>) -> Self {
		Self {
			query: String::new(),
			intent: default_intent(),
			term_groups: Vec::new(),
			metadata_filters: MetadataFilters::default(),
			query_embedding: None,
			filters: Vec::new(),
			min_relevance: 0,
			page: DEFAULT_PAGE,
			results_per_page: DEFAULT_RESULTS_PER_PAGE,
			filter_only: false,
			mailbox_scope,
			get_all_ids: false,
		}
	}
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilters {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub from: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub to: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub subject: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub date_range: Option<DateRange>,
}
impl MetadataFilters {
	pub fn is_empty(&self) -> bool {
		let blank = |value: &Option<String>| value.as_deref().is_none_or(|v| v.trim().is_empty());

		blank(&self.from)
			&& blank(&self.to)
			&& blank(&self.subject)
			&& self.date_range.as_ref().is_none_or(DateRange::is_unbounded)
	}
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
	#[serde(
		default,
		with = "courier_storage::date_serde",
		skip_serializing_if = "Option::is_none"
	)]
	pub start: Option<OffsetDateTime>,
	#[serde(
		default,
		with = "courier_storage::date_serde",
		skip_serializing_if = "Option::is_none"
	)]
	pub end: Option<OffsetDateTime>,
}
impl DateRange {
	pub fn is_unbounded(&self) -> bool {
		self.start.is_none() && self.end.is_none()
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterAction {
	Add,
	Remove,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
	pub action: FilterAction,
	pub terms: Vec<String>,
}
impl FilterSpec {
	pub fn new<S>(action: FilterAction, terms: &[S]) -> Self
	where
		S: AsRef<str>,
	{
		Self { action, terms: terms.iter().map(|term| term.as_ref().to_string()).collect() }
	}

	/// Map key used in `filter_counts`.
	pub fn key(&self) -> String {
		courier_domain::terms::terms_key(&self.terms)
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
	#[default]
	Light,
	Full,
}
impl SearchMode {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Light => "light",
			Self::Full => "full",
		}
	}
}

/// Why a response looks the way it does; separates the kinds of empty responses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SearchOutcome {
	#[default]
	Ranked,
	NoCandidates,
	BelowMinRelevance,
	BackendUnavailable,
}
impl SearchOutcome {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Ranked => "ranked",
			Self::NoCandidates => "no_candidates",
			Self::BelowMinRelevance => "below_min_relevance",
			Self::BackendUnavailable => "backend_unavailable",
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RankedResult {
	pub id: String,
	pub mailbox_id: String,
	pub from: String,
	pub to: String,
	pub subject: String,
	#[serde(default, with = "courier_storage::date_serde")]
	pub date: Option<OffsetDateTime>,
	pub summary: String,
	pub relevant_terms: Vec<String>,
	pub domain_tag: Option<String>,
	pub relevance: u8,
	/// Backend score before feedback blending.
	pub score: f32,
	pub explanation: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub breakdown: Option<ScoreBreakdown>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCounts {
	pub remove: BTreeMap<String, u64>,
	pub add: BTreeMap<String, u64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchResponse {
	pub mode: SearchMode,
	pub results: Vec<RankedResult>,
	#[serde(rename = "totalResults")]
	pub total_results: u64,
	pub filter_counts: FilterCounts,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub all_email_ids: Option<Vec<String>>,
	#[serde(skip)]
	pub outcome: SearchOutcome,
}

impl CourierService {
	pub async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
		let plan = planner::plan(&req, &self.cfg, &self.domains)?;
		let cache_key = if self.cfg.cache.enabled {
			match cache::cache_key(&req) {
				Ok(key) => Some(key),
				Err(err) => {
					tracing::warn!(error = %err, "Response cache key build failed.");

					None
				},
			}
		} else {
			None
		};

		if let Some(key) = cache_key.as_deref()
			&& let Some(cached) = self.cache.get(key)
		{
			tracing::debug!(
				cache_key_prefix = cache::cache_key_prefix(key),
				mode = cached.mode.as_str(),
				"Response cache hit."
			);

			return Ok(cached);
		}

		let generation = self.cache.generation(plan.scope.ids());
		let response = self.execute_plan(&req, &plan).await;

		if let Some(key) = cache_key
			&& response.outcome != SearchOutcome::BackendUnavailable
		{
			self.cache.put(key, plan.scope.ids().to_vec(), generation, response.clone());
		}

		Ok(response)
	}

	async fn execute_plan(&self, req: &SearchRequest, plan: &Plan) -> SearchResponse {
		let timeout = Duration::from_millis(self.cfg.backend.timeout_ms);
		let (weights, hits, filter_counts) = tokio::join!(
			self.weights.snapshot(self.backends.feedback.as_ref(), &plan.scope),
			retrieval::retrieve(
				self.backends.index.as_ref(),
				&plan.primary,
				plan.secondary.as_ref(),
				timeout
			),
			retrieval::run_counts(self.backends.index.clone(), plan.counts.clone(), timeout),
		);
		let hits = match hits {
			Ok(hits) => hits,
			Err(err) => {
				tracing::warn!(
					cause = SearchOutcome::BackendUnavailable.as_str(),
					error = %err,
					mode = plan.mode.as_str(),
					"Search degraded to an empty response."
				);

				return unavailable_response(plan);
			},
		};

		if hits.is_empty() {
			tracing::info!(
				cause = SearchOutcome::NoCandidates.as_str(),
				mode = plan.mode.as_str(),
				"Search matched no candidates."
			);

			return SearchResponse {
				mode: plan.mode,
				filter_counts,
				all_email_ids: req.get_all_ids.then(Vec::new),
				outcome: SearchOutcome::NoCandidates,
				..SearchResponse::default()
			};
		}

		let candidate_count = hits.len();
		let ranked = self.rank(plan.mode, hits, &weights);
		let assembled = assemble::assemble(
			ranked,
			&assemble::PageOptions {
				min_relevance: req.min_relevance,
				filter_only: req.filter_only,
				page: req.page,
				results_per_page: req.results_per_page,
				get_all_ids: req.get_all_ids,
			},
		);
		let outcome = if assembled.total == 0 {
			tracing::info!(
				cause = SearchOutcome::BelowMinRelevance.as_str(),
				candidates = candidate_count,
				min_relevance = req.min_relevance,
				mode = plan.mode.as_str(),
				"Every candidate fell below the relevance threshold."
			);

			SearchOutcome::BelowMinRelevance
		} else {
			SearchOutcome::Ranked
		};

		SearchResponse {
			mode: plan.mode,
			results: assembled.results,
			total_results: assembled.total,
			filter_counts,
			all_email_ids: assembled.all_ids,
			outcome,
		}
	}

	fn rank(
		&self,
		mode: SearchMode,
		hits: Vec<IndexHit>,
		weights: &FeedbackWeightMap,
	) -> Vec<RankedResult> {
		let ranking = &self.cfg.ranking;

		match mode {
			SearchMode::Light => {
				let screened = normalize::screen_light(hits, weights, ranking);
				let candidates = screened
					.into_iter()
					.map(|(hit, effective)| {
						let explained = explain::build_light(f64::from(hit.score));

						normalize::Candidate { hit, effective, explained }
					})
					.collect();

				normalize::normalize(candidates, ranking.sigmoid_slope)
			},
			SearchMode::Full => {
				let candidates = hits
					.into_iter()
					.map(|hit| {
						let total = f64::from(hit.score);
						let components = match hit.explanation.as_ref().map(decompose::parse) {
							Some(Ok(tree)) => decompose::decompose(&tree),
							Some(Err(err)) => {
								tracing::warn!(
									error = %err,
									document_id = hit.id.as_str(),
									"Score explanation could not be parsed."
								);

								decompose::ScoreComponents::default()
							},
							None => decompose::ScoreComponents::default(),
						};
						let explained = explain::build(total, &components, &hit.source);
						let weight = weights.weight(&hit.source.mailbox_id, &hit.id);
						let effective = normalize::full_effective_score(
							total,
							weight,
							ranking.feedback_boost,
						);

						normalize::Candidate { hit, effective, explained }
					})
					.collect();

				normalize::normalize(candidates, ranking.sigmoid_slope)
			},
		}
	}
}

fn unavailable_response(plan: &Plan) -> SearchResponse {
	let mut filter_counts = FilterCounts::default();

	for CountQuery { action, key, .. } in &plan.counts {
		let map = match action {
			FilterAction::Remove => &mut filter_counts.remove,
			FilterAction::Add => &mut filter_counts.add,
		};

		map.insert(key.clone(), 0);
	}

	SearchResponse {
		mode: plan.mode,
		filter_counts,
		outcome: SearchOutcome::BackendUnavailable,
		..SearchResponse::default()
	}
}

fn default_intent() -> String {
	courier_domain::GENERAL_INTENT.to_string()
}

fn default_page() -> u32 {
	DEFAULT_PAGE
}

fn default_results_per_page() -> u32 {
	DEFAULT_RESULTS_PER_PAGE
}
