use serde_json::Value;

use crate::{
	Error, Result,
	search::{FilterAction, FilterSpec, MetadataFilters, SearchMode, SearchRequest},
};
use courier_config::{Config, SearchFields};
use courier_domain::{DomainTable, domain_table, terms};
use courier_storage::index::{
	BoolQuery, Clause, Field, IndexQuery, MailboxScope, Sort, WeightedField,
};

pub const MAX_RESULTS_PER_PAGE: u32 = 1_000;
pub const MAX_RELEVANCE: u32 = 100;

/// Fields searched by add/remove filter terms.
const FILTER_FIELDS: [Field; 6] = Field::TEXT;

#[derive(Clone, Debug)]
pub struct CountQuery {
	pub action: FilterAction,
	pub key: String,
	pub query: IndexQuery,
}

#[derive(Clone, Debug)]
pub struct Plan {
	pub mode: SearchMode,
	pub scope: MailboxScope,
	pub primary: IndexQuery,
	/// Full mode only: documents pulled in by add filters.
	pub secondary: Option<IndexQuery>,
	pub counts: Vec<CountQuery>,
	/// Whether a vector-similarity clause made it into the primary query.
	pub semantic: bool,
}

/// Request after validation, with every term list normalized.
struct Normalized<'a> {
	scope: MailboxScope,
	term_groups: Vec<Vec<String>>,
	removes: Vec<Vec<String>>,
	adds: Vec<Vec<String>>,
	counts: Vec<(FilterAction, String, Vec<String>)>,
	metadata: &'a MetadataFilters,
}

pub fn validate(req: &SearchRequest) -> Result<MailboxScope> {
	let scope = MailboxScope::new(&req.mailbox_scope)?;

	if req.page == 0 {
		return Err(Error::InvalidRequest { message: "page must be 1 or greater.".to_string() });
	}
	if req.results_per_page == 0 || req.results_per_page > MAX_RESULTS_PER_PAGE {
		return Err(Error::InvalidRequest {
			message: format!("results_per_page must be between 1 and {MAX_RESULTS_PER_PAGE}."),
		});
	}
	if req.min_relevance > MAX_RELEVANCE {
		return Err(Error::InvalidRequest {
			message: format!("min_relevance must be between 0 and {MAX_RELEVANCE}."),
		});
	}

	for (idx, group) in req.term_groups.iter().enumerate() {
		if terms::clean_terms(group).is_empty() {
			return Err(Error::InvalidRequest {
				message: format!("term_groups[{idx}] must contain at least one term."),
			});
		}
	}
	for (idx, filter) in req.filters.iter().enumerate() {
		if terms::clean_terms(&filter.terms).is_empty() {
			return Err(Error::InvalidRequest {
				message: format!("filters[{idx}].terms must contain at least one term."),
			});
		}
	}

	if let Some(range) = req.metadata_filters.date_range.as_ref()
		&& let (Some(start), Some(end)) = (range.start, range.end)
		&& start > end
	{
		return Err(Error::InvalidRequest {
			message: "metadata_filters.date_range.start must not be after its end.".to_string(),
		});
	}

	Ok(scope)
}

pub fn term_count(req: &SearchRequest) -> usize {
	req.term_groups.iter().map(|group| terms::clean_terms(group).len()).sum()
}

pub fn choose_mode(req: &SearchRequest, light_max_terms: u32) -> SearchMode {
	let complex = term_count(req) > light_max_terms as usize
		|| !domain_table::is_general(&req.intent)
		|| req.query_embedding.is_some()
		|| !req.metadata_filters.is_empty();

	if complex { SearchMode::Full } else { SearchMode::Light }
}

pub fn plan(req: &SearchRequest, cfg: &Config, domains: &DomainTable) -> Result<Plan> {
	let scope = validate(req)?;
	let mode = choose_mode(req, cfg.search.light.max_terms);
	let normalized = normalize(req, scope);

	match mode {
		SearchMode::Light => Ok(plan_light(req, cfg, normalized)),
		SearchMode::Full => Ok(plan_full(req, cfg, domains, normalized)),
	}
}

/// Reads the query embedding as a finite, non-zero vector of the configured length.
pub fn decode_embedding(raw: &Value, expected_dims: Option<u32>) -> Result<Vec<f32>> {
	let decode_err = |message: &str| Error::EmbeddingDecode { message: message.to_string() };
	let items = raw.as_array().ok_or_else(|| decode_err("query_embedding must be an array."))?;

	if items.is_empty() {
		return Err(decode_err("query_embedding must not be empty."));
	}
	if let Some(dims) = expected_dims
		&& items.len() != dims as usize
	{
		return Err(Error::EmbeddingDecode {
			message: format!("query_embedding has {} values, expected {dims}.", items.len()),
		});
	}

	let mut vector = Vec::with_capacity(items.len());

	for item in items {
		let value = item
			.as_f64()
			.map(|value| value as f32)
			.filter(|value| value.is_finite())
			.ok_or_else(|| decode_err("query_embedding values must be finite numbers."))?;

		vector.push(value);
	}

	if vector.iter().all(|value| *value == 0.0) {
		return Err(decode_err("query_embedding must have a non-zero norm."));
	}

	Ok(vector)
}

pub fn text_fields(fields: &SearchFields) -> Vec<WeightedField> {
	vec![
		WeightedField::new(Field::Subject, fields.subject),
		WeightedField::new(Field::Body, fields.body),
		WeightedField::new(Field::Summary, fields.summary),
		WeightedField::new(Field::RelevantTerms, fields.relevant_terms),
	]
}

/// Matches documents containing any of the filter terms in any display field.
pub fn filter_clause(terms: &[String]) -> Clause {
	let fields: Vec<WeightedField> =
		FILTER_FIELDS.iter().map(|field| WeightedField::new(*field, 1.0)).collect();

	Clause::any_term(terms, &fields, 1.0)
}

fn normalize(req: &SearchRequest, scope: MailboxScope) -> Normalized<'_> {
	let term_groups = req.term_groups.iter().map(|group| terms::clean_terms(group)).collect();
	let mut removes = Vec::new();
	let mut adds = Vec::new();
	let mut counts = Vec::new();

	for FilterSpec { action, terms: raw } in &req.filters {
		let cleaned = terms::clean_terms(raw);

		counts.push((*action, terms::terms_key(raw), cleaned.clone()));

		match action {
			FilterAction::Remove => removes.push(cleaned),
			FilterAction::Add => adds.push(cleaned),
		}
	}

	Normalized { scope, term_groups, removes, adds, counts, metadata: &req.metadata_filters }
}

fn plan_light(req: &SearchRequest, cfg: &Config, normalized: Normalized<'_>) -> Plan {
	let fields = text_fields(&cfg.search.fields);
	let mut base = BoolQuery::default();
	let mut any_terms: Vec<String> = Vec::new();

	for term in normalized.term_groups.iter().flatten() {
		if !any_terms.contains(term) {
			any_terms.push(term.clone());
		}
	}

	if !any_terms.is_empty() {
		base.must.push(Clause::any_term(&any_terms, &fields, 1.0));
	}

	base.must.extend(metadata_clauses(normalized.metadata, 1.0));

	let mut root = base.clone();

	root.must_not.extend(normalized.removes.iter().map(|terms| filter_clause(terms)));
	root.must.extend(normalized.adds.iter().map(|terms| filter_clause(terms)));

	let size = req.results_per_page.saturating_mul(cfg.search.light.overfetch_factor);
	let primary = IndexQuery::new(normalized.scope.clone(), root).with_size(size);
	let counts = count_queries(&normalized, &base);

	Plan {
		mode: SearchMode::Light,
		scope: normalized.scope,
		primary,
		secondary: None,
		counts,
		semantic: false,
	}
}

fn plan_full(
	req: &SearchRequest,
	cfg: &Config,
	domains: &DomainTable,
	normalized: Normalized<'_>,
) -> Plan {
	let full = &cfg.search.full;
	let fields = text_fields(&cfg.search.fields);
	let mut base = BoolQuery::default();

	for group in &normalized.term_groups {
		let should = group
			.iter()
			.enumerate()
			.map(|(idx, term)| Clause::MultiMatch {
				text: term.clone(),
				fields: fields.clone(),
				boost: if idx == 0 { full.primary_term_boost } else { 1.0 },
			})
			.collect();

		base.must.push(Clause::Bool(BoolQuery {
			should,
			minimum_should_match: Some(1),
			..BoolQuery::default()
		}));
	}

	let mut semantic = false;

	if let Some(raw) = req.query_embedding.as_ref() {
		match decode_embedding(raw, full.embedding_dims) {
			Ok(vector) => {
				base.should.push(Clause::VectorSimilarity { vector, boost: full.semantic_boost });

				semantic = true;
			},
			Err(err) => {
				tracing::warn!(error = %err, "Semantic scoring disabled for this query.");
			},
		}
	}

	let tags = domains.tags_for(&req.intent);

	if !tags.is_empty() {
		base.should.push(Clause::Terms {
			field: Field::DomainTags,
			values: tags.to_vec(),
			boost: full.domain_boost,
		});
	}

	base.must.extend(metadata_clauses(normalized.metadata, full.date_range_boost));

	let removes: Vec<Clause> =
		normalized.removes.iter().map(|terms| filter_clause(terms)).collect();
	let mut root = base.clone();

	root.must_not.extend(removes.iter().cloned());

	let primary = IndexQuery::new(normalized.scope.clone(), root)
		.with_size(full.max_hits)
		.with_explain(true)
		.with_sort(Sort::Score);
	let secondary = (!normalized.adds.is_empty()).then(|| {
		let add_terms: Vec<String> = normalized.adds.iter().flatten().cloned().collect();
		let root = BoolQuery {
			must: vec![filter_clause(&add_terms)],
			must_not: removes.clone(),
			..BoolQuery::default()
		};

		IndexQuery::new(normalized.scope.clone(), root)
			.with_size(full.max_hits)
			.with_explain(true)
			.with_sort(Sort::Score)
	});
	let counts = count_queries(&normalized, &base);

	Plan { mode: SearchMode::Full, scope: normalized.scope, primary, secondary, counts, semantic }
}

fn metadata_clauses(filters: &MetadataFilters, date_boost: f32) -> Vec<Clause> {
	let mut clauses = Vec::new();

	for (field, value) in [
		(Field::From, filters.from.as_deref()),
		(Field::To, filters.to.as_deref()),
		(Field::Subject, filters.subject.as_deref()),
	] {
		let Some(text) = value.map(str::trim).filter(|text| !text.is_empty()) else {
			continue;
		};

		clauses.push(Clause::Match { field, text: text.to_string(), boost: 1.0 });
	}

	if let Some(range) = filters.date_range.as_ref().filter(|range| !range.is_unbounded()) {
		clauses.push(Clause::Range {
			field: Field::Date,
			gte: range.start,
			lte: range.end,
			boost: date_boost,
		});
	}

	clauses
}

/// Remove counts run against the unfiltered base query; add counts only against the mailbox.
fn count_queries(normalized: &Normalized<'_>, base: &BoolQuery) -> Vec<CountQuery> {
	normalized
		.counts
		.iter()
		.map(|(action, key, terms)| {
			let root = match action {
				FilterAction::Remove => {
					let mut root = base.clone();

					root.must.push(filter_clause(terms));

					root
				},
				FilterAction::Add =>
					BoolQuery { must: vec![filter_clause(terms)], ..BoolQuery::default() },
			};

			CountQuery {
				action: *action,
				key: key.clone(),
				query: IndexQuery::new(normalized.scope.clone(), root).with_size(0),
			}
		})
		.collect()
}
