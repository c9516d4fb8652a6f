use std::time::Duration;

use reqwest::{
	Client,
	header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde_json::{Map, Value, json};
use time::format_description::well_known::Rfc3339;

use crate::{
	BoxFuture, Error, Result,
	index::{BoolQuery, Clause, IndexBackend, IndexQuery, SearchPage, Sort, WeightedField},
	models::{EmailFields, IndexHit},
};

const SIMILARITY_SCRIPT: &str =
	"doc['embedding'].size() == 0 ? 0 : cosineSimilarity(params.query_vector, 'embedding') + 1.0";

/// Elasticsearch-compatible index reached over HTTP.
pub struct ElasticIndex {
	client: Client,
	base_url: String,
	index: String,
}
impl ElasticIndex {
	pub fn new(cfg: &courier_config::Index, timeout_ms: u64) -> Result<Self> {
		let mut headers = HeaderMap::new();

		if let Some(api_key) = cfg.api_key.as_deref() {
			let value = HeaderValue::from_str(&format!("ApiKey {api_key}")).map_err(|_| {
				Error::InvalidArgument("storage.index.api_key is not a valid header.".to_string())
			})?;

			headers.insert(AUTHORIZATION, value);
		}

		let client = Client::builder()
			.timeout(Duration::from_millis(timeout_ms))
			.default_headers(headers)
			.build()?;

		Ok(Self { client, base_url: cfg.url.clone(), index: cfg.index.clone() })
	}

	async fn post(&self, endpoint: &str, body: &Value) -> Result<Value> {
		let url = format!("{}/{}/{endpoint}", self.base_url, self.index);
		let res = self.client.post(url).json(body).send().await?;
		let json: Value = res.error_for_status()?.json().await?;

		Ok(json)
	}

	async fn run_search(&self, query: &IndexQuery) -> Result<SearchPage> {
		let body = render_search(query);
		let json = self.post("_search", &body).await?;

		parse_search_response(json)
	}

	async fn run_count(&self, query: &IndexQuery) -> Result<u64> {
		let body = json!({ "query": render_bool(&query.scoped_root()) });
		let json = self.post("_count", &body).await?;

		json.get("count")
			.and_then(Value::as_u64)
			.ok_or_else(|| Error::InvalidResponse("Count response is missing count.".to_string()))
	}
}
impl IndexBackend for ElasticIndex {
	fn search<'a>(&'a self, query: &'a IndexQuery) -> BoxFuture<'a, Result<SearchPage>> {
		Box::pin(self.run_search(query))
	}

	fn count<'a>(&'a self, query: &'a IndexQuery) -> BoxFuture<'a, Result<u64>> {
		Box::pin(self.run_count(query))
	}
}

pub fn render_search(query: &IndexQuery) -> Value {
	let sort = match query.sort {
		Sort::Score => json!(["_score", { "email_id": { "order": "asc" } }]),
		Sort::DateDesc => json!([
			{ "date": { "order": "desc", "missing": "_last" } },
			{ "email_id": { "order": "asc" } }
		]),
	};

	json!({
		"query": render_bool(&query.scoped_root()),
		"size": query.size,
		"from": query.from,
		"explain": query.explain,
		"track_total_hits": true,
		"track_scores": true,
		"sort": sort,
		"_source": { "excludes": ["body", "embedding"] },
	})
}

pub fn render_bool(query: &BoolQuery) -> Value {
	let mut body = Map::new();

	for (key, clauses) in [
		("must", &query.must),
		("should", &query.should),
		("must_not", &query.must_not),
		("filter", &query.filter),
	] {
		if clauses.is_empty() {
			continue;
		}

		body.insert(key.to_string(), Value::Array(clauses.iter().map(render_clause).collect()));
	}

	if let Some(min) = query.minimum_should_match {
		body.insert("minimum_should_match".to_string(), json!(min));
	}
	if query.boost != 1.0 {
		body.insert("boost".to_string(), json!(query.boost));
	}
	if body.is_empty() {
		return json!({ "match_all": {} });
	}

	json!({ "bool": body })
}

fn render_clause(clause: &Clause) -> Value {
	match clause {
		Clause::MultiMatch { text, fields, boost } => json!({
			"multi_match": {
				"query": text,
				"fields": fields.iter().map(render_weighted_field).collect::<Vec<_>>(),
				"type": "best_fields",
				"boost": boost,
			}
		}),
		Clause::Match { field, text, boost } => json!({
			"match": { field.as_str(): { "query": text, "boost": boost } }
		}),
		Clause::Terms { field, values, boost } => json!({
			"terms": { field.as_str(): values, "boost": boost }
		}),
		Clause::Range { field, gte, lte, boost } => {
			let mut range = Map::new();

			if let Some(gte) = gte.and_then(|value| value.format(&Rfc3339).ok()) {
				range.insert("gte".to_string(), Value::String(gte));
			}
			if let Some(lte) = lte.and_then(|value| value.format(&Rfc3339).ok()) {
				range.insert("lte".to_string(), Value::String(lte));
			}

			range.insert("boost".to_string(), json!(boost));

			json!({ "range": { field.as_str(): range } })
		},
		Clause::VectorSimilarity { vector, boost } => json!({
			"script_score": {
				"query": { "exists": { "field": "embedding" } },
				"script": {
					"source": SIMILARITY_SCRIPT,
					"params": { "query_vector": vector },
				},
				"boost": boost,
			}
		}),
		Clause::Bool(query) => render_bool(query),
	}
}

fn render_weighted_field(field: &WeightedField) -> String {
	format!("{}^{}", field.field.as_str(), field.weight)
}

fn parse_search_response(json: Value) -> Result<SearchPage> {
	let hits = json
		.get("hits")
		.ok_or_else(|| Error::InvalidResponse("Search response is missing hits.".to_string()))?;
	let total = hits
		.get("total")
		.and_then(|total| total.get("value").or(Some(total)))
		.and_then(Value::as_u64)
		.unwrap_or(0);
	let items = hits.get("hits").and_then(Value::as_array).cloned().unwrap_or_default();
	let mut out = Vec::with_capacity(items.len());

	for item in items {
		let id = item
			.get("_id")
			.and_then(Value::as_str)
			.ok_or_else(|| Error::InvalidResponse("Search hit is missing _id.".to_string()))?
			.to_string();
		let score = item.get("_score").and_then(Value::as_f64).unwrap_or(0.0) as f32;
		let source = match item.get("_source") {
			Some(source) => serde_json::from_value::<EmailFields>(source.clone())?,
			None => return Err(Error::InvalidResponse(format!("Search hit {id} has no _source."))),
		};
		let explanation = item.get("_explanation").cloned();

		out.push(IndexHit { id, score, source, explanation });
	}

	Ok(SearchPage { hits: out, total })
}
