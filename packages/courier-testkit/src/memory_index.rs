use std::{
	cmp::Ordering as CmpOrdering,
	sync::{
		Mutex,
		atomic::{AtomicBool, AtomicU64, Ordering},
	},
	time::Duration,
};

use serde_json::{Value, json};
use time::OffsetDateTime;
use unicode_segmentation::UnicodeSegmentation;

use courier_domain::terms;
use courier_storage::{
	BoxFuture, Error, Result,
	index::{BoolQuery, Clause, Field, IndexBackend, IndexQuery, SearchPage, Sort, WeightedField},
	models::{EmailFields, IndexHit},
};

const SIMILARITY_DESCRIPTION: &str =
	"script score function, computed with script: cosineSimilarity(params.query_vector, 'embedding') + 1.0";

#[derive(Clone, Debug)]
pub struct IndexedEmail {
	pub id: String,
	pub fields: EmailFields,
	pub embedding: Option<Vec<f32>>,
}
impl IndexedEmail {
	pub fn new(id: impl Into<String>, fields: EmailFields) -> Self {
		Self { id: id.into(), fields, embedding: None }
	}

	pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
		self.embedding = Some(embedding);

		self
	}
}

/// In-process index that evaluates the query language and emits backend-style explanations.
///
/// Text scoring is `(1 + ln(tf)) × field weight × boost` per query token; multi-field matches
/// keep the best field.
#[derive(Default)]
pub struct MemoryIndex {
	docs: Mutex<Vec<IndexedEmail>>,
	unavailable: AtomicBool,
	failing_counts: AtomicBool,
	malformed_explanations: AtomicBool,
	latency_ms: AtomicU64,
	search_calls: AtomicU64,
	count_calls: AtomicU64,
}
impl MemoryIndex {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_emails(emails: Vec<IndexedEmail>) -> Self {
		let index = Self::new();

		for email in emails {
			index.insert(email);
		}

		index
	}

	/// Inserts or replaces by id.
	pub fn insert(&self, email: IndexedEmail) {
		let mut docs = self.docs.lock().unwrap_or_else(|err| err.into_inner());

		match docs.iter_mut().find(|doc| doc.id == email.id) {
			Some(existing) => *existing = email,
			None => docs.push(email),
		}
	}

	pub fn len(&self) -> usize {
		self.docs.lock().unwrap_or_else(|err| err.into_inner()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Every call fails while set.
	pub fn set_unavailable(&self, unavailable: bool) {
		self.unavailable.store(unavailable, Ordering::SeqCst);
	}

	/// Count calls fail while set; searches keep working.
	pub fn set_failing_counts(&self, failing: bool) {
		self.failing_counts.store(failing, Ordering::SeqCst);
	}

	/// Requested explanations come back in a shape no explanation parser accepts.
	pub fn set_malformed_explanations(&self, malformed: bool) {
		self.malformed_explanations.store(malformed, Ordering::SeqCst);
	}

	pub fn set_latency(&self, latency: Duration) {
		self.latency_ms.store(latency.as_millis() as u64, Ordering::SeqCst);
	}

	pub fn search_calls(&self) -> u64 {
		self.search_calls.load(Ordering::SeqCst)
	}

	pub fn count_calls(&self) -> u64 {
		self.count_calls.load(Ordering::SeqCst)
	}

	async fn before_call(&self) -> Result<()> {
		let latency = self.latency_ms.load(Ordering::SeqCst);

		if latency > 0 {
			tokio::time::sleep(Duration::from_millis(latency)).await;
		}
		if self.unavailable.load(Ordering::SeqCst) {
			return Err(Error::InvalidResponse("Memory index is unavailable.".to_string()));
		}

		Ok(())
	}

	fn evaluate_all(&self, query: &IndexQuery) -> Vec<(IndexedEmail, Node)> {
		let docs = self.docs.lock().unwrap_or_else(|err| err.into_inner());
		let root = query.scoped_root();

		docs.iter()
			.enumerate()
			.filter_map(|(ordinal, doc)| {
				let ctx = DocContext { ordinal, email: doc };

				eval_bool(&root, &ctx, 1.0).map(|node| (doc.clone(), node))
			})
			.collect()
	}

	async fn run_search(&self, query: &IndexQuery) -> Result<SearchPage> {
		self.search_calls.fetch_add(1, Ordering::SeqCst);
		self.before_call().await?;

		let mut matched = self.evaluate_all(query);

		match query.sort {
			Sort::Score => matched.sort_by(|(a, a_node), (b, b_node)| {
				b_node.value.total_cmp(&a_node.value).then_with(|| a.id.cmp(&b.id))
			}),
			Sort::DateDesc => matched.sort_by(|(a, _), (b, _)| {
				compare_dates_desc(a.fields.date, b.fields.date).then_with(|| a.id.cmp(&b.id))
			}),
		}

		let total = matched.len() as u64;
		let malformed = self.malformed_explanations.load(Ordering::SeqCst);
		let hits = matched
			.into_iter()
			.skip(query.from as usize)
			.take(query.size as usize)
			.map(|(doc, node)| {
				let mut source = doc.fields;

				source.body.clear();

				IndexHit {
					id: doc.id,
					score: node.value,
					source,
					explanation: query.explain.then(|| {
						if malformed {
							json!({ "value": "n/a", "details": "truncated" })
						} else {
							node.to_json()
						}
					}),
				}
			})
			.collect();

		Ok(SearchPage { hits, total })
	}

	async fn run_count(&self, query: &IndexQuery) -> Result<u64> {
		self.count_calls.fetch_add(1, Ordering::SeqCst);
		self.before_call().await?;

		if self.failing_counts.load(Ordering::SeqCst) {
			return Err(Error::InvalidResponse("Memory index count failed.".to_string()));
		}

		Ok(self.evaluate_all(query).len() as u64)
	}
}
impl IndexBackend for MemoryIndex {
	fn search<'a>(&'a self, query: &'a IndexQuery) -> BoxFuture<'a, Result<SearchPage>> {
		Box::pin(self.run_search(query))
	}

	fn count<'a>(&'a self, query: &'a IndexQuery) -> BoxFuture<'a, Result<u64>> {
		Box::pin(self.run_count(query))
	}
}

struct DocContext<'a> {
	ordinal: usize,
	email: &'a IndexedEmail,
}
impl DocContext<'_> {
	fn field_tokens(&self, field: Field) -> Vec<String> {
		let fields = &self.email.fields;
		let text = match field {
			Field::MailboxId => return vec![fields.mailbox_id.clone()],
			Field::From => fields.from.clone(),
			Field::To => fields.to.clone(),
			Field::Subject => fields.subject.clone(),
			Field::Body => fields.body.clone(),
			Field::Summary => fields.summary.clone(),
			Field::RelevantTerms => fields.relevant_terms.join(" "),
			Field::DomainTags =>
				return fields.domain_tags.iter().map(String::as_str).map(terms::fold).collect(),
			Field::Date => return Vec::new(),
		};

		tokenize(&text)
	}
}

#[derive(Clone, Debug)]
struct Node {
	value: f32,
	description: String,
	details: Vec<Node>,
}
impl Node {
	fn leaf(value: f32, description: String) -> Self {
		Self { value, description, details: Vec::new() }
	}

	fn sum(details: Vec<Node>) -> Self {
		let value = details.iter().map(|node| node.value).sum();

		Self { value, description: "sum of:".to_string(), details }
	}

	fn to_json(&self) -> Value {
		json!({
			"value": self.value,
			"description": self.description,
			"details": self.details.iter().map(Node::to_json).collect::<Vec<_>>(),
		})
	}
}

fn tokenize(text: &str) -> Vec<String> {
	terms::fold(text).unicode_words().map(str::to_string).collect()
}

fn compare_dates_desc(a: Option<OffsetDateTime>, b: Option<OffsetDateTime>) -> CmpOrdering {
	match (a, b) {
		(Some(a), Some(b)) => b.cmp(&a),
		(Some(_), None) => CmpOrdering::Less,
		(None, Some(_)) => CmpOrdering::Greater,
		(None, None) => CmpOrdering::Equal,
	}
}

fn eval_clause(clause: &Clause, ctx: &DocContext<'_>, boost: f32) -> Option<Node> {
	match clause {
		Clause::MultiMatch { text, fields, boost: own } =>
			eval_multi_match(text, fields, ctx, boost * own),
		Clause::Match { field, text, boost: own } =>
			eval_field_match(*field, &tokenize(text), 1.0, ctx, boost * own),
		Clause::Terms { field, values, boost: own } =>
			eval_terms(*field, values, ctx, boost * own),
		Clause::Range { field, gte, lte, boost: own } =>
			eval_range(*field, *gte, *lte, ctx, boost * own),
		Clause::VectorSimilarity { vector, boost: own } =>
			eval_similarity(vector, ctx, boost * own),
		Clause::Bool(query) => eval_bool(query, ctx, boost),
	}
}

fn eval_bool(query: &BoolQuery, ctx: &DocContext<'_>, boost: f32) -> Option<Node> {
	if query.is_empty() {
		return Some(Node::leaf(boost * query.boost, "*:*".to_string()));
	}

	let boost = boost * query.boost;
	let mut details = Vec::new();

	for clause in &query.filter {
		eval_clause(clause, ctx, 0.0)?;
	}
	for clause in &query.must_not {
		if eval_clause(clause, ctx, 0.0).is_some() {
			return None;
		}
	}
	for clause in &query.must {
		details.push(eval_clause(clause, ctx, boost)?);
	}

	let mut should_matched = 0_u32;

	for clause in &query.should {
		if let Some(node) = eval_clause(clause, ctx, boost) {
			should_matched += 1;

			details.push(node);
		}
	}

	let required = query.minimum_should_match.unwrap_or(
		if query.must.is_empty() && query.filter.is_empty() && !query.should.is_empty() {
			1
		} else {
			0
		},
	);

	if should_matched < required {
		return None;
	}

	Some(Node::sum(details))
}

fn eval_multi_match(
	text: &str,
	fields: &[WeightedField],
	ctx: &DocContext<'_>,
	boost: f32,
) -> Option<Node> {
	let tokens = tokenize(text);
	let per_field: Vec<Node> = fields
		.iter()
		.filter_map(|weighted| {
			eval_field_match(weighted.field, &tokens, weighted.weight, ctx, boost)
		})
		.collect();

	if per_field.is_empty() {
		return None;
	}

	let value = per_field.iter().map(|node| node.value).fold(0.0_f32, f32::max);

	Some(Node { value, description: "max of:".to_string(), details: per_field })
}

fn eval_field_match(
	field: Field,
	tokens: &[String],
	weight: f32,
	ctx: &DocContext<'_>,
	boost: f32,
) -> Option<Node> {
	let doc_tokens = ctx.field_tokens(field);
	let mut leaves = Vec::new();

	for token in tokens {
		let tf = doc_tokens.iter().filter(|candidate| *candidate == token).count();

		if tf == 0 {
			continue;
		}

		let score = (1.0 + (tf as f32).ln()) * weight * boost;
		let description = format!(
			"weight({}:{token} in {}) [PerFieldSimilarity], result of:",
			field.as_str(),
			ctx.ordinal
		);
		let mut leaf = Node::leaf(score, description);

		leaf.details.push(Node::leaf(score, format!("score(freq={tf}.0), computed as boost * tf")));
		leaves.push(leaf);
	}

	match leaves.len() {
		0 => None,
		1 => leaves.pop(),
		_ => Some(Node::sum(leaves)),
	}
}

fn eval_terms(field: Field, values: &[String], ctx: &DocContext<'_>, boost: f32) -> Option<Node> {
	let matched = match field {
		Field::MailboxId => values.iter().any(|value| *value == ctx.email.fields.mailbox_id),
		_ => {
			let doc_tokens = ctx.field_tokens(field);

			values.iter().any(|value| doc_tokens.contains(&terms::fold(value)))
		},
	};

	if !matched {
		return None;
	}

	Some(Node::leaf(boost, format!("{}:({})", field.as_str(), values.join(" "))))
}

fn eval_range(
	field: Field,
	gte: Option<OffsetDateTime>,
	lte: Option<OffsetDateTime>,
	ctx: &DocContext<'_>,
	boost: f32,
) -> Option<Node> {
	if field != Field::Date {
		return None;
	}

	let date = ctx.email.fields.date?;

	if gte.is_some_and(|start| date < start) || lte.is_some_and(|end| date > end) {
		return None;
	}

	let bound = |value: Option<OffsetDateTime>| {
		value
			.map(|value| (value.unix_timestamp_nanos() / 1_000_000).to_string())
			.unwrap_or_else(|| "*".to_string())
	};

	Some(Node::leaf(boost, format!("{}:[{} TO {}]", field.as_str(), bound(gte), bound(lte))))
}

fn eval_similarity(vector: &[f32], ctx: &DocContext<'_>, boost: f32) -> Option<Node> {
	let stored = ctx.email.embedding.as_ref()?;

	if stored.len() != vector.len() {
		return None;
	}

	let dot: f32 = stored.iter().zip(vector).map(|(a, b)| a * b).sum();
	let norm_a = stored.iter().map(|a| a * a).sum::<f32>().sqrt();
	let norm_b = vector.iter().map(|b| b * b).sum::<f32>().sqrt();
	let cosine = if norm_a == 0.0 || norm_b == 0.0 { 0.0 } else { dot / (norm_a * norm_b) };

	Some(Node::leaf(boost * (cosine + 1.0), SIMILARITY_DESCRIPTION.to_string()))
}
