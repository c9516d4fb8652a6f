use time::OffsetDateTime;

use crate::{BoxFuture, Error, Result, models::IndexHit};

/// Indexed fields the query language can address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
	MailboxId,
	From,
	To,
	Subject,
	Body,
	Summary,
	RelevantTerms,
	DomainTags,
	Date,
}
impl Field {
	pub const TEXT: [Self; 6] =
		[Self::From, Self::To, Self::Subject, Self::Body, Self::Summary, Self::RelevantTerms];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::MailboxId => "mailbox_id",
			Self::From => "from",
			Self::To => "to",
			Self::Subject => "subject",
			Self::Body => "body",
			Self::Summary => "summary",
			Self::RelevantTerms => "relevant_terms",
			Self::DomainTags => "domain_tags",
			Self::Date => "date",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		let field = match raw {
			"mailbox_id" => Self::MailboxId,
			"from" => Self::From,
			"to" => Self::To,
			"subject" => Self::Subject,
			"body" => Self::Body,
			"summary" => Self::Summary,
			"relevant_terms" => Self::RelevantTerms,
			"domain_tags" => Self::DomainTags,
			"date" => Self::Date,
			_ => return None,
		};

		Some(field)
	}

	pub fn is_text(self) -> bool {
		Self::TEXT.contains(&self)
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightedField {
	pub field: Field,
	pub weight: f32,
}
impl WeightedField {
	pub fn new(field: Field, weight: f32) -> Self {
		Self { field, weight }
	}
}

#[derive(Clone, Debug, PartialEq)]
pub enum Clause {
	/// Analyzed match of `text` against several fields; the best field wins.
	MultiMatch { text: String, fields: Vec<WeightedField>, boost: f32 },
	/// Analyzed match of `text` against one field.
	Match { field: Field, text: String, boost: f32 },
	/// Exact keyword membership; scores a constant `boost` when it matches.
	Terms { field: Field, values: Vec<String>, boost: f32 },
	/// Inclusive date range; scores a constant `boost` when it matches.
	Range { field: Field, gte: Option<OffsetDateTime>, lte: Option<OffsetDateTime>, boost: f32 },
	/// `boost × (cosine(vector, stored embedding) + 1)` for documents carrying an embedding.
	VectorSimilarity { vector: Vec<f32>, boost: f32 },
	Bool(BoolQuery),
}
impl Clause {
	/// Matches a document containing any of `terms` in any of `fields`.
	pub fn any_term(terms: &[String], fields: &[WeightedField], boost: f32) -> Self {
		let should = terms
			.iter()
			.map(|term| Self::MultiMatch {
				text: term.clone(),
				fields: fields.to_vec(),
				boost: 1.0,
			})
			.collect();

		Self::Bool(BoolQuery {
			should,
			minimum_should_match: Some(1),
			boost,
			..BoolQuery::default()
		})
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoolQuery {
	pub must: Vec<Clause>,
	pub should: Vec<Clause>,
	pub must_not: Vec<Clause>,
	/// Non-scoring required clauses.
	pub filter: Vec<Clause>,
	pub minimum_should_match: Option<u32>,
	pub boost: f32,
}
impl BoolQuery {
	pub fn is_empty(&self) -> bool {
		self.must.is_empty()
			&& self.should.is_empty()
			&& self.must_not.is_empty()
			&& self.filter.is_empty()
	}
}
impl Default for BoolQuery {
	fn default() -> Self {
		Self {
			must: Vec::new(),
			should: Vec::new(),
			must_not: Vec::new(),
			filter: Vec::new(),
			minimum_should_match: None,
			boost: 1.0,
		}
	}
}

/// Non-empty, sorted, deduplicated set of mailbox ids a query may read.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MailboxScope {
	ids: Vec<String>,
}
impl MailboxScope {
	pub fn new<I, S>(ids: I) -> Result<Self>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut out: Vec<String> = Vec::new();

		for id in ids {
			let id = id.as_ref().trim();

			if id.is_empty() {
				return Err(Error::InvalidArgument("mailbox ids must be non-empty.".to_string()));
			}

			out.push(id.to_string());
		}

		if out.is_empty() {
			return Err(Error::InvalidArgument("mailbox scope must be non-empty.".to_string()));
		}

		out.sort();
		out.dedup();

		Ok(Self { ids: out })
	}

	pub fn ids(&self) -> &[String] {
		&self.ids
	}

	pub fn contains(&self, mailbox_id: &str) -> bool {
		self.ids.binary_search_by(|id| id.as_str().cmp(mailbox_id)).is_ok()
	}

	pub fn clause(&self) -> Clause {
		Clause::Terms { field: Field::MailboxId, values: self.ids.clone(), boost: 1.0 }
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Sort {
	/// Score descending, then id ascending.
	#[default]
	Score,
	/// Date descending with undated documents last, then id ascending.
	DateDesc,
}

/// A query that can only be built together with its mailbox scope.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexQuery {
	scope: MailboxScope,
	pub root: BoolQuery,
	pub size: u32,
	pub from: u32,
	pub explain: bool,
	pub sort: Sort,
}
impl IndexQuery {
	pub fn new(scope: MailboxScope, root: BoolQuery) -> Self {
		Self { scope, root, size: 10, from: 0, explain: false, sort: Sort::Score }
	}

	pub fn scope(&self) -> &MailboxScope {
		&self.scope
	}

	/// The root query with the mailbox restriction attached as a filter.
	pub fn scoped_root(&self) -> BoolQuery {
		let mut root = self.root.clone();

		root.filter.insert(0, self.scope.clause());

		root
	}

	pub fn with_size(mut self, size: u32) -> Self {
		self.size = size;

		self
	}

	pub fn with_from(mut self, from: u32) -> Self {
		self.from = from;

		self
	}

	pub fn with_explain(mut self, explain: bool) -> Self {
		self.explain = explain;

		self
	}

	pub fn with_sort(mut self, sort: Sort) -> Self {
		self.sort = sort;

		self
	}
}

#[derive(Clone, Debug, Default)]
pub struct SearchPage {
	pub hits: Vec<IndexHit>,
	/// Total matches, independent of `size` and `from`.
	pub total: u64,
}

pub trait IndexBackend
where
	Self: Send + Sync,
{
	fn search<'a>(&'a self, query: &'a IndexQuery) -> BoxFuture<'a, Result<SearchPage>>;

	fn count<'a>(&'a self, query: &'a IndexQuery) -> BoxFuture<'a, Result<u64>>;
}
