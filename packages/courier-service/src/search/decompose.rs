use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Result};
use courier_storage::index::Field;

const WEIGHT_MARKER: &str = r"^weight\((?P<field>[A-Za-z_][A-Za-z0-9_.]*):(?P<term>.+?) in \d+\)";
const DOMAIN_MARKER: &str = "domain_tags";
const SEMANTIC_MARKERS: [&str; 2] = ["script score", "cosineSimilarity"];
const TEMPORAL_MARKER: &str = "date:[";
const DIS_MAX_MARKER: &str = "max of:";

static WEIGHT_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(WEIGHT_MARKER).ok());

/// One node of a backend score explanation.
#[derive(Clone, Debug, Deserialize)]
pub struct ExplanationNode {
	pub value: f64,
	#[serde(default)]
	pub description: String,
	#[serde(default)]
	pub details: Vec<ExplanationNode>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TermMatch {
	pub field: Field,
	pub term: String,
	pub score: f64,
}

/// Non-negative contributions recovered from an explanation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScoreComponents {
	pub text: f64,
	pub domain: f64,
	pub semantic: f64,
	pub temporal: f64,
	pub matches: Vec<TermMatch>,
}
impl ScoreComponents {
	pub fn sum(&self) -> f64 {
		self.text + self.domain + self.semantic + self.temporal
	}
}

enum Marker {
	Text { field: Field, term: String },
	Domain,
	Semantic,
	Temporal,
}

pub fn parse(raw: &Value) -> Result<ExplanationNode> {
	serde_json::from_value(raw.clone())
		.map_err(|err| Error::ExplainParse { message: err.to_string() })
}

pub fn decompose(tree: &ExplanationNode) -> ScoreComponents {
	let mut out = ScoreComponents::default();

	walk(tree, &mut out);

	out
}

fn walk(node: &ExplanationNode, out: &mut ScoreComponents) {
	if let Some(marker) = classify(&node.description) {
		let value = if node.value.is_finite() { node.value.max(0.0) } else { 0.0 };

		match marker {
			Marker::Text { field, term } => {
				out.text += value;
				out.matches.push(TermMatch { field, term, score: value });
			},
			Marker::Domain => out.domain += value,
			Marker::Semantic => out.semantic += value,
			Marker::Temporal => out.temporal += value,
		}

		return;
	}

	// Multi-field matches score as their best field only.
	if node.description.starts_with(DIS_MAX_MARKER) {
		let best = node
			.details
			.iter()
			.reduce(|best, child| if child.value > best.value { child } else { best });

		if let Some(best) = best {
			walk(best, out);
		}

		return;
	}

	for child in &node.details {
		walk(child, out);
	}
}

fn classify(description: &str) -> Option<Marker> {
	if description.contains(DOMAIN_MARKER) {
		return Some(Marker::Domain);
	}
	if SEMANTIC_MARKERS.iter().any(|marker| description.contains(marker)) {
		return Some(Marker::Semantic);
	}
	if description.contains(TEMPORAL_MARKER) {
		return Some(Marker::Temporal);
	}

	let captures = WEIGHT_RE.as_ref()?.captures(description)?;
	let raw_field = captures.name("field")?.as_str();
	let field = Field::parse(raw_field.split('.').next().unwrap_or(raw_field))?;

	if !field.is_text() {
		return None;
	}

	let term = captures.name("term")?.as_str().trim_matches('"').to_string();

	Some(Marker::Text { field, term })
}
