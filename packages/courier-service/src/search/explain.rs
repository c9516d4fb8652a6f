use serde::{Deserialize, Serialize};

use crate::search::decompose::ScoreComponents;
use courier_storage::{index::Field, models::EmailFields};

pub const NO_FACTORS: &str = "no specific contributing factors identified.";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BreakdownTerm {
	pub name: String,
	pub value: f64,
}

/// Scaled contributions behind an explanation; `terms` sum to `total`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
	pub total: f64,
	pub terms: Vec<BreakdownTerm>,
}
impl ScoreBreakdown {
	pub fn reported_sum(&self) -> f64 {
		self.terms.iter().map(|term| term.value).sum()
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct Explained {
	pub text: String,
	pub breakdown: Option<ScoreBreakdown>,
}
impl Explained {
	fn none() -> Self {
		Self { text: NO_FACTORS.to_string(), breakdown: None }
	}
}

pub fn build(total: f64, components: &ScoreComponents, document: &EmailFields) -> Explained {
	let sum = components.sum();

	if sum <= 0.0 || !sum.is_finite() || !total.is_finite() {
		return Explained::none();
	}

	let scale = total / sum;
	let mut terms = Vec::new();
	let mut parts = Vec::new();

	if components.text > 0.0 {
		let fields = field_scores(components, scale);
		let listed = fields
			.iter()
			.map(|(field, value)| format!("{} {value:.2}", field.as_str()))
			.collect::<Vec<_>>()
			.join(", ");

		parts.push(format!("text match {:.2} ({listed})", components.text * scale));
		terms.extend(fields.into_iter().map(|(field, value)| BreakdownTerm {
			name: format!("text.{}", field.as_str()),
			value,
		}));
	}
	if components.domain > 0.0 {
		let value = components.domain * scale;

		match document.domain_tags.first() {
			Some(tag) => parts.push(format!("domain match {value:.2} ({tag})")),
			None => parts.push(format!("domain match {value:.2}")),
		}

		terms.push(BreakdownTerm { name: "domain".to_string(), value });
	}
	if components.semantic > 0.0 {
		let value = components.semantic * scale;

		parts.push(format!("semantic similarity {value:.2}"));
		terms.push(BreakdownTerm { name: "semantic".to_string(), value });
	}
	if components.temporal > 0.0 {
		let value = components.temporal * scale;

		parts.push(format!("date range {value:.2}"));
		terms.push(BreakdownTerm { name: "temporal".to_string(), value });
	}

	Explained {
		text: format!("Score {total:.2}: {}.", parts.join("; ")),
		breakdown: Some(ScoreBreakdown { total, terms }),
	}
}

/// Light mode has no explanation tree; the whole score is text relevance.
pub fn build_light(total: f64) -> Explained {
	if total <= 0.0 || !total.is_finite() {
		return Explained::none();
	}

	Explained {
		text: format!("Score {total:.2}: text match {total:.2}."),
		breakdown: Some(ScoreBreakdown {
			total,
			terms: vec![BreakdownTerm { name: "text".to_string(), value: total }],
		}),
	}
}

/// Scaled text contribution per field, largest first.
fn field_scores(components: &ScoreComponents, scale: f64) -> Vec<(Field, f64)> {
	let mut fields: Vec<(Field, f64)> = Vec::new();

	for term in &components.matches {
		match fields.iter_mut().find(|(field, _)| *field == term.field) {
			Some((_, value)) => *value += term.score * scale,
			None => fields.push((term.field, term.score * scale)),
		}
	}

	fields.sort_by(|(a_field, a), (b_field, b)| {
		b.total_cmp(a).then_with(|| a_field.cmp(b_field))
	});

	fields
}
