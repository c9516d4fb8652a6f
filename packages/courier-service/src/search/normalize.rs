use courier_config::Ranking;
use courier_storage::models::IndexHit;

use crate::{
	feedback::FeedbackWeightMap,
	search::{RankedResult, explain::Explained},
};

pub struct Candidate {
	pub hit: IndexHit,
	/// Score after feedback blending; drives relevance.
	pub effective: f64,
	pub explained: Explained,
}

/// `round(100 / (1 + exp(-slope × (score - mean))))`, clamped to 0..=100.
pub fn relevance(score: f64, mean: f64, slope: f64) -> u8 {
	let raw = 100.0 / (1.0 + (-slope * (score - mean)).exp());

	if raw.is_nan() {
		return 50;
	}

	raw.round().clamp(0.0, 100.0) as u8
}

pub fn mean(scores: &[f64]) -> f64 {
	if scores.is_empty() {
		return 0.0;
	}

	scores.iter().sum::<f64>() / scores.len() as f64
}

/// Light mode: drops candidates whose feedback weight is at or below the screen, then
/// blends the rest multiplicatively.
pub fn screen_light(
	hits: Vec<IndexHit>,
	weights: &FeedbackWeightMap,
	ranking: &Ranking,
) -> Vec<(IndexHit, f64)> {
	hits.into_iter()
		.filter_map(|hit| {
			let weight = weights.weight(&hit.source.mailbox_id, &hit.id);

			if weight <= ranking.light_screen_weight {
				return None;
			}

			let effective = f64::from(hit.score) * f64::from(weight);

			Some((hit, effective))
		})
		.collect()
}

/// Full mode: feedback shifts the score additively and stays out of the explanation.
pub fn full_effective_score(raw: f64, weight: f32, feedback_boost: f32) -> f64 {
	raw + f64::from(feedback_boost) * (f64::from(weight) - 1.0)
}

/// Relevance is relative to the candidate set: a document at the set mean scores 50.
pub fn normalize(candidates: Vec<Candidate>, slope: f32) -> Vec<RankedResult> {
	let scores: Vec<f64> = candidates.iter().map(|candidate| candidate.effective).collect();
	let mean = mean(&scores);
	let slope = f64::from(slope);

	candidates
		.into_iter()
		.map(|Candidate { hit, effective, explained }| {
			let IndexHit { id, score, source, .. } = hit;

			RankedResult {
				id,
				domain_tag: source.domain_tags.first().cloned(),
				mailbox_id: source.mailbox_id,
				from: source.from,
				to: source.to,
				subject: source.subject,
				date: source.date,
				summary: source.summary,
				relevant_terms: source.relevant_terms,
				relevance: relevance(effective, mean, slope),
				score,
				explanation: explained.text,
				breakdown: explained.breakdown,
			}
		})
		.collect()
}
