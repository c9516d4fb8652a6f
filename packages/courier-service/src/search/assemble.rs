use std::cmp::Ordering;

use crate::search::RankedResult;

pub struct PageOptions {
	pub min_relevance: u32,
	/// Keeps documents below `min_relevance`.
	pub filter_only: bool,
	pub page: u32,
	pub results_per_page: u32,
	pub get_all_ids: bool,
}

#[derive(Debug)]
pub struct Assembled {
	pub results: Vec<RankedResult>,
	/// Size of the filtered, sorted set before pagination.
	pub total: u64,
	pub all_ids: Option<Vec<String>>,
}

/// Relevance descending, then raw score descending, then id ascending.
pub fn compare(a: &RankedResult, b: &RankedResult) -> Ordering {
	b.relevance
		.cmp(&a.relevance)
		.then_with(|| b.score.total_cmp(&a.score))
		.then_with(|| a.id.cmp(&b.id))
}

pub fn assemble(mut ranked: Vec<RankedResult>, opts: &PageOptions) -> Assembled {
	if !opts.filter_only {
		ranked.retain(|result| u32::from(result.relevance) >= opts.min_relevance);
	}

	ranked.sort_by(compare);

	let total = ranked.len() as u64;
	let all_ids =
		opts.get_all_ids.then(|| ranked.iter().map(|result| result.id.clone()).collect());
	let per_page = opts.results_per_page.max(1) as usize;
	let start = (opts.page.max(1) as usize - 1).saturating_mul(per_page);
	let results = ranked.into_iter().skip(start).take(per_page).collect();

	Assembled { results, total, all_ids }
}
