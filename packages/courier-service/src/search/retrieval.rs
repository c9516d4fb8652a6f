use std::{collections::HashSet, sync::Arc, time::Duration};

use tokio::task::JoinSet;

use crate::{
	Error, Result,
	search::{FilterAction, FilterCounts, planner::CountQuery},
};
use courier_storage::{
	index::{IndexBackend, IndexQuery, SearchPage},
	models::IndexHit,
};

pub async fn search(
	index: &dyn IndexBackend,
	query: &IndexQuery,
	timeout: Duration,
) -> Result<SearchPage> {
	match tokio::time::timeout(timeout, index.search(query)).await {
		Ok(Ok(page)) => Ok(page),
		Ok(Err(err)) => Err(Error::BackendUnavailable { message: err.to_string() }),
		Err(_) => Err(Error::BackendUnavailable {
			message: format!("Index search timed out after {} ms.", timeout.as_millis()),
		}),
	}
}

pub async fn count(index: &dyn IndexBackend, query: &IndexQuery, timeout: Duration) -> Result<u64> {
	match tokio::time::timeout(timeout, index.count(query)).await {
		Ok(Ok(count)) => Ok(count),
		Ok(Err(err)) => Err(Error::BackendUnavailable { message: err.to_string() }),
		Err(_) => Err(Error::BackendUnavailable {
			message: format!("Index count timed out after {} ms.", timeout.as_millis()),
		}),
	}
}

/// Runs the primary and optional secondary query together and unions the hits by id.
///
/// Primary hits keep their position and score; secondary hits are appended only when new.
pub async fn retrieve(
	index: &dyn IndexBackend,
	primary: &IndexQuery,
	secondary: Option<&IndexQuery>,
	timeout: Duration,
) -> Result<Vec<IndexHit>> {
	let Some(secondary) = secondary else {
		return Ok(search(index, primary, timeout).await?.hits);
	};
	let (primary, secondary) =
		tokio::join!(search(index, primary, timeout), search(index, secondary, timeout));

	Ok(union_hits(primary?.hits, secondary?.hits))
}

pub fn union_hits(primary: Vec<IndexHit>, secondary: Vec<IndexHit>) -> Vec<IndexHit> {
	let mut seen: HashSet<String> = primary.iter().map(|hit| hit.id.clone()).collect();
	let mut out = primary;

	for hit in secondary {
		if seen.insert(hit.id.clone()) {
			out.push(hit);
		}
	}

	out
}

/// Issues every filter count concurrently. A failed count reports zero for its key.
pub async fn run_counts(
	index: Arc<dyn IndexBackend>,
	counts: Vec<CountQuery>,
	timeout: Duration,
) -> FilterCounts {
	let mut out = FilterCounts::default();
	let mut tasks = JoinSet::new();

	for CountQuery { action, key, query } in counts {
		let index = index.clone();

		tasks.spawn(async move {
			let result = count(index.as_ref(), &query, timeout).await;

			(action, key, result)
		});
	}

	while let Some(joined) = tasks.join_next().await {
		let (action, key, result) = match joined {
			Ok(done) => done,
			Err(err) => {
				tracing::warn!(error = %err, "Filter count task failed.");

				continue;
			},
		};
		let value = match result {
			Ok(value) => value,
			Err(err) => {
				tracing::warn!(
					error = %err,
					filter_key = key.as_str(),
					action = ?action,
					"Filter count failed; reporting zero."
				);

				0
			},
		};
		let map = match action {
			FilterAction::Remove => &mut out.remove,
			FilterAction::Add => &mut out.add,
		};

		map.insert(key, value);
	}

	out
}
