use std::{
	collections::HashMap,
	sync::Mutex,
	time::{Duration, Instant},
};

use serde_json::Value;

use crate::{
	Error, Result,
	search::{SearchRequest, SearchResponse},
};

const RESPONSE_CACHE_SCHEMA_VERSION: i32 = 1;

/// Stores finished responses keyed by request hash; entries expire after a fixed TTL.
pub trait ResponseCache
where
	Self: Send + Sync,
{
	fn get(&self, key: &str) -> Option<SearchResponse>;

	/// Invalidation generation of the mailboxes; changes whenever any of them is invalidated.
	fn generation(&self, mailboxes: &[String]) -> u64;

	/// Stores the response unless the mailboxes were invalidated after `generation` was read.
	fn put(&self, key: String, mailboxes: Vec<String>, generation: u64, response: SearchResponse);

	/// Drops every entry whose request could read `mailbox_id`.
	fn invalidate_mailbox(&self, mailbox_id: &str);
}

pub struct NoopResponseCache;
impl ResponseCache for NoopResponseCache {
	fn get(&self, _key: &str) -> Option<SearchResponse> {
		None
	}

	fn generation(&self, _mailboxes: &[String]) -> u64 {
		0
	}

	fn put(
		&self,
		_key: String,
		_mailboxes: Vec<String>,
		_generation: u64,
		_response: SearchResponse,
	) {
	}

	fn invalidate_mailbox(&self, _mailbox_id: &str) {}
}

struct CacheEntry {
	inserted_at: Instant,
	mailboxes: Vec<String>,
	response: SearchResponse,
}

#[derive(Default)]
struct CacheState {
	entries: HashMap<String, CacheEntry>,
	generations: HashMap<String, u64>,
}
impl CacheState {
	fn generation(&self, mailboxes: &[String]) -> u64 {
		mailboxes
			.iter()
			.map(|mailbox| self.generations.get(mailbox).copied().unwrap_or_default())
			.fold(0, u64::wrapping_add)
	}
}

pub struct MemoryResponseCache {
	ttl: Duration,
	max_entries: usize,
	state: Mutex<CacheState>,
}
impl MemoryResponseCache {
	pub fn new(ttl: Duration, max_entries: usize) -> Self {
		Self { ttl, max_entries: max_entries.max(1), state: Mutex::new(CacheState::default()) }
	}

	pub fn from_config(cfg: &courier_config::Cache) -> Self {
		Self::new(Duration::from_secs(cfg.response_ttl_secs), cfg.max_entries)
	}

	pub fn len(&self) -> usize {
		self.state.lock().unwrap_or_else(|err| err.into_inner()).entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
impl ResponseCache for MemoryResponseCache {
	fn get(&self, key: &str) -> Option<SearchResponse> {
		let mut state = self.state.lock().unwrap_or_else(|err| err.into_inner());
		let entries = &mut state.entries;
		let expired = entries.get(key)?.inserted_at.elapsed() >= self.ttl;

		if expired {
			entries.remove(key);

			return None;
		}

		entries.get(key).map(|entry| entry.response.clone())
	}

	fn generation(&self, mailboxes: &[String]) -> u64 {
		self.state.lock().unwrap_or_else(|err| err.into_inner()).generation(mailboxes)
	}

	fn put(&self, key: String, mailboxes: Vec<String>, generation: u64, response: SearchResponse) {
		let mut state = self.state.lock().unwrap_or_else(|err| err.into_inner());

		if state.generation(&mailboxes) != generation {
			return;
		}

		let entries = &mut state.entries;
		let ttl = self.ttl;

		entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);

		if entries.len() >= self.max_entries && !entries.contains_key(&key) {
			let oldest = entries
				.iter()
				.min_by_key(|(_, entry)| entry.inserted_at)
				.map(|(oldest, _)| oldest.clone());

			if let Some(oldest) = oldest {
				entries.remove(&oldest);
			}
		}

		entries.insert(key, CacheEntry { inserted_at: Instant::now(), mailboxes, response });
	}

	fn invalidate_mailbox(&self, mailbox_id: &str) {
		let mut state = self.state.lock().unwrap_or_else(|err| err.into_inner());
		let generation = state.generations.entry(mailbox_id.to_string()).or_default();

		*generation = generation.wrapping_add(1);
		state
			.entries
			.retain(|_, entry| !entry.mailboxes.iter().any(|mailbox| mailbox == mailbox_id));
	}
}

pub fn hash_cache_key(payload: &Value) -> Result<String> {
	let raw = serde_json::to_vec(payload).map_err(|err| Error::Storage {
		message: format!("Failed to encode cache key payload: {err}"),
	})?;

	Ok(blake3::hash(&raw).to_hex().to_string())
}

pub fn cache_key_prefix(key: &str) -> &str {
	let len = key.len().min(12);

	&key[..len]
}

/// Hash of the canonical request JSON; mailbox order does not matter.
pub fn cache_key(req: &SearchRequest) -> Result<String> {
	let mut mailboxes: Vec<&str> = req.mailbox_scope.iter().map(|id| id.trim()).collect();

	mailboxes.sort_unstable();
	mailboxes.dedup();

	let mut request = serde_json::to_value(req).map_err(|err| Error::Storage {
		message: format!("Failed to encode search request: {err}"),
	})?;

	if let Some(object) = request.as_object_mut() {
		object.insert("mailbox_scope".to_string(), serde_json::json!(mailboxes));
	}

	let payload = serde_json::json!({
		"kind": "search_response",
		"schema_version": RESPONSE_CACHE_SCHEMA_VERSION,
		"request": request,
	});

	hash_cache_key(&payload)
}
