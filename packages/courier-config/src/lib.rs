mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Backend, Cache, Config, Feedback, Index, MAX_RESULT_WINDOW, Postgres, Preview, Ranking, Search,
	SearchFields, SearchFull, SearchLight, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);
	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.index.url.trim().is_empty() || cfg.storage.index.index.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.index.url and storage.index.index must be non-empty.".to_string(),
		});
	}
	if cfg.backend.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "backend.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.search.light.overfetch_factor == 0 {
		return Err(Error::Validation {
			message: "search.light.overfetch_factor must be greater than zero.".to_string(),
		});
	}
	if cfg.search.full.max_hits == 0 {
		return Err(Error::Validation {
			message: "search.full.max_hits must be greater than zero.".to_string(),
		});
	}
	if cfg.search.full.max_hits > MAX_RESULT_WINDOW {
		return Err(Error::Validation {
			message: format!("search.full.max_hits must be {MAX_RESULT_WINDOW} or less."),
		});
	}

	for (label, value) in [
		("search.full.primary_term_boost", cfg.search.full.primary_term_boost),
		("search.full.semantic_boost", cfg.search.full.semantic_boost),
		("search.full.domain_boost", cfg.search.full.domain_boost),
		("search.full.date_range_boost", cfg.search.full.date_range_boost),
		("search.fields.subject", cfg.search.fields.subject),
		("search.fields.body", cfg.search.fields.body),
		("search.fields.summary", cfg.search.fields.summary),
		("search.fields.relevant_terms", cfg.search.fields.relevant_terms),
		("ranking.feedback_boost", cfg.ranking.feedback_boost),
	] {
		if !value.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if value < 0.0 {
			return Err(Error::Validation { message: format!("{label} must be zero or greater.") });
		}
	}

	if let Some(dims) = cfg.search.full.embedding_dims
		&& dims == 0
	{
		return Err(Error::Validation {
			message: "search.full.embedding_dims must be greater than zero.".to_string(),
		});
	}

	if !cfg.ranking.sigmoid_slope.is_finite() || cfg.ranking.sigmoid_slope <= 0.0 {
		return Err(Error::Validation {
			message: "ranking.sigmoid_slope must be a positive finite number.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.ranking.feedback_floor) {
		return Err(Error::Validation {
			message: "ranking.feedback_floor must be in the range 0.0-1.0.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.ranking.light_screen_weight) {
		return Err(Error::Validation {
			message: "ranking.light_screen_weight must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.cache.enabled {
		if cfg.cache.response_ttl_secs == 0 || cfg.cache.weights_ttl_secs == 0 {
			return Err(Error::Validation {
				message: "cache ttl values must be greater than zero when the cache is enabled."
					.to_string(),
			});
		}
		if cfg.cache.max_entries == 0 {
			return Err(Error::Validation {
				message: "cache.max_entries must be greater than zero when the cache is enabled."
					.to_string(),
			});
		}
	}
	if cfg.feedback.bulk_max_ids == 0 {
		return Err(Error::Validation {
			message: "feedback.bulk_max_ids must be greater than zero.".to_string(),
		});
	}
	if cfg.feedback.write_concurrency == 0 {
		return Err(Error::Validation {
			message: "feedback.write_concurrency must be greater than zero.".to_string(),
		});
	}
	if cfg.preview.page_size == 0 {
		return Err(Error::Validation {
			message: "preview.page_size must be greater than zero.".to_string(),
		});
	}

	for (intent, tags) in &cfg.domains {
		if intent.trim().is_empty() {
			return Err(Error::Validation {
				message: "domains keys must be non-empty intent tags.".to_string(),
			});
		}
		if tags.iter().all(|tag| tag.trim().is_empty()) {
			return Err(Error::Validation {
				message: format!("domains.{intent} must list at least one tag."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.storage.index.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.storage.index.api_key = None;
	}

	cfg.storage.index.url = cfg.storage.index.url.trim_end_matches('/').to_string();
	cfg.domains = std::mem::take(&mut cfg.domains)
		.into_iter()
		.map(|(intent, tags)| (intent.trim().to_lowercase(), tags))
		.collect();
}
