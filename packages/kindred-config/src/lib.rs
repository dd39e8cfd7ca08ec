mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Cache, Config, EmbeddingProviderConfig, ExactMatch, Postgres, Providers, Search, Service,
	Storage,
};

use std::{fs, path::Path};

const MAX_SEARCH_TTL_DAYS: i64 = 36_500;

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
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}

	let embedding = &cfg.providers.embedding;

	if embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if embedding.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.timeout_ms must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("providers.embedding.api_key", &embedding.api_key),
		("providers.embedding.api_base", &embedding.api_base),
		("providers.embedding.model", &embedding.model),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	for (label, value) in [
		("search.candidate_limit", cfg.search.candidate_limit),
		("search.results_limit", cfg.search.results_limit),
		("search.max_facets_per_query", cfg.search.max_facets_per_query),
		("cache.facets_refresh_limit", cfg.cache.facets_refresh_limit),
		("cache.extraction_max_entries", cfg.cache.extraction_max_entries),
	] {
		if value == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	if !cfg.search.min_similarity.is_finite() {
		return Err(Error::Validation {
			message: "search.min_similarity must be a finite number.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.search.min_similarity) {
		return Err(Error::Validation {
			message: "search.min_similarity must be in the range 0.0-1.0.".to_string(),
		});
	}

	let exact = &cfg.search.exact_match;

	if !exact.penalty_multiplier.is_finite() {
		return Err(Error::Validation {
			message: "search.exact_match.penalty_multiplier must be a finite number.".to_string(),
		});
	}
	if exact.penalty_multiplier <= 0.0 || exact.penalty_multiplier > 1.0 {
		return Err(Error::Validation {
			message: "search.exact_match.penalty_multiplier must be in the range (0.0, 1.0]."
				.to_string(),
		});
	}
	if !exact.boost_multiplier.is_finite() {
		return Err(Error::Validation {
			message: "search.exact_match.boost_multiplier must be a finite number.".to_string(),
		});
	}
	if exact.boost_multiplier < 1.0 {
		return Err(Error::Validation {
			message: "search.exact_match.boost_multiplier must be 1.0 or greater.".to_string(),
		});
	}
	if !(0..=MAX_SEARCH_TTL_DAYS).contains(&cfg.cache.search_ttl_days) {
		return Err(Error::Validation {
			message: format!("cache.search_ttl_days must be in the range 0-{MAX_SEARCH_TTL_DAYS}."),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.service.log_level = cfg.service.log_level.trim().to_string();

	let embedding = &mut cfg.providers.embedding;

	embedding.api_base = embedding.api_base.trim_end_matches('/').to_string();

	if !embedding.path.is_empty() && !embedding.path.starts_with('/') {
		embedding.path = format!("/{}", embedding.path);
	}
}
