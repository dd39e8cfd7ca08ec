use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub cache: Cache,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	/// Passed to `tracing_subscriber::EnvFilter` by the embedding application.
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Search {
	pub candidate_limit: u32,
	pub results_limit: u32,
	pub min_similarity: f32,
	/// Upper bound on values in one set-membership prefilter query.
	pub max_facets_per_query: u32,
	pub parallel_scoring: bool,
	pub exact_match: ExactMatch,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			candidate_limit: 200,
			results_limit: 50,
			min_similarity: 0.2,
			max_facets_per_query: 30,
			parallel_scoring: true,
			exact_match: ExactMatch::default(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExactMatch {
	pub enabled: bool,
	pub case_sensitive: bool,
	pub penalty_multiplier: f32,
	pub boost_multiplier: f32,
	/// Multiplies verbatim matches by `boost_multiplier` (clamped to 1.0). Off unless requested.
	pub reward_matches: bool,
}
impl Default for ExactMatch {
	fn default() -> Self {
		Self {
			enabled: true,
			case_sensitive: false,
			penalty_multiplier: 0.3,
			boost_multiplier: 2.0,
			reward_matches: false,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Cache {
	pub facets_ttl_seconds: u64,
	pub facets_refresh_limit: u32,
	pub search_ttl_days: i64,
	pub extraction_ttl_seconds: u64,
	pub extraction_max_entries: u32,
}
impl Default for Cache {
	fn default() -> Self {
		Self {
			facets_ttl_seconds: 300,
			facets_refresh_limit: 500,
			search_ttl_days: 30,
			extraction_ttl_seconds: 3_600,
			extraction_max_entries: 1_000,
		}
	}
}

fn default_log_level() -> String {
	"info".to_string()
}
