use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use kindred_config::{Config, Error};

const SAMPLE_CONFIG_TOML: &str = include_str!("fixtures/sample_config.toml");

fn sample_toml_with(section: &[&str], key: &str, value: Value) -> String {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.");
	let mut table = root.as_table_mut().expect("Sample config must be a table.");

	for name in section {
		table = table
			.get_mut(*name)
			.and_then(Value::as_table_mut)
			.unwrap_or_else(|| panic!("Sample config must include [{name}]."));
	}

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render sample config.")
}

fn sample_toml_without(section: &str) -> String {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.");

	root.as_table_mut().expect("Sample config must be a table.").remove(section);

	toml::to_string(&root).expect("Failed to render sample config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("kindred_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_payload(payload: String) -> kindred_config::Result<Config> {
	let path = write_temp_config(payload);
	let result = kindred_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

fn expect_validation_error(payload: String, expected: &str) {
	let err = load_payload(payload).expect_err("Expected validation error.");
	let message = err.to_string();

	assert!(matches!(err, Error::Validation { .. }), "Unexpected error kind: {err:?}");
	assert!(message.contains(expected), "Unexpected error message: {message}");
}

#[test]
fn sample_config_loads_and_normalizes() {
	let cfg = load_payload(SAMPLE_CONFIG_TOML.to_string()).expect("Sample config must load.");

	assert_eq!(cfg.providers.embedding.api_base, "http://127.0.0.1:8000");
	assert_eq!(cfg.providers.embedding.path, "/v1/embeddings");
	assert_eq!(cfg.providers.embedding.dimensions, 384);
	assert_eq!(cfg.search.max_facets_per_query, 30);
	assert!(cfg.search.exact_match.enabled);
	assert!(!cfg.search.exact_match.reward_matches);
}

#[test]
fn omitted_sections_use_defaults() {
	let payload = sample_toml_without("search");
	let payload = {
		let mut root: Value = toml::from_str(&payload).expect("Failed to parse config.");

		root.as_table_mut().expect("Config must be a table.").remove("cache");

		toml::to_string(&root).expect("Failed to render config.")
	};
	let cfg = load_payload(payload).expect("Config without optional sections must load.");

	assert_eq!(cfg.search.candidate_limit, 200);
	assert_eq!(cfg.search.results_limit, 50);
	assert!((cfg.search.min_similarity - 0.2).abs() < f32::EPSILON);
	assert!((cfg.search.exact_match.penalty_multiplier - 0.3).abs() < f32::EPSILON);
	assert!((cfg.search.exact_match.boost_multiplier - 2.0).abs() < f32::EPSILON);
	assert!(!cfg.search.exact_match.case_sensitive);
	assert_eq!(cfg.cache.facets_ttl_seconds, 300);
	assert_eq!(cfg.cache.facets_refresh_limit, 500);
	assert_eq!(cfg.cache.search_ttl_days, 30);
	assert_eq!(cfg.cache.extraction_ttl_seconds, 3_600);
	assert_eq!(cfg.cache.extraction_max_entries, 1_000);
}

#[test]
fn dimensions_must_be_positive() {
	expect_validation_error(
		sample_toml_with(&["providers", "embedding"], "dimensions", Value::Integer(0)),
		"providers.embedding.dimensions must be greater than zero.",
	);
}

#[test]
fn timeout_must_be_positive() {
	expect_validation_error(
		sample_toml_with(&["providers", "embedding"], "timeout_ms", Value::Integer(0)),
		"providers.embedding.timeout_ms must be greater than zero.",
	);
}

#[test]
fn api_key_must_be_non_empty() {
	expect_validation_error(
		sample_toml_with(&["providers", "embedding"], "api_key", Value::String("  ".to_string())),
		"providers.embedding.api_key must be non-empty.",
	);
}

#[test]
fn facet_cap_must_be_positive() {
	expect_validation_error(
		sample_toml_with(&["search"], "max_facets_per_query", Value::Integer(0)),
		"search.max_facets_per_query must be greater than zero.",
	);
}

#[test]
fn min_similarity_must_be_in_unit_range() {
	expect_validation_error(
		sample_toml_with(&["search"], "min_similarity", Value::Float(1.5)),
		"search.min_similarity must be in the range 0.0-1.0.",
	);
}

#[test]
fn penalty_multiplier_must_shrink_scores() {
	expect_validation_error(
		sample_toml_with(&["search", "exact_match"], "penalty_multiplier", Value::Float(1.2)),
		"search.exact_match.penalty_multiplier must be in the range (0.0, 1.0].",
	);
	expect_validation_error(
		sample_toml_with(&["search", "exact_match"], "penalty_multiplier", Value::Float(0.0)),
		"search.exact_match.penalty_multiplier must be in the range (0.0, 1.0].",
	);
}

#[test]
fn boost_multiplier_must_not_shrink_scores() {
	expect_validation_error(
		sample_toml_with(&["search", "exact_match"], "boost_multiplier", Value::Float(0.5)),
		"search.exact_match.boost_multiplier must be 1.0 or greater.",
	);
}

#[test]
fn search_ttl_must_be_bounded() {
	expect_validation_error(
		sample_toml_with(&["cache"], "search_ttl_days", Value::Integer(-1)),
		"cache.search_ttl_days must be in the range 0-36500.",
	);
	expect_validation_error(
		sample_toml_with(&["cache"], "search_ttl_days", Value::Integer(36_501)),
		"cache.search_ttl_days must be in the range 0-36500.",
	);
}

#[test]
fn missing_file_reports_read_error() {
	let mut path = env::temp_dir();

	path.push("kindred_config_test_does_not_exist.toml");

	let err = kindred_config::load(&path).expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }));
}

#[test]
fn malformed_toml_reports_parse_error() {
	let err =
		load_payload("[service\nlog_level = ".to_string()).expect_err("Expected parse error.");

	assert!(matches!(err, Error::ParseConfig { .. }));
}
