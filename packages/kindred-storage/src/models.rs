use serde_json::Value;
use time::OffsetDateTime;

/// One cached search outcome.
///
/// Payload columns are raw JSON; older rows may hold `", "`-joined strings where newer rows hold
/// string arrays, so decoding is left to the reader.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SearchCacheRow {
	pub cache_key: String,
	pub normalized_text: String,
	pub social_model: Value,
	pub figure_names: Value,
	pub facets: Value,
	pub created_at: OffsetDateTime,
	pub expires_at: OffsetDateTime,
	pub hit_count: i64,
	pub last_hit_at: Option<OffsetDateTime>,
}
