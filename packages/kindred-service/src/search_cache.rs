use std::sync::Arc;

use serde_json::{Map, Value};
use time::{Duration, OffsetDateTime};

use kindred_domain::{SocialModel, text};
use kindred_storage::{SearchCacheStore, models::SearchCacheRow};

/// Older flattened cache documents join list values with `", "`.
const LEGACY_SEPARATOR: char = ',';

/// A cached search outcome.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CachedSearch {
	pub social_model: SocialModel,
	pub figure_names: Vec<String>,
	pub facets: Vec<String>,
}

/// Search outcomes keyed by the SHA-256 of the normalized query text.
///
/// Every store failure is logged and treated as a miss or a skipped write.
pub struct SearchResultCache {
	store: Arc<dyn SearchCacheStore>,
	ttl: Duration,
}
impl SearchResultCache {
	pub fn new(store: Arc<dyn SearchCacheStore>, ttl: Duration) -> Self {
		Self { store, ttl }
	}

	pub fn cache_key(query: &str) -> String {
		text::content_key(&text::normalize_search_text(query))
	}

	pub async fn get(&self, query: &str) -> Option<CachedSearch> {
		self.get_at(query, OffsetDateTime::now_utc()).await
	}

	/// Expired entries are deleted and reported as a miss. Hits bump the entry's hit counter.
	pub async fn get_at(&self, query: &str, now: OffsetDateTime) -> Option<CachedSearch> {
		if query.trim().is_empty() {
			return None;
		}

		let key = Self::cache_key(query);
		let row = match self.store.fetch(&key).await {
			Ok(row) => row,
			Err(err) => {
				tracing::warn!(
					error = %err,
					cache_kind = "search",
					cache_key_prefix = cache_key_prefix(&key),
					"Cache read failed. Treating as miss."
				);

				return None;
			},
		};
		let Some(row) = row else {
			tracing::info!(
				cache_kind = "search",
				cache_key_prefix = cache_key_prefix(&key),
				hit = false,
				"Cache miss."
			);

			return None;
		};

		if row.expires_at <= now {
			tracing::info!(
				cache_kind = "search",
				cache_key_prefix = cache_key_prefix(&key),
				hit = false,
				"Cache entry expired."
			);

			if let Err(err) = self.store.delete(&key).await {
				tracing::warn!(
					error = %err,
					cache_kind = "search",
					cache_key_prefix = cache_key_prefix(&key),
					"Failed to delete expired cache entry."
				);
			}

			return None;
		}

		let cached = match decode_row(&row) {
			Ok(cached) => cached,
			Err(err) => {
				tracing::warn!(
					error = %err,
					cache_kind = "search",
					cache_key_prefix = cache_key_prefix(&key),
					"Cache payload decode failed. Treating as miss."
				);

				return None;
			},
		};

		if let Err(err) = self.store.record_hit(&key, now).await {
			tracing::warn!(
				error = %err,
				cache_kind = "search",
				cache_key_prefix = cache_key_prefix(&key),
				"Failed to record cache hit."
			);
		}

		tracing::info!(
			cache_kind = "search",
			cache_key_prefix = cache_key_prefix(&key),
			hit = true,
			hit_count = row.hit_count + 1,
			"Cache hit."
		);

		Some(cached)
	}

	pub async fn put(
		&self,
		query: &str,
		social_model: &SocialModel,
		figure_names: &[String],
		facets: &[String],
	) -> bool {
		self.put_at(query, social_model, figure_names, facets, OffsetDateTime::now_utc()).await
	}

	/// Returns whether the entry was written.
	pub async fn put_at(
		&self,
		query: &str,
		social_model: &SocialModel,
		figure_names: &[String],
		facets: &[String],
		now: OffsetDateTime,
	) -> bool {
		if query.trim().is_empty() {
			return false;
		}

		let normalized = text::normalize_search_text(query);
		let key = text::content_key(&normalized);
		let social_model = match serde_json::to_value(social_model) {
			Ok(value) => value,
			Err(err) => {
				tracing::warn!(
					error = %err,
					cache_kind = "search",
					"Failed to encode cache payload."
				);

				return false;
			},
		};
		let row = SearchCacheRow {
			cache_key: key.clone(),
			normalized_text: normalized,
			social_model,
			figure_names: Value::from(figure_names.to_vec()),
			facets: Value::from(facets.to_vec()),
			created_at: now,
			expires_at: now + self.ttl,
			hit_count: 0,
			last_hit_at: None,
		};

		match self.store.store(&row).await {
			Ok(()) => {
				tracing::info!(
					cache_kind = "search",
					cache_key_prefix = cache_key_prefix(&key),
					figures = figure_names.len(),
					"Cache stored."
				);

				true
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					cache_kind = "search",
					cache_key_prefix = cache_key_prefix(&key),
					"Cache write failed."
				);

				false
			},
		}
	}
}

/// The first 12 characters of `key`, for log fields.
pub fn cache_key_prefix(key: &str) -> &str {
	key.char_indices().nth(12).map_or(key, |(end, _)| &key[..end])
}

fn decode_row(row: &SearchCacheRow) -> serde_json::Result<CachedSearch> {
	let social_model = match &row.social_model {
		Value::Object(fields) => {
			let fields = fields
				.iter()
				.map(|(field, value)| (field.clone(), Value::from(decode_list(value))))
				.collect::<Map<_, _>>();

			serde_json::from_value(Value::Object(fields))?
		},
		Value::Null => SocialModel::default(),
		other => serde_json::from_value(other.clone())?,
	};

	Ok(CachedSearch {
		social_model,
		figure_names: decode_list(&row.figure_names),
		facets: decode_list(&row.facets),
	})
}

/// Reads a list written either as a string array or as a legacy `", "`-joined string.
fn decode_list(value: &Value) -> Vec<String> {
	match value {
		Value::Array(items) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
		Value::String(joined) => joined
			.split(LEGACY_SEPARATOR)
			.map(str::trim)
			.filter(|item| !item.is_empty())
			.map(str::to_string)
			.collect(),
		_ => Vec::new(),
	}
}
