use std::{collections::HashMap, sync::RwLock};

use serde::Serialize;
use time::{Duration, OffsetDateTime};

use kindred_domain::{SocialModel, text};

use crate::search_cache::cache_key_prefix;

struct Entry {
	social_model: SocialModel,
	inserted_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtractionCacheStats {
	pub entries: usize,
	pub max_entries: usize,
	pub ttl_seconds: i64,
}

/// In-memory memo of extraction results keyed by the SHA-256 of trimmed, lowercased text.
///
/// Writes purge expired entries first. If the cache is still full, the oldest tenth by insertion
/// time is evicted in one pass.
pub struct FacetExtractionCache {
	entries: RwLock<HashMap<String, Entry>>,
	ttl: Duration,
	max_entries: usize,
}
impl FacetExtractionCache {
	pub fn new(ttl: Duration, max_entries: usize) -> Self {
		Self { entries: RwLock::new(HashMap::new()), ttl, max_entries: max_entries.max(1) }
	}

	pub fn cache_key(input: &str) -> String {
		text::content_key(&text::normalize_key_text(input))
	}

	pub fn get(&self, input: &str) -> Option<SocialModel> {
		self.get_at(input, OffsetDateTime::now_utc())
	}

	pub fn get_at(&self, input: &str, now: OffsetDateTime) -> Option<SocialModel> {
		let key = Self::cache_key(input);

		{
			let entries = self.entries.read().unwrap_or_else(|err| err.into_inner());

			match entries.get(&key) {
				None => {
					tracing::debug!(
						cache_kind = "extraction",
						cache_key_prefix = cache_key_prefix(&key),
						hit = false,
						"Cache miss."
					);

					return None;
				},
				Some(entry) if !self.is_expired(entry, now) => {
					tracing::debug!(
						cache_kind = "extraction",
						cache_key_prefix = cache_key_prefix(&key),
						hit = true,
						"Cache hit."
					);

					return Some(entry.social_model.clone());
				},
				Some(_) => {},
			}
		}

		let mut entries = self.entries.write().unwrap_or_else(|err| err.into_inner());

		// Re-check under the write lock; a writer may have replaced the entry.
		if entries.get(&key).is_some_and(|entry| self.is_expired(entry, now)) {
			entries.remove(&key);

			tracing::debug!(
				cache_kind = "extraction",
				cache_key_prefix = cache_key_prefix(&key),
				"Cache entry expired."
			);
		}

		None
	}

	pub fn put(&self, input: &str, social_model: SocialModel) {
		self.put_at(input, social_model, OffsetDateTime::now_utc());
	}

	pub fn put_at(&self, input: &str, social_model: SocialModel, now: OffsetDateTime) {
		let key = Self::cache_key(input);
		let mut entries = self.entries.write().unwrap_or_else(|err| err.into_inner());

		entries.retain(|_, entry| !self.is_expired(entry, now));

		if entries.len() >= self.max_entries {
			let mut by_age = entries
				.iter()
				.map(|(key, entry)| (entry.inserted_at, key.clone()))
				.collect::<Vec<_>>();

			by_age.sort();

			let evict = (by_age.len() / 10).max(1);

			for (_, key) in by_age.into_iter().take(evict) {
				entries.remove(&key);
			}

			tracing::debug!(
				cache_kind = "extraction",
				evicted = evict,
				"Cache evicted oldest entries."
			);
		}

		entries.insert(key, Entry { social_model, inserted_at: now });
	}

	pub fn clear(&self) {
		self.entries.write().unwrap_or_else(|err| err.into_inner()).clear();

		tracing::info!(cache_kind = "extraction", "Cache cleared.");
	}

	pub fn stats(&self) -> ExtractionCacheStats {
		ExtractionCacheStats {
			entries: self.len(),
			max_entries: self.max_entries,
			ttl_seconds: self.ttl.whole_seconds(),
		}
	}

	pub fn len(&self) -> usize {
		self.entries.read().unwrap_or_else(|err| err.into_inner()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn is_expired(&self, entry: &Entry, now: OffsetDateTime) -> bool {
		now - entry.inserted_at >= self.ttl
	}
}
