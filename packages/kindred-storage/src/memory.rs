//! In-process stores for tests and single-node deployments.

use std::{
	collections::{BTreeMap, HashSet},
	sync::RwLock,
};

use time::OffsetDateTime;

use crate::{
	BoxFuture, Error, FigureStore, Result, SearchCacheStore, check_facet_filter,
	models::SearchCacheRow,
};
use kindred_domain::FigureRecord;

/// Figure records kept in key order, so scans are deterministic.
#[derive(Debug)]
pub struct MemoryFigureStore {
	records: RwLock<BTreeMap<String, FigureRecord>>,
	facet_filter: bool,
}
impl MemoryFigureStore {
	pub fn new() -> Self {
		Self { records: RwLock::new(BTreeMap::new()), facet_filter: true }
	}

	/// A store that cannot filter by facet membership.
	pub fn without_facet_filter() -> Self {
		Self { facet_filter: false, ..Self::new() }
	}

	pub fn len(&self) -> usize {
		self.records.read().unwrap_or_else(|err| err.into_inner()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
impl Default for MemoryFigureStore {
	fn default() -> Self {
		Self::new()
	}
}
impl FigureStore for MemoryFigureStore {
	fn get_by_facets_any<'a>(
		&'a self,
		facets: &'a [String],
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<FigureRecord>>> {
		Box::pin(async move {
			if !self.facet_filter {
				return Err(Error::Unavailable(
					"Facet filtering is not supported by this store.".to_string(),
				));
			}

			check_facet_filter(facets)?;

			let wanted = facets.iter().map(String::as_str).collect::<HashSet<_>>();
			let records = self.records.read().unwrap_or_else(|err| err.into_inner());

			Ok(records
				.values()
				.filter(|record| record.facets.iter().any(|facet| wanted.contains(facet.as_str())))
				.take(limit)
				.cloned()
				.collect())
		})
	}

	fn scan<'a>(&'a self, limit: usize) -> BoxFuture<'a, Result<Vec<FigureRecord>>> {
		Box::pin(async move {
			let records = self.records.read().unwrap_or_else(|err| err.into_inner());

			Ok(records.values().take(limit).cloned().collect())
		})
	}

	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<FigureRecord>>> {
		Box::pin(async move {
			let records = self.records.read().unwrap_or_else(|err| err.into_inner());

			Ok(records.get(key).cloned())
		})
	}

	fn put<'a>(&'a self, key: &'a str, record: &'a FigureRecord) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut records = self.records.write().unwrap_or_else(|err| err.into_inner());

			records.insert(key.to_string(), record.clone());

			Ok(())
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let mut records = self.records.write().unwrap_or_else(|err| err.into_inner());

			Ok(records.remove(key).is_some())
		})
	}

	fn supports_facet_filter(&self) -> bool {
		self.facet_filter
	}
}

#[derive(Debug, Default)]
pub struct MemorySearchCacheStore {
	rows: RwLock<BTreeMap<String, SearchCacheRow>>,
}
impl MemorySearchCacheStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.rows.read().unwrap_or_else(|err| err.into_inner()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
impl SearchCacheStore for MemorySearchCacheStore {
	fn fetch<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<SearchCacheRow>>> {
		Box::pin(async move {
			let rows = self.rows.read().unwrap_or_else(|err| err.into_inner());

			Ok(rows.get(key).cloned())
		})
	}

	fn store<'a>(&'a self, row: &'a SearchCacheRow) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut rows = self.rows.write().unwrap_or_else(|err| err.into_inner());
			let row = SearchCacheRow { hit_count: 0, last_hit_at: None, ..row.clone() };

			rows.insert(row.cache_key.clone(), row);

			Ok(())
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.rows.write().unwrap_or_else(|err| err.into_inner()).remove(key);

			Ok(())
		})
	}

	fn record_hit<'a>(&'a self, key: &'a str, now: OffsetDateTime) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut rows = self.rows.write().unwrap_or_else(|err| err.into_inner());

			if let Some(row) = rows.get_mut(key) {
				row.hit_count += 1;
				row.last_hit_at = Some(now);
			}

			Ok(())
		})
	}
}
