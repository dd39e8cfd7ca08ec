pub mod db;
pub mod figures;
pub mod memory;
pub mod models;
pub mod schema;
pub mod search_cache;

mod error;

pub use error::Error;

use std::{future::Future, pin::Pin};

use time::OffsetDateTime;

use kindred_domain::FigureRecord;
use models::SearchCacheRow;

pub type Result<T, E = Error> = std::result::Result<T, E>;
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Largest value list a set-membership filter accepts.
pub const MAX_FACET_FILTER_VALUES: usize = 30;

/// Persistent figure records keyed by figure key.
pub trait FigureStore: Send + Sync {
	/// Records whose flat `facets` list shares at least one value with `facets`.
	///
	/// Rejects more than [`MAX_FACET_FILTER_VALUES`] values with `Error::InvalidArgument`.
	fn get_by_facets_any<'a>(
		&'a self,
		facets: &'a [String],
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<FigureRecord>>>;

	fn scan<'a>(&'a self, limit: usize) -> BoxFuture<'a, Result<Vec<FigureRecord>>>;

	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<FigureRecord>>>;

	fn put<'a>(&'a self, key: &'a str, record: &'a FigureRecord) -> BoxFuture<'a, Result<()>>;

	fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>>;

	/// Stores without set-membership filtering report `false`; retrieval then always scans.
	fn supports_facet_filter(&self) -> bool {
		true
	}
}

/// Backing store for cached search outcomes.
pub trait SearchCacheStore: Send + Sync {
	/// Returns the row even when it has expired. Expiry is the caller's decision.
	fn fetch<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<SearchCacheRow>>>;

	/// Inserts or replaces the row. Replacing resets the hit counter.
	fn store<'a>(&'a self, row: &'a SearchCacheRow) -> BoxFuture<'a, Result<()>>;

	fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>>;

	fn record_hit<'a>(&'a self, key: &'a str, now: OffsetDateTime) -> BoxFuture<'a, Result<()>>;
}

pub(crate) fn check_facet_filter(facets: &[String]) -> Result<()> {
	if facets.len() > MAX_FACET_FILTER_VALUES {
		return Err(Error::InvalidArgument(format!(
			"Facet filter accepts at most {MAX_FACET_FILTER_VALUES} values, got {}.",
			facets.len()
		)));
	}

	Ok(())
}
