use time::OffsetDateTime;

use crate::{BoxFuture, Result, SearchCacheStore, db::Db, models::SearchCacheRow};

impl SearchCacheStore for Db {
	fn fetch<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<SearchCacheRow>>> {
		Box::pin(async move {
			let row = sqlx::query_as::<_, SearchCacheRow>(
				"\
SELECT
	cache_key,
	normalized_text,
	social_model,
	figure_names,
	facets,
	created_at,
	expires_at,
	hit_count,
	last_hit_at
FROM search_cache
WHERE cache_key = $1",
			)
			.bind(key)
			.fetch_optional(&self.pool)
			.await?;

			Ok(row)
		})
	}

	fn store<'a>(&'a self, row: &'a SearchCacheRow) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			sqlx::query(
				"\
INSERT INTO search_cache (
	cache_key,
	normalized_text,
	social_model,
	figure_names,
	facets,
	created_at,
	expires_at,
	hit_count,
	last_hit_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, 0, NULL)
ON CONFLICT (cache_key) DO UPDATE SET
	normalized_text = EXCLUDED.normalized_text,
	social_model = EXCLUDED.social_model,
	figure_names = EXCLUDED.figure_names,
	facets = EXCLUDED.facets,
	created_at = EXCLUDED.created_at,
	expires_at = EXCLUDED.expires_at,
	hit_count = 0,
	last_hit_at = NULL",
			)
			.bind(row.cache_key.as_str())
			.bind(row.normalized_text.as_str())
			.bind(&row.social_model)
			.bind(&row.figure_names)
			.bind(&row.facets)
			.bind(row.created_at)
			.bind(row.expires_at)
			.execute(&self.pool)
			.await?;

			Ok(())
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			sqlx::query("DELETE FROM search_cache WHERE cache_key = $1")
				.bind(key)
				.execute(&self.pool)
				.await?;

			Ok(())
		})
	}

	fn record_hit<'a>(&'a self, key: &'a str, now: OffsetDateTime) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			sqlx::query(
				"\
UPDATE search_cache
SET hit_count = hit_count + 1, last_hit_at = $2
WHERE cache_key = $1",
			)
			.bind(key)
			.bind(now)
			.execute(&self.pool)
			.await?;

			Ok(())
		})
	}
}
