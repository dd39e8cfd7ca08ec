use sqlx::types::Json;

use crate::{BoxFuture, FigureStore, Result, check_facet_filter, db::Db};
use kindred_domain::FigureRecord;

impl FigureStore for Db {
	fn get_by_facets_any<'a>(
		&'a self,
		facets: &'a [String],
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<FigureRecord>>> {
		Box::pin(async move {
			check_facet_filter(facets)?;

			let rows: Vec<Json<FigureRecord>> = sqlx::query_scalar(
				"\
SELECT record
FROM figures
WHERE facets && $1
ORDER BY figure_key
LIMIT $2",
			)
			.bind(facets)
			.bind(limit_param(limit))
			.fetch_all(&self.pool)
			.await?;

			Ok(rows.into_iter().map(|Json(record)| record).collect())
		})
	}

	fn scan<'a>(&'a self, limit: usize) -> BoxFuture<'a, Result<Vec<FigureRecord>>> {
		Box::pin(async move {
			let rows: Vec<Json<FigureRecord>> =
				sqlx::query_scalar("SELECT record FROM figures ORDER BY figure_key LIMIT $1")
					.bind(limit_param(limit))
					.fetch_all(&self.pool)
					.await?;

			Ok(rows.into_iter().map(|Json(record)| record).collect())
		})
	}

	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<FigureRecord>>> {
		Box::pin(async move {
			let row: Option<Json<FigureRecord>> =
				sqlx::query_scalar("SELECT record FROM figures WHERE figure_key = $1")
					.bind(key)
					.fetch_optional(&self.pool)
					.await?;

			Ok(row.map(|Json(record)| record))
		})
	}

	fn put<'a>(&'a self, key: &'a str, record: &'a FigureRecord) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			sqlx::query(
				"\
INSERT INTO figures (figure_key, name, facets, record, updated_at)
VALUES ($1, $2, $3, $4, now())
ON CONFLICT (figure_key) DO UPDATE SET
	name = EXCLUDED.name,
	facets = EXCLUDED.facets,
	record = EXCLUDED.record,
	updated_at = EXCLUDED.updated_at",
			)
			.bind(key)
			.bind(record.name.as_str())
			.bind(&record.facets)
			.bind(Json(record))
			.execute(&self.pool)
			.await?;

			Ok(())
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let result = sqlx::query("DELETE FROM figures WHERE figure_key = $1")
				.bind(key)
				.execute(&self.pool)
				.await?;

			Ok(result.rows_affected() > 0)
		})
	}
}

fn limit_param(limit: usize) -> i64 {
	i64::try_from(limit).unwrap_or(i64::MAX)
}
