use kindred_domain::{FigureRecord, figure_key};

use crate::{Error, KindredService, Result};

impl KindredService {
	/// Stores a figure under its figure key.
	///
	/// `facets` and `facet_embeddings` are always rebuilt from `tags`. With `generate_embeddings`
	/// off, the embeddings are cleared and the figure drops out of semantic scoring until it is
	/// saved again with embeddings.
	pub async fn save_figure(
		&self,
		mut record: FigureRecord,
		generate_embeddings: bool,
	) -> Result<FigureRecord> {
		if record.name.trim().is_empty() {
			return Err(Error::InvalidRequest {
				message: "Figure name must be non-empty.".to_string(),
			});
		}

		if generate_embeddings {
			let (facets, embeddings) = self.encoder.encode_tags(&record.tags).await?;

			record.facets = facets;
			record.facet_embeddings = embeddings;
		} else {
			record.facets = record.tags.facets();
			record.facet_embeddings.clear();
		}

		let key = record.key();

		self.figures.put(&key, &record).await?;
		self.facets.invalidate();

		tracing::info!(
			figure_key = %key,
			facets = record.facets.len(),
			embedded = record.facet_embeddings.len(),
			"Figure saved."
		);

		Ok(record)
	}

	pub async fn figure_exists(&self, name: &str) -> Result<bool> {
		Ok(self.figures.get(&figure_key(name)).await?.is_some())
	}

	pub async fn get_figure(&self, name: &str) -> Result<Option<FigureRecord>> {
		Ok(self.figures.get(&figure_key(name)).await?)
	}
}
