use std::{
	collections::{HashMap, hash_map::Entry},
	sync::Arc,
};

use kindred_config::EmbeddingProviderConfig;
use kindred_domain::{FacetEmbeddings, Field, SocialModel, describe_facet};

use crate::{EmbeddingProvider, Error, Result};

/// Formats facets as descriptive sentences and embeds them in one batched call.
pub struct FacetEncoder {
	provider: Arc<dyn EmbeddingProvider>,
	cfg: EmbeddingProviderConfig,
}
impl FacetEncoder {
	pub fn new(provider: Arc<dyn EmbeddingProvider>, cfg: EmbeddingProviderConfig) -> Self {
		Self { provider, cfg }
	}

	pub fn dimensions(&self) -> usize {
		self.cfg.dimensions as usize
	}

	pub fn encode(&self, field: Option<Field>, value: &str) -> String {
		describe_facet(field, value)
	}

	/// Embeds each distinct sentence once and fans the vectors back out in input order.
	pub async fn batch_encode(&self, sentences: &[String]) -> Result<Vec<Vec<f32>>> {
		if sentences.is_empty() {
			return Ok(Vec::new());
		}

		let mut unique = Vec::new();
		let mut slots = HashMap::new();
		let positions = sentences
			.iter()
			.map(|sentence| match slots.entry(sentence.as_str()) {
				Entry::Occupied(slot) => *slot.get(),
				Entry::Vacant(slot) => {
					unique.push(sentence.clone());

					*slot.insert(unique.len() - 1)
				},
			})
			.collect::<Vec<_>>();
		let vectors = self.provider.embed(&self.cfg, &unique).await?;

		if vectors.len() != unique.len() {
			return Err(Error::Provider {
				message: format!(
					"Embedding provider returned {} vectors for {} inputs.",
					vectors.len(),
					unique.len()
				),
			});
		}

		let expected = self.dimensions();

		if let Some(vector) = vectors.iter().find(|vector| vector.len() != expected) {
			return Err(Error::Provider {
				message: format!(
					"Embedding provider returned {} dimensions; expected {expected}.",
					vector.len()
				),
			});
		}

		tracing::debug!(requested = sentences.len(), embedded = unique.len(), "Facets embedded.");

		Ok(positions.into_iter().map(|index| vectors[index].clone()).collect())
	}

	/// Embeds a user's facets. Fields are looked up in `field_index` (keyed by lowercased value);
	/// unresolved facets use the generic sentence.
	pub async fn encode_user_facets(
		&self,
		facets: &[String],
		field_index: &HashMap<String, Field>,
	) -> Result<FacetEmbeddings> {
		let sentences = facets
			.iter()
			.map(|facet| self.encode(field_index.get(&facet.to_lowercase()).copied(), facet))
			.collect::<Vec<_>>();

		self.embed_pairs(facets, &sentences).await
	}

	/// Derives a figure's flat facet list and its embeddings from its tags.
	pub async fn encode_tags(&self, tags: &SocialModel) -> Result<(Vec<String>, FacetEmbeddings)> {
		let pairs = tags.facet_pairs();
		let sentences =
			pairs.iter().map(|(field, value)| field.describe(value)).collect::<Vec<_>>();
		let facets = pairs.into_iter().map(|(_, value)| value).collect::<Vec<_>>();
		let embeddings = self.embed_pairs(&facets, &sentences).await?;

		Ok((facets, embeddings))
	}

	async fn embed_pairs(
		&self,
		facets: &[String],
		sentences: &[String],
	) -> Result<FacetEmbeddings> {
		let vectors = self.batch_encode(sentences).await?;

		Ok(facets.iter().cloned().zip(vectors).collect())
	}
}
