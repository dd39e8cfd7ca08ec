use serde::{Deserialize, Serialize};

use crate::{facet::FacetEmbeddings, social_model::SocialModel};

/// A stored historical figure.
///
/// `facets` and `facet_embeddings` are derived from `tags` and must be regenerated together
/// whenever `tags` changes. A record without facets never takes part in facet retrieval.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FigureRecord {
	pub name: String,
	#[serde(default)]
	pub marginalization_context: String,
	#[serde(default)]
	pub challenges_faced: Option<String>,
	#[serde(default)]
	pub how_they_overcame: Option<String>,
	#[serde(default)]
	pub achievement: String,
	#[serde(default)]
	pub image_url: Option<String>,
	#[serde(default)]
	pub tags: SocialModel,
	#[serde(default)]
	pub search_queries_used: Vec<String>,
	/// Set for figures loaded by the initial population rather than a user search.
	#[serde(default)]
	pub initial: bool,
	#[serde(default)]
	pub facets: Vec<String>,
	#[serde(default)]
	pub facet_embeddings: FacetEmbeddings,
}
impl FigureRecord {
	pub fn key(&self) -> String {
		figure_key(&self.name)
	}

	pub fn has_facets(&self) -> bool {
		!self.facets.is_empty()
	}

	/// Narrative fields followed by every tag value, joined by single spaces.
	pub fn searchable_text(&self) -> String {
		let narrative = [
			Some(self.marginalization_context.as_str()),
			self.challenges_faced.as_deref(),
			self.how_they_overcame.as_deref(),
			Some(self.achievement.as_str()),
		];
		let tags = self.tags.iter().flat_map(|(_, values)| values.iter().map(String::as_str));

		narrative
			.into_iter()
			.flatten()
			.chain(tags)
			.filter(|part| !part.is_empty())
			.collect::<Vec<_>>()
			.join(" ")
	}
}

/// Store key for a figure name. Path and field separators are not allowed in keys.
pub fn figure_key(name: &str) -> String {
	name.replace(['/', '.'], "_")
}
