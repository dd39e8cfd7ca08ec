use std::collections::{BTreeMap, HashSet};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use kindred_config::ExactMatch;
use kindred_domain::{FigureRecord, SocialModel, figure_key};
use kindred_storage::MAX_FACET_FILTER_VALUES;

use crate::{
	Error, KindredService, Result,
	coalesce::RequestCoalescer,
	facets::facet_field_index,
	retrieval::RetrievalMode,
	scoring::{ExactMatchBooster, FacetScorer},
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
	pub facets: Vec<String>,
	/// Defaults to `search.results_limit`.
	pub limit: Option<usize>,
	/// Defaults to `search.min_similarity`.
	pub min_similarity: Option<f32>,
	/// Defaults to `search.exact_match.enabled`.
	pub exact_match: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredFigure {
	pub figure: FigureRecord,
	pub score: f32,
	pub facet_scores: BTreeMap<String, f32>,
}
impl ScoredFigure {
	fn unscored(figure: FigureRecord) -> Self {
		Self { figure, score: 1.0, facet_scores: BTreeMap::new() }
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
	pub results: Vec<ScoredFigure>,
	pub mode: RetrievalMode,
	pub candidates: usize,
	/// Figures whose stored embeddings do not match the current model's dimensions.
	pub skipped_incompatible: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DescriptionMatch {
	pub social_model: SocialModel,
	pub facets: Vec<String>,
	pub results: Vec<ScoredFigure>,
	pub from_cache: bool,
}

enum Scored {
	Kept(ScoredFigure),
	Incompatible,
	NoFacets,
}

impl KindredService {
	/// Ranks stored figures by semantic similarity to `req.facets`.
	///
	/// Candidate selection and facet lookups are fail-soft. Failing to embed the user's own facets
	/// fails the query, unless there were no candidates to score. Scoring runs on the blocking
	/// pool.
	pub async fn query_by_facets_semantic(&self, req: SearchRequest) -> Result<SearchResponse> {
		let facets = clean_facets(&req.facets);
		let limit = req.limit.unwrap_or(self.cfg.search.results_limit as usize);
		let min_similarity = req.min_similarity.unwrap_or(self.cfg.search.min_similarity);

		if !min_similarity.is_finite() || !(0.0..=1.0).contains(&min_similarity) {
			return Err(Error::InvalidRequest {
				message: "min_similarity must be in the range 0.0-1.0.".to_string(),
			});
		}

		let candidates =
			self.retriever.retrieve(&facets, self.cfg.search.candidate_limit as usize).await;
		let candidate_count = candidates.figures.len();

		if candidates.mode == RetrievalMode::Browse {
			let results = candidates
				.figures
				.into_iter()
				.take(limit)
				.map(ScoredFigure::unscored)
				.collect::<Vec<_>>();

			tracing::info!(
				mode = "browse",
				candidates = candidate_count,
				returned = results.len(),
				"Facet query served."
			);

			return Ok(SearchResponse {
				results,
				mode: RetrievalMode::Browse,
				candidates: candidate_count,
				skipped_incompatible: 0,
			});
		}

		if candidates.figures.is_empty() {
			tracing::info!(
				mode = ?candidates.mode,
				facets = facets.len(),
				candidates = 0,
				returned = 0,
				"Facet query served."
			);

			return Ok(SearchResponse {
				results: Vec::new(),
				mode: candidates.mode,
				candidates: 0,
				skipped_incompatible: 0,
			});
		}

		let known_facets = self.facets.get_all_facets().await;
		let field_index = facet_field_index(&known_facets);
		let user = self.encoder.encode_user_facets(&facets, &field_index).await?;
		let scorer = FacetScorer::new(&user)?;
		let booster = if req.exact_match.unwrap_or(self.cfg.search.exact_match.enabled) {
			let cfg = ExactMatch { enabled: true, ..self.cfg.search.exact_match.clone() };

			ExactMatchBooster::new(&facets, &cfg)
		} else {
			ExactMatchBooster::disabled()
		};
		let parallel = self.cfg.search.parallel_scoring;
		let figures = candidates.figures;
		let scored = tokio::task::spawn_blocking(move || {
			let score_one = |figure| score_figure(&scorer, &booster, figure);

			if parallel {
				figures.into_par_iter().map(score_one).collect::<Vec<_>>()
			} else {
				figures.into_iter().map(score_one).collect::<Vec<_>>()
			}
		})
		.await
		.map_err(|err| Error::Internal { message: format!("Scoring task failed: {err}") })?;
		let mut skipped_incompatible = 0;
		let mut without_facets = 0;
		let mut results = Vec::with_capacity(scored.len());

		for outcome in scored {
			match outcome {
				Scored::Kept(result) if result.score >= min_similarity => results.push(result),
				Scored::Kept(_) => {},
				Scored::Incompatible => skipped_incompatible += 1,
				Scored::NoFacets => without_facets += 1,
			}
		}

		results.sort_by(|a, b| {
			b.score.total_cmp(&a.score).then_with(|| a.figure.name.cmp(&b.figure.name))
		});
		results.truncate(limit);

		if skipped_incompatible > 0 {
			tracing::warn!(
				skipped_incompatible,
				expected_dimensions = self.encoder.dimensions(),
				"Skipped figures with incompatible embeddings."
			);
		}

		tracing::info!(
			mode = ?candidates.mode,
			facets = facets.len(),
			candidates = candidate_count,
			without_facets,
			skipped_incompatible,
			returned = results.len(),
			"Facet query served."
		);

		Ok(SearchResponse {
			results,
			mode: candidates.mode,
			candidates: candidate_count,
			skipped_incompatible,
		})
	}

	/// Figures sharing at least one facet verbatim, or any figures when `facets` is empty.
	///
	/// Only the first `search.max_facets_per_query` facets are used. Store failures yield an
	/// empty list.
	pub async fn query_by_facets_exact(
		&self,
		facets: &[String],
		limit: usize,
	) -> Vec<FigureRecord> {
		let facets = clean_facets(facets);
		let result = if facets.is_empty() {
			self.figures.scan(limit).await
		} else {
			let cap = (self.cfg.search.max_facets_per_query as usize)
				.min(MAX_FACET_FILTER_VALUES)
				.min(facets.len());

			self.figures.get_by_facets_any(&facets[..cap], limit).await
		};

		match result {
			Ok(figures) => figures,
			Err(err) => {
				tracing::warn!(error = %err, facets = facets.len(), "Exact facet query failed.");

				Vec::new()
			},
		}
	}

	/// Matches a free-text self description.
	///
	/// A cached outcome for the same text is served directly. Otherwise the text's social model
	/// is extracted (memoized and coalesced) and its facets drive a semantic query.
	pub async fn match_description(&self, description: &str) -> Result<DescriptionMatch> {
		if description.trim().is_empty() {
			return Err(Error::InvalidRequest {
				message: "Description must be non-empty.".to_string(),
			});
		}

		if let Some(cached) = self.search_cache.get(description).await {
			let mut results = Vec::with_capacity(cached.figure_names.len());

			for name in &cached.figure_names {
				match self.figures.get(&figure_key(name)).await {
					Ok(Some(figure)) => results.push(ScoredFigure::unscored(figure)),
					Ok(None) => {
						tracing::debug!(figure = %name, "Cached figure no longer stored.");
					},
					Err(err) => {
						tracing::warn!(
							error = %err,
							figure = %name,
							"Failed to load cached figure."
						);
					},
				}
			}

			return Ok(DescriptionMatch {
				social_model: cached.social_model,
				facets: cached.facets,
				results,
				from_cache: true,
			});
		}

		let social_model = self.extract_social_model(description).await?;
		let facets = social_model.facets();

		if facets.is_empty() {
			return Ok(DescriptionMatch {
				social_model,
				facets,
				results: Vec::new(),
				from_cache: false,
			});
		}

		let request = SearchRequest { facets: facets.clone(), ..Default::default() };
		let response = self.query_by_facets_semantic(request).await?;

		Ok(DescriptionMatch { social_model, facets, results: response.results, from_cache: false })
	}

	/// Extracts a social model once per distinct text, sharing in-flight extractions.
	pub async fn extract_social_model(&self, description: &str) -> Result<SocialModel> {
		if let Some(social_model) = self.extraction_cache.get(description) {
			return Ok(social_model);
		}

		let key = RequestCoalescer::<SocialModel>::key_for(description);
		let extractor = self.providers.extractor.clone();
		let cache = self.extraction_cache.clone();
		let text = description.to_string();

		self.coalescer
			.coalesce(&key, move || async move {
				let social_model = extractor.extract(&text).await?;

				cache.put(&text, social_model.clone());

				Ok(social_model)
			})
			.await
	}

	/// Caches a finished search so the same description is served from cache next time.
	pub async fn record_search_outcome(
		&self,
		description: &str,
		social_model: &SocialModel,
		figure_names: &[String],
		facets: &[String],
	) -> bool {
		self.search_cache.put(description, social_model, figure_names, facets).await
	}
}

fn score_figure(
	scorer: &FacetScorer,
	booster: &ExactMatchBooster,
	figure: FigureRecord,
) -> Scored {
	if figure.facet_embeddings.is_empty() {
		return Scored::NoFacets;
	}

	match scorer.score(&figure.facet_embeddings) {
		Ok(score) => {
			let score = if booster.is_enabled() {
				booster.apply(score, &figure.searchable_text())
			} else {
				score
			};

			Scored::Kept(ScoredFigure {
				figure,
				score: score.overall,
				facet_scores: score.per_facet,
			})
		},
		Err(err) => {
			tracing::debug!(
				figure = %figure.name,
				error = %err,
				"Skipping figure with incompatible embeddings."
			);

			Scored::Incompatible
		},
	}
}

/// Trimmed, non-blank facets, deduplicated case-insensitively in input order.
fn clean_facets(facets: &[String]) -> Vec<String> {
	let mut seen = HashSet::new();

	facets
		.iter()
		.map(|facet| facet.trim())
		.filter(|facet| !facet.is_empty() && seen.insert(facet.to_lowercase()))
		.map(str::to_string)
		.collect()
}
