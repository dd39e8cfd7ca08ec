//! Facet similarity scoring.
//!
//! Each user facet is scored by its best cosine match among a figure's facets, and the overall
//! score is the mean over user facets. A figure has to resemble the user on every facet to rank
//! well; one perfect match next to unrelated traits does not.

use std::collections::BTreeMap;

use kindred_config::ExactMatch;
use kindred_domain::{FacetEmbeddings, exact_match::FacetPattern};

use crate::{Error, Result};

const MIN_NORM: f32 = 1e-10;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacetScore {
	pub overall: f32,
	/// User facet to its best match against the figure, in `[0, 1]`.
	pub per_facet: BTreeMap<String, f32>,
}
impl FacetScore {
	fn from_per_facet(per_facet: BTreeMap<String, f32>) -> Self {
		let overall = mean(per_facet.values().copied());

		Self { overall, per_facet }
	}
}

/// Scores figures against one user's facets. User vectors are normalized once.
#[derive(Debug, Clone)]
pub struct FacetScorer {
	user: Vec<(String, Vec<f32>)>,
	dimensions: usize,
}
impl FacetScorer {
	pub fn new(user: &FacetEmbeddings) -> Result<Self> {
		let dimensions = user.values().next().map(Vec::len).unwrap_or(0);
		let mut normalized = Vec::with_capacity(user.len());

		for (facet, vector) in user {
			check_dimensions(dimensions, vector.len())?;
			normalized.push((facet.clone(), normalize(vector)));
		}

		normalized.sort_by(|a, b| a.0.cmp(&b.0));

		Ok(Self { user: normalized, dimensions })
	}

	pub fn is_empty(&self) -> bool {
		self.user.is_empty()
	}

	/// Fails with `Error::DimensionMismatch` when any figure vector has a different length.
	pub fn score(&self, figure: &FacetEmbeddings) -> Result<FacetScore> {
		if self.user.is_empty() || figure.is_empty() {
			return Ok(FacetScore::default());
		}

		let figure = figure
			.values()
			.map(|vector| {
				check_dimensions(self.dimensions, vector.len())?;

				Ok(normalize(vector))
			})
			.collect::<Result<Vec<_>>>()?;
		let per_facet = self
			.user
			.iter()
			.map(|(facet, user)| {
				let best = figure
					.iter()
					.map(|candidate| dot(user, candidate))
					.fold(f32::NEG_INFINITY, f32::max);

				(facet.clone(), best.clamp(0.0, 1.0))
			})
			.collect();

		Ok(FacetScore::from_per_facet(per_facet))
	}
}

/// One-shot scoring of a user facet map against a figure facet map.
pub fn score_facets(user: &FacetEmbeddings, figure: &FacetEmbeddings) -> Result<FacetScore> {
	FacetScorer::new(user)?.score(figure)
}

/// Separates facets confirmed verbatim in a figure's text from facets that are only semantically
/// close. Patterns are compiled once per query.
#[derive(Debug, Clone)]
pub struct ExactMatchBooster {
	patterns: Vec<(String, FacetPattern)>,
	enabled: bool,
	case_sensitive: bool,
	penalty_multiplier: f32,
	boost_multiplier: f32,
	reward_matches: bool,
}
impl ExactMatchBooster {
	pub fn new(facets: &[String], cfg: &ExactMatch) -> Self {
		let patterns = if cfg.enabled {
			facets
				.iter()
				.map(|facet| (facet.clone(), FacetPattern::new(facet, cfg.case_sensitive)))
				.collect()
		} else {
			Vec::new()
		};

		Self {
			patterns,
			enabled: cfg.enabled,
			case_sensitive: cfg.case_sensitive,
			penalty_multiplier: cfg.penalty_multiplier,
			boost_multiplier: cfg.boost_multiplier,
			reward_matches: cfg.reward_matches,
		}
	}

	pub fn disabled() -> Self {
		Self {
			patterns: Vec::new(),
			enabled: false,
			case_sensitive: false,
			penalty_multiplier: 1.0,
			boost_multiplier: 1.0,
			reward_matches: false,
		}
	}

	pub fn is_enabled(&self) -> bool {
		self.enabled
	}

	/// Unmatched facets are multiplied by the penalty. The overall score is re-derived from the
	/// adjusted per-facet scores.
	pub fn apply(&self, score: FacetScore, searchable_text: &str) -> FacetScore {
		if !self.enabled || score.per_facet.is_empty() {
			return score;
		}

		let per_facet = score
			.per_facet
			.into_iter()
			.map(|(facet, value)| {
				let matched = self
					.patterns
					.iter()
					.find(|(pattern_facet, _)| *pattern_facet == facet)
					.map(|(_, pattern)| pattern.is_match(searchable_text))
					.unwrap_or_else(|| {
						FacetPattern::new(&facet, self.case_sensitive).is_match(searchable_text)
					});
				let adjusted = match (matched, self.reward_matches) {
					(true, true) => value * self.boost_multiplier,
					(true, false) => value,
					(false, _) => value * self.penalty_multiplier,
				};

				(facet, adjusted.clamp(0.0, 1.0))
			})
			.collect();

		FacetScore::from_per_facet(per_facet)
	}
}

fn check_dimensions(expected: usize, actual: usize) -> Result<()> {
	if expected != actual {
		return Err(Error::DimensionMismatch { expected, actual });
	}

	Ok(())
}

fn normalize(vector: &[f32]) -> Vec<f32> {
	let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt().max(MIN_NORM);

	vector.iter().map(|v| v / norm).collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
	a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn mean(values: impl Iterator<Item = f32>) -> f32 {
	let (sum, count) = values.fold((0.0_f32, 0_usize), |(sum, count), v| (sum + v, count + 1));

	if count == 0 { 0.0 } else { (sum / count as f32).clamp(0.0, 1.0) }
}
