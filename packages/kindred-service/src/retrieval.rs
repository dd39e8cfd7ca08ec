use std::sync::Arc;

use serde::Serialize;

use kindred_domain::FigureRecord;
use kindred_storage::{FigureStore, MAX_FACET_FILTER_VALUES};

/// How a candidate set was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
	/// No facets were given; records are returned unscored.
	Browse,
	/// Records sharing at least one facet verbatim.
	Prefilter,
	/// The prefilter found nothing, so an unfiltered scan was used.
	Fallback,
	/// Too many facets to prefilter, or the store cannot filter.
	Unfiltered,
}

#[derive(Debug, Clone)]
pub struct Candidates {
	pub figures: Vec<FigureRecord>,
	pub mode: RetrievalMode,
}

/// Selects a bounded candidate set for scoring.
///
/// Store failures surface as an empty set; candidate selection only bounds the work done by the
/// scorer.
pub struct CandidateRetriever {
	store: Arc<dyn FigureStore>,
	max_facets: usize,
}
impl CandidateRetriever {
	pub fn new(store: Arc<dyn FigureStore>, max_facets: usize) -> Self {
		Self { store, max_facets: max_facets.min(MAX_FACET_FILTER_VALUES) }
	}

	pub async fn retrieve(&self, facets: &[String], limit: usize) -> Candidates {
		if facets.is_empty() {
			return Candidates { figures: self.scan(limit).await, mode: RetrievalMode::Browse };
		}
		if facets.len() > self.max_facets || !self.store.supports_facet_filter() {
			return Candidates { figures: self.scan(limit).await, mode: RetrievalMode::Unfiltered };
		}

		let figures = match self.store.get_by_facets_any(facets, limit).await {
			Ok(figures) => figures,
			Err(err) => {
				tracing::warn!(error = %err, facets = facets.len(), "Facet prefilter failed.");

				return Candidates { figures: Vec::new(), mode: RetrievalMode::Prefilter };
			},
		};

		if figures.is_empty() {
			tracing::debug!(facets = facets.len(), "Facet prefilter matched nothing; scanning.");

			return Candidates { figures: self.scan(limit).await, mode: RetrievalMode::Fallback };
		}

		Candidates { figures, mode: RetrievalMode::Prefilter }
	}

	async fn scan(&self, limit: usize) -> Vec<FigureRecord> {
		match self.store.scan(limit).await {
			Ok(figures) => figures,
			Err(err) => {
				tracing::warn!(error = %err, limit, "Figure scan failed.");

				Vec::new()
			},
		}
	}
}
