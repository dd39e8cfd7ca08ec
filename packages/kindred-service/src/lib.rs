pub mod coalesce;
pub mod encoder;
pub mod extraction_cache;
pub mod facets;
pub mod figures;
pub mod retrieval;
pub mod scoring;
pub mod search;
pub mod search_cache;

mod error;

pub use error::{Error, Result};
pub use search::{DescriptionMatch, ScoredFigure, SearchRequest, SearchResponse};

use std::{future::Future, pin::Pin, sync::Arc};

use time::Duration;

use coalesce::RequestCoalescer;
use encoder::FacetEncoder;
use extraction_cache::FacetExtractionCache;
use facets::FacetAggregationCache;
use kindred_config::{Config, EmbeddingProviderConfig};
use kindred_domain::SocialModel;
use kindred_providers::embedding;
use kindred_storage::{FigureStore, SearchCacheStore, db::Db};
use retrieval::CandidateRetriever;
use search_cache::SearchResultCache;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, kindred_providers::Result<Vec<Vec<f32>>>>;
}

/// Turns a free-text self description into a social model. Supplied by the embedding application.
pub trait FacetExtractor
where
	Self: Send + Sync,
{
	fn extract<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<SocialModel>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub extractor: Arc<dyn FacetExtractor>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, extractor: Arc<dyn FacetExtractor>) -> Self {
		Self { embedding, extractor }
	}

	/// Embeds over HTTP with the configured provider.
	pub fn with_extractor(extractor: Arc<dyn FacetExtractor>) -> Self {
		Self { embedding: Arc::new(HttpEmbedding), extractor }
	}
}

/// The OpenAI-compatible HTTP embedding client.
pub struct HttpEmbedding;
impl EmbeddingProvider for HttpEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, kindred_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

pub struct KindredService {
	pub cfg: Config,
	pub figures: Arc<dyn FigureStore>,
	pub providers: Providers,
	pub encoder: FacetEncoder,
	pub retriever: CandidateRetriever,
	pub facets: FacetAggregationCache,
	pub search_cache: SearchResultCache,
	pub extraction_cache: Arc<FacetExtractionCache>,
	pub coalescer: RequestCoalescer<SocialModel>,
}
impl KindredService {
	pub fn new(
		cfg: Config,
		figures: Arc<dyn FigureStore>,
		search_cache: Arc<dyn SearchCacheStore>,
		providers: Providers,
	) -> Self {
		let encoder =
			FacetEncoder::new(providers.embedding.clone(), cfg.providers.embedding.clone());
		let retriever =
			CandidateRetriever::new(figures.clone(), cfg.search.max_facets_per_query as usize);
		let facets = FacetAggregationCache::new(
			figures.clone(),
			Duration::seconds(duration_secs(cfg.cache.facets_ttl_seconds)),
			cfg.cache.facets_refresh_limit as usize,
		);
		let search_cache =
			SearchResultCache::new(search_cache, Duration::days(cfg.cache.search_ttl_days));
		let extraction_cache = Arc::new(FacetExtractionCache::new(
			Duration::seconds(duration_secs(cfg.cache.extraction_ttl_seconds)),
			cfg.cache.extraction_max_entries as usize,
		));

		Self {
			cfg,
			figures,
			providers,
			encoder,
			retriever,
			facets,
			search_cache,
			extraction_cache,
			coalescer: RequestCoalescer::new(),
		}
	}

	/// Connects to Postgres, bootstraps the schema, and serves both stores from it.
	pub async fn connect(cfg: Config, providers: Providers) -> Result<Self> {
		let db = Arc::new(Db::connect(&cfg.storage.postgres).await?);

		db.ensure_schema().await?;

		Ok(Self::new(cfg, db.clone(), db, providers))
	}
}

fn duration_secs(secs: u64) -> i64 {
	i64::try_from(secs).unwrap_or(i64::MAX)
}
