use std::{
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};

use time::{Duration, OffsetDateTime};

use kindred_domain::{Field, FigureRecord, SocialModel};
use kindred_service::{
	BoxFuture, Error,
	coalesce::RequestCoalescer,
	facets::FacetAggregationCache,
	retrieval::{CandidateRetriever, RetrievalMode},
	search_cache::SearchResultCache,
};
use kindred_storage::{
	FigureStore, SearchCacheStore,
	memory::{MemoryFigureStore, MemorySearchCacheStore},
	models::SearchCacheRow,
};

struct FailingSearchCacheStore;
impl SearchCacheStore for FailingSearchCacheStore {
	fn fetch<'a>(
		&'a self,
		_key: &'a str,
	) -> BoxFuture<'a, kindred_storage::Result<Option<SearchCacheRow>>> {
		Box::pin(async move { Err(unavailable()) })
	}

	fn store<'a>(&'a self, _row: &'a SearchCacheRow) -> BoxFuture<'a, kindred_storage::Result<()>> {
		Box::pin(async move { Err(unavailable()) })
	}

	fn delete<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, kindred_storage::Result<()>> {
		Box::pin(async move { Err(unavailable()) })
	}

	fn record_hit<'a>(
		&'a self,
		_key: &'a str,
		_now: OffsetDateTime,
	) -> BoxFuture<'a, kindred_storage::Result<()>> {
		Box::pin(async move { Err(unavailable()) })
	}
}

/// Delegates to a memory store until switched to failing. Counts scans.
struct SwitchableFigureStore {
	inner: MemoryFigureStore,
	failing: AtomicBool,
	scans: AtomicUsize,
}
impl SwitchableFigureStore {
	fn new() -> Self {
		Self {
			inner: MemoryFigureStore::new(),
			failing: AtomicBool::new(false),
			scans: AtomicUsize::new(0),
		}
	}
}
impl FigureStore for SwitchableFigureStore {
	fn get_by_facets_any<'a>(
		&'a self,
		facets: &'a [String],
		limit: usize,
	) -> BoxFuture<'a, kindred_storage::Result<Vec<FigureRecord>>> {
		self.inner.get_by_facets_any(facets, limit)
	}

	fn scan<'a>(
		&'a self,
		limit: usize,
	) -> BoxFuture<'a, kindred_storage::Result<Vec<FigureRecord>>> {
		Box::pin(async move {
			self.scans.fetch_add(1, Ordering::SeqCst);

			if self.failing.load(Ordering::SeqCst) {
				return Err(unavailable());
			}

			self.inner.scan(limit).await
		})
	}

	fn get<'a>(
		&'a self,
		key: &'a str,
	) -> BoxFuture<'a, kindred_storage::Result<Option<FigureRecord>>> {
		self.inner.get(key)
	}

	fn put<'a>(
		&'a self,
		key: &'a str,
		record: &'a FigureRecord,
	) -> BoxFuture<'a, kindred_storage::Result<()>> {
		self.inner.put(key, record)
	}

	fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, kindred_storage::Result<bool>> {
		self.inner.delete(key)
	}
}

fn unavailable() -> kindred_storage::Error {
	kindred_storage::Error::Unavailable("Store is down.".to_string())
}

fn at(seconds: i64) -> OffsetDateTime {
	OffsetDateTime::UNIX_EPOCH + Duration::days(20_000) + Duration::seconds(seconds)
}

fn model() -> SocialModel {
	SocialModel {
		gender: Some(vec!["woman".to_string()]),
		interests: Some(vec!["astronomy".to_string()]),
		..Default::default()
	}
}

fn strings(values: &[&str]) -> Vec<String> {
	values.iter().map(|value| value.to_string()).collect()
}

fn tagged(name: &str, field: Field, value: &str) -> FigureRecord {
	let mut tags = SocialModel::default();

	tags.set(field, vec![value.to_string()]);

	FigureRecord { name: name.to_string(), facets: tags.facets(), tags, ..Default::default() }
}

#[tokio::test]
async fn search_results_round_trip_and_count_hits() {
	let store = Arc::new(MemorySearchCacheStore::new());
	let cache = SearchResultCache::new(store.clone(), Duration::days(30));
	let names = strings(&["Mae Jemison"]);
	let facets = strings(&["woman", "astronomy"]);

	assert!(cache.put_at("A woman into  astronomy", &model(), &names, &facets, at(0)).await);

	let hit = cache.get_at("a WOMAN into astronomy", at(10)).await.expect("Expected a hit.");

	assert_eq!(hit.social_model, model());
	assert_eq!(hit.figure_names, names);
	assert_eq!(hit.facets, facets);

	cache.get_at("a woman into astronomy", at(20)).await.expect("Expected a hit.");

	let key = SearchResultCache::cache_key("a woman into astronomy");
	let row = store.fetch(&key).await.expect("Fetch failed.").expect("Row missing.");

	assert_eq!(row.hit_count, 2);
	assert_eq!(row.last_hit_at, Some(at(20)));
	assert_eq!(row.normalized_text, "a woman into astronomy");

	// Rewriting resets the counters.
	assert!(cache.put_at("a woman into astronomy", &model(), &names, &facets, at(30)).await);

	let row = store.fetch(&key).await.expect("Fetch failed.").expect("Row missing.");

	assert_eq!(row.hit_count, 0);
	assert_eq!(row.last_hit_at, None);
}

#[tokio::test]
async fn expired_search_results_are_deleted() {
	let store = Arc::new(MemorySearchCacheStore::new());
	let cache = SearchResultCache::new(store.clone(), Duration::days(1));

	assert!(cache.put_at("query", &model(), &[], &[], at(0)).await);
	assert!(cache.get_at("query", at(86_399)).await.is_some());
	assert!(cache.get_at("query", at(86_400)).await.is_none());
	assert!(store.is_empty());
}

#[tokio::test]
async fn zero_ttl_search_results_never_hit() {
	let store = Arc::new(MemorySearchCacheStore::new());
	let cache = SearchResultCache::new(store.clone(), Duration::ZERO);

	assert!(cache.put_at("query", &model(), &[], &[], at(0)).await);
	assert!(cache.get_at("query", at(0)).await.is_none());
	assert!(store.is_empty());
}

#[tokio::test]
async fn blank_queries_bypass_the_search_cache() {
	let store = Arc::new(MemorySearchCacheStore::new());
	let cache = SearchResultCache::new(store.clone(), Duration::days(1));

	assert!(!cache.put_at("   ", &model(), &[], &[], at(0)).await);
	assert!(cache.get_at("   ", at(0)).await.is_none());
	assert!(store.is_empty());
}

#[tokio::test]
async fn search_cache_store_failures_are_misses() {
	let cache = SearchResultCache::new(Arc::new(FailingSearchCacheStore), Duration::days(1));

	assert!(!cache.put_at("query", &model(), &[], &[], at(0)).await);
	assert!(cache.get_at("query", at(0)).await.is_none());
}

#[tokio::test]
async fn facet_snapshot_refreshes_after_ttl() {
	let store = Arc::new(SwitchableFigureStore::new());
	let cache = FacetAggregationCache::new(store.clone(), Duration::seconds(60), 100);
	let ada = tagged("Ada", Field::Interests, "mathematics");

	store.put(&ada.key(), &ada).await.expect("Put failed.");

	let first = cache.get_all_facets_at(at(0)).await;

	assert_eq!(first[&Field::Interests], strings(&["mathematics"]));

	let grace = tagged("Grace", Field::Interests, "compilers");

	store.put(&grace.key(), &grace).await.expect("Put failed.");

	assert_eq!(cache.get_all_facets_at(at(59)).await, first);
	assert_eq!(store.scans.load(Ordering::SeqCst), 1);

	let refreshed = cache.get_all_facets_at(at(60)).await;

	assert_eq!(refreshed[&Field::Interests], strings(&["compilers", "mathematics"]));
	assert_eq!(store.scans.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn facet_snapshot_survives_refresh_failures() {
	let store = Arc::new(SwitchableFigureStore::new());
	let cache = FacetAggregationCache::new(store.clone(), Duration::seconds(60), 100);

	store.failing.store(true, Ordering::SeqCst);

	assert!(cache.get_all_facets_at(at(0)).await.is_empty());

	store.failing.store(false, Ordering::SeqCst);

	let ada = tagged("Ada", Field::Gender, "woman");

	store.put(&ada.key(), &ada).await.expect("Put failed.");

	let fresh = cache.get_all_facets_at(at(1)).await;

	assert_eq!(fresh[&Field::Gender], strings(&["woman"]));

	store.failing.store(true, Ordering::SeqCst);
	cache.invalidate();

	assert_eq!(cache.get_all_facets_at(at(2)).await, fresh);
}

#[tokio::test]
async fn retrieval_modes_follow_facets_and_store_support() {
	let store = Arc::new(MemoryFigureStore::new());
	let ada = tagged("Ada", Field::Interests, "mathematics");
	let grace = tagged("Grace", Field::Interests, "compilers");

	store.put(&ada.key(), &ada).await.expect("Put failed.");
	store.put(&grace.key(), &grace).await.expect("Put failed.");

	let retriever = CandidateRetriever::new(store.clone(), 2);
	let browse = retriever.retrieve(&[], 10).await;

	assert_eq!(browse.mode, RetrievalMode::Browse);
	assert_eq!(browse.figures.len(), 2);

	let prefilter = retriever.retrieve(&strings(&["compilers"]), 10).await;

	assert_eq!(prefilter.mode, RetrievalMode::Prefilter);
	assert_eq!(prefilter.figures.len(), 1);
	assert_eq!(prefilter.figures[0].name, "Grace");

	let fallback = retriever.retrieve(&strings(&["poetry"]), 10).await;

	assert_eq!(fallback.mode, RetrievalMode::Fallback);
	assert_eq!(fallback.figures.len(), 2);

	let unfiltered = retriever.retrieve(&strings(&["a", "b", "compilers"]), 1).await;

	assert_eq!(unfiltered.mode, RetrievalMode::Unfiltered);
	assert_eq!(unfiltered.figures.len(), 1);

	let retriever =
		CandidateRetriever::new(Arc::new(MemoryFigureStore::without_facet_filter()), 30);

	assert_eq!(
		retriever.retrieve(&strings(&["compilers"]), 10).await.mode,
		RetrievalMode::Unfiltered
	);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn coalesced_callers_share_one_run() {
	let coalescer = Arc::new(RequestCoalescer::<u64>::new());
	let runs = Arc::new(AtomicUsize::new(0));
	let mut handles = Vec::new();

	for _ in 0..10 {
		let coalescer = coalescer.clone();
		let runs = runs.clone();

		handles.push(tokio::spawn(async move {
			coalescer
				.coalesce("key", move || async move {
					runs.fetch_add(1, Ordering::SeqCst);
					tokio::time::sleep(StdDuration::from_millis(100)).await;

					Ok(42)
				})
				.await
		}));
	}

	for handle in handles {
		assert_eq!(handle.await.expect("Task panicked."), Ok(42));
	}

	assert_eq!(runs.load(Ordering::SeqCst), 1);
	assert_eq!(coalescer.pending_count(), 0);

	// Settled work is not remembered.
	let again = coalescer.coalesce("key", || async { Ok(7) }).await;

	assert_eq!(again, Ok(7));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn coalesced_failures_reach_every_caller() {
	let coalescer = Arc::new(RequestCoalescer::<u64>::new());
	let mut handles = Vec::new();

	for _ in 0..5 {
		let coalescer = coalescer.clone();

		handles.push(tokio::spawn(async move {
			coalescer
				.coalesce("key", || async {
					tokio::time::sleep(StdDuration::from_millis(100)).await;

					Err(Error::Provider { message: "boom".to_string() })
				})
				.await
		}));
	}

	for handle in handles {
		assert_eq!(
			handle.await.expect("Task panicked."),
			Err(Error::Provider { message: "boom".to_string() })
		);
	}

	assert_eq!(coalescer.pending_count(), 0);
}

#[tokio::test]
async fn distinct_keys_run_independently() {
	let coalescer = RequestCoalescer::<String>::new();
	let a = RequestCoalescer::<String>::key_for("Hello ");
	let b = RequestCoalescer::<String>::key_for("hello");
	let c = RequestCoalescer::<String>::key_for("goodbye");

	assert_eq!(a, b);
	assert_ne!(a, c);

	let (left, right) = tokio::join!(
		coalescer.coalesce(&a, || async { Ok("left".to_string()) }),
		coalescer.coalesce(&c, || async { Ok("right".to_string()) }),
	);

	assert_eq!(left, Ok("left".to_string()));
	assert_eq!(right, Ok("right".to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn coalesced_work_survives_cancelled_callers() {
	let coalescer = Arc::new(RequestCoalescer::<u64>::new());
	let runs = Arc::new(AtomicUsize::new(0));
	let leader = {
		let coalescer = coalescer.clone();
		let runs = runs.clone();

		tokio::spawn(async move {
			coalescer
				.coalesce("key", move || async move {
					tokio::time::sleep(StdDuration::from_millis(200)).await;
					runs.fetch_add(1, Ordering::SeqCst);

					Ok(5)
				})
				.await
		})
	};

	while coalescer.pending_count() == 0 {
		tokio::time::sleep(StdDuration::from_millis(5)).await;
	}

	let joiner = {
		let coalescer = coalescer.clone();

		tokio::spawn(async move { coalescer.coalesce("key", || async { Ok(99) }).await })
	};

	tokio::time::sleep(StdDuration::from_millis(20)).await;
	leader.abort();

	assert_eq!(joiner.await.expect("Task panicked."), Ok(5));
	assert_eq!(runs.load(Ordering::SeqCst), 1);
	assert_eq!(coalescer.pending_count(), 0);
}

#[tokio::test]
async fn non_ascii_keys_are_logged_and_released() {
	kindred_testkit::init_tracing("debug");

	let coalescer = RequestCoalescer::<u64>::new();
	// The twelfth byte falls inside a multi-byte character.
	let key = "añññññññ";

	assert_eq!(coalescer.coalesce(key, || async { Ok(1) }).await, Ok(1));
	assert_eq!(coalescer.pending_count(), 0);
	assert_eq!(coalescer.coalesce(key, || async { Ok(2) }).await, Ok(2));
	assert_eq!(coalescer.pending_count(), 0);
}
