use std::{
	collections::{BTreeMap, BTreeSet, HashMap},
	sync::{Arc, RwLock},
};

use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;

use kindred_domain::{Field, FigureRecord};
use kindred_storage::FigureStore;

/// Known facet values per field, each list sorted.
pub type FacetsByField = BTreeMap<Field, Vec<String>>;

struct Snapshot {
	facets: Arc<FacetsByField>,
	fetched_at: OffsetDateTime,
}

/// A TTL-bound snapshot of every facet value in the store, grouped by field.
///
/// Refreshes scan at most `refresh_limit` records. A failed refresh keeps serving the previous
/// snapshot.
pub struct FacetAggregationCache {
	store: Arc<dyn FigureStore>,
	ttl: Duration,
	refresh_limit: usize,
	snapshot: RwLock<Option<Snapshot>>,
	refresh: Mutex<()>,
}
impl FacetAggregationCache {
	pub fn new(store: Arc<dyn FigureStore>, ttl: Duration, refresh_limit: usize) -> Self {
		Self { store, ttl, refresh_limit, snapshot: RwLock::new(None), refresh: Mutex::new(()) }
	}

	pub async fn get_all_facets(&self) -> Arc<FacetsByField> {
		self.get_all_facets_at(OffsetDateTime::now_utc()).await
	}

	pub async fn get_all_facets_at(&self, now: OffsetDateTime) -> Arc<FacetsByField> {
		if let Some(facets) = self.fresh(now) {
			return facets;
		}

		// One refresh at a time; waiters reuse its result.
		let _refresh = self.refresh.lock().await;

		if let Some(facets) = self.fresh(now) {
			return facets;
		}

		match self.store.scan(self.refresh_limit).await {
			Ok(records) => {
				let facets = Arc::new(aggregate(&records));

				tracing::info!(
					cache_kind = "facets",
					records = records.len(),
					fields = facets.len(),
					"Facet snapshot refreshed."
				);

				let mut snapshot = self.snapshot.write().unwrap_or_else(|err| err.into_inner());

				*snapshot = Some(Snapshot { facets: facets.clone(), fetched_at: now });

				facets
			},
			Err(err) => {
				let stale = self.current();

				tracing::warn!(
					cache_kind = "facets",
					error = %err,
					stale = stale.is_some(),
					"Facet snapshot refresh failed."
				);

				stale.unwrap_or_default()
			},
		}
	}

	/// Forces the next read to refresh.
	pub fn invalidate(&self) {
		let mut snapshot = self.snapshot.write().unwrap_or_else(|err| err.into_inner());

		if let Some(snapshot) = snapshot.as_mut() {
			snapshot.fetched_at = OffsetDateTime::UNIX_EPOCH;
		}
	}

	fn fresh(&self, now: OffsetDateTime) -> Option<Arc<FacetsByField>> {
		let snapshot = self.snapshot.read().unwrap_or_else(|err| err.into_inner());

		snapshot
			.as_ref()
			.filter(|snapshot| now - snapshot.fetched_at < self.ttl)
			.map(|snapshot| snapshot.facets.clone())
	}

	fn current(&self) -> Option<Arc<FacetsByField>> {
		let snapshot = self.snapshot.read().unwrap_or_else(|err| err.into_inner());

		snapshot.as_ref().map(|snapshot| snapshot.facets.clone())
	}
}

/// Lowercased facet value to its field. A value listed under several fields resolves to the first
/// in canonical field order.
pub fn facet_field_index(facets: &FacetsByField) -> HashMap<String, Field> {
	let mut index = HashMap::new();

	for (field, values) in facets {
		for value in values {
			index.entry(value.to_lowercase()).or_insert(*field);
		}
	}

	index
}

fn aggregate(records: &[FigureRecord]) -> FacetsByField {
	let mut grouped: BTreeMap<Field, BTreeSet<String>> = BTreeMap::new();

	for record in records {
		for (field, values) in record.tags.iter() {
			let known = grouped.entry(field).or_default();

			for value in values.iter().map(|value| value.trim()).filter(|value| !value.is_empty()) {
				known.insert(value.to_string());
			}
		}
	}

	grouped.into_iter().map(|(field, values)| (field, values.into_iter().collect())).collect()
}
