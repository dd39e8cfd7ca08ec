use std::{
	collections::HashMap,
	future::Future,
	sync::{Arc, Mutex},
};

use tokio::sync::watch;

use kindred_domain::text;

use crate::{Error, Result, search_cache::cache_key_prefix};

type Outcome<T> = Option<Result<T>>;
type Registry<T> = Arc<Mutex<HashMap<String, watch::Receiver<Outcome<T>>>>>;

/// Single-flight execution: concurrent callers with the same key share one computation.
///
/// Work runs on its own task, so a caller that stops waiting does not cancel it for the others.
/// Nothing is remembered once the work settles.
pub struct RequestCoalescer<T> {
	pending: Registry<T>,
}
impl<T> RequestCoalescer<T>
where
	T: Clone + Send + Sync + 'static,
{
	pub fn new() -> Self {
		Self { pending: Arc::new(Mutex::new(HashMap::new())) }
	}

	/// SHA-256 of the trimmed, lowercased input.
	pub fn key_for(input: &str) -> String {
		text::content_key(&text::normalize_key_text(input))
	}

	pub fn pending_count(&self) -> usize {
		self.pending.lock().unwrap_or_else(|err| err.into_inner()).len()
	}

	/// Runs `work` unless a computation for `key` is already in flight, in which case its result
	/// (or error) is shared.
	pub async fn coalesce<F, Fut>(&self, key: &str, work: F) -> Result<T>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T>> + Send + 'static,
	{
		let (mut rx, leader) = {
			let mut pending = self.pending.lock().unwrap_or_else(|err| err.into_inner());

			match pending.get(key) {
				Some(rx) => (rx.clone(), None),
				None => {
					let (tx, rx) = watch::channel(None);

					pending.insert(key.to_string(), rx.clone());

					// Armed with the entry so nothing between here and the spawn can orphan it.
					let guard =
						PendingGuard { pending: self.pending.clone(), key: key.to_string() };

					(rx, Some((tx, guard)))
				},
			}
		};

		match leader {
			Some((tx, guard)) => {
				tracing::debug!(
					cache_key_prefix = cache_key_prefix(key),
					"Coalescing new request."
				);

				let fut = work();

				tokio::spawn(async move {
					let outcome = fut.await;

					// Deregister before publishing so later callers start fresh work.
					drop(guard);

					let _ = tx.send(Some(outcome));
				});
			},
			None => {
				tracing::debug!(
					cache_key_prefix = cache_key_prefix(key),
					"Joining in-flight request."
				);
			},
		}

		let settled = rx.wait_for(Option::is_some).await.map_err(|_| Error::Coalesce {
			message: "In-flight computation ended without a result.".to_string(),
		})?;

		match &*settled {
			Some(outcome) => outcome.clone(),
			None => Err(Error::Coalesce {
				message: "In-flight computation has no result.".to_string(),
			}),
		}
	}
}
impl<T> Default for RequestCoalescer<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn default() -> Self {
		Self::new()
	}
}

/// Removes the registry entry when the work settles, panics included.
struct PendingGuard<T> {
	pending: Registry<T>,
	key: String,
}
impl<T> Drop for PendingGuard<T> {
	fn drop(&mut self) {
		self.pending.lock().unwrap_or_else(|err| err.into_inner()).remove(&self.key);
	}
}
