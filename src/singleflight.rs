//! Per-key coalescing of concurrent async work.

// crates.io
use futures::{
	FutureExt,
	future::{BoxFuture, Shared},
};
// self
use crate::_prelude::*;

type Flight<V> = Shared<BoxFuture<'static, Result<V, Arc<Error>>>>;

/// Registry that runs at most one operation per key at a time.
///
/// Callers that arrive while an operation for their key is pending await the same future
/// and observe the same outcome. The entry is removed as soon as the operation settles, so
/// the next caller starts fresh work. Failures reach every caller as [`Error::Shared`].
pub struct SingleFlight<K, V> {
	inflight: Arc<Mutex<HashMap<K, Flight<V>>>>,
}
impl<K, V> SingleFlight<K, V>
where
	K: 'static + Clone + Eq + Hash + Send + Sync,
	V: 'static + Clone + Send + Sync,
{
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self { inflight: Default::default() }
	}

	/// Runs `work` for `key`, or joins the operation already pending for it.
	///
	/// `work` is only invoked when no operation for `key` is pending.
	pub async fn run<F, Fut>(&self, key: K, work: F) -> Result<V>
	where
		F: FnOnce() -> Fut,
		Fut: 'static + Send + Future<Output = Result<V>>,
	{
		let flight = {
			let mut inflight = self.inflight.lock();

			match inflight.get(&key) {
				Some(flight) => flight.clone(),
				None => {
					let registry = self.inflight.clone();
					let settled_key = key.clone();
					let pending = work();
					let flight = async move {
						let result = pending.await.map_err(Arc::new);

						registry.lock().remove(&settled_key);

						result
					}
					.boxed()
					.shared();

					inflight.insert(key, flight.clone());

					flight
				},
			}
		};

		flight.await.map_err(Error::Shared)
	}

	/// Number of keys with a pending operation.
	pub fn in_flight(&self) -> usize {
		self.inflight.lock().len()
	}
}
impl<K, V> Clone for SingleFlight<K, V> {
	fn clone(&self) -> Self {
		Self { inflight: self.inflight.clone() }
	}
}
impl<K, V> Default for SingleFlight<K, V>
where
	K: 'static + Clone + Eq + Hash + Send + Sync,
	V: 'static + Clone + Send + Sync,
{
	fn default() -> Self {
		Self::new()
	}
}
impl<K, V> Debug for SingleFlight<K, V> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SingleFlight").field("in_flight", &self.inflight.lock().len()).finish()
	}
}
