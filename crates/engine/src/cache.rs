//! Bounded cache of heavyweight project models.
//!
//! Facades stay small; the full [`ProjectModel`] of a unit lives here, keyed by
//! `(location, generation)` so a replaced facade can never be served a model
//! read for its predecessor. Observers are told about every entry that leaves
//! the cache, whatever the reason.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use trellis_registry::Location;

use crate::collab::ProjectModel;

/// Why an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictReason {
	/// Pushed out by a newer entry.
	Capacity,
	/// Dropped because its descriptor is being re-read.
	Invalidated,
	/// Released because its facade left the registry.
	Detached,
}

pub trait CacheObserver: Send + Sync {
	fn on_evict(&self, location: &Location, generation: u64, reason: EvictReason);
}

type Key = (Location, u64);

pub struct ProjectCache {
	entries: Mutex<LruCache<Key, Arc<ProjectModel>>>,
	observers: RwLock<Vec<Arc<dyn CacheObserver>>>,
}

impl std::fmt::Debug for ProjectCache {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let entries = self.entries.lock();
		f.debug_struct("ProjectCache")
			.field("len", &entries.len())
			.field("capacity", &entries.cap())
			.finish()
	}
}

impl ProjectCache {
	pub fn new(capacity: NonZeroUsize) -> Self {
		Self {
			entries: Mutex::new(LruCache::new(capacity)),
			observers: RwLock::new(Vec::new()),
		}
	}

	pub fn add_observer(&self, observer: Arc<dyn CacheObserver>) {
		self.observers.write().push(observer);
	}

	pub fn insert(&self, location: &Location, generation: u64, model: Arc<ProjectModel>) {
		let key = (location.clone(), generation);
		let evicted = self.entries.lock().push(key.clone(), model);
		if let Some((old, _)) = evicted
			&& old != key
		{
			tracing::trace!(location = %old.0, generation = old.1, "project model evicted");
			self.notify(&old, EvictReason::Capacity);
		}
	}

	/// Returns the model for exactly this facade generation, marking it recently used.
	pub fn get(&self, location: &Location, generation: u64) -> Option<Arc<ProjectModel>> {
		self.entries.lock().get(&(location.clone(), generation)).cloned()
	}

	/// Drops every generation cached for `location`.
	pub fn invalidate(&self, location: &Location) -> usize {
		let removed: Vec<Key> = {
			let mut entries = self.entries.lock();
			let keys: Vec<Key> = entries.iter().map(|(k, _)| k.clone()).filter(|k| &k.0 == location).collect();
			for key in &keys {
				entries.pop(key);
			}
			keys
		};
		for key in &removed {
			self.notify(key, EvictReason::Invalidated);
		}
		removed.len()
	}

	/// Releases the model of one facade generation, returning it to the caller.
	pub fn detach(&self, location: &Location, generation: u64) -> Option<Arc<ProjectModel>> {
		let key = (location.clone(), generation);
		let model = self.entries.lock().pop(&key)?;
		self.notify(&key, EvictReason::Detached);
		Some(model)
	}

	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}

	pub fn capacity(&self) -> usize {
		self.entries.lock().cap().get()
	}

	fn notify(&self, key: &Key, reason: EvictReason) {
		for observer in self.observers.read().iter() {
			observer.on_evict(&key.0, key.1, reason);
		}
	}
}
