use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic generation clock for facades.
///
/// Every facade built during a refresh is stamped with a fresh generation.
/// Change detection compares generations, never facade contents.
#[derive(Debug, Default, Clone)]
pub struct GenerationClock {
	last: Arc<AtomicU64>,
}

impl GenerationClock {
	/// Creates a new generation clock starting at generation 1.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the next generation ID.
	pub fn next(&self) -> u64 {
		self.last.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
	}

	/// Advances the clock past `generation` so restored facades never collide with new ones.
	pub fn observe(&self, generation: u64) {
		self.last.fetch_max(generation, Ordering::AcqRel);
	}

	/// Returns the most recently issued generation.
	pub fn current(&self) -> u64 {
		self.last.load(Ordering::Acquire)
	}
}
