use std::collections::VecDeque;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::core::{Location, Problem};

/// Carried-forward outcome for one unit within a refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitStatus {
	pub problems: Vec<Problem>,
}

impl UnitStatus {
	pub fn has_errors(&self) -> bool {
		self.problems.iter().any(Problem::is_error)
	}
}

struct ContextState {
	queue: VecDeque<Location>,
	queued: FxHashSet<Location>,
	statuses: FxHashMap<Location, UnitStatus>,
}

impl ContextState {
	fn push(&mut self, location: Location) -> bool {
		if !self.queued.insert(location.clone()) {
			return false;
		}
		self.queue.push_back(location);
		true
	}
}

/// Work queue of pending descriptor locations for one refresh.
///
/// Insertion-ordered with set semantics: enqueueing a location that is already
/// queued is a no-op. One context belongs to one refresh invocation, but
/// collaborator callbacks may enqueue from other threads, so all state sits
/// behind a single mutex.
pub struct DependencyResolutionContext {
	state: Mutex<ContextState>,
}

impl std::fmt::Debug for DependencyResolutionContext {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.state.lock();
		f.debug_struct("DependencyResolutionContext")
			.field("queued", &state.queue.len())
			.field("statuses", &state.statuses.len())
			.finish()
	}
}

impl DependencyResolutionContext {
	pub fn new(seed: impl IntoIterator<Item = Location>) -> Self {
		let ctx = Self {
			state: Mutex::new(ContextState {
				queue: VecDeque::new(),
				queued: FxHashSet::default(),
				statuses: FxHashMap::default(),
			}),
		};
		ctx.force(seed);
		ctx
	}

	/// Removes and returns the oldest queued location.
	pub fn pop(&self) -> Option<Location> {
		let mut state = self.state.lock();
		let location = state.queue.pop_front()?;
		state.queued.remove(&location);
		Some(location)
	}

	/// Queues `location`; returns false if it was already queued.
	pub fn enqueue(&self, location: Location) -> bool {
		self.state.lock().push(location)
	}

	/// Merge-adds `locations`, keeping their order for the new ones.
	pub fn force(&self, locations: impl IntoIterator<Item = Location>) {
		let mut state = self.state.lock();
		for location in locations {
			state.push(location);
		}
	}

	pub fn is_empty(&self) -> bool {
		self.state.lock().queue.is_empty()
	}

	pub fn len(&self) -> usize {
		self.state.lock().queue.len()
	}

	pub fn contains(&self, location: &Location) -> bool {
		self.state.lock().queued.contains(location)
	}

	/// Empties the queue, returning its contents in order. Statuses are kept.
	pub fn drain(&self) -> Vec<Location> {
		let mut state = self.state.lock();
		state.queued.clear();
		state.queue.drain(..).collect()
	}

	/// Copy of the queue contents in order.
	pub fn queued(&self) -> Vec<Location> {
		self.state.lock().queue.iter().cloned().collect()
	}

	pub fn set_status(&self, location: Location, status: UnitStatus) -> Option<UnitStatus> {
		self.state.lock().statuses.insert(location, status)
	}

	pub fn status(&self, location: &Location) -> Option<UnitStatus> {
		self.state.lock().statuses.get(location).cloned()
	}

	pub fn clear_status(&self, location: &Location) -> Option<UnitStatus> {
		self.state.lock().statuses.remove(location)
	}

	pub fn add_problem(&self, location: &Location, problem: Problem) {
		self.state
			.lock()
			.statuses
			.entry(location.clone())
			.or_default()
			.problems
			.push(problem);
	}

	/// Takes every recorded status, ordered by location.
	pub fn take_statuses(&self) -> Vec<(Location, UnitStatus)> {
		let mut out: Vec<_> = std::mem::take(&mut self.state.lock().statuses).into_iter().collect();
		out.sort_by(|a, b| a.0.cmp(&b.0));
		out
	}
}
