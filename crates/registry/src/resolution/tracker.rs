use rustc_hash::FxHashSet;

use super::DependencyResolutionContext;
use crate::core::Location;

/// Bounds the fixpoint loop of dependency resolution.
///
/// Within one round each location is processed at most once. A location that is
/// re-queued after it was processed is recorded as changed and retried in the
/// next round. Every extra round must shrink the seed, and the round count is
/// capped, so the loop always terminates.
#[derive(Debug)]
pub struct ProjectProcessingTracker {
	seed: FxHashSet<Location>,
	processed: FxHashSet<Location>,
	changed: Vec<Location>,
	changed_set: FxHashSet<Location>,
	rounds: usize,
	max_rounds: usize,
	ceiling_reached: bool,
}

impl ProjectProcessingTracker {
	/// Seeds the tracker with everything currently queued in `context`.
	pub fn new(context: &DependencyResolutionContext, max_rounds: usize) -> Self {
		Self {
			seed: context.queued().into_iter().collect(),
			processed: FxHashSet::default(),
			changed: Vec::new(),
			changed_set: FxHashSet::default(),
			rounds: 0,
			max_rounds: max_rounds.max(1),
			ceiling_reached: false,
		}
	}

	/// Returns true the first time `location` is seen this round.
	pub fn should_process(&mut self, location: &Location) -> bool {
		if self.processed.insert(location.clone()) {
			return true;
		}
		if self.changed_set.insert(location.clone()) {
			self.changed.push(location.clone());
		}
		false
	}

	/// Decides after a drained round whether another round can make progress.
	///
	/// On `true`, the context has been re-armed with the locations that changed
	/// this round.
	pub fn needs_improvement(&mut self, context: &DependencyResolutionContext) -> bool {
		self.rounds += 1;
		if self.changed.is_empty() || self.seed.is_empty() {
			return false;
		}

		let before = self.seed.len();
		let changed_set = &self.changed_set;
		self.seed.retain(|loc| changed_set.contains(loc));
		if self.seed.len() == before {
			tracing::debug!(rounds = self.rounds, pending = self.changed.len(), "no forward progress; stopping");
			return false;
		}
		if self.rounds >= self.max_rounds {
			self.ceiling_reached = true;
			tracing::warn!(
				rounds = self.rounds,
				pending = self.changed.len(),
				"dependency resolution hit the round ceiling"
			);
			return false;
		}

		tracing::trace!(rounds = self.rounds, requeued = self.changed.len(), "re-arming resolution round");
		context.force(self.changed.drain(..));
		self.changed_set.clear();
		self.processed.clear();
		true
	}

	/// Locations re-queued during the last round that were never reprocessed.
	pub fn pending(&self) -> &[Location] {
		&self.changed
	}

	/// False when the last stop left work behind (ceiling or no progress).
	pub fn is_converged(&self) -> bool {
		self.changed.is_empty()
	}

	pub fn ceiling_reached(&self) -> bool {
		self.ceiling_reached
	}

	/// Completed rounds.
	pub fn rounds(&self) -> usize {
		self.rounds
	}
}
