//! Published registry container with atomic publication.
//!
//! # Role
//!
//! This module provides the thread-safe entrypoint for reading and replacing
//! the workspace registry. Reads are a wait-free atomic load; the only write
//! path is [`ProjectRegistry::apply`].
//!
//! # Invariants
//!
//! - A stale working copy must never be published (see `invariants::test_stale_apply_is_rejected`).
//! - `version` increases by exactly one per successful apply and never resets.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use super::error::StaleSnapshot;
use super::events::ChangeEvent;
use super::mutable::MutableProjectRegistry;
use super::snapshot::Snapshot;
use super::types::BasicRegistry;
use crate::core::RequiredCapability;

pub(crate) struct Shared {
	pub(crate) current: ArcSwap<Snapshot>,
	write: Mutex<()>,
}

impl Shared {
	pub(crate) fn version(&self) -> u64 {
		self.current.load().version
	}
}

/// Versioned, shareable handle to the published workspace registry.
///
/// Cloning the handle shares the same registry.
#[derive(Clone)]
pub struct ProjectRegistry {
	shared: Arc<Shared>,
}

impl std::fmt::Debug for ProjectRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let snap = self.shared.current.load();
		f.debug_struct("ProjectRegistry")
			.field("version", &snap.version)
			.field("units", &snap.len())
			.finish()
	}
}

impl ProjectRegistry {
	/// Creates an empty registry at version 0.
	pub fn new(build_tag: impl Into<String>) -> Self {
		Self::from_state(BasicRegistry::new(build_tag))
	}

	/// Creates a registry publishing `state` at version 0, e.g. a restored snapshot.
	pub fn from_state(state: BasicRegistry) -> Self {
		Self {
			shared: Arc::new(Shared {
				current: ArcSwap::from_pointee(Snapshot::new(0, state)),
				write: Mutex::new(()),
			}),
		}
	}

	/// Returns the current snapshot; it stays valid while held.
	#[inline]
	pub fn snapshot(&self) -> Arc<Snapshot> {
		self.shared.current.load_full()
	}

	#[inline]
	pub fn version(&self) -> u64 {
		self.shared.version()
	}

	/// Opens a working copy of the current snapshot.
	pub fn open(&self) -> MutableProjectRegistry {
		let snap = self.snapshot();
		MutableProjectRegistry::new(snap.state.clone(), snap.version, Arc::clone(&self.shared))
	}

	/// Publishes `mutable` as the next snapshot and returns the unit-level differences.
	///
	/// Fails without touching the registry if another working copy was applied
	/// after `mutable` was opened. On success `mutable` is closed.
	pub fn apply(&self, mutable: &mut MutableProjectRegistry) -> Result<Vec<ChangeEvent>, StaleSnapshot> {
		assert!(!mutable.is_closed(), "applying a closed working copy");
		assert!(
			Arc::ptr_eq(&self.shared, mutable.parent()),
			"working copy belongs to a different registry"
		);

		let _guard = self.shared.write.lock();
		let old = self.shared.current.load_full();
		if old.version != mutable.parent_version() {
			return Err(StaleSnapshot {
				expected: mutable.parent_version(),
				actual: old.version,
			});
		}

		let state = mutable.take_state();
		if cfg!(feature = "registry-contracts") {
			assert!(state.reverse_index_consistent(), "reverse requirement index diverged from requirement sets");
		}
		let events = diff(&old.state, &state);

		let version = old.version + 1;
		tracing::debug!(
			version,
			units = state.len(),
			indexed_keys = state.indexed_key_count(),
			events = events.len(),
			"published registry snapshot"
		);
		self.shared.current.store(Arc::new(Snapshot::new(version, state)));
		Ok(events)
	}
}

fn requirements_differ(old: Option<&FxHashSet<RequiredCapability>>, new: Option<&FxHashSet<RequiredCapability>>) -> bool {
	match (old, new) {
		(None, None) => false,
		(Some(set), None) | (None, Some(set)) => !set.is_empty(),
		(Some(a), Some(b)) => a != b,
	}
}

/// Removals first, then additions and changes; each group ordered by location.
fn diff(old: &BasicRegistry, new: &BasicRegistry) -> Vec<ChangeEvent> {
	let mut events = Vec::new();

	let mut removed: Vec<_> = old
		.facades
		.iter()
		.filter(|(loc, _)| !new.facades.contains_key(*loc))
		.collect();
	removed.sort_by(|a, b| a.0.cmp(b.0));
	for (loc, facade) in removed {
		events.push(ChangeEvent::removed(loc.clone(), Arc::clone(facade)));
	}

	let mut current: Vec<_> = new.facades.iter().collect();
	current.sort_by(|a, b| a.0.cmp(b.0));
	for (loc, facade) in current {
		match old.facades.get(loc) {
			None => events.push(ChangeEvent::added(loc.clone(), Arc::clone(facade))),
			Some(prev) if prev.generation() != facade.generation() => {
				let deps_changed = requirements_differ(old.requirements(loc), new.requirements(loc));
				events.push(ChangeEvent::changed(loc.clone(), Arc::clone(prev), Arc::clone(facade), deps_changed));
			}
			Some(_) => {}
		}
	}

	events
}
