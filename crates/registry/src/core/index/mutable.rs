//! Working copy used to compute the next snapshot.
//!
//! # Role
//!
//! A [`MutableProjectRegistry`] is a full independent copy of one published
//! snapshot's storage, stamped with that snapshot's version. The refresh engine
//! performs all computation here and then hands it to
//! [`super::ProjectRegistry::apply`]. It is single-owner and not synchronized.
//!
//! # Invariants
//!
//! - An applied or closed working copy rejects every mutation (see `invariants::test_closed_copy_rejects_mutation`).
//! - Requirement updates keep the reverse index the exact inverse of the per-location sets.

use std::ops::Deref;
use std::sync::Arc;

use rustc_hash::FxHashSet;

use super::runtime::Shared;
use super::types::BasicRegistry;
use crate::core::{Capability, Facade, Location, RequiredCapability};

pub struct MutableProjectRegistry {
	state: BasicRegistry,
	parent_version: u64,
	parent: Arc<Shared>,
	closed: bool,
}

impl std::fmt::Debug for MutableProjectRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MutableProjectRegistry")
			.field("parent_version", &self.parent_version)
			.field("units", &self.state.len())
			.field("closed", &self.closed)
			.finish()
	}
}

impl MutableProjectRegistry {
	pub(crate) fn new(state: BasicRegistry, parent_version: u64, parent: Arc<Shared>) -> Self {
		Self {
			state,
			parent_version,
			parent,
			closed: false,
		}
	}

	#[track_caller]
	fn assert_open(&self) {
		assert!(!self.closed, "working copy is closed");
	}

	/// Version of the snapshot this copy was opened against.
	pub fn parent_version(&self) -> u64 {
		self.parent_version
	}

	pub(crate) fn parent(&self) -> &Arc<Shared> {
		&self.parent
	}

	/// Returns true once the published registry has advanced past the parent version.
	pub fn is_stale(&self) -> bool {
		self.parent.version() != self.parent_version
	}

	/// Marks the copy permanently unusable and drops its storage.
	pub fn close(&mut self) {
		self.closed = true;
		self.state = BasicRegistry::default();
	}

	pub fn is_closed(&self) -> bool {
		self.closed
	}

	pub(crate) fn take_state(&mut self) -> BasicRegistry {
		self.closed = true;
		std::mem::take(&mut self.state)
	}

	/// Replaces the facade at `location`, returning the previous one.
	pub fn set_facade(&mut self, location: &Location, facade: Option<Arc<Facade>>) -> Option<Arc<Facade>> {
		self.assert_open();
		self.state.set_facade(location, facade)
	}

	/// Replaces the capability set at `location`; an empty set is stored as absent.
	pub fn set_capabilities(&mut self, location: &Location, caps: Option<FxHashSet<Capability>>) -> Option<FxHashSet<Capability>> {
		self.assert_open();
		self.state.set_capabilities(location, caps)
	}

	/// Replaces the requirement set at `location` and updates the reverse index to match.
	pub fn set_requirements(
		&mut self,
		location: &Location,
		reqs: Option<FxHashSet<RequiredCapability>>,
	) -> Option<FxHashSet<RequiredCapability>> {
		self.assert_open();
		self.state.set_requirements(location, reqs)
	}

	/// Removes every requirement of `location` from both indices.
	pub fn remove_requirements(&mut self, location: &Location) -> Option<FxHashSet<RequiredCapability>> {
		self.assert_open();
		self.state.remove_requirements(location)
	}

	/// Locations requiring something potentially satisfied by `capability`.
	///
	/// With `remove`, each matched requirement is detached from the reverse
	/// index and from its owner's requirement set, so a later lookup in the same
	/// pass will not report it again until the owner is re-resolved.
	pub fn dependents(&mut self, capability: &Capability, exact_only: bool, remove: bool) -> FxHashSet<Location> {
		self.assert_open();
		self.state.dependents(capability, exact_only, remove)
	}

	/// Union of [`Self::dependents`] over `capabilities`.
	pub fn dependents_of_all<'a>(
		&mut self,
		capabilities: impl IntoIterator<Item = &'a Capability>,
		exact_only: bool,
		remove: bool,
	) -> FxHashSet<Location> {
		let mut out = FxHashSet::default();
		for cap in capabilities {
			out.extend(self.dependents(cap, exact_only, remove));
		}
		out
	}
}

impl Deref for MutableProjectRegistry {
	type Target = BasicRegistry;

	fn deref(&self) -> &BasicRegistry {
		&self.state
	}
}
