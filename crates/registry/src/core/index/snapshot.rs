//! Published snapshot view.
//!
//! # Role
//!
//! Pure view type handed to readers. It contains no mutation logic; holding an
//! `Arc<Snapshot>` keeps its facades alive across later publications.
//!
//! # Invariants
//!
//! - A snapshot is never mutated after publication (see `invariants::test_snapshot_liveness_across_apply`).

use std::ops::Deref;

use super::types::BasicRegistry;

/// One published, immutable state of the registry.
#[derive(Debug)]
pub struct Snapshot {
	pub(crate) version: u64,
	pub(crate) state: BasicRegistry,
}

impl Snapshot {
	pub(crate) fn new(version: u64, state: BasicRegistry) -> Self {
		Self { version, state }
	}

	/// Monotonic publication counter.
	pub fn version(&self) -> u64 {
		self.version
	}

	pub fn state(&self) -> &BasicRegistry {
		&self.state
	}
}

impl Deref for Snapshot {
	type Target = BasicRegistry;

	fn deref(&self) -> &BasicRegistry {
		&self.state
	}
}
