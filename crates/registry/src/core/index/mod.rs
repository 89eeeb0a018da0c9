#![cfg_attr(doc, allow(rustdoc::private_intra_doc_links))]
//! Workspace registry storage and publication.
//!
//! # Purpose
//!
//! The `index` subsystem stores every workspace unit keyed by descriptor
//! location, together with the capabilities each unit offers, the requirements
//! it declares, and a reverse index from requirement identity to requiring
//! locations. It publishes that storage as versioned immutable snapshots.
//!
//! # Mental Model
//!
//! 1. **Open:** [`ProjectRegistry::open`] copies the current [`Snapshot`] into a
//!    [`MutableProjectRegistry`] stamped with the snapshot's version.
//! 2. **Compute:** the refresh engine mutates the working copy: facades,
//!    capability sets, requirement sets; lookups of reverse dependents drive
//!    re-queueing.
//! 3. **Apply:** [`ProjectRegistry::apply`] checks the stamped version against
//!    the live one, diffs old and new storage into [`ChangeEvent`]s, swaps the
//!    new snapshot in, and bumps the version.
//! 4. **Consumption:** readers load a [`Snapshot`] wait-free and keep it alive
//!    for as long as they hold it.
//!
//! # Key Types
//!
//! | Type | Role |
//! |------|------|
//! | [`ProjectRegistry`] | Atomic container for the published snapshot. |
//! | [`Snapshot`] | One immutable published state plus its version. |
//! | [`BasicRegistry`] | Passive storage and derived reverse index. |
//! | [`MutableProjectRegistry`] | Single-owner working copy of a snapshot. |
//! | [`ChangeEvent`] | Unit-level difference produced by an apply. |
//!
//! # Concurrency
//!
//! - **Reads:** Wait-free (atomic load of current snapshot).
//! - **Writes:** Serialized by a registry-wide lock inside `apply`; the version
//!   increment is the linearization point.
//! - **Working copies:** never shared with a published snapshot (copy on open).
//!
//! # Invariants
//!
//! - Reverse index and per-location requirement sets are mutual inverses.
//!   - Enforced in: [`types::BasicRegistry::set_requirements`], [`types::BasicRegistry::dependents`].
//!   - Tested by: [`invariants::test_reverse_index_inverse`]
//!   - Failure symptom: a changed capability fails to re-queue a dependent.
//!
//! - Stale working copies are never published.
//!   - Enforced in: [`runtime::ProjectRegistry::apply`].
//!   - Tested by: [`invariants::test_stale_apply_is_rejected`]
//!   - Failure symptom: concurrent refreshes silently overwrite each other.
//!
//! - Closed working copies reject mutation.
//!   - Enforced in: [`mutable::MutableProjectRegistry`] (`assert_open`).
//!   - Tested by: [`invariants::test_closed_copy_rejects_mutation`]
//!
//! - Published snapshots stay alive and unchanged while held.
//!   - Enforced in: [`snapshot::Snapshot`] (held through `Arc`).
//!   - Tested by: [`invariants::test_snapshot_liveness_across_apply`]

mod error;
mod events;
pub(crate) mod lookup;
mod mutable;
pub mod persist;
pub(crate) mod runtime;
pub(crate) mod snapshot;
mod types;

pub use error::StaleSnapshot;
pub use events::{ChangeEvent, ChangeKind};
pub use mutable::MutableProjectRegistry;
pub use runtime::ProjectRegistry;
pub use snapshot::Snapshot;
pub use types::BasicRegistry;

#[cfg(any(test, doc))]
pub(crate) mod invariants;

#[cfg(any(test, doc))]
pub(crate) mod test_fixtures;
