//! Per-refresh work queue and fixpoint control.
//!
//! # Role
//!
//! A refresh drains a [`DependencyResolutionContext`] twice: once to read
//! descriptors and once to resolve dependencies. The second drain runs under a
//! [`ProjectProcessingTracker`], which turns "reprocess whoever depends on what
//! just changed" into a bounded sequence of rounds.
//!
//! # Key Types
//!
//! | Type | Role |
//! |------|------|
//! | [`DependencyResolutionContext`] | Insertion-ordered location set plus per-unit status slots. |
//! | [`UnitStatus`] | Problems carried forward for one unit. |
//! | [`ProjectProcessingTracker`] | Round bookkeeping, progress check, ceiling. |
//!
//! # Concurrency
//!
//! The context is internally locked so collaborator callbacks may enqueue from
//! other threads. The tracker is owned by the refresh that drives it.

mod context;
mod tracker;

pub use context::{DependencyResolutionContext, UnitStatus};
pub use tracker::ProjectProcessingTracker;
