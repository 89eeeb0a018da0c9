//! Versioned workspace project registry.
//!
//! This crate holds the passive half of the incremental workspace model: the
//! unit identities and facades, the capability/requirement matching model, the
//! published [`ProjectRegistry`] snapshot and its [`MutableProjectRegistry`]
//! working copy, plus the work queue and convergence tracker that drive a
//! refresh. The orchestration itself lives in `trellis-engine`.
//!
//! # Modules
//!
//! - [`core`] - identities, facades, capabilities, version ranges, registry storage
//! - [`resolution`] - per-refresh work queue and fixpoint tracker

pub mod core;
pub mod resolution;

pub use crate::core::index::persist::{PersistError, PersistedSnapshot};
pub use crate::core::{
	BasicRegistry, Capability, ChangeEvent, ChangeKind, ComparableVersion, Coordinates, Dependency, Facade, FacadeModel,
	GenerationClock, Location, MappingResult, MutableProjectRegistry, Namespace, Problem, ProblemKind, ProjectRegistry,
	Repository, RequiredCapability, Resolution, ResolvedDependency, ResolverConfig, Severity, Snapshot, StaleSnapshot,
	VersionRange, VersionRangeError, VersionlessKey,
};
pub use crate::resolution::{DependencyResolutionContext, ProjectProcessingTracker, UnitStatus};
