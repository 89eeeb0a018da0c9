//! Shared registry infrastructure.

pub mod capability;
pub mod facade;
pub mod generation;
pub mod index;
pub mod key;
pub mod problem;
pub mod version;

pub use capability::{Capability, Namespace, RequiredCapability, VersionlessKey};
pub use facade::{
	Dependency, Facade, FacadeModel, MappingResult, Repository, Resolution, ResolvedDependency, ResolverConfig,
};
pub use generation::GenerationClock;
pub use index::{BasicRegistry, ChangeEvent, ChangeKind, MutableProjectRegistry, ProjectRegistry, Snapshot, StaleSnapshot};
pub use key::{Coordinates, Location};
pub use problem::{Problem, ProblemKind, Severity};
pub use version::{ComparableVersion, VersionRange, VersionRangeError};
