//! Collaborator seams: descriptor reading, lifecycle mapping, change listeners.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use trellis_registry::{
	ChangeEvent, Dependency, FacadeModel, Location, MappingResult, Problem, ProblemKind, Repository, ResolverConfig,
};

/// Full result of reading one descriptor.
///
/// The [`FacadeModel`] part becomes the unit's facade; the rest is the
/// heavyweight state kept only in the [`crate::ProjectCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectModel {
	pub facade: FacadeModel,
	/// Effective properties after inheritance and interpolation.
	pub properties: BTreeMap<String, String>,
}

impl ProjectModel {
	pub fn new(facade: FacadeModel) -> Self {
		Self {
			facade,
			properties: BTreeMap::new(),
		}
	}

	pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.properties.insert(key.into(), value.into());
		self
	}
}

impl From<FacadeModel> for ProjectModel {
	fn from(facade: FacadeModel) -> Self {
		Self::new(facade)
	}
}

/// Outcome of reading one descriptor; a failure carries its problems.
pub type ReadResult = Result<ProjectModel, Vec<Problem>>;

/// Turns descriptor files into structured project models.
pub trait ProjectReader: Send + Sync {
	/// Reads `locations` together; all of them share `config`.
	///
	/// A location missing from the returned map counts as a failed read.
	fn read_batch(&self, locations: &[Location], config: &ResolverConfig) -> FxHashMap<Location, ReadResult>;

	/// Whether `location` is still a workspace member.
	fn is_member(&self, location: &Location) -> bool {
		location.is_readable()
	}

	/// Resolves a dependency outside the workspace, returning the version found.
	fn resolve_artifact(&self, _dependency: &Dependency, _repositories: &[Repository]) -> Option<String> {
		None
	}
}

/// Assigns build-step handlers to a unit's executions.
pub trait LifecycleMapper: Send + Sync {
	fn compute_mapping(&self, model: &ProjectModel, executions: &[String], explicit_mapping_id: Option<&str>) -> MappingResult;
}

/// Maps executions through a fixed handler table.
///
/// The mapping id is the explicit one when given, otherwise the packaging.
/// Executions without a handler are reported as mapping warnings.
#[derive(Debug, Default)]
pub struct DefaultLifecycleMapper {
	handlers: FxHashMap<String, Vec<String>>,
}

impl DefaultLifecycleMapper {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_handler(mut self, execution: impl Into<String>, handler: impl Into<String>) -> Self {
		self.handlers.entry(execution.into()).or_default().push(handler.into());
		self
	}
}

impl LifecycleMapper for DefaultLifecycleMapper {
	fn compute_mapping(&self, model: &ProjectModel, executions: &[String], explicit_mapping_id: Option<&str>) -> MappingResult {
		let mut result = MappingResult {
			mapping_id: Some(explicit_mapping_id.unwrap_or(&model.facade.packaging).to_string()),
			..MappingResult::default()
		};
		for execution in executions {
			match self.handlers.get(execution) {
				Some(handlers) => {
					result.handlers.insert(execution.clone(), handlers.clone());
				}
				None => result.problems.push(Problem::warning(
					ProblemKind::Mapping,
					format!("execution {execution} is not covered by the lifecycle mapping"),
				)),
			}
		}
		result
	}
}

/// Receives the change events of every successful, non-empty commit.
pub trait RegistryListener: Send + Sync {
	fn registry_changed(&self, events: &[ChangeEvent]);
}
