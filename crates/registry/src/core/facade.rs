//! Cached, resolved representation of one build unit.
//!
//! A [`Facade`] is built once per successful descriptor read and is immutable
//! apart from its execution-mapping slot and session-property bag. A re-read
//! that changes anything produces a new facade with a fresh generation; the
//! previous one is discarded, never mutated. Facades hold no reference to the
//! engine that built them.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::capability::{Namespace, RequiredCapability, VersionlessKey};
use super::key::{Coordinates, Location};
use super::problem::Problem;

/// A remote repository declared by a unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Repository {
	pub id: String,
	pub url: String,
}

/// A declared dependency, as written in the descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
	pub group: String,
	pub artifact: String,
	pub classifier: Option<String>,
	/// Version constraint: a bare version or a range.
	pub version: String,
	pub scope: Option<String>,
	pub optional: bool,
}

impl Dependency {
	pub fn new(group: impl Into<String>, artifact: impl Into<String>, version: impl Into<String>) -> Self {
		Self {
			group: group.into(),
			artifact: artifact.into(),
			classifier: None,
			version: version.into(),
			scope: None,
			optional: false,
		}
	}

	pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = Some(scope.into());
		self
	}

	pub fn with_optional(mut self, optional: bool) -> Self {
		self.optional = optional;
		self
	}

	pub fn versionless_id(&self) -> String {
		match &self.classifier {
			Some(c) => format!("{}:{}:{}", self.group, self.artifact, c),
			None => format!("{}:{}", self.group, self.artifact),
		}
	}

	/// Requirement in the given namespace carrying this dependency's constraint, scope and optionality.
	pub fn requirement(&self, namespace: Namespace) -> RequiredCapability {
		let mut req = RequiredCapability::new(VersionlessKey::new(namespace, self.versionless_id()), self.version.clone())
			.with_optional(self.optional);
		if let Some(scope) = &self.scope {
			req = req.with_scope(scope.clone());
		}
		req
	}
}

/// Resolver settings a unit is read with; units are read in batches grouped by this value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolverConfig {
	pub active_profiles: Vec<String>,
	pub inactive_profiles: Vec<String>,
	/// Resolve dependencies against other workspace units before remote repositories.
	pub resolve_workspace: bool,
}

impl Default for ResolverConfig {
	fn default() -> Self {
		Self {
			active_profiles: Vec::new(),
			inactive_profiles: Vec::new(),
			resolve_workspace: true,
		}
	}
}

/// Content of a facade as produced by a descriptor read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacadeModel {
	pub identity: Coordinates,
	pub packaging: String,
	pub parent: Option<Coordinates>,
	pub source_roots: Vec<PathBuf>,
	pub resource_roots: Vec<PathBuf>,
	pub output_dir: Option<PathBuf>,
	pub test_output_dir: Option<PathBuf>,
	pub repositories: Vec<Repository>,
	pub dependencies: Vec<Dependency>,
	/// Dependency-management imports.
	pub imports: Vec<Dependency>,
	pub resolver_config: ResolverConfig,
	/// Lifecycle mapping explicitly requested by the descriptor.
	pub explicit_mapping_id: Option<String>,
	/// Build-step executions the lifecycle mapping is computed for.
	pub executions: Vec<String>,
}

impl FacadeModel {
	pub fn new(identity: Coordinates, packaging: impl Into<String>) -> Self {
		Self {
			identity,
			packaging: packaging.into(),
			parent: None,
			source_roots: Vec::new(),
			resource_roots: Vec::new(),
			output_dir: None,
			test_output_dir: None,
			repositories: Vec::new(),
			dependencies: Vec::new(),
			imports: Vec::new(),
			resolver_config: ResolverConfig::default(),
			explicit_mapping_id: None,
			executions: Vec::new(),
		}
	}

	pub fn is_pom(&self) -> bool {
		self.packaging == "pom"
	}
}

/// A dependency after resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDependency {
	pub dependency: Dependency,
	/// Version the dependency resolved to, if it resolved at all.
	pub version: Option<String>,
	/// Workspace unit providing the dependency, when resolved inside the workspace.
	pub workspace: Option<Location>,
}

/// Outcome of dependency resolution for one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
	pub dependencies: Vec<ResolvedDependency>,
	pub problems: Vec<Problem>,
}

/// Build-step handler assignment computed by the lifecycle mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingResult {
	pub mapping_id: Option<String>,
	/// Execution key to handler ids.
	pub handlers: BTreeMap<String, Vec<String>>,
	pub problems: Vec<Problem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Facade {
	generation: u64,
	location: Location,
	model: FacadeModel,
	resolution: Option<Resolution>,
	#[serde(skip)]
	mapping: Mutex<Option<Arc<MappingResult>>>,
	#[serde(skip)]
	session: Mutex<FxHashMap<String, String>>,
}

impl Facade {
	pub fn new(generation: u64, location: Location, model: FacadeModel) -> Self {
		Self {
			generation,
			location,
			model,
			resolution: None,
			mapping: Mutex::default(),
			session: Mutex::default(),
		}
	}

	/// Copy of this facade with a new resolution and generation.
	///
	/// Session properties carry over; the execution mapping does not.
	pub fn with_resolution(&self, generation: u64, resolution: Resolution) -> Self {
		Self {
			generation,
			location: self.location.clone(),
			model: self.model.clone(),
			resolution: Some(resolution),
			mapping: Mutex::default(),
			session: Mutex::new(self.session.lock().clone()),
		}
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn location(&self) -> &Location {
		&self.location
	}

	pub fn identity(&self) -> &Coordinates {
		&self.model.identity
	}

	pub fn packaging(&self) -> &str {
		&self.model.packaging
	}

	pub fn parent(&self) -> Option<&Coordinates> {
		self.model.parent.as_ref()
	}

	pub fn model(&self) -> &FacadeModel {
		&self.model
	}

	pub fn resolution(&self) -> Option<&Resolution> {
		self.resolution.as_ref()
	}

	/// Resolution problems recorded for this unit.
	pub fn problems(&self) -> &[Problem] {
		self.resolution.as_ref().map(|r| r.problems.as_slice()).unwrap_or_default()
	}

	pub fn mapping(&self) -> Option<Arc<MappingResult>> {
		self.mapping.lock().clone()
	}

	pub fn set_mapping(&self, mapping: MappingResult) {
		*self.mapping.lock() = Some(Arc::new(mapping));
	}

	pub fn session_property(&self, key: &str) -> Option<String> {
		self.session.lock().get(key).cloned()
	}

	pub fn set_session_property(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
		self.session.lock().insert(key.into(), value.into())
	}
}
