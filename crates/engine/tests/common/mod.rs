//! In-memory workspace used by the engine integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use trellis_engine::{EngineConfig, ProjectModel, ProjectReader, ReadResult, RegistryManager};
use trellis_registry::{
	ChangeEvent, ChangeKind, Coordinates, Dependency, FacadeModel, Location, Problem, ProblemKind, Repository,
	ResolverConfig,
};

pub const GROUP: &str = "org.example";

type ReadHook = Box<dyn Fn(&[Location]) + Send + Sync>;

/// Descriptor store standing in for the file system and the build tool.
#[derive(Default)]
pub struct FakeWorkspace {
	units: Mutex<BTreeMap<Location, ReadResult>>,
	external: Mutex<BTreeMap<String, String>>,
	reads: Mutex<Vec<Location>>,
	hook: Mutex<Option<ReadHook>>,
}

impl FakeWorkspace {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Stores `model` under the location derived from its artifact id.
	pub fn put(&self, model: ProjectModel) -> Location {
		let location = loc(&model.facade.identity.artifact);
		self.units.lock().insert(location.clone(), Ok(model));
		location
	}

	pub fn fail(&self, name: &str, message: &str) -> Location {
		let location = loc(name);
		self.units
			.lock()
			.insert(location.clone(), Err(vec![Problem::error(ProblemKind::Read, message)]));
		location
	}

	pub fn remove(&self, name: &str) -> Location {
		let location = loc(name);
		self.units.lock().remove(&location);
		location
	}

	/// Makes `group:artifact` resolvable outside the workspace at `version`.
	pub fn publish_external(&self, versionless_id: &str, version: &str) {
		self.external.lock().insert(versionless_id.to_string(), version.to_string());
	}

	pub fn reads_of(&self, name: &str) -> usize {
		let location = loc(name);
		self.reads.lock().iter().filter(|l| **l == location).count()
	}

	/// Runs `hook` at the start of every batch read.
	pub fn on_read(&self, hook: impl Fn(&[Location]) + Send + Sync + 'static) {
		*self.hook.lock() = Some(Box::new(hook));
	}
}

impl ProjectReader for FakeWorkspace {
	fn read_batch(&self, locations: &[Location], _config: &ResolverConfig) -> FxHashMap<Location, ReadResult> {
		if let Some(hook) = self.hook.lock().as_ref() {
			hook(locations);
		}
		self.reads.lock().extend(locations.iter().cloned());
		let units = self.units.lock();
		locations
			.iter()
			.filter_map(|l| units.get(l).map(|r| (l.clone(), r.clone())))
			.collect()
	}

	fn is_member(&self, location: &Location) -> bool {
		self.units.lock().contains_key(location)
	}

	fn resolve_artifact(&self, dependency: &Dependency, _repositories: &[Repository]) -> Option<String> {
		self.external.lock().get(&dependency.versionless_id()).cloned()
	}
}

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt::try_init();
}

pub fn loc(name: &str) -> Location {
	Location::new(format!("/ws/{name}/pom.xml"))
}

pub fn coords(name: &str, version: &str) -> Coordinates {
	Coordinates::new(GROUP, name, version)
}

pub fn id(name: &str) -> String {
	format!("{GROUP}:{name}")
}

/// A jar unit with no dependencies.
pub fn unit(name: &str, version: &str) -> FacadeModel {
	FacadeModel::new(coords(name, version), "jar")
}

pub fn pom(name: &str, version: &str) -> FacadeModel {
	FacadeModel::new(coords(name, version), "pom")
}

pub fn depending_on(mut model: FacadeModel, name: &str, constraint: &str) -> FacadeModel {
	model.dependencies.push(Dependency::new(GROUP, name, constraint));
	model
}

pub fn with_parent(mut model: FacadeModel, parent: &str, version: &str) -> FacadeModel {
	model.parent = Some(coords(parent, version));
	model
}

pub fn manager(workspace: &Arc<FakeWorkspace>) -> RegistryManager {
	manager_with(workspace, EngineConfig::default())
}

pub fn manager_with(workspace: &Arc<FakeWorkspace>, config: EngineConfig) -> RegistryManager {
	init_tracing();
	RegistryManager::new(config, Arc::clone(workspace) as Arc<dyn ProjectReader>)
}

pub fn kinds(events: &[ChangeEvent]) -> Vec<(ChangeKind, Location)> {
	events.iter().map(|e| (e.kind, e.location.clone())).collect()
}
