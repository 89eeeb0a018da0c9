use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::core::{
	Capability, Coordinates, Facade, FacadeModel, GenerationClock, Location, MutableProjectRegistry, RequiredCapability,
};

pub(crate) fn loc(name: &str) -> Location {
	Location::new(format!("/ws/{name}/pom.xml"))
}

pub(crate) fn coords(artifact: &str, version: &str) -> Coordinates {
	Coordinates::new("g", artifact, version)
}

pub(crate) fn facade(clock: &GenerationClock, name: &str, version: &str) -> Arc<Facade> {
	Arc::new(Facade::new(clock.next(), loc(name), FacadeModel::new(coords(name, version), "jar")))
}

pub(crate) fn set<T: std::hash::Hash + Eq + Clone>(items: &[T]) -> FxHashSet<T> {
	items.iter().cloned().collect()
}

/// Installs a unit providing `g:{name}:{version}` and requiring `requires`.
pub(crate) fn install(
	copy: &mut MutableProjectRegistry,
	clock: &GenerationClock,
	name: &str,
	version: &str,
	requires: &[RequiredCapability],
) {
	let location = loc(name);
	copy.set_facade(&location, Some(facade(clock, name, version)));
	copy.set_capabilities(&location, Some(set(&[Capability::artifact(&coords(name, version))])));
	copy.set_requirements(&location, Some(set(requires)));
}
