use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::lookup::RequirementIndex;
use crate::core::{Capability, Coordinates, Facade, Location, RequiredCapability};

/// Passive storage of workspace units and their capability indices.
///
/// `Clone` produces an independent copy: nested maps and sets are copied, and
/// only the immutable facades are shared.
#[derive(Debug, Clone, Default)]
pub struct BasicRegistry {
	pub(crate) build_tag: String,
	pub(crate) artifacts: FxHashMap<Coordinates, Location>,
	pub(crate) facades: FxHashMap<Location, Arc<Facade>>,
	pub(crate) capabilities: FxHashMap<Location, FxHashSet<Capability>>,
	pub(crate) requirements: FxHashMap<Location, FxHashSet<RequiredCapability>>,
	pub(crate) dependents: RequirementIndex,
}

impl BasicRegistry {
	/// Creates an empty registry stamped with the running build's tag.
	pub fn new(build_tag: impl Into<String>) -> Self {
		Self {
			build_tag: build_tag.into(),
			..Self::default()
		}
	}

	pub fn build_tag(&self) -> &str {
		&self.build_tag
	}

	#[inline]
	pub fn facade(&self, location: &Location) -> Option<&Arc<Facade>> {
		self.facades.get(location)
	}

	#[inline]
	pub fn facade_for(&self, coords: &Coordinates) -> Option<&Arc<Facade>> {
		self.facades.get(self.artifacts.get(coords)?)
	}

	#[inline]
	pub fn location_for(&self, coords: &Coordinates) -> Option<&Location> {
		self.artifacts.get(coords)
	}

	/// Returns all facades sorted by location.
	pub fn facades(&self) -> Vec<Arc<Facade>> {
		let mut out: Vec<_> = self.facades.values().cloned().collect();
		out.sort_by(|a, b| a.location().cmp(b.location()));
		out
	}

	/// Returns all locations with a facade, sorted.
	pub fn locations(&self) -> Vec<Location> {
		let mut out: Vec<_> = self.facades.keys().cloned().collect();
		out.sort();
		out
	}

	pub fn capabilities(&self, location: &Location) -> Option<&FxHashSet<Capability>> {
		self.capabilities.get(location)
	}

	pub fn requirements(&self, location: &Location) -> Option<&FxHashSet<RequiredCapability>> {
		self.requirements.get(location)
	}

	/// Locations providing a capability that potentially satisfies `req`.
	pub fn providers(&self, req: &RequiredCapability) -> Vec<(Location, Capability)> {
		let mut out: Vec<_> = self
			.capabilities
			.iter()
			.flat_map(|(loc, caps)| caps.iter().map(move |cap| (loc, cap)))
			.filter(|(_, cap)| req.is_potential_match(cap, false))
			.map(|(loc, cap)| (loc.clone(), cap.clone()))
			.collect();
		out.sort();
		out
	}

	/// Highest facade generation stored here, or 0 when empty.
	pub fn max_generation(&self) -> u64 {
		self.facades.values().map(|f| f.generation()).max().unwrap_or(0)
	}

	pub fn len(&self) -> usize {
		self.facades.len()
	}

	pub fn is_empty(&self) -> bool {
		self.facades.is_empty()
	}

	/// Returns true when this registry may be reused by the running build.
	///
	/// Requires a matching build tag and a readable descriptor for every facade.
	pub fn is_valid(&self, build_tag: &str, readable: impl Fn(&Location) -> bool) -> bool {
		self.build_tag == build_tag && self.facades.keys().all(readable)
	}

	pub(crate) fn set_facade(&mut self, location: &Location, facade: Option<Arc<Facade>>) -> Option<Arc<Facade>> {
		let old = match &facade {
			Some(f) => self.facades.insert(location.clone(), Arc::clone(f)),
			None => self.facades.remove(location),
		};
		if let Some(old) = &old
			&& self.artifacts.get(old.identity()) == Some(location)
		{
			self.artifacts.remove(old.identity());
		}
		if let Some(new) = &facade {
			self.artifacts.insert(new.identity().clone(), location.clone());
		}
		old
	}

	pub(crate) fn set_capabilities(&mut self, location: &Location, caps: Option<FxHashSet<Capability>>) -> Option<FxHashSet<Capability>> {
		match caps.filter(|c| !c.is_empty()) {
			Some(caps) => self.capabilities.insert(location.clone(), caps),
			None => self.capabilities.remove(location),
		}
	}

	pub(crate) fn set_requirements(&mut self, location: &Location, reqs: Option<FxHashSet<RequiredCapability>>) -> Option<FxHashSet<RequiredCapability>> {
		let old = self.remove_requirements(location);
		if let Some(reqs) = reqs.filter(|r| !r.is_empty()) {
			for req in &reqs {
				self.dependents.insert(location, req);
			}
			self.requirements.insert(location.clone(), reqs);
		}
		old
	}

	pub(crate) fn remove_requirements(&mut self, location: &Location) -> Option<FxHashSet<RequiredCapability>> {
		let old = self.requirements.remove(location)?;
		for req in &old {
			self.dependents.remove(location, req);
		}
		Some(old)
	}

	pub(crate) fn dependents(&mut self, capability: &Capability, exact_only: bool, remove: bool) -> FxHashSet<Location> {
		if !remove {
			return self.dependents.matching(capability, exact_only);
		}
		let mut out = FxHashSet::default();
		for (req, locations) in self.dependents.take_matching(capability, exact_only) {
			for location in locations {
				if let Some(forward) = self.requirements.get_mut(&location) {
					forward.remove(&req);
					if forward.is_empty() {
						self.requirements.remove(&location);
					}
				}
				out.insert(location);
			}
		}
		out
	}

	/// Reconstructs the reverse index from the per-location requirement sets.
	pub(crate) fn rebuild_reverse_index(&mut self) {
		self.dependents.clear();
		for (location, reqs) in &self.requirements {
			for req in reqs {
				self.dependents.insert(location, req);
			}
		}
	}

	/// Returns true if the reverse index is exactly the inverse of the forward requirement sets.
	pub(crate) fn reverse_index_consistent(&self) -> bool {
		let mut rebuilt = RequirementIndex::default();
		for (location, reqs) in &self.requirements {
			if reqs.is_empty() {
				return false;
			}
			for req in reqs {
				rebuilt.insert(location, req);
			}
		}
		rebuilt == self.dependents && !self.dependents.has_empty_buckets()
	}

	pub(crate) fn indexed_key_count(&self) -> usize {
		self.dependents.key_count()
	}
}
