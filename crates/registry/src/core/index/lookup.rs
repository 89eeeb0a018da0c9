//! Reverse requirement index.
//!
//! # Role
//!
//! Answers "which locations require something compatible with capability C"
//! without scanning every unit. Requirements are bucketed by versionless key;
//! version matching only runs inside the matching bucket.
//!
//! # Invariants
//!
//! - No empty bucket is retained at either level (see `invariants::test_reverse_index_has_no_empty_buckets`).

use rustc_hash::{FxHashMap, FxHashSet};

use crate::core::{Capability, Location, RequiredCapability, VersionlessKey};

type Bucket = FxHashMap<RequiredCapability, FxHashSet<Location>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RequirementIndex {
	by_key: FxHashMap<VersionlessKey, Bucket>,
}

impl RequirementIndex {
	pub(crate) fn insert(&mut self, location: &Location, req: &RequiredCapability) {
		self.by_key
			.entry(req.key.clone())
			.or_default()
			.entry(req.clone())
			.or_default()
			.insert(location.clone());
	}

	pub(crate) fn remove(&mut self, location: &Location, req: &RequiredCapability) {
		let Some(bucket) = self.by_key.get_mut(&req.key) else {
			return;
		};
		if let Some(locations) = bucket.get_mut(req) {
			locations.remove(location);
			if locations.is_empty() {
				bucket.remove(req);
			}
		}
		if bucket.is_empty() {
			self.by_key.remove(&req.key);
		}
	}

	/// Locations whose requirements potentially match `capability`.
	pub(crate) fn matching(&self, capability: &Capability, exact_only: bool) -> FxHashSet<Location> {
		let mut out = FxHashSet::default();
		if let Some(bucket) = self.by_key.get(&capability.key) {
			for (req, locations) in bucket {
				if req.is_potential_match(capability, exact_only) {
					out.extend(locations.iter().cloned());
				}
			}
		}
		out
	}

	/// Removes and returns every requirement entry potentially matching `capability`.
	pub(crate) fn take_matching(&mut self, capability: &Capability, exact_only: bool) -> Vec<(RequiredCapability, FxHashSet<Location>)> {
		let Some(bucket) = self.by_key.get_mut(&capability.key) else {
			return Vec::new();
		};
		let matched: Vec<RequiredCapability> = bucket
			.keys()
			.filter(|req| req.is_potential_match(capability, exact_only))
			.cloned()
			.collect();
		let taken = matched
			.into_iter()
			.filter_map(|req| bucket.remove(&req).map(|locations| (req, locations)))
			.collect();
		if bucket.is_empty() {
			self.by_key.remove(&capability.key);
		}
		taken
	}

	pub(crate) fn clear(&mut self) {
		self.by_key.clear();
	}

	/// Number of versionless-key buckets.
	pub(crate) fn key_count(&self) -> usize {
		self.by_key.len()
	}

	/// Iterates every `(requirement, location)` pair in the index.
	#[cfg(test)]
	pub(crate) fn entries(&self) -> impl Iterator<Item = (&RequiredCapability, &Location)> + '_ {
		self.by_key
			.values()
			.flat_map(|bucket| bucket.iter().flat_map(|(req, locations)| locations.iter().map(move |loc| (req, loc))))
	}

	pub(crate) fn has_empty_buckets(&self) -> bool {
		self.by_key
			.values()
			.any(|bucket| bucket.is_empty() || bucket.values().any(FxHashSet::is_empty))
	}
}
