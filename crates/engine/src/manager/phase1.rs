//! Descriptor reading.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use trellis_registry::{Capability, Facade, Location, Namespace, Problem, ProblemKind, ResolverConfig, UnitStatus};

use super::Refresh;
use crate::collab::ProjectModel;
use crate::error::RefreshError;
use crate::resolver::{structural_capabilities, structural_requirements};

impl Refresh<'_> {
	/// Drains the context in batches, reading every queued descriptor.
	pub(super) fn read_descriptors(&mut self) -> Result<(), RefreshError> {
		loop {
			self.checkpoint()?;
			let pending = self.context.drain();
			if pending.is_empty() {
				return Ok(());
			}
			self.batch += 1;

			let mut groups: Vec<(ResolverConfig, Vec<Location>)> = Vec::new();
			for location in pending {
				self.manager.cache.invalidate(&location);
				if !self.manager.reader.is_member(&location) {
					tracing::trace!(%location, "no longer a workspace member");
					self.context.clear_status(&location);
					self.clear_unit(&location);
					continue;
				}
				let reads = self.reads.get(&location).copied().unwrap_or(0);
				if reads >= self.manager.config.max_reads_per_unit {
					tracing::debug!(%location, reads, "read limit reached; keeping last read");
					continue;
				}
				let config = self
					.copy
					.facade(&location)
					.map(|f| f.model().resolver_config.clone())
					.unwrap_or_default();
				match groups.iter_mut().find(|(c, _)| *c == config) {
					Some((_, locations)) => locations.push(location),
					None => groups.push((config, vec![location])),
				}
			}

			for (config, locations) in groups {
				self.checkpoint()?;
				let mut results = self.manager.reader.read_batch(&locations, &config);
				tracing::debug!(batch = self.batch, units = locations.len(), "read descriptor batch");
				for location in locations {
					*self.reads.entry(location.clone()).or_default() += 1;
					self.last_read.insert(location.clone(), self.batch);
					match results.remove(&location) {
						Some(Ok(model)) => self.install_read(&location, model),
						Some(Err(problems)) => self.read_failed(&location, problems),
						None => self.read_failed(&location, vec![Problem::error(ProblemKind::Read, "reader returned no result")]),
					}
				}
			}
		}
	}

	fn install_read(&mut self, location: &Location, model: ProjectModel) {
		let identity = &model.facade.identity;
		if !identity.is_complete() {
			let problem = Problem::error(ProblemKind::Read, format!("descriptor declares an incomplete identity {identity}"));
			self.read_failed(location, vec![problem]);
			return;
		}
		self.read_failures.remove(location);
		self.context.clear_status(location);

		let facade = match self.copy.facade(location) {
			Some(prev) if *prev.model() == model.facade => Arc::clone(prev),
			_ => Arc::new(Facade::new(self.manager.clock.next(), location.clone(), model.facade.clone())),
		};
		tracing::trace!(%location, generation = facade.generation(), "descriptor read");
		self.manager.cache.insert(location, facade.generation(), Arc::new(model));

		let caps = structural_capabilities(&facade);
		let reqs = structural_requirements(&facade);
		self.copy.set_facade(location, Some(facade));
		let old_caps = self.copy.set_capabilities(location, Some(caps.clone())).unwrap_or_default();
		self.copy.set_requirements(location, Some(reqs));

		let changed: Vec<Capability> = old_caps.symmetric_difference(&caps).cloned().collect();
		self.seed_phase2([location.clone()]);
		let affected = self.copy.dependents_of_all(&changed, false, false);
		self.seed_phase2(sorted(affected));

		let structural: Vec<Capability> = caps.iter().chain(&changed).filter(|c| is_structural(c)).cloned().collect();
		let ripple = self.copy.dependents_of_all(&structural, false, false);
		self.requeue_for_read(ripple);
	}

	fn read_failed(&mut self, location: &Location, problems: Vec<Problem>) {
		let failures = self.read_failures.entry(location.clone()).or_default();
		*failures += 1;
		let reads = self.reads.get(location).copied().unwrap_or(0);
		if *failures == 1 && reads < self.manager.config.max_reads_per_unit {
			tracing::debug!(%location, "descriptor read failed; retrying in a later batch");
			self.context.enqueue(location.clone());
			return;
		}

		tracing::warn!(%location, problems = problems.len(), "descriptor read failed");
		self.clear_unit(location);
		self.context.set_status(location.clone(), UnitStatus { problems });
	}

	/// Drops everything the registry knows about `location`.
	fn clear_unit(&mut self, location: &Location) {
		self.copy.set_facade(location, None);
		let old_caps: Vec<Capability> = self
			.copy
			.set_capabilities(location, None)
			.map(|caps| caps.into_iter().collect())
			.unwrap_or_default();
		self.copy.remove_requirements(location);
		self.last_resolved.remove(location);
		if old_caps.is_empty() {
			return;
		}

		let structural: Vec<Capability> = old_caps.iter().filter(|c| is_structural(c)).cloned().collect();
		let ripple = self.copy.dependents_of_all(&structural, false, false);
		self.requeue_for_read(ripple);
		let affected = self.copy.dependents_of_all(&old_caps, false, false);
		self.seed_phase2(sorted(affected));
	}

	/// Queues units for reading unless they were already read in this batch or hit the read limit.
	fn requeue_for_read(&mut self, locations: FxHashSet<Location>) {
		for location in sorted(locations) {
			if self.last_read.get(&location) == Some(&self.batch) {
				continue;
			}
			if self.reads.get(&location).copied().unwrap_or(0) >= self.manager.config.max_reads_per_unit {
				continue;
			}
			self.context.enqueue(location);
		}
	}

	fn seed_phase2(&mut self, locations: impl IntoIterator<Item = Location>) {
		for location in locations {
			if self.phase2_seeded.insert(location.clone()) {
				self.phase2_seed.push(location);
			}
		}
	}
}

fn is_structural(cap: &Capability) -> bool {
	matches!(cap.namespace(), Namespace::Parent | Namespace::ArtifactImport)
}

pub(super) fn sorted(locations: FxHashSet<Location>) -> Vec<Location> {
	let mut out: Vec<_> = locations.into_iter().collect();
	out.sort();
	out
}
