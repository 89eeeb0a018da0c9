//! Dependency resolution under the convergence tracker.

use std::sync::Arc;

use trellis_registry::{Capability, Location, Namespace, ProjectProcessingTracker};

use super::Refresh;
use super::phase1::sorted;
use crate::error::RefreshError;
use crate::resolver::ResolveRequest;

impl Refresh<'_> {
	/// Resolves every queued unit, re-queueing dependents of whatever changed, until the tracker stops.
	pub(super) fn resolve_dependencies(&mut self) -> Result<ProjectProcessingTracker, RefreshError> {
		let mut tracker = ProjectProcessingTracker::new(&self.context, self.manager.config.max_convergence_rounds);
		loop {
			loop {
				self.checkpoint()?;
				let Some(location) = self.context.pop() else {
					break;
				};
				if tracker.should_process(&location) {
					self.resolve_unit(&location);
				}
			}
			if !tracker.needs_improvement(&self.context) {
				break;
			}
		}
		self.restore_detached();
		Ok(tracker)
	}

	fn resolve_unit(&mut self, location: &Location) {
		self.detached.remove(location);
		let Some(facade) = self.copy.facade(location).cloned() else {
			return;
		};

		let manager = self.manager;
		let model = manager.model_for(&facade);
		let mapping = manager.mapper.compute_mapping(
			&model,
			&facade.model().executions,
			facade.model().explicit_mapping_id.as_deref(),
		);
		let resolver = Arc::clone(manager.resolvers.select(mapping.mapping_id.as_deref()));
		let unit = resolver.resolve(&ResolveRequest {
			facade: &facade,
			workspace: &*self.copy,
			reader: manager.reader.as_ref(),
		});

		let mut problems = unit.resolution.problems.clone();
		problems.extend(mapping.problems.iter().cloned());
		self.unit_problems.insert(location.clone(), problems);

		let facade = if facade.resolution() == Some(&unit.resolution) {
			facade
		} else {
			let next = Arc::new(facade.with_resolution(manager.clock.next(), unit.resolution));
			manager.cache.insert(location, next.generation(), model);
			next
		};
		self.copy.set_facade(location, Some(facade));
		self.mappings.insert(location.clone(), mapping);

		let old_caps = self.copy.set_capabilities(location, Some(unit.capabilities.clone())).unwrap_or_default();
		let changed: Vec<Capability> = old_caps.symmetric_difference(&unit.capabilities).cloned().collect();

		let old_reqs = self
			.last_resolved
			.get(location)
			.or_else(|| self.baseline.requirements(location))
			.cloned()
			.unwrap_or_default();
		let requirements_changed = old_reqs != unit.requirements;
		self.copy.set_requirements(location, Some(unit.requirements.clone()));
		self.last_resolved.insert(location.clone(), unit.requirements);

		tracing::trace!(
			%location,
			changed_capabilities = changed.len(),
			requirements_changed,
			"unit resolved"
		);
		if !changed.is_empty() {
			let exact_only = changed.iter().all(|c| c.namespace() == Namespace::Parent);
			self.requeue_dependents(location, &changed, exact_only);
		}
		if requirements_changed {
			let own: Vec<Capability> = unit.capabilities.into_iter().collect();
			self.requeue_dependents(location, &own, false);
		}
	}

	/// Detaches and re-queues every dependent of `capabilities`.
	///
	/// The detached requirement sets are remembered until the dependent is
	/// resolved again, so units the tracker never gets back to keep theirs.
	fn requeue_dependents(&mut self, origin: &Location, capabilities: &[Capability], exact_only: bool) {
		let mut hits = self.copy.dependents_of_all(capabilities, exact_only, false);
		hits.remove(origin);
		if hits.is_empty() {
			return;
		}
		for hit in &hits {
			if !self.detached.contains_key(hit) {
				let reqs = self.copy.requirements(hit).cloned().unwrap_or_default();
				self.detached.insert(hit.clone(), reqs);
			}
		}

		// The origin is never re-queued by its own change, so its requirements stay attached.
		let own = self.copy.requirements(origin).cloned();
		self.copy.dependents_of_all(capabilities, exact_only, true);
		self.copy.set_requirements(origin, own);

		let hits = sorted(hits);
		tracing::trace!(%origin, requeued = hits.len(), exact_only, "re-queueing dependents");
		self.context.force(hits);
	}

	fn restore_detached(&mut self) {
		let mut detached: Vec<_> = std::mem::take(&mut self.detached).into_iter().collect();
		detached.sort_by(|a, b| a.0.cmp(&b.0));
		for (location, reqs) in detached {
			if self.copy.facade(&location).is_some() {
				tracing::trace!(%location, "restoring requirements of unit left unresolved");
				self.copy.set_requirements(&location, Some(reqs));
			}
		}
	}
}
