//! Incremental refresh of the workspace registry.
//!
//! # Role
//!
//! [`RegistryManager`] owns the published [`ProjectRegistry`] and turns "these
//! descriptors changed" into a new snapshot plus change events. Each refresh
//! opens a working copy, runs two phases over a [`DependencyResolutionContext`]
//! and publishes the result with a single `apply`.
//!
//! # Mental Model
//!
//! 1. **Seeding:** the requested locations fill the context.
//! 2. **Reading:** the context is drained in batches. Each batch is grouped by
//!    resolver configuration and read through the [`ProjectReader`]. Read units
//!    get their structural capabilities and requirements, and units built on top
//!    of them (children, importers) are queued for reading too.
//! 3. **Resolving:** the context is re-seeded with every read unit plus the
//!    dependents of capabilities that changed, then drained under a
//!    [`ProjectProcessingTracker`]. Each unit is resolved, its capability and
//!    requirement sets are diffed, and dependents of whatever changed are
//!    re-queued.
//! 4. **Committing:** the working copy is applied. Listeners see the events.
//!
//! Cancellation and staleness are polled at the top of every loop iteration in
//! both phases. Either aborts the refresh; nothing is published.
//!
//! # Concurrency
//!
//! - Refreshes are serialized by a manager-wide lock.
//! - Queries load the published snapshot wait-free and never block on a refresh.
//! - Listeners run on the refreshing thread after the refresh lock is released.

mod phase1;
mod phase2;

use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use tokio_util::sync::CancellationToken;
use trellis_registry::{
	ChangeEvent, Coordinates, DependencyResolutionContext, Facade, GenerationClock, Location, MappingResult,
	MutableProjectRegistry, PersistError, PersistedSnapshot, Problem, ProjectProcessingTracker, ProjectRegistry, RequiredCapability, Snapshot,
	StaleSnapshot,
};

use crate::cache::ProjectCache;
use crate::collab::{DefaultLifecycleMapper, LifecycleMapper, ProjectModel, ProjectReader, RegistryListener};
use crate::config::{ConvergencePolicy, EngineConfig};
use crate::error::RefreshError;
use crate::resolver::{DependencyResolver, ResolverSelector};

/// Descriptor locations to refresh, with a cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct RefreshRequest {
	pub locations: Vec<Location>,
	pub cancel: CancellationToken,
}

impl RefreshRequest {
	pub fn new(locations: impl IntoIterator<Item = Location>) -> Self {
		Self {
			locations: locations.into_iter().collect(),
			cancel: CancellationToken::new(),
		}
	}

	pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
		self.cancel = cancel;
		self
	}
}

/// What a committed refresh published.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
	pub events: Vec<ChangeEvent>,
	/// Read, resolution and mapping problems of the refreshed units, ordered by location.
	pub problems: Vec<(Location, Problem)>,
	/// False when resolution stopped with re-queued units left unprocessed.
	pub converged: bool,
	pub rounds: usize,
	/// Registry version this refresh published.
	pub version: u64,
}

impl RefreshOutcome {
	pub fn problems_for<'a>(&'a self, location: &'a Location) -> impl Iterator<Item = &'a Problem> + 'a {
		self.problems.iter().filter(move |(l, _)| l == location).map(|(_, p)| p)
	}
}

/// Owner of the published registry and driver of incremental refreshes.
pub struct RegistryManager {
	registry: ProjectRegistry,
	reader: Arc<dyn ProjectReader>,
	mapper: Arc<dyn LifecycleMapper>,
	resolvers: ResolverSelector,
	cache: ProjectCache,
	clock: GenerationClock,
	config: EngineConfig,
	listeners: RwLock<Vec<Arc<dyn RegistryListener>>>,
	refresh_lock: Mutex<()>,
}

impl std::fmt::Debug for RegistryManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RegistryManager")
			.field("registry", &self.registry)
			.field("cache", &self.cache)
			.field("resolvers", &self.resolvers)
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}

impl RegistryManager {
	pub fn new(config: EngineConfig, reader: Arc<dyn ProjectReader>) -> Self {
		let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
		Self {
			registry: ProjectRegistry::new(config.build_tag.clone()),
			reader,
			mapper: Arc::new(DefaultLifecycleMapper::new()),
			resolvers: ResolverSelector::default(),
			cache: ProjectCache::new(capacity),
			clock: GenerationClock::new(),
			config,
			listeners: RwLock::new(Vec::new()),
			refresh_lock: Mutex::new(()),
		}
	}

	pub fn with_mapper(mut self, mapper: Arc<dyn LifecycleMapper>) -> Self {
		self.mapper = mapper;
		self
	}

	/// Uses `resolver` for units whose lifecycle mapping id is `mapping_id`.
	pub fn with_resolver(mut self, mapping_id: impl Into<String>, resolver: Arc<dyn DependencyResolver>) -> Self {
		self.resolvers.register(mapping_id, resolver);
		self
	}

	/// Starts from a persisted snapshot, or from an empty registry if it is rejected.
	pub fn with_snapshot(mut self, path: impl AsRef<Path>) -> Self {
		let path = path.as_ref();
		let loaded = std::fs::File::open(path).map_err(PersistError::from).and_then(|file| {
			let reader = Arc::clone(&self.reader);
			PersistedSnapshot::load(std::io::BufReader::new(file), &self.config.build_tag, |l| reader.is_member(l))
		});
		match loaded {
			Ok(state) => {
				self.clock.observe(state.max_generation());
				tracing::info!(path = %path.display(), units = state.len(), "restored registry snapshot");
				self.registry = ProjectRegistry::from_state(state);
			}
			Err(error) => {
				tracing::warn!(path = %path.display(), %error, "discarding persisted registry snapshot");
			}
		}
		self
	}

	/// Writes the current snapshot to `path`.
	pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
		let snapshot = self.registry.snapshot();
		let file = std::fs::File::create(path.as_ref())?;
		PersistedSnapshot::save(&snapshot, std::io::BufWriter::new(file))?;
		tracing::debug!(path = %path.as_ref().display(), version = snapshot.version(), "saved registry snapshot");
		Ok(())
	}

	pub fn config(&self) -> &EngineConfig {
		&self.config
	}

	pub fn registry(&self) -> &ProjectRegistry {
		&self.registry
	}

	pub fn cache(&self) -> &ProjectCache {
		&self.cache
	}

	pub fn snapshot(&self) -> Arc<Snapshot> {
		self.registry.snapshot()
	}

	pub fn version(&self) -> u64 {
		self.registry.version()
	}

	pub fn facade(&self, location: &Location) -> Option<Arc<Facade>> {
		self.registry.snapshot().facade(location).cloned()
	}

	pub fn facade_for(&self, coords: &Coordinates) -> Option<Arc<Facade>> {
		self.registry.snapshot().facade_for(coords).cloned()
	}

	pub fn facades(&self) -> Vec<Arc<Facade>> {
		self.registry.snapshot().facades()
	}

	pub fn add_listener(&self, listener: Arc<dyn RegistryListener>) {
		self.listeners.write().push(listener);
	}

	/// Heavyweight model of `facade`, from the cache or by re-reading its descriptor.
	///
	/// Returns `None` when the descriptor no longer reads back to this facade's content.
	pub fn project_model(&self, facade: &Facade) -> Option<Arc<ProjectModel>> {
		let location = facade.location();
		if let Some(model) = self.cache.get(location, facade.generation()) {
			return Some(model);
		}
		let mut results = self.reader.read_batch(std::slice::from_ref(location), &facade.model().resolver_config);
		match results.remove(location) {
			Some(Ok(model)) if model.facade == *facade.model() => {
				let model = Arc::new(model);
				self.cache.insert(location, facade.generation(), Arc::clone(&model));
				Some(model)
			}
			Some(Ok(_)) => {
				tracing::debug!(%location, "descriptor changed since last refresh; model not cached");
				None
			}
			Some(Err(_)) | None => None,
		}
	}

	/// Re-reads every unit currently in the registry.
	pub fn refresh_all(&self, cancel: CancellationToken) -> Result<RefreshOutcome, RefreshError> {
		let locations = self.registry.snapshot().locations();
		self.refresh(RefreshRequest::new(locations).with_cancel(cancel))
	}

	/// Refreshes the requested descriptors and publishes the result.
	///
	/// Fails with [`RefreshError::Stale`] if the registry advanced while the
	/// refresh ran, [`RefreshError::Cancelled`] on cancellation, and
	/// [`RefreshError::ConvergenceExceeded`] when the round ceiling is hit
	/// under [`ConvergencePolicy::Fail`]. A failed refresh publishes nothing.
	pub fn refresh(&self, request: RefreshRequest) -> Result<RefreshOutcome, RefreshError> {
		let outcome = {
			let _guard = self.refresh_lock.lock();
			let copy = self.registry.open();
			let span = tracing::info_span!("refresh", requested = request.locations.len(), parent = copy.parent_version());
			let _entered = span.enter();

			let mut refresh = Refresh::new(self, copy, &request);
			match refresh.run() {
				Ok(outcome) => outcome,
				Err(error) => {
					refresh.copy.close();
					tracing::info!(%error, "refresh aborted");
					return Err(error);
				}
			}
		};

		if !outcome.events.is_empty() {
			let listeners = self.listeners.read().clone();
			for listener in listeners {
				listener.registry_changed(&outcome.events);
			}
		}
		Ok(outcome)
	}

	pub(crate) fn model_for(&self, facade: &Facade) -> Arc<ProjectModel> {
		self.project_model(facade)
			.unwrap_or_else(|| Arc::new(ProjectModel::new(facade.model().clone())))
	}
}

/// State of one refresh invocation.
pub(crate) struct Refresh<'a> {
	manager: &'a RegistryManager,
	cancel: &'a CancellationToken,
	pub(crate) copy: MutableProjectRegistry,
	context: DependencyResolutionContext,
	baseline: Arc<Snapshot>,
	/// Descriptor reads per unit.
	reads: FxHashMap<Location, u32>,
	/// Batch each unit was last read in.
	last_read: FxHashMap<Location, usize>,
	read_failures: FxHashMap<Location, u32>,
	batch: usize,
	phase2_seed: Vec<Location>,
	phase2_seeded: FxHashSet<Location>,
	/// Requirement sets detached by destructive dependent lookups, pending re-resolution.
	detached: FxHashMap<Location, FxHashSet<RequiredCapability>>,
	last_resolved: FxHashMap<Location, FxHashSet<RequiredCapability>>,
	unit_problems: FxHashMap<Location, Vec<Problem>>,
	/// Execution mappings computed this refresh; attached only once the commit lands.
	mappings: FxHashMap<Location, MappingResult>,
}

impl<'a> Refresh<'a> {
	fn new(manager: &'a RegistryManager, copy: MutableProjectRegistry, request: &'a RefreshRequest) -> Self {
		Self {
			manager,
			cancel: &request.cancel,
			copy,
			context: DependencyResolutionContext::new(request.locations.iter().cloned()),
			baseline: manager.registry.snapshot(),
			reads: FxHashMap::default(),
			last_read: FxHashMap::default(),
			read_failures: FxHashMap::default(),
			batch: 0,
			phase2_seed: Vec::new(),
			phase2_seeded: FxHashSet::default(),
			detached: FxHashMap::default(),
			last_resolved: FxHashMap::default(),
			unit_problems: FxHashMap::default(),
			mappings: FxHashMap::default(),
		}
	}

	fn run(&mut self) -> Result<RefreshOutcome, RefreshError> {
		self.read_descriptors()?;
		let seed = std::mem::take(&mut self.phase2_seed);
		tracing::debug!(batches = self.batch, seeded = seed.len(), "descriptor phase done");
		self.context.force(seed);

		let tracker = self.resolve_dependencies()?;
		tracing::debug!(rounds = tracker.rounds(), converged = tracker.is_converged(), "resolution phase done");
		self.commit(&tracker)
	}

	/// Aborts on cancellation or when the registry moved past this working copy.
	fn checkpoint(&self) -> Result<(), RefreshError> {
		if self.cancel.is_cancelled() {
			return Err(RefreshError::Cancelled);
		}
		if self.copy.is_stale() {
			return Err(RefreshError::Stale(StaleSnapshot {
				expected: self.copy.parent_version(),
				actual: self.manager.registry.version(),
			}));
		}
		Ok(())
	}

	fn commit(&mut self, tracker: &ProjectProcessingTracker) -> Result<RefreshOutcome, RefreshError> {
		self.checkpoint()?;
		if tracker.ceiling_reached() && self.manager.config.convergence_policy == ConvergencePolicy::Fail {
			return Err(RefreshError::ConvergenceExceeded { rounds: tracker.rounds() });
		}
		if !tracker.is_converged() {
			tracing::warn!(
				rounds = tracker.rounds(),
				pending = tracker.pending().len(),
				"committing without convergence"
			);
		}

		let version = self.copy.parent_version() + 1;
		let events = self.manager.registry.apply(&mut self.copy)?;
		for event in &events {
			if let Some(old) = &event.old
				&& event.new.as_ref().map(|f| f.generation()) != Some(old.generation())
			{
				self.manager.cache.detach(&event.location, old.generation());
			}
		}

		let snapshot = self.manager.registry.snapshot();
		for (location, mapping) in std::mem::take(&mut self.mappings) {
			if let Some(facade) = snapshot.facade(&location) {
				facade.set_mapping(mapping);
			}
		}

		let mut problems: Vec<(Location, Problem)> = Vec::new();
		for (location, status) in self.context.take_statuses() {
			problems.extend(status.problems.into_iter().map(|p| (location.clone(), p)));
		}
		for (location, unit) in std::mem::take(&mut self.unit_problems) {
			if snapshot.facade(&location).is_some() {
				problems.extend(unit.into_iter().map(|p| (location.clone(), p)));
			}
		}
		problems.sort_by(|a, b| a.0.cmp(&b.0));

		tracing::info!(version, events = events.len(), problems = problems.len(), "refresh committed");
		Ok(RefreshOutcome {
			events,
			problems,
			converged: tracker.is_converged(),
			rounds: tracker.rounds(),
			version,
		})
	}
}
