mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use common::*;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use trellis_engine::resolver::{structural_capabilities, structural_requirements};
use trellis_engine::{
	CacheObserver, CancellationToken, ConvergencePolicy, DefaultDependencyResolver, DefaultLifecycleMapper,
	DependencyResolver, EngineConfig, EvictReason, LifecycleMapper, ProjectModel, RefreshError, RefreshRequest,
	RegistryListener, RegistryManager, ResolveRequest, ResolvedUnit,
};
use trellis_registry::{
	Capability, ChangeEvent, ChangeKind, Coordinates, FacadeModel, Location, MappingResult, Namespace, ProblemKind,
	Resolution,
};

fn put(workspace: &FakeWorkspace, model: FacadeModel) -> Location {
	workspace.put(ProjectModel::new(model))
}

#[test]
fn new_units_are_added_and_resolved() {
	let workspace = FakeWorkspace::new();
	let a = put(&workspace, unit("a", "1.0"));
	let b = put(&workspace, depending_on(unit("b", "1.0"), "a", "[1.0,2.0)"));
	let manager = manager(&workspace);

	let outcome = manager.refresh(RefreshRequest::new([a.clone(), b.clone()])).unwrap();

	assert_eq!(kinds(&outcome.events), vec![(ChangeKind::Added, a.clone()), (ChangeKind::Added, b.clone())]);
	assert!(outcome.converged);
	assert!(outcome.problems.is_empty());
	assert_eq!(outcome.version, 1);
	assert_eq!(manager.version(), 1);

	let facade = manager.facade(&b).unwrap();
	let resolution = facade.resolution().unwrap();
	assert_eq!(resolution.dependencies.len(), 1);
	assert_eq!(resolution.dependencies[0].version.as_deref(), Some("1.0"));
	assert_eq!(resolution.dependencies[0].workspace.as_ref(), Some(&a));
	assert_eq!(facade.mapping().unwrap().mapping_id.as_deref(), Some("jar"));
	assert!(Arc::ptr_eq(&manager.facade_for(&coords("a", "1.0")).unwrap(), &manager.facade(&a).unwrap()));
}

#[test]
fn refresh_is_idempotent() {
	let workspace = FakeWorkspace::new();
	let a = put(&workspace, unit("a", "1.0"));
	let b = put(&workspace, depending_on(unit("b", "1.0"), "a", "1.0"));
	let manager = manager(&workspace);
	manager.refresh(RefreshRequest::new([a.clone(), b.clone()])).unwrap();
	let before: Vec<_> = manager.facades();

	let outcome = manager.refresh(RefreshRequest::new([a, b])).unwrap();

	assert!(outcome.events.is_empty());
	let after = manager.facades();
	assert_eq!(before.len(), after.len());
	for (old, new) in before.iter().zip(&after) {
		assert!(Arc::ptr_eq(old, new), "{} was replaced", old.location());
	}
}

#[test]
fn range_dependent_follows_provider_version() {
	let workspace = FakeWorkspace::new();
	let a = put(&workspace, unit("a", "1.0"));
	let b = put(&workspace, depending_on(unit("b", "1.0"), "a", "[1.0,2.0)"));
	let manager = manager(&workspace);
	manager.refresh(RefreshRequest::new([a.clone(), b.clone()])).unwrap();

	put(&workspace, unit("a", "1.1"));
	let outcome = manager.refresh(RefreshRequest::new([a.clone()])).unwrap();

	assert_eq!(kinds(&outcome.events), vec![(ChangeKind::Changed, a.clone()), (ChangeKind::Changed, b.clone())]);
	let event = outcome.events.iter().find(|e| e.location == b).unwrap();
	assert!(event.dependencies_changed);
	let facade = manager.facade(&b).unwrap();
	let resolved = &facade.resolution().unwrap().dependencies[0];
	assert_eq!(resolved.version.as_deref(), Some("1.1"));
	assert_eq!(workspace.reads_of("b"), 1);
}

#[test]
fn removed_provider_leaves_dependent_unresolved() {
	let workspace = FakeWorkspace::new();
	let a = put(&workspace, unit("a", "1.0"));
	let b = put(&workspace, depending_on(unit("b", "1.0"), "a", "1.0"));
	let manager = manager(&workspace);
	manager.refresh(RefreshRequest::new([a.clone(), b.clone()])).unwrap();

	workspace.remove("a");
	let outcome = manager.refresh(RefreshRequest::new([a.clone()])).unwrap();

	assert_eq!(kinds(&outcome.events), vec![(ChangeKind::Removed, a.clone()), (ChangeKind::Changed, b.clone())]);
	assert!(manager.facade(&a).is_none());

	let problems: Vec<_> = outcome.problems_for(&b).collect();
	assert_eq!(problems.len(), 1);
	assert_eq!(problems[0].kind, ProblemKind::Resolution);
	assert!(problems[0].message.contains("unresolved dependency org.example:a:1.0"));
	assert_eq!(manager.facade(&b).unwrap().problems().len(), 1);

	let requirements = manager.snapshot().requirements(&b).cloned().unwrap();
	assert!(requirements.iter().all(|r| !r.is_resolved()));
}

#[test]
fn cosmetic_edit_publishes_nothing() {
	let workspace = FakeWorkspace::new();
	let a = workspace.put(ProjectModel::new(unit("a", "1.0")).with_property("description", "first"));
	let manager = manager(&workspace);
	manager.refresh(RefreshRequest::new([a.clone()])).unwrap();
	let before = manager.facade(&a).unwrap();

	workspace.put(ProjectModel::new(unit("a", "1.0")).with_property("description", "second"));
	let outcome = manager.refresh(RefreshRequest::new([a.clone()])).unwrap();

	assert!(outcome.events.is_empty());
	let after = manager.facade(&a).unwrap();
	assert!(Arc::ptr_eq(&before, &after));
	let model = manager.project_model(&after).unwrap();
	assert_eq!(model.properties.get("description").map(String::as_str), Some("second"));
}

#[test]
fn exact_lookup_matches_only_the_resolved_version() {
	let workspace = FakeWorkspace::new();
	let a = put(&workspace, unit("a", "1.0"));
	let b = put(&workspace, depending_on(unit("b", "1.0"), "a", "[1.0,2.0)"));
	let manager = manager(&workspace);
	manager.refresh(RefreshRequest::new([a, b.clone()])).unwrap();

	let mut copy = manager.registry().open();
	let artifact = |version: &str| Capability::artifact(&coords("a", version));
	assert!(copy.dependents(&artifact("1.0"), true, false).contains(&b));
	assert!(copy.dependents(&artifact("1.5"), true, false).is_empty());
	assert!(copy.dependents(&artifact("1.5"), false, false).contains(&b));
	assert!(copy.dependents(&artifact("2.0"), false, false).is_empty());
	copy.close();
}

#[test]
fn children_are_reread_with_their_parent() {
	let workspace = FakeWorkspace::new();
	let parent = put(&workspace, pom("p", "1.0"));
	let child = put(&workspace, with_parent(unit("c", "1.0"), "p", "1.0"));
	let manager = manager(&workspace);
	manager.refresh(RefreshRequest::new([parent.clone(), child.clone()])).unwrap();
	assert_eq!(workspace.reads_of("c"), 1);

	let outcome = manager.refresh(RefreshRequest::new([parent])).unwrap();

	assert!(outcome.events.is_empty());
	assert_eq!(workspace.reads_of("p"), 2);
	assert_eq!(workspace.reads_of("c"), 2);
	let requirements = manager.snapshot().requirements(&child).cloned().unwrap();
	assert!(requirements.iter().any(|r| r.key.namespace == Namespace::Parent));
}

#[test]
fn failed_read_is_retried_once_then_reported() {
	let workspace = FakeWorkspace::new();
	let a = workspace.fail("a", "malformed descriptor");
	let manager = manager(&workspace);

	let outcome = manager.refresh(RefreshRequest::new([a.clone()])).unwrap();

	assert!(outcome.events.is_empty());
	assert_eq!(workspace.reads_of("a"), 2);
	let problems: Vec<_> = outcome.problems_for(&a).collect();
	assert_eq!(problems.len(), 1);
	assert_eq!(problems[0].kind, ProblemKind::Read);
	assert!(manager.facade(&a).is_none());
}

#[test]
fn incomplete_identity_is_a_read_failure() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("registry.bin");
	let workspace = FakeWorkspace::new();
	let a = put(&workspace, unit("a", "1.0"));
	let b = put(&workspace, unit("b", ""));
	let manager = manager(&workspace);

	let outcome = manager.refresh(RefreshRequest::new([a.clone(), b.clone()])).unwrap();

	assert_eq!(kinds(&outcome.events), vec![(ChangeKind::Added, a.clone())]);
	assert!(manager.facade(&b).is_none());
	assert_eq!(workspace.reads_of("b"), 2);
	let problems: Vec<_> = outcome.problems_for(&b).collect();
	assert_eq!(problems.len(), 1);
	assert_eq!(problems[0].kind, ProblemKind::Read);

	manager.save_snapshot(&path).unwrap();
	let restored = common::manager(&workspace).with_snapshot(&path);
	assert_eq!(restored.snapshot().locations(), vec![a]);
}

#[test]
fn unit_that_stops_reading_is_removed() {
	let workspace = FakeWorkspace::new();
	let a = put(&workspace, unit("a", "1.0"));
	let manager = manager(&workspace);
	manager.refresh(RefreshRequest::new([a.clone()])).unwrap();

	workspace.fail("a", "malformed descriptor");
	let outcome = manager.refresh(RefreshRequest::new([a.clone()])).unwrap();

	assert_eq!(kinds(&outcome.events), vec![(ChangeKind::Removed, a.clone())]);
	assert_eq!(outcome.problems_for(&a).count(), 1);
}

#[test]
fn reads_are_batched_by_resolver_config() {
	let workspace = FakeWorkspace::new();
	let a = put(&workspace, unit("a", "1.0"));
	let b = put(&workspace, unit("b", "1.0"));
	let mut profiled = unit("c", "1.0");
	profiled.resolver_config.active_profiles.push("ci".into());
	let c = put(&workspace, profiled);
	let manager = manager(&workspace);
	manager.refresh(RefreshRequest::new([a.clone(), b.clone(), c.clone()])).unwrap();

	let batches = Arc::new(Mutex::new(Vec::new()));
	let seen = Arc::clone(&batches);
	workspace.on_read(move |locations| seen.lock().push(locations.to_vec()));
	manager.refresh(RefreshRequest::new([a.clone(), b.clone(), c.clone()])).unwrap();

	assert_eq!(*batches.lock(), vec![vec![a, b], vec![c]]);
}

#[test]
fn dependency_outside_workspace_resolves_through_reader() {
	let workspace = FakeWorkspace::new();
	let lib = put(&workspace, unit("lib", "2.0"));
	let mut model = depending_on(unit("app", "1.0"), "lib", "2.0");
	model.resolver_config.resolve_workspace = false;
	let app = put(&workspace, model);
	workspace.publish_external(&id("lib"), "2.0");
	let manager = manager(&workspace);

	let outcome = manager.refresh(RefreshRequest::new([lib, app.clone()])).unwrap();

	assert!(outcome.problems.is_empty());
	let facade = manager.facade(&app).unwrap();
	let resolved = &facade.resolution().unwrap().dependencies[0];
	assert_eq!(resolved.version.as_deref(), Some("2.0"));
	assert_eq!(resolved.workspace, None);
}

#[test]
fn cancelled_refresh_publishes_nothing() {
	let workspace = FakeWorkspace::new();
	let a = put(&workspace, unit("a", "1.0"));
	let manager = manager(&workspace);
	let cancel = CancellationToken::new();
	cancel.cancel();

	let result = manager.refresh(RefreshRequest::new([a.clone()]).with_cancel(cancel));

	assert!(matches!(result, Err(RefreshError::Cancelled)));
	assert_eq!(manager.version(), 0);
	assert_eq!(workspace.reads_of("a"), 0);
}

#[test]
fn cancellation_during_read_aborts_refresh() {
	let workspace = FakeWorkspace::new();
	let a = put(&workspace, unit("a", "1.0"));
	let manager = manager(&workspace);
	let cancel = CancellationToken::new();
	let trigger = cancel.clone();
	workspace.on_read(move |_| trigger.cancel());

	let result = manager.refresh(RefreshRequest::new([a.clone()]).with_cancel(cancel));

	assert!(matches!(result, Err(RefreshError::Cancelled)));
	assert!(manager.facade(&a).is_none());
}

/// Maps by packaging until armed, then renames the mapping and cancels the refresh.
#[derive(Default)]
struct CancellingMapper(Mutex<Option<CancellationToken>>);

impl LifecycleMapper for CancellingMapper {
	fn compute_mapping(&self, model: &ProjectModel, executions: &[String], explicit_mapping_id: Option<&str>) -> MappingResult {
		let mut mapping = DefaultLifecycleMapper::new().compute_mapping(model, executions, explicit_mapping_id);
		if let Some(cancel) = self.0.lock().take() {
			mapping.mapping_id = Some("renamed".into());
			cancel.cancel();
		}
		mapping
	}
}

#[test]
fn aborted_refresh_keeps_published_mappings() {
	let workspace = FakeWorkspace::new();
	let a = put(&workspace, unit("a", "1.0"));
	let mapper = Arc::new(CancellingMapper::default());
	let manager = manager(&workspace).with_mapper(Arc::clone(&mapper) as Arc<dyn LifecycleMapper>);
	manager.refresh(RefreshRequest::new([a.clone()])).unwrap();
	let published = manager.facade(&a).unwrap();

	let cancel = CancellationToken::new();
	*mapper.0.lock() = Some(cancel.clone());
	let result = manager.refresh(RefreshRequest::new([a.clone()]).with_cancel(cancel));

	assert!(matches!(result, Err(RefreshError::Cancelled)));
	assert!(Arc::ptr_eq(&published, &manager.facade(&a).unwrap()));
	assert_eq!(published.mapping().unwrap().mapping_id.as_deref(), Some("jar"));
}

#[test]
fn concurrent_publication_makes_refresh_stale() {
	let workspace = FakeWorkspace::new();
	let a = put(&workspace, unit("a", "1.0"));
	let manager = manager(&workspace);
	let registry = manager.registry().clone();
	let fired = AtomicBool::new(false);
	workspace.on_read(move |_| {
		if !fired.swap(true, Ordering::SeqCst) {
			let mut copy = registry.open();
			registry.apply(&mut copy).unwrap();
		}
	});

	let error = manager.refresh(RefreshRequest::new([a.clone()])).unwrap_err();
	assert!(matches!(error, RefreshError::Stale(_)));
	assert!(error.is_retryable());
	assert!(manager.facade(&a).is_none());

	let outcome = manager.refresh(RefreshRequest::new([a.clone()])).unwrap();
	assert_eq!(kinds(&outcome.events), vec![(ChangeKind::Added, a)]);
	assert_eq!(outcome.version, 2);
}

/// Provides a fresh artifact version on every call, so dependents never settle.
#[derive(Default)]
struct Drifting {
	calls: AtomicU64,
}

impl DependencyResolver for Drifting {
	fn resolve(&self, request: &ResolveRequest<'_>) -> ResolvedUnit {
		let n = self.calls.fetch_add(1, Ordering::Relaxed);
		let facade = request.facade;
		let identity = facade.identity();
		let drifted = Coordinates::new(&identity.group, &identity.artifact, format!("1.0.{n}"));

		let mut unit = ResolvedUnit {
			capabilities: structural_capabilities(facade),
			requirements: structural_requirements(facade),
			resolution: Resolution::default(),
		};
		unit.capabilities.insert(Capability::artifact(&drifted));
		for dependency in &facade.model().dependencies {
			unit.requirements.insert(dependency.requirement(Namespace::Artifact));
		}
		unit
	}
}

fn drifting(workspace: &FakeWorkspace, name: &str, dependency: &str) -> Location {
	let mut model = depending_on(unit(name, "1.0"), dependency, "1.0");
	model.explicit_mapping_id = Some("drifting".into());
	put(workspace, model)
}

fn drifting_manager(workspace: &Arc<FakeWorkspace>, policy: ConvergencePolicy) -> RegistryManager {
	let config = EngineConfig {
		max_convergence_rounds: 2,
		convergence_policy: policy,
		..EngineConfig::default()
	};
	manager_with(workspace, config).with_resolver("drifting", Arc::new(Drifting::default()))
}

#[test]
fn stalled_cycle_commits_unconverged_under_either_policy() {
	for policy in [ConvergencePolicy::Warn, ConvergencePolicy::Fail] {
		let workspace = FakeWorkspace::new();
		let x = drifting(&workspace, "x", "y");
		let y = drifting(&workspace, "y", "x");
		let manager = drifting_manager(&workspace, policy);

		let outcome = manager.refresh(RefreshRequest::new([x.clone(), y.clone()])).unwrap();

		assert!(!outcome.converged);
		assert_eq!(outcome.rounds, 2);
		assert_eq!(kinds(&outcome.events), vec![(ChangeKind::Added, x), (ChangeKind::Added, y)]);
	}
}

/// `a` needs `b` needs `c`: every round shrinks the seed, so only the ceiling stops it.
fn drifting_chain(workspace: &FakeWorkspace) -> [Location; 3] {
	[drifting(workspace, "a", "b"), drifting(workspace, "b", "c"), drifting(workspace, "c", "d")]
}

#[test]
fn round_ceiling_under_warn_commits_unconverged() {
	let workspace = FakeWorkspace::new();
	let [a, b, c] = drifting_chain(&workspace);
	let manager = drifting_manager(&workspace, ConvergencePolicy::Warn);

	let outcome = manager.refresh(RefreshRequest::new([a.clone(), b.clone(), c.clone()])).unwrap();

	assert!(!outcome.converged);
	assert_eq!(outcome.rounds, 2);
	assert_eq!(
		kinds(&outcome.events),
		vec![(ChangeKind::Added, a), (ChangeKind::Added, b), (ChangeKind::Added, c)]
	);
}

#[test]
fn round_ceiling_under_fail_publishes_nothing() {
	let workspace = FakeWorkspace::new();
	let [a, b, c] = drifting_chain(&workspace);
	let manager = drifting_manager(&workspace, ConvergencePolicy::Fail);

	let result = manager.refresh(RefreshRequest::new([a, b, c]));

	assert!(matches!(result, Err(RefreshError::ConvergenceExceeded { rounds: 2 })));
	assert_eq!(manager.version(), 0);
}

/// Resolves with the default strategy and records which units it saw.
#[derive(Default)]
struct Counting(Mutex<Vec<Location>>);

impl Counting {
	fn resolutions_of(&self, location: &Location) -> usize {
		self.0.lock().iter().filter(|l| *l == location).count()
	}
}

impl DependencyResolver for Counting {
	fn resolve(&self, request: &ResolveRequest<'_>) -> ResolvedUnit {
		self.0.lock().push(request.facade.location().clone());
		DefaultDependencyResolver.resolve(request)
	}
}

/// Also publishes the parent identity `alias`, which no descriptor declares.
struct Aliasing;

impl DependencyResolver for Aliasing {
	fn resolve(&self, request: &ResolveRequest<'_>) -> ResolvedUnit {
		let mut unit = DefaultDependencyResolver.resolve(request);
		unit.capabilities.insert(Capability::parent(&coords("alias", "1.0")));
		unit
	}
}

#[test]
fn parent_identity_change_requeues_only_exact_children() {
	let workspace = FakeWorkspace::new();
	let mut child = with_parent(unit("c", "1.0"), "alias", "1.0");
	child.explicit_mapping_id = Some("counting".into());
	let c = put(&workspace, child);
	let mut other = with_parent(unit("d", "1.0"), "alias", "2.0");
	other.explicit_mapping_id = Some("counting".into());
	let d = put(&workspace, other);

	let counting = Arc::new(Counting::default());
	let manager = manager(&workspace)
		.with_resolver("counting", Arc::clone(&counting) as Arc<dyn DependencyResolver>)
		.with_resolver("aliasing", Arc::new(Aliasing));
	manager.refresh(RefreshRequest::new([c.clone(), d.clone()])).unwrap();
	assert_eq!(counting.resolutions_of(&c), 1);

	let mut provider = pom("p", "1.0");
	provider.explicit_mapping_id = Some("aliasing".into());
	let p = put(&workspace, provider);
	let outcome = manager.refresh(RefreshRequest::new([p.clone()])).unwrap();

	assert_eq!(kinds(&outcome.events), vec![(ChangeKind::Added, p)]);
	assert!(outcome.converged);
	assert_eq!(counting.resolutions_of(&c), 2);
	assert_eq!(counting.resolutions_of(&d), 1);
	assert_eq!(workspace.reads_of("c"), 1);
}

#[test]
fn padded_snapshot_range_binds_and_tracks_provider() {
	let workspace = FakeWorkspace::new();
	let a = put(&workspace, unit("a", "1.0-SNAPSHOT"));
	let b = put(&workspace, depending_on(unit("b", "1.0"), "a", "[1.0.0-SNAPSHOT,2)"));
	let manager = manager(&workspace);

	let outcome = manager.refresh(RefreshRequest::new([a.clone(), b.clone()])).unwrap();
	assert!(outcome.problems.is_empty());
	let facade = manager.facade(&b).unwrap();
	let resolved = &facade.resolution().unwrap().dependencies[0];
	assert_eq!(resolved.workspace.as_ref(), Some(&a));
	assert_eq!(resolved.version.as_deref(), Some("1.0-SNAPSHOT"));

	workspace.remove("a");
	let outcome = manager.refresh(RefreshRequest::new([a.clone()])).unwrap();

	assert_eq!(kinds(&outcome.events), vec![(ChangeKind::Removed, a), (ChangeKind::Changed, b.clone())]);
	let problems: Vec<_> = outcome.problems_for(&b).collect();
	assert_eq!(problems.len(), 1);
	assert!(problems[0].message.contains("unresolved dependency org.example:a:[1.0.0-SNAPSHOT,2)"));
}

#[test]
fn malformed_constraint_is_reported_and_unit_published() {
	let workspace = FakeWorkspace::new();
	let a = put(&workspace, unit("a", "1.0"));
	let b = put(&workspace, depending_on(unit("b", "1.0"), "a", "[1.0,"));
	let manager = manager(&workspace);

	let outcome = manager.refresh(RefreshRequest::new([a.clone(), b.clone()])).unwrap();

	assert_eq!(kinds(&outcome.events), vec![(ChangeKind::Added, a.clone()), (ChangeKind::Added, b.clone())]);
	let problems: Vec<_> = outcome.problems_for(&b).collect();
	assert_eq!(problems.len(), 1);
	assert_eq!(problems[0].kind, ProblemKind::Resolution);
	let mut copy = manager.registry().open();
	assert!(copy.dependents(&Capability::artifact(&coords("a", "7.0")), false, false).contains(&b));
	copy.close();
}

#[derive(Default)]
struct Recorder(Mutex<Vec<Vec<(ChangeKind, Location)>>>);

impl RegistryListener for Recorder {
	fn registry_changed(&self, events: &[ChangeEvent]) {
		self.0.lock().push(kinds(events));
	}
}

#[test]
fn listeners_see_only_nonempty_commits() {
	let workspace = FakeWorkspace::new();
	let a = put(&workspace, unit("a", "1.0"));
	let manager = manager(&workspace);
	let recorder = Arc::new(Recorder::default());
	manager.add_listener(Arc::clone(&recorder) as Arc<dyn RegistryListener>);

	manager.refresh(RefreshRequest::new([a.clone()])).unwrap();
	manager.refresh(RefreshRequest::new([a.clone()])).unwrap();

	assert_eq!(*recorder.0.lock(), vec![vec![(ChangeKind::Added, a)]]);
}

#[derive(Default)]
struct Evictions(Mutex<Vec<(Location, u64, EvictReason)>>);

impl CacheObserver for Evictions {
	fn on_evict(&self, location: &Location, generation: u64, reason: EvictReason) {
		self.0.lock().push((location.clone(), generation, reason));
	}
}

#[test]
fn replaced_facades_detach_their_cached_models() {
	let workspace = FakeWorkspace::new();
	let a = put(&workspace, unit("a", "1.0"));
	let b = put(&workspace, depending_on(unit("b", "1.0"), "a", "[1.0,2.0)"));
	let manager = manager(&workspace);
	let evictions = Arc::new(Evictions::default());
	manager.cache().add_observer(Arc::clone(&evictions) as Arc<dyn CacheObserver>);
	manager.refresh(RefreshRequest::new([a.clone(), b.clone()])).unwrap();
	let old_b = manager.facade(&b).unwrap().generation();
	evictions.0.lock().clear();

	put(&workspace, unit("a", "1.1"));
	manager.refresh(RefreshRequest::new([a])).unwrap();

	assert!(evictions.0.lock().contains(&(b.clone(), old_b, EvictReason::Detached)));
	let new_b = manager.facade(&b).unwrap();
	assert!(manager.cache().get(&b, new_b.generation()).is_some());
	assert!(manager.cache().get(&b, old_b).is_none());
}

#[test]
fn small_cache_rereads_evicted_models() {
	let workspace = FakeWorkspace::new();
	let a = put(&workspace, unit("a", "1.0"));
	let b = put(&workspace, unit("b", "1.0"));
	let config = EngineConfig {
		cache_capacity: 1,
		..EngineConfig::default()
	};
	let manager = manager_with(&workspace, config);
	let evictions = Arc::new(Evictions::default());
	manager.cache().add_observer(Arc::clone(&evictions) as Arc<dyn CacheObserver>);

	manager.refresh(RefreshRequest::new([a.clone(), b])).unwrap();

	assert!(manager.cache().len() <= 1);
	assert!(evictions.0.lock().iter().any(|(.., reason)| *reason == EvictReason::Capacity));
	let facade = manager.facade(&a).unwrap();
	let model = manager.project_model(&facade).unwrap();
	assert_eq!(model.facade, *facade.model());
}

#[test]
fn project_model_is_none_once_descriptor_diverges() {
	let workspace = FakeWorkspace::new();
	let a = put(&workspace, unit("a", "1.0"));
	let manager = manager(&workspace);
	manager.refresh(RefreshRequest::new([a.clone()])).unwrap();
	let facade = manager.facade(&a).unwrap();
	manager.cache().invalidate(&a);

	put(&workspace, unit("a", "2.0"));

	assert!(manager.project_model(&facade).is_none());
}

#[test]
fn refresh_all_rereads_every_unit() {
	let workspace = FakeWorkspace::new();
	let a = put(&workspace, unit("a", "1.0"));
	let b = put(&workspace, unit("b", "1.0"));
	let manager = manager(&workspace);
	manager.refresh(RefreshRequest::new([a.clone(), b.clone()])).unwrap();

	put(&workspace, unit("b", "1.1"));
	let outcome = manager.refresh_all(CancellationToken::new()).unwrap();

	assert_eq!(kinds(&outcome.events), vec![(ChangeKind::Changed, b)]);
	assert_eq!(workspace.reads_of("a"), 2);
}

#[test]
fn persisted_snapshot_restores_registry() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("registry.bin");
	let workspace = FakeWorkspace::new();
	let a = put(&workspace, unit("a", "1.0"));
	let b = put(&workspace, depending_on(unit("b", "1.0"), "a", "1.0"));
	let first = manager(&workspace);
	first.refresh(RefreshRequest::new([a.clone(), b.clone()])).unwrap();
	first.save_snapshot(&path).unwrap();

	let restored = manager(&workspace).with_snapshot(&path);

	assert_eq!(restored.snapshot().locations(), vec![a.clone(), b.clone()]);
	assert_eq!(
		restored.facade(&b).unwrap().generation(),
		first.facade(&b).unwrap().generation()
	);
	assert_eq!(restored.snapshot().requirements(&b), first.snapshot().requirements(&b));

	let outcome = restored.refresh_all(CancellationToken::new()).unwrap();
	assert!(outcome.events.is_empty());

	let c = put(&workspace, unit("c", "1.0"));
	restored.refresh(RefreshRequest::new([c.clone()])).unwrap();
	let max = restored.facades().iter().filter(|f| *f.location() != c).map(|f| f.generation()).max().unwrap();
	assert!(restored.facade(&c).unwrap().generation() > max);
}

#[test]
fn snapshot_from_another_build_is_discarded() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("registry.bin");
	let workspace = FakeWorkspace::new();
	let a = put(&workspace, unit("a", "1.0"));
	let first = manager(&workspace);
	first.refresh(RefreshRequest::new([a])).unwrap();
	first.save_snapshot(&path).unwrap();

	let config = EngineConfig {
		build_tag: "another-build".into(),
		..EngineConfig::default()
	};
	let restored = manager_with(&workspace, config).with_snapshot(&path);

	assert!(restored.facades().is_empty());
}

#[test]
fn missing_snapshot_file_starts_empty() {
	let dir = tempfile::tempdir().unwrap();
	let workspace = FakeWorkspace::new();

	let restored = manager(&workspace).with_snapshot(dir.path().join("absent.bin"));

	assert!(restored.facades().is_empty());
	assert_eq!(restored.version(), 0);
}
