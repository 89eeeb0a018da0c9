//! Dependency resolution strategies.
//!
//! A resolver turns one unit's facade into its full capability and requirement
//! sets plus a [`Resolution`]. Strategies are selected per lifecycle mapping id
//! through [`ResolverSelector`]; units whose mapping has no registered strategy
//! use [`DefaultDependencyResolver`].

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use trellis_registry::{
	BasicRegistry, Capability, ComparableVersion, Dependency, Facade, Location, Namespace, Problem, ProblemKind,
	RequiredCapability, Resolution, ResolvedDependency, VersionRange,
};

use crate::collab::ProjectReader;

/// Input to one resolution.
pub struct ResolveRequest<'a> {
	pub facade: &'a Facade,
	/// The working copy as it stands when this unit is resolved.
	pub workspace: &'a BasicRegistry,
	pub reader: &'a dyn ProjectReader,
}

/// Full capability and requirement sets of one unit after resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedUnit {
	pub capabilities: FxHashSet<Capability>,
	pub requirements: FxHashSet<RequiredCapability>,
	pub resolution: Resolution,
}

pub trait DependencyResolver: Send + Sync {
	fn resolve(&self, request: &ResolveRequest<'_>) -> ResolvedUnit;
}

/// Capabilities every unit provides from its identity alone.
pub fn structural_capabilities(facade: &Facade) -> FxHashSet<Capability> {
	let identity = facade.identity();
	let mut caps = FxHashSet::default();
	caps.insert(Capability::artifact(identity));
	caps.insert(Capability::parent(identity));
	if facade.model().is_pom() {
		caps.insert(Capability::artifact_import(identity));
	}
	caps
}

/// Requirements every unit declares from its descriptor structure alone.
pub fn structural_requirements(facade: &Facade) -> FxHashSet<RequiredCapability> {
	let mut reqs = FxHashSet::default();
	if let Some(parent) = facade.parent() {
		reqs.insert(RequiredCapability::parent(parent));
	}
	for import in &facade.model().imports {
		reqs.insert(import.requirement(Namespace::ArtifactImport));
	}
	reqs
}

/// Resolves declared dependencies against workspace providers first, then
/// through [`ProjectReader::resolve_artifact`].
///
/// A range picks the highest contained workspace version; a bare version only
/// binds to a workspace unit of exactly that version. Unresolved dependencies
/// are recorded as problems and leave their requirement unresolved.
#[derive(Debug, Default)]
pub struct DefaultDependencyResolver;

impl DefaultDependencyResolver {
	fn resolve_dependency(&self, request: &ResolveRequest<'_>, dependency: &Dependency) -> (RequiredCapability, ResolvedDependency, Option<Problem>) {
		let model = request.facade.model();
		let req = dependency.requirement(Namespace::Artifact);
		let workspace = if model.resolver_config.resolve_workspace {
			select_provider(request.workspace, &req)
		} else {
			None
		};

		if let Some((location, version)) = workspace {
			let resolved = ResolvedDependency {
				dependency: dependency.clone(),
				version: Some(version.clone()),
				workspace: Some(location),
			};
			return (req.resolved_to(version), resolved, None);
		}

		match request.reader.resolve_artifact(dependency, &model.repositories) {
			Some(version) => {
				let resolved = ResolvedDependency {
					dependency: dependency.clone(),
					version: Some(version),
					workspace: None,
				};
				(req, resolved, None)
			}
			None => {
				let problem = Problem::error(
					ProblemKind::Resolution,
					format!("unresolved dependency {}:{}", dependency.versionless_id(), dependency.version),
				);
				let resolved = ResolvedDependency {
					dependency: dependency.clone(),
					version: None,
					workspace: None,
				};
				(req, resolved, Some(problem))
			}
		}
	}
}

impl DependencyResolver for DefaultDependencyResolver {
	fn resolve(&self, request: &ResolveRequest<'_>) -> ResolvedUnit {
		let facade = request.facade;
		let mut unit = ResolvedUnit {
			capabilities: structural_capabilities(facade),
			requirements: structural_requirements(facade),
			resolution: Resolution::default(),
		};

		for dependency in &facade.model().dependencies {
			let (req, resolved, problem) = self.resolve_dependency(request, dependency);
			unit.requirements.insert(req);
			unit.resolution.dependencies.push(resolved);
			unit.resolution.problems.extend(problem);
		}

		tracing::trace!(
			location = %facade.location(),
			requirements = unit.requirements.len(),
			problems = unit.resolution.problems.len(),
			"resolved unit"
		);
		unit
	}
}

/// Picks the workspace provider a requirement binds to, if any.
fn select_provider(workspace: &BasicRegistry, req: &RequiredCapability) -> Option<(Location, String)> {
	let range = VersionRange::parse(&req.constraint).ok()?;
	let candidates = workspace
		.providers(req)
		.into_iter()
		.map(|(loc, cap)| (ComparableVersion::new(&cap.version), loc, cap.version));
	let (_, location, version) = match range.recommended() {
		Some(recommended) => candidates.filter(|(v, ..)| v == recommended).min_by(|a, b| a.1.cmp(&b.1))?,
		None => candidates.max_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(&a.1)))?,
	};
	Some((location, version))
}

/// Resolver strategies keyed by lifecycle mapping id.
pub struct ResolverSelector {
	default: Arc<dyn DependencyResolver>,
	by_mapping: FxHashMap<String, Arc<dyn DependencyResolver>>,
}

impl Default for ResolverSelector {
	fn default() -> Self {
		Self {
			default: Arc::new(DefaultDependencyResolver),
			by_mapping: FxHashMap::default(),
		}
	}
}

impl std::fmt::Debug for ResolverSelector {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut ids: Vec<_> = self.by_mapping.keys().collect();
		ids.sort();
		f.debug_struct("ResolverSelector").field("mappings", &ids).finish()
	}
}

impl ResolverSelector {
	pub fn register(&mut self, mapping_id: impl Into<String>, resolver: Arc<dyn DependencyResolver>) {
		self.by_mapping.insert(mapping_id.into(), resolver);
	}

	pub fn select(&self, mapping_id: Option<&str>) -> &Arc<dyn DependencyResolver> {
		mapping_id.and_then(|id| self.by_mapping.get(id)).unwrap_or(&self.default)
	}
}
