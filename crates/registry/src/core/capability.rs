//! Capability and requirement primitives of the matching model.
//!
//! A [`Capability`] is "this unit offers identity K at version V"; a
//! [`RequiredCapability`] is "this unit needs something satisfying K and
//! constraint C". Both are bucketed by their [`VersionlessKey`] so that the
//! cheap, selective identity match runs before the version check.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::key::Coordinates;
use super::version::{ComparableVersion, VersionRange};

/// Closed set of capability namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Namespace {
	/// The unit's own artifact identity; target of ordinary dependencies.
	Artifact,
	/// A `pom` unit importable into dependency management.
	ArtifactImport,
	/// The unit acting as a parent of other units.
	Parent,
}

impl Namespace {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Artifact => "artifact",
			Self::ArtifactImport => "artifact-import",
			Self::Parent => "parent",
		}
	}
}

impl fmt::Display for Namespace {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Identity of a capability ignoring its version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionlessKey {
	pub namespace: Namespace,
	pub id: String,
}

impl VersionlessKey {
	pub fn new(namespace: Namespace, id: impl Into<String>) -> Self {
		Self { namespace, id: id.into() }
	}
}

impl fmt::Display for VersionlessKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.namespace, self.id)
	}
}

/// Something a unit offers to the rest of the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Capability {
	pub key: VersionlessKey,
	pub version: String,
}

impl Capability {
	pub fn new(key: VersionlessKey, version: impl Into<String>) -> Self {
		Self {
			key,
			version: version.into(),
		}
	}

	pub fn artifact(coords: &Coordinates) -> Self {
		Self::for_coordinates(Namespace::Artifact, coords)
	}

	pub fn artifact_import(coords: &Coordinates) -> Self {
		Self::for_coordinates(Namespace::ArtifactImport, coords)
	}

	pub fn parent(coords: &Coordinates) -> Self {
		Self::for_coordinates(Namespace::Parent, coords)
	}

	fn for_coordinates(namespace: Namespace, coords: &Coordinates) -> Self {
		Self::new(VersionlessKey::new(namespace, coords.versionless_id()), coords.version.clone())
	}

	pub fn versionless_key(&self) -> &VersionlessKey {
		&self.key
	}

	pub fn namespace(&self) -> Namespace {
		self.key.namespace
	}
}

impl fmt::Display for Capability {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}@{}", self.key, self.version)
	}
}

/// Something a unit needs from the rest of the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequiredCapability {
	pub key: VersionlessKey,
	/// Version constraint in range syntax, or a bare (soft) version.
	pub constraint: String,
	pub scope: Option<String>,
	pub optional: bool,
	/// Exact version this requirement was resolved against inside the workspace.
	pub resolved: Option<String>,
}

impl RequiredCapability {
	pub fn new(key: VersionlessKey, constraint: impl Into<String>) -> Self {
		Self {
			key,
			constraint: constraint.into(),
			scope: None,
			optional: false,
			resolved: None,
		}
	}

	/// Requirement on a unit's declared parent, resolved to the one version it names.
	pub fn parent(parent: &Coordinates) -> Self {
		Self::new(VersionlessKey::new(Namespace::Parent, parent.versionless_id()), parent.version.clone())
			.resolved_to(parent.version.clone())
	}

	/// Requirement on a dependency-management import.
	pub fn import(imported: &Coordinates) -> Self {
		Self::new(VersionlessKey::new(Namespace::ArtifactImport, imported.versionless_id()), imported.version.clone())
	}

	/// Requirement on an ordinary artifact dependency.
	pub fn artifact(versionless_id: impl Into<String>, constraint: impl Into<String>) -> Self {
		Self::new(VersionlessKey::new(Namespace::Artifact, versionless_id), constraint)
	}

	pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = Some(scope.into());
		self
	}

	pub fn with_optional(mut self, optional: bool) -> Self {
		self.optional = optional;
		self
	}

	pub fn resolved_to(mut self, version: impl Into<String>) -> Self {
		self.resolved = Some(version.into());
		self
	}

	pub fn versionless_key(&self) -> &VersionlessKey {
		&self.key
	}

	pub fn is_resolved(&self) -> bool {
		self.resolved.is_some()
	}

	/// Returns true if a change to `capability` could affect this requirement.
	///
	/// Sound but imprecise: it may report a match that resolution would not pick,
	/// but never misses one. With `exact_only`, only a requirement resolved to
	/// exactly the capability's version matches. Otherwise the version must lie
	/// in the constraint's range; a malformed constraint matches everything.
	pub fn is_potential_match(&self, capability: &Capability, exact_only: bool) -> bool {
		if self.key != capability.key {
			return false;
		}
		if exact_only {
			return self
				.resolved
				.as_deref()
				.is_some_and(|resolved| ComparableVersion::new(resolved) == ComparableVersion::new(&capability.version));
		}
		match self.key.namespace {
			Namespace::Artifact if self.scope.as_deref() == Some("system") => true,
			Namespace::Artifact | Namespace::ArtifactImport | Namespace::Parent => self.constraint_admits(&capability.version),
		}
	}

	fn constraint_admits(&self, version: &str) -> bool {
		// TODO: fail-open lets a malformed constraint force reprocessing on every matching change; revisit once
		// descriptors are validated before indexing.
		match VersionRange::parse(&self.constraint) {
			Ok(range) => range.contains(&ComparableVersion::new(version)),
			Err(error) => {
				tracing::trace!(requirement = %self.key, constraint = %self.constraint, %error, "malformed constraint matches all");
				true
			}
		}
	}
}

impl fmt::Display for RequiredCapability {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.key, self.constraint)?;
		if let Some(v) = &self.resolved {
			write!(f, " (resolved {v})")?;
		}
		Ok(())
	}
}
