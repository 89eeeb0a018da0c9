//! Unit identities and descriptor locations.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Artifact coordinates identifying one build unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinates {
	pub group: String,
	pub artifact: String,
	pub version: String,
	pub classifier: Option<String>,
}

impl Coordinates {
	/// Creates coordinates without a classifier.
	pub fn new(group: impl Into<String>, artifact: impl Into<String>, version: impl Into<String>) -> Self {
		Self {
			group: group.into(),
			artifact: artifact.into(),
			version: version.into(),
			classifier: None,
		}
	}

	/// Returns a copy carrying the given classifier.
	pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
		self.classifier = Some(classifier.into());
		self
	}

	/// Parses `group:artifact:version[:classifier]`.
	pub fn parse(s: &str) -> Option<Self> {
		let mut parts = s.split(':');
		let group = parts.next().filter(|p| !p.is_empty())?;
		let artifact = parts.next().filter(|p| !p.is_empty())?;
		let version = parts.next().filter(|p| !p.is_empty())?;
		let classifier = parts.next().filter(|p| !p.is_empty());
		if parts.next().is_some() {
			return None;
		}
		let coords = Self::new(group, artifact, version);
		Some(match classifier {
			Some(c) => coords.with_classifier(c),
			None => coords,
		})
	}

	/// Identity without the version: `group:artifact[:classifier]`.
	pub fn versionless_id(&self) -> String {
		match &self.classifier {
			Some(c) => format!("{}:{}:{}", self.group, self.artifact, c),
			None => format!("{}:{}", self.group, self.artifact),
		}
	}

	/// Returns true when group, artifact and version are all non-empty.
	pub fn is_complete(&self) -> bool {
		!self.group.is_empty() && !self.artifact.is_empty() && !self.version.is_empty()
	}
}

impl fmt::Display for Coordinates {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}:{}", self.group, self.artifact, self.version)?;
		if let Some(c) = &self.classifier {
			write!(f, ":{c}")?;
		}
		Ok(())
	}
}

/// Handle to a unit's build descriptor.
///
/// Primary key of every per-unit index in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location(PathBuf);

impl Location {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self(path.into())
	}

	pub fn path(&self) -> &Path {
		&self.0
	}

	/// Returns true if the descriptor still exists as a regular file.
	pub fn is_readable(&self) -> bool {
		std::fs::metadata(&self.0).map(|m| m.is_file()).unwrap_or(false)
	}
}

impl fmt::Display for Location {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0.display())
	}
}

impl From<&str> for Location {
	fn from(s: &str) -> Self {
		Self::new(s)
	}
}

impl From<PathBuf> for Location {
	fn from(p: PathBuf) -> Self {
		Self(p)
	}
}
