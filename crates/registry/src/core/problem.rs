use std::fmt;

use serde::{Deserialize, Serialize};

/// Where in the refresh pipeline a problem was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProblemKind {
	/// The descriptor could not be read into a structured project.
	Read,
	/// A declared dependency could not be resolved.
	Resolution,
	/// The lifecycle mapping reported an issue.
	Mapping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
	Warning,
	Error,
}

/// A per-unit problem recorded during refresh.
///
/// Problems are data attached to the unit they concern; they never abort a refresh.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Problem {
	pub kind: ProblemKind,
	pub severity: Severity,
	pub message: String,
}

impl Problem {
	pub fn error(kind: ProblemKind, message: impl Into<String>) -> Self {
		Self {
			kind,
			severity: Severity::Error,
			message: message.into(),
		}
	}

	pub fn warning(kind: ProblemKind, message: impl Into<String>) -> Self {
		Self {
			kind,
			severity: Severity::Warning,
			message: message.into(),
		}
	}

	pub fn is_error(&self) -> bool {
		self.severity == Severity::Error
	}
}

impl fmt::Display for Problem {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let sev = match self.severity {
			Severity::Warning => "warning",
			Severity::Error => "error",
		};
		write!(f, "{sev} ({:?}): {}", self.kind, self.message)
	}
}
