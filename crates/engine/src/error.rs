use thiserror::Error;
use trellis_registry::StaleSnapshot;

/// Why a refresh committed nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
	/// The registry advanced underneath the refresh; retry against the new snapshot.
	#[error(transparent)]
	Stale(#[from] StaleSnapshot),
	#[error("refresh was cancelled")]
	Cancelled,
	#[error("dependency resolution did not converge within {rounds} rounds")]
	ConvergenceExceeded { rounds: usize },
}

impl RefreshError {
	/// True for failures a caller should retry.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Stale(_))
	}
}
