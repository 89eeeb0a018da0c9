/// A working copy was opened against a snapshot that has since been replaced.
///
/// The registry is left untouched; the caller is expected to retry against the
/// current snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("stale working copy: opened at version {expected}, registry is at version {actual}")]
pub struct StaleSnapshot {
	pub expected: u64,
	pub actual: u64,
}
