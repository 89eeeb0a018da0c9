//! Engine configuration loaded from TOML.
//!
//! Every field has a default, so an empty document is a valid configuration.
//!
//! ```toml
//! max_convergence_rounds = 20
//! convergence_policy = "warn"   # or "fail"
//! max_reads_per_unit = 3
//! cache_capacity = 64
//! build_tag = "trellis-0.1.0"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read {path}: {source}")]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("failed to parse engine config: {0}")]
	Parse(#[from] toml::de::Error),
	#[error("invalid engine config: {0}")]
	Invalid(&'static str),
}

/// What a refresh does when dependency resolution hits the round ceiling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvergencePolicy {
	/// Commit the bounded result and report `converged = false`.
	#[default]
	Warn,
	/// Abort the refresh without committing.
	Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
	/// Hard ceiling on dependency-resolution rounds per refresh.
	pub max_convergence_rounds: usize,
	pub convergence_policy: ConvergencePolicy,
	/// Descriptor reads allowed per unit per refresh; bounds parent cycles.
	pub max_reads_per_unit: u32,
	/// Heavyweight project models kept in memory.
	pub cache_capacity: usize,
	/// Stamp written into persisted snapshots; a mismatch discards them on load.
	pub build_tag: String,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			max_convergence_rounds: 20,
			convergence_policy: ConvergencePolicy::Warn,
			max_reads_per_unit: 3,
			cache_capacity: 64,
			build_tag: concat!("trellis-", env!("CARGO_PKG_VERSION")).to_string(),
		}
	}
}

impl EngineConfig {
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
			path: path.to_path_buf(),
			source,
		})?;
		let config = Self::from_toml_str(&input)?;
		tracing::debug!(path = %path.display(), ?config, "loaded engine config");
		Ok(config)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.max_convergence_rounds == 0 {
			return Err(ConfigError::Invalid("max_convergence_rounds must be at least 1"));
		}
		if self.max_reads_per_unit == 0 {
			return Err(ConfigError::Invalid("max_reads_per_unit must be at least 1"));
		}
		if self.cache_capacity == 0 {
			return Err(ConfigError::Invalid("cache_capacity must be at least 1"));
		}
		Ok(())
	}
}
