//! Persisted registry snapshots.
//!
//! A snapshot is stored as `(format, build_tag, facades, capabilities,
//! requirements)` encoded with postcard. Loading is all-or-nothing: a format or
//! build-tag mismatch, an unreadable descriptor, or a decode failure rejects the
//! whole blob, and the caller falls back to an empty registry. The reverse
//! requirement index is rebuilt on load, never read from disk.

use std::io::{Read, Write};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::types::BasicRegistry;
use crate::core::{Capability, Facade, Location, RequiredCapability};

const FORMAT: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
	#[error("snapshot i/o: {0}")]
	Io(#[from] std::io::Error),
	#[error("snapshot encoding: {0}")]
	Codec(#[from] postcard::Error),
	#[error("snapshot format {found} is not supported (expected {expected})")]
	Format { found: u32, expected: u32 },
	#[error("snapshot was written by build {found:?}, running build is {expected:?}")]
	BuildTag { found: String, expected: String },
	#[error("descriptor {0} is no longer readable")]
	Unreadable(Location),
	#[error("snapshot is inconsistent: {0}")]
	Invalid(String),
}

#[derive(Serialize)]
struct PersistedSnapshotRef<'a> {
	format: u32,
	build_tag: &'a str,
	facades: Vec<&'a Facade>,
	capabilities: Vec<(&'a Location, Vec<&'a Capability>)>,
	requirements: Vec<(&'a Location, Vec<&'a RequiredCapability>)>,
}

/// Decoded on-disk form of a registry snapshot.
#[derive(Debug, Deserialize)]
pub struct PersistedSnapshot {
	format: u32,
	build_tag: String,
	facades: Vec<Facade>,
	capabilities: Vec<(Location, Vec<Capability>)>,
	requirements: Vec<(Location, Vec<RequiredCapability>)>,
}

impl PersistedSnapshot {
	/// Encodes `registry` to `writer`, ordered by location for reproducible output.
	pub fn save(registry: &BasicRegistry, mut writer: impl Write) -> Result<(), PersistError> {
		let mut facades: Vec<&Facade> = registry.facades.values().map(Arc::as_ref).collect();
		facades.sort_by(|a, b| a.location().cmp(b.location()));

		let mut capabilities: Vec<_> = registry
			.capabilities
			.iter()
			.map(|(loc, caps)| {
				let mut caps: Vec<_> = caps.iter().collect();
				caps.sort();
				(loc, caps)
			})
			.collect();
		capabilities.sort_by(|a, b| a.0.cmp(b.0));

		let mut requirements: Vec<_> = registry
			.requirements
			.iter()
			.map(|(loc, reqs)| {
				let mut reqs: Vec<_> = reqs.iter().collect();
				reqs.sort();
				(loc, reqs)
			})
			.collect();
		requirements.sort_by(|a, b| a.0.cmp(b.0));

		let bytes = postcard::to_stdvec(&PersistedSnapshotRef {
			format: FORMAT,
			build_tag: &registry.build_tag,
			facades,
			capabilities,
			requirements,
		})?;
		writer.write_all(&bytes)?;
		writer.flush()?;
		Ok(())
	}

	/// Decodes a snapshot and validates it against the running build.
	pub fn load(mut reader: impl Read, build_tag: &str, readable: impl Fn(&Location) -> bool) -> Result<BasicRegistry, PersistError> {
		let mut bytes = Vec::new();
		reader.read_to_end(&mut bytes)?;
		let persisted: PersistedSnapshot = postcard::from_bytes(&bytes)?;
		persisted.into_registry(build_tag, readable)
	}

	fn into_registry(self, build_tag: &str, readable: impl Fn(&Location) -> bool) -> Result<BasicRegistry, PersistError> {
		if self.format != FORMAT {
			return Err(PersistError::Format {
				found: self.format,
				expected: FORMAT,
			});
		}
		if self.build_tag != build_tag {
			return Err(PersistError::BuildTag {
				found: self.build_tag,
				expected: build_tag.to_string(),
			});
		}

		let mut registry = BasicRegistry::new(self.build_tag);
		for facade in self.facades {
			if !facade.identity().is_complete() {
				return Err(PersistError::Invalid(format!("facade at {} has no identity", facade.location())));
			}
			if !readable(facade.location()) {
				return Err(PersistError::Unreadable(facade.location().clone()));
			}
			let location = facade.location().clone();
			if registry.set_facade(&location, Some(Arc::new(facade))).is_some() {
				return Err(PersistError::Invalid(format!("duplicate facade at {location}")));
			}
		}
		for (location, caps) in self.capabilities {
			registry.set_capabilities(&location, Some(caps.into_iter().collect()));
		}
		for (location, reqs) in self.requirements {
			registry.requirements.insert(location, reqs.into_iter().collect());
		}
		registry.requirements.retain(|_, reqs| !reqs.is_empty());
		registry.rebuild_reverse_index();
		Ok(registry)
	}
}
