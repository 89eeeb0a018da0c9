//! Incremental refresh engine for the trellis workspace registry.
//!
//! The registry crate stores and publishes workspace state; this crate keeps it
//! current. [`RegistryManager::refresh`] takes a set of changed descriptor
//! locations, re-reads and re-resolves whatever they affect through pluggable
//! collaborators, and publishes one new snapshot.
//!
//! # Modules
//!
//! - [`manager`] - the refresh state machine and registry queries
//! - [`collab`] - reader, lifecycle mapper and listener seams
//! - [`resolver`] - dependency resolution strategies
//! - [`cache`] - bounded cache of heavyweight project models
//! - [`config`] - TOML-backed engine settings

pub mod cache;
pub mod collab;
pub mod config;
pub mod error;
pub mod manager;
pub mod resolver;

pub use cache::{CacheObserver, EvictReason, ProjectCache};
pub use collab::{DefaultLifecycleMapper, LifecycleMapper, ProjectModel, ProjectReader, ReadResult, RegistryListener};
pub use config::{ConfigError, ConvergencePolicy, EngineConfig};
pub use error::RefreshError;
pub use manager::{RefreshOutcome, RefreshRequest, RegistryManager};
pub use resolver::{DefaultDependencyResolver, DependencyResolver, ResolveRequest, ResolvedUnit, ResolverSelector};
pub use tokio_util::sync::CancellationToken;
