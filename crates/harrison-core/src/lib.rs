//! Core types and configuration for harrison.
//!
//! This crate defines the `harrison.toml` schema ([`HarrisonConfig`]),
//! the fully resolved run parameters handed to the packaging pipeline
//! ([`PipelineConfig`]), and shared error types.

pub mod config;
pub mod error;

pub use config::{
    CONFIG_FILE_NAME, HarrisonConfig, PackageConfig, PackageOverrides, PipelineConfig,
    ProjectConfig, ResolveFrom, SshConfig,
};
pub use error::{Error, Result};
