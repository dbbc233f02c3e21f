//! Parsing and validation of `kiln.toml` project configuration files.
//!
//! This crate reads the project configuration file and produces a strongly-typed
//! [`ProjectConfig`]: entries, resolution roots, per-kind transform chains,
//! transform options, output naming, cache and watch settings.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod template;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_file, load_config_from_str, CONFIG_FILE_NAME};
pub use template::{Placeholder, Segment, Template};
pub use types::*;
