//! Universe Runner: configuration, run orchestration and persistence.
//!
//! This crate builds on `universe-core` to provide:
//! - TOML configuration with `{key}` parameter substitution
//! - A runner that executes the pipeline and folds stage outputs
//! - Parquet export of stage and final universes
//! - A JSON run manifest keyed by a content-addressed run id

pub mod config;
pub mod export;
pub mod runner;

pub use config::{parse_parameters, ConfigError, RunId, UniverseConfig};
pub use export::{read_universe, write_universe};
pub use runner::{read_manifest, FrameSummary, RunManifest, RunSummary, UniverseRunner};
