//! Universe runner: wires together configuration, data store, pipeline
//! executor and persistence.
//!
//! One `run()`:
//! 1. executes every stage in declaration order,
//! 2. writes each stage frame to `{intermediate_directory}/{stage}.parquet`,
//! 3. folds the stage frames with `combine_validity`,
//! 4. writes the final universe to `output_filename`,
//! 5. writes `manifest.json` next to the stage files.
//!
//! Any stage failure aborts the run; nothing is salvaged.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use universe_core::calendar::Calendar;
use universe_core::data::{DataStore, Params};
use universe_core::{combine_validity, PipelineExecutor, UniverseFrame, Value};

use crate::config::{ConfigError, RunId, UniverseConfig};
use crate::export::write_universe;

/// Current schema version for the run manifest.
pub const SCHEMA_VERSION: u32 = 1;

pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Shape and inclusion counts of one persisted frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameSummary {
    pub name: String,
    pub rows: usize,
    pub columns: usize,
    pub included: usize,
    pub unknown: usize,
    pub path: PathBuf,
}

impl FrameSummary {
    fn new(name: &str, frame: &UniverseFrame, path: &Path) -> Self {
        let (rows, columns) = frame.shape();
        Self {
            name: name.to_string(),
            rows,
            columns,
            included: frame.included_count(),
            unknown: frame.unknown_count(),
            path: path.to_path_buf(),
        }
    }
}

/// Everything a run wrote, as recorded in `manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub duration_secs: f64,
    pub calendar: Calendar,
    pub stages: Vec<FrameSummary>,
    pub universe: FrameSummary,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub manifest: RunManifest,
    pub universe: UniverseFrame,
}

/// Owns the data store and executor of one configured run.
#[derive(Debug)]
pub struct UniverseRunner {
    config: UniverseConfig,
    store: DataStore,
    executor: PipelineExecutor,
}

impl UniverseRunner {
    pub fn new(config: UniverseConfig) -> Result<Self, ConfigError> {
        let store = DataStore::new(config.catalog()?);
        let executor = PipelineExecutor::new(config.pipelines()?, config.calendar()?);
        Ok(Self {
            config,
            store,
            executor,
        })
    }

    pub fn config(&self) -> &UniverseConfig {
        &self.config
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    /// Register a custom data function, replacing any builtin of that name.
    pub fn register_data_function<G>(&mut self, name: impl Into<String>, function: G) -> &mut Self
    where
        G: Fn(&Params) -> universe_core::Result<Value> + Send + Sync + 'static,
    {
        self.store.register(name, function);
        self
    }

    /// Register a custom stage function, replacing any builtin of that name.
    pub fn register_stage_function<G>(&mut self, name: impl Into<String>, function: G) -> &mut Self
    where
        G: Fn(&Params, &Calendar) -> universe_core::Result<Value> + Send + Sync + 'static,
    {
        self.executor.register(name, function);
        self
    }

    /// Seed a data entry with a precomputed value instead of its function.
    pub fn update_values(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.store.update_values(name, value);
        self
    }

    /// Execute every stage, persist the results and return the final universe.
    pub fn run(&mut self) -> Result<RunSummary> {
        if self.executor.pipelines().is_empty() {
            bail!("no pipeline stages declared");
        }
        let started = Instant::now();
        let run_id = self.config.run_id()?;
        let stage_dir = self.config.intermediate_directory.clone();
        fs::create_dir_all(&stage_dir)
            .with_context(|| format!("failed to create {}", stage_dir.display()))?;
        info!(run_id = %run_id, stages = self.executor.pipelines().len(), "starting run");

        let mut frames = Vec::with_capacity(self.executor.pipelines().len());
        let mut stages = Vec::with_capacity(frames.capacity());
        for result in self.executor.execute_all(&mut self.store) {
            let (name, frame) = result?;
            let path = stage_dir.join(format!("{name}.parquet"));
            write_universe(&frame, &path)
                .with_context(|| format!("failed to persist stage '{name}'"))?;
            stages.push(FrameSummary::new(&name, &frame, &path));
            frames.push(frame);
        }

        let universe = combine_validity(&frames).context("failed to combine stage universes")?;
        let output = self.config.output_filename.clone();
        write_universe(&universe, &output).context("failed to persist final universe")?;

        let manifest = RunManifest {
            schema_version: SCHEMA_VERSION,
            run_id,
            created_at: chrono::Utc::now(),
            duration_secs: started.elapsed().as_secs_f64(),
            calendar: self.executor.calendar().clone(),
            universe: FrameSummary::new("universe", &universe, &output),
            stages,
        };
        write_manifest(&stage_dir.join(MANIFEST_FILENAME), &manifest)?;

        info!(
            run_id = %manifest.run_id,
            rows = manifest.universe.rows,
            instruments = manifest.universe.columns,
            included = manifest.universe.included,
            output = %output.display(),
            "run complete"
        );
        Ok(RunSummary { manifest, universe })
    }
}

pub fn write_manifest(path: &Path, manifest: &RunManifest) -> Result<()> {
    let json = serde_json::to_string_pretty(manifest).context("failed to serialize run manifest")?;
    fs::write(path, json)
        .with_context(|| format!("failed to write manifest to {}", path.display()))?;
    Ok(())
}

pub fn read_manifest(path: &Path) -> Result<RunManifest> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest from {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("malformed manifest in {}", path.display()))
}
