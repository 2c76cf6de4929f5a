// ============================================================
// Layer 6 — Experiment Store
// ============================================================
// One directory per named experiment:
//
//   <root>/<name>/
//     options.json   the TrainOptions every dataset was built with
//     summary.json   counts from the last `prepare` run
//
// Options are written before any dataset is built, so a later
// evaluation can rebuild batches with exactly the same settings.
//
// Reference: Rust Book §9 (Error Handling)

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::data::loader::load_json;
use crate::domain::options::TrainOptions;

pub struct ExperimentStore {
    dir: PathBuf,
}

impl ExperimentStore {
    pub fn new(root: impl AsRef<Path>, name: &str) -> Self {
        Self { dir: root.as_ref().join(name) }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save_options(&self, options: &TrainOptions) -> Result<()> {
        self.write_json("options.json", options)
    }

    pub fn load_options(&self) -> Result<TrainOptions> {
        let path = self.dir.join("options.json");
        load_json(&path).with_context(|| {
            format!("No options for experiment '{}'. Have you run 'prepare' first?", self.dir.display())
        })
    }

    pub fn save_summary<T: Serialize>(&self, summary: &T) -> Result<()> {
        self.write_json("summary.json", summary)
    }

    fn write_json<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| format!("Cannot create '{}'", self.dir.display()))?;
        let path = self.dir.join(file);
        fs::write(&path, serde_json::to_string_pretty(value)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::debug!("Saved '{}'", path.display());
        Ok(())
    }
}
