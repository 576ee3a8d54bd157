use anyhow::Result;
use config::{MapReduceConfig, SpillNamer};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::Engine;

/// Number of regular files in `dir`.
pub fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .count()
}

pub fn engine_in(dir: &Path, threshold: usize) -> Result<Engine> {
    Ok(Engine::new(MapReduceConfig::new(dir, threshold))?)
}

/// Runs `reduce_values` and collects every `(key, values)` it was handed.
pub fn reduce_all(engine: &mut Engine) -> Result<Vec<(String, Vec<Value>)>> {
    let mut out = Vec::new();
    engine.reduce_values(|key, values| {
        out.push((key.to_string(), values));
        Ok(())
    })?;
    Ok(out)
}

/// Namer that always hands out the same path.
pub struct FixedNamer(pub PathBuf);

impl SpillNamer for FixedNamer {
    fn next_path(&self, _base: &Path) -> PathBuf {
        self.0.clone()
    }
}
