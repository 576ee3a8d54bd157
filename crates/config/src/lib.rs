//! # Config - engine configuration
//!
//! Constructor-time settings for the map/reduce [`engine`]: where spill files
//! live, how many values are buffered before a spill, the merge fan-in, and
//! the two collaborators the engine does not own itself:
//!
//! - a [`SpillNamer`] that hands out fresh spill file paths, and
//! - an optional [`Progress`] hook that is ticked during long scans so an
//!   external watchdog can tell the process is still alive.
//!
//! ## Environment
//!
//! [`MapReduceConfig::from_env`] reads the tunables from the environment,
//! falling back to the defaults below:
//!
//! ```text
//! MAPREDUCE_MAX_RECORDS  values buffered before a spill (default: 100000)
//! MAPREDUCE_FAN_IN       max files merged in one pass   (default: 200)
//! MAPREDUCE_GROUP_SIZE   files per cascading group      (default: 100)
//! ```
//!
//! [`engine`]: ../engine/index.html

mod progress;

pub use progress::Progress;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

/// Default number of buffered values that triggers a spill.
pub const DEFAULT_MAX_IN_MEMORY_RECORDS: usize = 100_000;

/// Maximum number of sorted files merged directly in one pass.
pub const DEFAULT_FAN_IN_LIMIT: usize = 200;

/// Number of files merged together by one cascading pre-merge group.
pub const DEFAULT_MERGE_GROUP_SIZE: usize = 100;

/// File extension used by [`UuidNamer`].
pub const SPILL_EXTENSION: &str = "spill";

pub const ENV_MAX_RECORDS: &str = "MAPREDUCE_MAX_RECORDS";
pub const ENV_FAN_IN: &str = "MAPREDUCE_FAN_IN";
pub const ENV_GROUP_SIZE: &str = "MAPREDUCE_GROUP_SIZE";

/// Errors raised while validating a [`MapReduceConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_in_memory_records must be at least 1")]
    ZeroThreshold,

    #[error("merge_group_size must be at least 2 (got {0})")]
    GroupTooSmall(usize),

    #[error("fan_in_limit {fan_in} is smaller than merge_group_size {group}")]
    FanInBelowGroup { fan_in: usize, group: usize },

    #[error("base directory {0} does not exist or is not a directory")]
    BadBaseDir(PathBuf),
}

/// Produces a fresh, unused path for every new spill or merge output file.
///
/// Implementations only need to avoid collisions; the engine opens every
/// returned path with exclusive-create semantics, so a collision fails the
/// write instead of clobbering data.
pub trait SpillNamer: Send + Sync {
    fn next_path(&self, base: &Path) -> PathBuf;
}

/// Default namer: `<base>/<uuid v4>.spill`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidNamer;

impl SpillNamer for UuidNamer {
    fn next_path(&self, base: &Path) -> PathBuf {
        base.join(format!("{}.{}", Uuid::new_v4(), SPILL_EXTENSION))
    }
}

/// Configuration for one engine instance.
#[derive(Clone)]
pub struct MapReduceConfig {
    /// Existing, writable directory that receives every spill file.
    pub base_dir: PathBuf,
    /// Number of buffered values that triggers a spill to disk.
    pub max_in_memory_records: usize,
    /// Maximum number of files opened together by the final merge.
    pub fan_in_limit: usize,
    /// Number of files merged together by one cascading group.
    pub merge_group_size: usize,
    /// Optional liveness hook ticked during long-running operations.
    pub progress: Option<Progress>,
    /// Source of fresh spill file paths.
    pub namer: Arc<dyn SpillNamer>,
}

impl fmt::Debug for MapReduceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapReduceConfig")
            .field("base_dir", &self.base_dir)
            .field("max_in_memory_records", &self.max_in_memory_records)
            .field("fan_in_limit", &self.fan_in_limit)
            .field("merge_group_size", &self.merge_group_size)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl MapReduceConfig {
    /// Creates a configuration with the given base directory and spill
    /// threshold; everything else takes its default.
    pub fn new<P: AsRef<Path>>(base_dir: P, max_in_memory_records: usize) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            max_in_memory_records,
            fan_in_limit: DEFAULT_FAN_IN_LIMIT,
            merge_group_size: DEFAULT_MERGE_GROUP_SIZE,
            progress: None,
            namer: Arc::new(UuidNamer),
        }
    }

    /// Builds a configuration from `MAPREDUCE_*` environment variables.
    /// Unset or unparsable values fall back to the defaults.
    pub fn from_env<P: AsRef<Path>>(base_dir: P) -> Self {
        let mut cfg = Self::new(
            base_dir,
            env_or(ENV_MAX_RECORDS, DEFAULT_MAX_IN_MEMORY_RECORDS),
        );
        cfg.fan_in_limit = env_or(ENV_FAN_IN, DEFAULT_FAN_IN_LIMIT);
        cfg.merge_group_size = env_or(ENV_GROUP_SIZE, DEFAULT_MERGE_GROUP_SIZE);
        log::debug!("loaded config from environment: {:?}", cfg);
        cfg
    }

    /// Installs a liveness callback. Panics raised by it are swallowed.
    pub fn with_progress<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.progress = Some(Progress::new(f));
        self
    }

    pub fn with_namer<N: SpillNamer + 'static>(mut self, namer: N) -> Self {
        self.namer = Arc::new(namer);
        self
    }

    pub fn with_fan_in(mut self, fan_in_limit: usize, merge_group_size: usize) -> Self {
        self.fan_in_limit = fan_in_limit;
        self.merge_group_size = merge_group_size;
        self
    }

    /// Checks the thresholds and that `base_dir` is an existing directory.
    ///
    /// `fan_in_limit >= merge_group_size >= 2` guarantees every cascading
    /// pass shrinks the file count and every group fits under the fan-in.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_in_memory_records == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        if self.merge_group_size < 2 {
            return Err(ConfigError::GroupTooSmall(self.merge_group_size));
        }
        if self.fan_in_limit < self.merge_group_size {
            return Err(ConfigError::FanInBelowGroup {
                fan_in: self.fan_in_limit,
                group: self.merge_group_size,
            });
        }
        if !self.base_dir.is_dir() {
            return Err(ConfigError::BadBaseDir(self.base_dir.clone()));
        }
        Ok(())
    }

    /// Returns a fresh spill path inside `base_dir`.
    pub fn next_spill_path(&self) -> PathBuf {
        self.namer.next_path(&self.base_dir)
    }

    /// Ticks the liveness hook, if one is installed.
    pub fn tick(&self) {
        if let Some(p) = &self.progress {
            p.tick();
        }
    }
}
