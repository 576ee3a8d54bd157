//! # Engine - disk-backed map/group-by
//!
//! Collects arbitrarily many `(key, value)` pairs, spills them to sorted
//! files whenever the in-memory buffer reaches its threshold, and finally
//! merges every spill file to hand the caller one complete, ordered value
//! group per distinct key.
//!
//! ## Architecture
//!
//! ```text
//! Caller
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                   ENGINE                      │
//! │                                               │
//! │ write.rs → map_value() → Batch push           │
//! │              |                                │
//! │              |  (buffered >= threshold?)      │
//! │              |            yes                 │
//! │              v                                │
//! │           spill() → new sorted spill file     │
//! │                                               │
//! │ write_done() → final spill, state = Flushed   │
//! │                                               │
//! │ reduce.rs → premerge() while files > fan-in   │
//! │              |                                │
//! │              v                                │
//! │           KWayMerge → reducer(key, values)    │
//! │              |                                │
//! │              v                                │
//! │           delete spill files, state = Done    │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! ```text
//! Accepting --write_done--> Flushed --reduce_values--> Reducing --ok--> Done
//!                                                          \--err--> Failed
//! ```
//!
//! A failed reduction deletes nothing: every spill file still owned by the
//! engine is left on disk for inspection (see [`Engine::live_files`]).
//!
//! ## Concurrency
//!
//! Every operation takes `&mut self`, so calls on one engine are serialised
//! by construction. The only parallel work is the set of independent group
//! merges inside one cascading pre-merge pass, which run on the rayon pool.
//!
//! ## Example
//!
//! ```rust,no_run
//! use config::MapReduceConfig;
//! use engine::Engine;
//! use serde_json::json;
//!
//! let mut engine = Engine::new(MapReduceConfig::new("/tmp/mr", 10_000)).unwrap();
//! for word in "the cat saw the dog".split(' ') {
//!     engine.map_value(word, json!(1)).unwrap();
//! }
//! engine.write_done().unwrap();
//! engine
//!     .reduce_values(|word, ones| {
//!         println!("{word}: {}", ones.len());
//!         Ok(())
//!     })
//!     .unwrap();
//! ```
mod premerge;
mod reduce;
mod write;

use batch::Batch;
use config::{ConfigError, MapReduceConfig};
use spill::SpillError;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Lifecycle state of an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// `map_value` is permitted.
    Accepting,
    /// `write_done` has run; `reduce_values` may run once.
    Flushed,
    /// A reduction is in progress.
    Reducing,
    /// Every spill file was consumed and deleted.
    Done,
    /// A reduction failed; remaining spill files are left on disk.
    Failed,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Lifecycle::Accepting => "accepting",
            Lifecycle::Flushed => "flushed",
            Lifecycle::Reducing => "reducing",
            Lifecycle::Done => "done",
            Lifecycle::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Errors returned by [`Engine`] operations.
#[derive(Debug, Error)]
pub enum Error {
    /// `map_value` was called after `write_done`.
    #[error("map_value called after write_done")]
    AlreadyFlushed,

    /// `reduce_values` was called in any state other than `Flushed`.
    #[error("reduce_values requires a flushed engine, but it is {state}")]
    NotFlushed { state: Lifecycle },

    #[error(transparent)]
    Spill(#[from] SpillError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The caller's reducer returned an error for `key`.
    #[error("reducer failed on key {key:?}: {err:#}")]
    Reducer { key: String, err: anyhow::Error },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Disk-backed map/group-by engine.
///
/// # Map phase
///
/// 1. [`map_value`](Engine::map_value) appends the value to its key's group
///    in the in-memory [`Batch`].
/// 2. Once `max_in_memory_records` values are buffered, the batch is written
///    to a new sorted spill file and cleared.
/// 3. [`write_done`](Engine::write_done) spills whatever is left.
///
/// # Reduce phase
///
/// [`reduce_values`](Engine::reduce_values) first merges groups of spill
/// files while there are more than `fan_in_limit` of them, then k-way merges
/// the rest, calling the reducer once per key in ascending order.
pub struct Engine {
    pub(crate) cfg: MapReduceConfig,
    pub(crate) batch: Batch,
    /// Spill files owned by this engine, in creation order.
    pub(crate) files: Vec<PathBuf>,
    pub(crate) state: Lifecycle,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state)
            .field("base_dir", &self.cfg.base_dir)
            .field("max_in_memory_records", &self.cfg.max_in_memory_records)
            .field("buffered_keys", &self.batch.len())
            .field("buffered_values", &self.batch.value_count())
            .field("spill_files", &self.files.len())
            .finish()
    }
}

impl Engine {
    /// Creates an engine in the `Accepting` state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration does not validate
    /// (zero threshold, bad fan-in, or a missing base directory).
    pub fn new(cfg: MapReduceConfig) -> Result<Self> {
        cfg.validate()?;
        log::debug!("engine created: {:?}", cfg);
        Ok(Self {
            cfg,
            batch: Batch::new(),
            files: Vec::new(),
            state: Lifecycle::Accepting,
        })
    }

    #[must_use]
    pub fn state(&self) -> Lifecycle {
        self.state
    }

    /// Spill files currently owned by the engine. After a failed reduction
    /// these are the files left on disk.
    #[must_use]
    pub fn live_files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Number of values buffered in memory and not yet spilled.
    #[must_use]
    pub fn buffered_values(&self) -> usize {
        self.batch.value_count()
    }

    /// Number of distinct keys buffered in memory.
    #[must_use]
    pub fn buffered_keys(&self) -> usize {
        self.batch.len()
    }

    pub fn config(&self) -> &MapReduceConfig {
        &self.cfg
    }
}

#[cfg(test)]
mod tests;
