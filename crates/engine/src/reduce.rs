/// Reduce path: `reduce_values()`.
///
/// Runs the cascading pre-merge, then a single k-way merge over what is
/// left, handing each merged record to the caller's reducer. Spill files are
/// deleted only after the whole pass succeeded.
use serde_json::Value;
use spill::{KWayMerge, Record};
use std::fs;

use crate::{Engine, Error, Lifecycle, Result};

impl Engine {
    /// Calls `reducer(key, values)` once per distinct key, in strictly
    /// ascending key order, with every value mapped for that key.
    ///
    /// Values contributed within one spill batch keep their insertion
    /// order; groups from different spill files are concatenated in file
    /// order.
    ///
    /// On success all spill files are deleted and the engine is `Done`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFlushed`] unless the engine is `Flushed`.
    /// - Any spill, I/O or [`Error::Reducer`] failure moves the engine to
    ///   `Failed` and leaves the remaining spill files on disk.
    pub fn reduce_values<F>(&mut self, mut reducer: F) -> Result<()>
    where
        F: FnMut(&str, Vec<Value>) -> anyhow::Result<()>,
    {
        if self.state != Lifecycle::Flushed {
            return Err(Error::NotFlushed { state: self.state });
        }
        self.state = Lifecycle::Reducing;

        match self.run_reduce(&mut reducer) {
            Ok(keys) => {
                self.state = Lifecycle::Done;
                log::info!("reduce done: {} keys", keys);
                Ok(())
            }
            Err(e) => {
                self.state = Lifecycle::Failed;
                log::error!(
                    "reduce failed: {}; leaving {} spill files in {}",
                    e,
                    self.files.len(),
                    self.cfg.base_dir.display()
                );
                Err(e)
            }
        }
    }

    fn run_reduce<F>(&mut self, reducer: &mut F) -> Result<usize>
    where
        F: FnMut(&str, Vec<Value>) -> anyhow::Result<()>,
    {
        self.premerge()?;

        let mut merge = KWayMerge::open(&self.files, self.cfg.progress.clone())?;
        let mut keys = 0usize;
        while let Some(Record { key, values }) = merge.next_group()? {
            reducer(&key, values).map_err(|err| Error::Reducer { key, err })?;
            keys += 1;
        }
        drop(merge);

        let files = std::mem::take(&mut self.files);
        for (i, path) in files.iter().enumerate() {
            if let Err(e) = fs::remove_file(path) {
                self.files = files[i..].to_vec();
                return Err(e.into());
            }
        }
        Ok(keys)
    }
}
