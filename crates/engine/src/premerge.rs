/// Cascading pre-merge: keeps the final merge under the fan-in limit.
///
/// While more than `fan_in_limit` spill files exist, they are split into
/// consecutive groups of `merge_group_size` and each group is merged into a
/// single file. Groups share no files, so one pass merges them in parallel.
use rayon::prelude::*;
use spill::{merge_files, SpillError};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::{Engine, Result};

/// Inputs of one group, its output path, and how the merge went.
type GroupResult = (Vec<PathBuf>, PathBuf, std::result::Result<(), SpillError>);

impl Engine {
    /// Merges groups of spill files until at most `fan_in_limit` remain.
    ///
    /// # Errors
    ///
    /// Returns the first group's error after the pass completes. Outputs
    /// of successful groups replace their inputs in [`Engine::live_files`];
    /// a failed group lists whatever of its inputs and output is still on disk.
    pub(crate) fn premerge(&mut self) -> Result<()> {
        while self.files.len() > self.cfg.fan_in_limit {
            let before = self.files.len();
            let cfg = &self.cfg;

            let results: Vec<GroupResult> = self
                .files
                .par_chunks(cfg.merge_group_size)
                .map(|group| {
                    cfg.tick();
                    let out = cfg.next_spill_path();
                    let res = merge_files(group, &out, cfg.progress.as_ref()).map(|_| ());
                    (group.to_vec(), out, res)
                })
                .collect();

            let mut next = Vec::with_capacity(results.len());
            let mut first_err = None;
            for (group, out, res) in results {
                match res {
                    Ok(()) => next.push(out),
                    Err(e) => {
                        next.extend(files_left_behind(group, out));
                        first_err.get_or_insert(e);
                    }
                }
            }
            // A name collision can point a failed group's output at a file
            // that is already listed.
            let mut seen = HashSet::with_capacity(next.len());
            next.retain(|p| seen.insert(p.clone()));
            self.files = next;

            if let Some(e) = first_err {
                return Err(e.into());
            }
            log::info!(
                "pre-merge pass: {} spill files -> {}",
                before,
                self.files.len()
            );
        }
        Ok(())
    }
}

/// Files of a failed group that are still on disk.
///
/// The merge can fail before its output exists, part way through writing
/// it, or while deleting inputs after the output is complete. Listing every
/// surviving path covers all three.
pub(crate) fn files_left_behind(inputs: Vec<PathBuf>, output: PathBuf) -> Vec<PathBuf> {
    let mut left: Vec<PathBuf> = inputs.into_iter().filter(|p| p.exists()).collect();
    if output.exists() && !left.contains(&output) {
        left.push(output);
    }
    left
}
