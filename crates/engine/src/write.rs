/// Map path: `map_value()`, `write_done()`, and the internal `spill()`.
use serde_json::Value;
use spill::SpillWriter;

use crate::{Engine, Error, Lifecycle, Result};

impl Engine {
    /// Buffers one mapped pair.
    ///
    /// When the buffered value count reaches `max_in_memory_records`, the
    /// batch is spilled to a new sorted file before this call returns. The
    /// progress hook is ticked just before and just after the spill.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyFlushed`] once `write_done` has been called.
    /// - A spill error if the batch could not be written. The batch is kept
    ///   in memory so a later call retries the spill.
    pub fn map_value(&mut self, key: impl Into<String>, value: Value) -> Result<()> {
        if self.state != Lifecycle::Accepting {
            return Err(Error::AlreadyFlushed);
        }

        let buffered = self.batch.push(key.into(), value);
        if buffered >= self.cfg.max_in_memory_records {
            self.cfg.tick();
            self.spill()?;
            self.cfg.tick();
        }
        Ok(())
    }

    /// Ends the map phase, spilling anything still buffered.
    ///
    /// Calling it again, or after a reduction, is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a spill error if the final batch could not be written; the
    /// engine then stays `Accepting` with the batch intact.
    pub fn write_done(&mut self) -> Result<()> {
        if self.state != Lifecycle::Accepting {
            return Ok(());
        }
        self.spill()?;
        self.state = Lifecycle::Flushed;
        log::debug!("map phase done: {} spill files", self.files.len());
        Ok(())
    }

    /// Writes the current batch to a fresh spill file and clears it.
    ///
    /// The path is registered only after the file is completely written, so
    /// a half-written file from a failed attempt is never merged.
    pub(crate) fn spill(&mut self) -> Result<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let path = self.cfg.next_spill_path();
        SpillWriter::write_batch(&path, &self.batch, self.cfg.progress.as_ref())?;
        self.files.push(path);
        self.batch.clear();
        Ok(())
    }
}
