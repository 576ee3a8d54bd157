use batch::Batch;
use config::Progress;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::format::{encode_record, WRITE_FLUSH_BYTES};
use crate::{Result, SpillError};

/// Append-only writer for one sorted spill file.
///
/// The file is opened with exclusive-create semantics: if `path` already
/// exists the open fails instead of overwriting it. Encoded records are
/// collected in memory and written out whenever the pending output grows
/// past [`WRITE_FLUSH_BYTES`]; the progress hook is ticked after each such
/// write.
///
/// Keys must be appended in strictly ascending order.
pub struct SpillWriter {
    path: PathBuf,
    file: File,
    buf: Vec<u8>,
    last_key: Option<String>,
    records: usize,
    progress: Option<Progress>,
}

impl SpillWriter {
    /// Creates `path`, failing if it already exists.
    pub fn create<P: AsRef<Path>>(path: P, progress: Option<Progress>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        Ok(Self {
            path,
            file,
            buf: Vec::with_capacity(WRITE_FLUSH_BYTES + 1024),
            last_key: None,
            records: 0,
            progress,
        })
    }

    /// Encodes and buffers one record.
    ///
    /// # Errors
    ///
    /// Returns [`SpillError::OutOfOrder`] if `key` is not strictly greater
    /// than the previously appended key, or an I/O error from a flush.
    pub fn append(&mut self, key: &str, values: &[Value]) -> Result<()> {
        if let Some(prev) = &self.last_key {
            if prev.as_str() >= key {
                return Err(SpillError::OutOfOrder {
                    previous: prev.clone(),
                    key: key.to_string(),
                });
            }
        }

        encode_record(key, values, &mut self.buf)?;
        self.last_key = Some(key.to_string());
        self.records += 1;

        if self.buf.len() > WRITE_FLUSH_BYTES {
            self.flush_buf()?;
            Progress::tick_opt(self.progress.as_ref());
        }
        Ok(())
    }

    fn flush_buf(&mut self) -> Result<()> {
        if !self.buf.is_empty() {
            self.file.write_all(&self.buf)?;
            self.buf.clear();
        }
        Ok(())
    }

    /// Writes any remaining output and closes the file. Returns the number
    /// of records written.
    pub fn finish(mut self) -> Result<usize> {
        self.flush_buf()?;
        self.file.flush()?;
        Ok(self.records)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes every group in `batch`, in ascending key order, to a new file
    /// at `path`.
    ///
    /// An empty batch is a no-op: no file is created and `Ok(0)` is returned.
    pub fn write_batch<P: AsRef<Path>>(
        path: P,
        batch: &Batch,
        progress: Option<&Progress>,
    ) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut writer = Self::create(path, progress.cloned())?;
        for (key, values) in batch.iter() {
            writer.append(key, values)?;
        }
        let path = writer.path.clone();
        let records = writer.finish()?;

        log::debug!(
            "spilled {} keys ({} values) to {}",
            records,
            batch.value_count(),
            path.display()
        );
        Ok(records)
    }
}
