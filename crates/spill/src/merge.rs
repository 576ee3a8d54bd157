//! K-way merge over sorted spill files.
//!
//! Produces one `(key, values)` record per distinct key in ascending key
//! order. When the same key is present in several sources, their value
//! groups are concatenated in source order (the order of the input paths),
//! and every source positioned on that key is advanced.
//!
//! The same merge feeds two sinks: [`merge_files`] writes the result to a
//! new spill file (used by cascading pre-merges), while the engine's
//! terminal reduce pass pulls records straight from [`KWayMerge`].

use config::Progress;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::format::{corrupt, Record};
use crate::{RecordReader, Result, SpillWriter};

/// Current key of one source, ordered for a min-heap.
struct HeapEntry {
    key: String,
    /// Index into `readers` / `pending`.
    source: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.source == other.source
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the smallest key pops first,
        // and on equal keys the lower source index pops first.
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.source.cmp(&self.source))
    }
}

/// Streaming merge of N sorted spill files.
pub struct KWayMerge {
    readers: Vec<RecordReader>,
    /// Value group of each source's current record; `None` once consumed.
    pending: Vec<Option<Vec<Value>>>,
    heap: BinaryHeap<HeapEntry>,
    progress: Option<Progress>,
}

impl KWayMerge {
    /// Opens one reader per path and primes each with its first record.
    pub fn open(paths: &[PathBuf], progress: Option<Progress>) -> Result<Self> {
        let readers = paths
            .iter()
            .map(RecordReader::open)
            .collect::<Result<Vec<_>>>()?;

        let mut merge = Self {
            pending: vec![None; readers.len()],
            heap: BinaryHeap::with_capacity(readers.len()),
            readers,
            progress,
        };
        for source in 0..merge.readers.len() {
            merge.advance(source, None)?;
        }
        Ok(merge)
    }

    /// Reads the next record of `source` into the heap. `after` is the key
    /// just consumed from it; the next key must sort strictly after it.
    fn advance(&mut self, source: usize, after: Option<&str>) -> Result<()> {
        let reader = &mut self.readers[source];
        if let Some(rec) = reader.next_record()? {
            if let Some(prev) = after {
                if rec.key.as_str() <= prev {
                    return Err(corrupt(
                        reader.offset(),
                        &format!(
                            "{} is not sorted: {:?} follows {:?}",
                            reader.path().display(),
                            rec.key,
                            prev
                        ),
                    ));
                }
            }
            self.pending[source] = Some(rec.values);
            self.heap.push(HeapEntry {
                key: rec.key,
                source,
            });
        }
        Ok(())
    }

    /// Returns the next merged record, or `None` when every source is
    /// exhausted.
    pub fn next_group(&mut self) -> Result<Option<Record>> {
        let top = match self.heap.pop() {
            Some(e) => e,
            None => return Ok(None),
        };
        Progress::tick_opt(self.progress.as_ref());

        let key = top.key;
        let mut values = self.pending[top.source].take().unwrap_or_default();
        self.advance(top.source, Some(&key))?;

        // Every other source sitting on the same key, in source order.
        while self.heap.peek().is_some_and(|e| e.key == key) {
            let Some(dup) = self.heap.pop() else { break };
            if let Some(more) = self.pending[dup.source].take() {
                values.extend(more);
            }
            self.advance(dup.source, Some(&key))?;
        }

        Ok(Some(Record { key, values }))
    }

    /// Collects all remaining records into a `Vec`.
    pub fn collect_all(&mut self) -> Result<Vec<Record>> {
        let mut result = Vec::new();
        while let Some(rec) = self.next_group()? {
            result.push(rec);
        }
        Ok(result)
    }

    /// Number of sources that still hold a current record.
    #[must_use]
    pub fn active_sources(&self) -> usize {
        self.heap.len()
    }
}

/// Merges `inputs` into a new file at `output` and deletes the inputs.
///
/// `output` is created exclusively. The inputs are only removed after the
/// merged file has been fully written; on any error they are left in place.
/// Returns the number of records written.
pub fn merge_files(inputs: &[PathBuf], output: &Path, progress: Option<&Progress>) -> Result<usize> {
    let mut merge = KWayMerge::open(inputs, progress.cloned())?;
    let mut writer = SpillWriter::create(output, progress.cloned())?;
    while let Some(rec) = merge.next_group()? {
        writer.append(&rec.key, &rec.values)?;
    }
    let records = writer.finish()?;
    drop(merge);

    for p in inputs {
        fs::remove_file(p)?;
    }

    log::debug!(
        "merged {} files into {} ({} keys)",
        inputs.len(),
        output.display(),
        records
    );
    Ok(records)
}
