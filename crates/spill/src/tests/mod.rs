use batch::Batch;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::{encode_record, Result, SpillWriter};

mod format_tests;
mod writer_tests;

/// Helper: build a batch from `(key, value)` pairs and spill it to `dir/name`.
pub(crate) fn write_batch_file(dir: &Path, name: &str, pairs: &[(&str, Value)]) -> Result<PathBuf> {
    let path = dir.join(name);
    let mut batch = Batch::new();
    for (k, v) in pairs {
        batch.push(k.to_string(), v.clone());
    }
    SpillWriter::write_batch(&path, &batch, None)?;
    Ok(path)
}

/// Helper: write records verbatim, bypassing the writer's ordering checks.
pub(crate) fn write_raw(dir: &Path, name: &str, records: &[(&str, Vec<Value>)]) -> Result<PathBuf> {
    let path = dir.join(name);
    let mut buf = Vec::new();
    for (k, vs) in records {
        encode_record(k, vs, &mut buf)?;
    }
    std::fs::write(&path, &buf)?;
    Ok(path)
}
