use crate::*;
use anyhow::Result;
use batch::Batch;
use config::Progress;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn write_batch_sorts_keys() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("sorted.spill");
    let mut batch = Batch::new();
    for k in ["delta", "alpha", "charlie", "bravo", "alpha"] {
        batch.push(k.to_string(), json!(k.len()));
    }

    let written = SpillWriter::write_batch(&path, &batch, None)?;
    assert_eq!(written, 4);

    let keys: Vec<String> = read_all(&path)?.into_iter().map(|r| r.key).collect();
    assert_eq!(keys, vec!["alpha", "bravo", "charlie", "delta"]);
    Ok(())
}

#[test]
fn empty_batch_creates_no_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("empty.spill");
    let written = SpillWriter::write_batch(&path, &Batch::new(), None)?;
    assert_eq!(written, 0);
    assert!(!path.exists());
    Ok(())
}

#[test]
fn create_refuses_existing_path() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("taken.spill");
    std::fs::write(&path, b"precious")?;

    let err = SpillWriter::create(&path, None).err().expect("must fail");
    match err {
        SpillError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::AlreadyExists),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(std::fs::read(&path)?, b"precious");
    Ok(())
}

#[test]
fn append_rejects_unsorted_or_duplicate_keys() -> Result<()> {
    let dir = tempdir()?;
    let mut w = SpillWriter::create(dir.path().join("w.spill"), None)?;
    w.append("b", &[json!(1)])?;

    let err = w.append("a", &[json!(2)]).unwrap_err();
    assert!(matches!(err, SpillError::OutOfOrder { .. }));
    let err = w.append("b", &[json!(3)]).unwrap_err();
    assert!(matches!(err, SpillError::OutOfOrder { .. }));

    w.append("c", &[])?;
    assert_eq!(w.finish()?, 2);
    Ok(())
}

#[test]
fn large_batches_flush_in_chunks_and_tick() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("chunks.spill");
    let ticks = Arc::new(AtomicUsize::new(0));
    let t = ticks.clone();
    let progress = Progress::new(move || {
        t.fetch_add(1, Ordering::SeqCst);
    });

    let mut batch = Batch::new();
    for i in 0..1_000 {
        batch.push(format!("k{:04}", i), json!("v".repeat(50)));
    }
    SpillWriter::write_batch(&path, &batch, Some(&progress))?;

    let size = std::fs::metadata(&path)?.len() as usize;
    let expected_flushes = size / (WRITE_FLUSH_BYTES + 100);
    assert!(
        ticks.load(Ordering::SeqCst) >= expected_flushes.max(1),
        "expected at least {} ticks for {} bytes",
        expected_flushes,
        size
    );
    assert_eq!(read_all(&path)?.len(), 1_000);
    Ok(())
}

#[test]
fn small_batch_does_not_tick() -> Result<()> {
    let dir = tempdir()?;
    let ticks = Arc::new(AtomicUsize::new(0));
    let t = ticks.clone();
    let progress = Progress::new(move || {
        t.fetch_add(1, Ordering::SeqCst);
    });

    let mut batch = Batch::new();
    batch.push("a".into(), json!(1));
    SpillWriter::write_batch(dir.path().join("s.spill"), &batch, Some(&progress))?;
    assert_eq!(ticks.load(Ordering::SeqCst), 0);
    Ok(())
}
