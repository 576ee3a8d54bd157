use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::format::{corrupt, decode_body, parse_length_prefix, Record, READ_BUFFER_BYTES};
use crate::Result;

/// Forward-only reader that decodes one record at a time from a spill file.
///
/// Each call to [`next_record`](RecordReader::next_record) reads up to
/// [`READ_BUFFER_BYTES`] from the current offset into a fixed buffer. A record
/// longer than that is re-read in full into a one-off buffer sized exactly to
/// it, so records of any length are supported without growing the fixed one.
///
/// The file handle is released exactly once: on end of stream, on the first
/// error, or on drop, whichever comes first. After that every call returns
/// `Ok(None)`.
pub struct RecordReader {
    path: PathBuf,
    file: Option<File>,
    buf: Box<[u8]>,
    offset: u64,
    /// Fetched on the first read and cached.
    file_size: Option<u64>,
}

impl RecordReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(Self {
            path,
            file: Some(file),
            buf: vec![0u8; READ_BUFFER_BYTES].into_boxed_slice(),
            offset: 0,
            file_size: None,
        })
    }

    /// Returns the next record, or `None` once the file is exhausted.
    ///
    /// # Errors
    ///
    /// I/O failures, framing corruption and malformed JSON are returned as
    /// errors; the handle is closed before the error propagates.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        let result = self.read_next();
        match &result {
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => self.close(),
        }
        result
    }

    fn read_next(&mut self) -> Result<Option<Record>> {
        let offset = self.offset;
        let file = match self.file.as_mut() {
            Some(f) => f,
            None => return Ok(None),
        };

        let file_size = match self.file_size {
            Some(size) => size,
            None => {
                let size = file.metadata()?.len();
                self.file_size = Some(size);
                size
            }
        };

        file.seek(SeekFrom::Start(offset))?;
        let n = read_fill(file, &mut self.buf)?;
        if n == 0 {
            return Ok(None);
        }

        let (body_len, header) = parse_length_prefix(&self.buf[..n], offset)?;
        let total = header
            .checked_add(body_len)
            .ok_or_else(|| corrupt(offset, "record length overflows"))?;
        if offset + total as u64 > file_size {
            return Err(corrupt(offset, "record runs past end of file"));
        }

        let record = if total <= n {
            decode_body(&self.buf[header..total], offset)?
        } else {
            // Oversized record: read it whole from the same offset.
            let mut big = vec![0u8; total];
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut big)?;
            decode_body(&big[header..], offset)?
        };

        self.offset = offset + total as u64;
        Ok(Some(record))
    }

    fn close(&mut self) {
        if self.file.take().is_some() {
            log::trace!("closed spill reader {} at offset {}", self.path.display(), self.offset);
        }
    }

    /// Returns `true` once the underlying handle has been released.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Byte offset of the next record.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for RecordReader {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Reads every record in `path` into memory.
pub fn read_all<P: AsRef<Path>>(path: P) -> Result<Vec<Record>> {
    RecordReader::open(path)?.collect()
}

/// Reads until `buf` is full or the file ends. Returns the bytes read.
fn read_fill<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
