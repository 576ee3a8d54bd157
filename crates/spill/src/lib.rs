//! # Spill - sorted spill files
//!
//! On-disk half of the map/reduce engine. When the engine's in-memory
//! [`batch::Batch`] reaches its threshold it is written out as a spill file:
//! an immutable run of records sorted by key, one record per distinct key.
//! Spill files are later combined by a [`KWayMerge`], either into another
//! spill file ([`merge_files`]) or straight into the caller's reducer.
//!
//! ## File layout
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ body_len | key_len | key | [v0, v1, ...]                   │
//! │ body_len | key_len | key | [v0, v1, ...]                   │
//! │ ... one record per key, ascending, no separator between ... │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lengths are decimal ASCII, measured in UTF-8 bytes. `body_len` covers
//! everything after its own `|`. There is no header, footer or checksum; a
//! file is valid if it decodes from offset 0 to its exact end.
//!
//! ## Components
//!
//! | Module     | Purpose                                                  |
//! |-----------|----------------------------------------------------------|
//! | `format`  | record encode/decode, length-prefix parsing              |
//! | `reader`  | [`RecordReader`]: forward-only, 16 KiB buffered decoding  |
//! | `writer`  | [`SpillWriter`]: exclusive-create, chunked sorted writes  |
//! | `merge`   | [`KWayMerge`] and [`merge_files`]                        |

mod format;
mod merge;
mod reader;
mod writer;

use std::io;
use thiserror::Error;

pub use format::{
    decode_body, decode_record, encode_record, parse_length_prefix, Record, READ_BUFFER_BYTES,
    SEPARATOR, WRITE_FLUSH_BYTES,
};
pub use merge::{merge_files, KWayMerge};
pub use reader::{read_all, RecordReader};
pub use writer::SpillWriter;

/// Errors raised while writing, reading or merging spill files.
#[derive(Debug, Error)]
pub enum SpillError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The framing of a record is broken: bad length prefix, missing
    /// separator, truncation, or a key that is not UTF-8.
    #[error("corrupt record at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    /// The record framed correctly but its value group is not a JSON array.
    #[error("malformed values at offset {offset}: {source}")]
    Decode {
        offset: u64,
        source: serde_json::Error,
    },

    #[error("cannot encode values for key {key:?}: {source}")]
    Encode {
        key: String,
        source: serde_json::Error,
    },

    #[error("keys out of order: {key:?} appended after {previous:?}")]
    OutOfOrder { previous: String, key: String },
}

pub type Result<T> = std::result::Result<T, SpillError>;

#[cfg(test)]
mod tests;
