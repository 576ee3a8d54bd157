//! Record codec for spill files.
//!
//! One record per distinct key, concatenated with no separator between
//! records:
//!
//! ```text
//! <body_len>|<key_len>|<key>|<json array of values>
//! \________/ \___________________________________/
//!   header                  body
//! ```
//!
//! Both lengths are decimal ASCII and both are measured in UTF-8 bytes:
//! `body_len` covers everything after the first `|`, `key_len` covers the
//! key alone. The body's JSON is the whole value group as one array.

use serde::Deserialize;
use serde_json::Value;

use crate::{Result, SpillError};

/// Size of the fixed read buffer used by the streaming reader (16 KiB).
pub const READ_BUFFER_BYTES: usize = 16 * 1024;

/// Pending output is written to disk once it grows past this many bytes.
pub const WRITE_FLUSH_BYTES: usize = 16_000;

/// Field separator.
pub const SEPARATOR: u8 = b'|';

/// Longest accepted length prefix; `u64::MAX` has 20 decimal digits.
const MAX_PREFIX_DIGITS: usize = 20;

/// One decoded `(key, value group)` record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: String,
    pub values: Vec<Value>,
}

impl Record {
    pub fn new(key: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            key: key.into(),
            values,
        }
    }
}

/// Appends the encoded form of `(key, values)` to `out`.
pub fn encode_record(key: &str, values: &[Value], out: &mut Vec<u8>) -> Result<()> {
    let json = serde_json::to_vec(values).map_err(|source| SpillError::Encode {
        key: key.to_string(),
        source,
    })?;

    let key_len = key.len().to_string();
    let body_len = key_len.len() + 1 + key.len() + 1 + json.len();

    out.extend_from_slice(body_len.to_string().as_bytes());
    out.push(SEPARATOR);
    out.extend_from_slice(key_len.as_bytes());
    out.push(SEPARATOR);
    out.extend_from_slice(key.as_bytes());
    out.push(SEPARATOR);
    out.extend_from_slice(&json);
    Ok(())
}

/// Parses a `<digits>|` prefix at the start of `buf`.
///
/// Returns `(value, prefix_len)` where `prefix_len` includes the separator.
/// `offset` is only used to locate errors.
pub fn parse_length_prefix(buf: &[u8], offset: u64) -> Result<(usize, usize)> {
    let window = &buf[..buf.len().min(MAX_PREFIX_DIGITS + 1)];
    let sep = window
        .iter()
        .position(|&b| b == SEPARATOR)
        .ok_or_else(|| corrupt(offset, "missing length separator"))?;
    let digits = &window[..sep];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(corrupt(offset, "length prefix is not a decimal number"));
    }
    // Only ASCII digits past this point, so both conversions succeed unless
    // the number overflows usize.
    let value = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| corrupt(offset, "length prefix overflows"))?;
    Ok((value, sep + 1))
}

/// Decodes a record body (everything after the outer `<body_len>|` header).
pub fn decode_body(body: &[u8], offset: u64) -> Result<Record> {
    let (key_len, header) = parse_length_prefix(body, offset)?;
    let key_end = header
        .checked_add(key_len)
        .filter(|&end| end < body.len())
        .ok_or_else(|| corrupt(offset, "key runs past end of record"))?;
    if body[key_end] != SEPARATOR {
        return Err(corrupt(offset, "missing separator after key"));
    }

    let key = std::str::from_utf8(&body[header..key_end])
        .map_err(|_| corrupt(offset, "key is not valid UTF-8"))?
        .to_string();
    let values = decode_values(&body[key_end + 1..])
        .map_err(|source| SpillError::Decode { offset, source })?;

    Ok(Record { key, values })
}

/// Parses a JSON array of values at any nesting depth.
///
/// The serializer puts no bound on depth, so neither does the reader:
/// serde_json's recursion limit is lifted and `serde_stacker` grows the
/// stack on demand instead.
fn decode_values(json: &[u8]) -> serde_json::Result<Vec<Value>> {
    let mut de = serde_json::Deserializer::from_slice(json);
    de.disable_recursion_limit();
    let values = Vec::<Value>::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(values)
}

/// Decodes the record starting at `buf[0]`, which must hold all of it.
///
/// Returns the record and the number of bytes it occupied.
pub fn decode_record(buf: &[u8], offset: u64) -> Result<(Record, usize)> {
    let (body_len, header) = parse_length_prefix(buf, offset)?;
    let total = header + body_len;
    if total > buf.len() {
        return Err(corrupt(offset, "record is truncated"));
    }
    let record = decode_body(&buf[header..total], offset)?;
    Ok((record, total))
}

pub(crate) fn corrupt(offset: u64, reason: &str) -> SpillError {
    SpillError::Corrupt {
        offset,
        reason: reason.to_string(),
    }
}
