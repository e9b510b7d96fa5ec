//! Records, sub-blocks and the container framing they travel in.
//!
//! Every container file (input record files, chunk artifacts, bypass part
//! files) is a flat sequence of entries:
//!
//! ```text
//! u32 LE key length | key (UTF-8 box key) | u64 LE payload length | payload
//! ```
//!
//! The key has its own length prefix, so it is never recovered by scanning
//! the payload for delimiters.

use std::path::Path;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FormatError, RecordError, RechunkError};
use crate::geometry::{HyperRectangle, checked_volume};

/// One input unit: a box of the global dataset and its row-major payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    bbox: HyperRectangle,
    payload: Bytes,
}

impl Record {
    pub fn new(bbox: HyperRectangle, payload: impl Into<Bytes>) -> Self {
        Self {
            bbox,
            payload: payload.into(),
        }
    }

    /// Builds a record from a container entry and checks it against the grid
    /// dimensionality and element size.
    pub fn from_entry(
        entry: Entry,
        dimensions: usize,
        element_size: usize,
    ) -> Result<Self, RecordError> {
        let key = entry.key_str()?;
        let bbox = HyperRectangle::from_key(key)?;
        if bbox.dimensions() != dimensions {
            return Err(RecordError::Dimensionality {
                key: key.to_string(),
                expected: dimensions,
                actual: bbox.dimensions(),
            });
        }
        // degenerate boxes are valid records with an empty payload
        let volume = if bbox.has_finite_ends() {
            checked_volume(bbox.length())
        } else {
            None
        };
        let expected = volume
            .and_then(|v| usize::try_from(v).ok())
            .and_then(|v| v.checked_mul(element_size))
            .ok_or_else(|| RecordError::Overflow {
                key: key.to_string(),
            })?;
        if entry.payload.len() != expected {
            return Err(RecordError::PayloadSize {
                key: key.to_string(),
                expected,
                actual: entry.payload.len(),
            });
        }
        Ok(Self {
            bbox,
            payload: entry.payload,
        })
    }

    pub fn bbox(&self) -> &HyperRectangle {
        &self.bbox
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

/// The part of one record that falls inside one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubBlock {
    /// Overlap box in global coordinates.
    pub absolute_box: HyperRectangle,
    /// `absolute_box.offset - chunk.offset`.
    pub chunk_relative_offset: Vec<i64>,
    /// Row-major bytes of `absolute_box`.
    pub payload: Bytes,
}

impl SubBlock {
    pub fn key(&self) -> String {
        self.absolute_box.to_key()
    }
}

/// A raw `(key, payload)` container entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Bytes,
    pub payload: Bytes,
}

impl Entry {
    pub fn new(key: impl Into<Bytes>, payload: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
        }
    }

    pub fn key_str(&self) -> Result<&str, FormatError> {
        std::str::from_utf8(&self.key).map_err(|_| FormatError::InvalidUtf8)
    }
}

const KEY_LEN_BYTES: usize = 4;
const PAYLOAD_LEN_BYTES: usize = 8;

/// Length prefix of a key, refusing keys the u32 field cannot hold.
pub fn key_len_prefix(len: usize) -> Result<u32, FormatError> {
    u32::try_from(len).map_err(|_| FormatError::KeyTooLong(len))
}

/// Appends one framed entry to `buf`. Nothing is written on error.
pub fn put_entry(buf: &mut BytesMut, key: &[u8], payload: &[u8]) -> Result<(), FormatError> {
    let key_len = key_len_prefix(key.len())?;
    buf.reserve(KEY_LEN_BYTES + key.len() + PAYLOAD_LEN_BYTES + payload.len());
    buf.put_u32_le(key_len);
    buf.put_slice(key);
    buf.put_u64_le(payload.len() as u64);
    buf.put_slice(payload);
    Ok(())
}

/// Iterates the entries of a container buffer. Stops after the first framing
/// error.
pub struct EntryReader {
    buf: Bytes,
    position: usize,
    failed: bool,
}

impl EntryReader {
    pub fn new(buf: impl Into<Bytes>) -> Self {
        Self {
            buf: buf.into(),
            position: 0,
            failed: false,
        }
    }

    fn take(&mut self, n: usize) -> Result<Bytes, FormatError> {
        if self.buf.remaining() < n {
            return Err(FormatError::Truncated {
                position: self.position,
                needed: n - self.buf.remaining(),
            });
        }
        self.position += n;
        Ok(self.buf.split_to(n))
    }

    fn read_entry(&mut self) -> Result<Entry, FormatError> {
        let key_len = self.take(KEY_LEN_BYTES)?.get_u32_le() as usize;
        let key = self.take(key_len)?;
        let payload_len = self.take(PAYLOAD_LEN_BYTES)?.get_u64_le() as usize;
        let payload = self.take(payload_len)?;
        Ok(Entry { key, payload })
    }
}

impl Iterator for EntryReader {
    type Item = Result<Entry, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || !self.buf.has_remaining() {
            return None;
        }
        let res = self.read_entry();
        self.failed = res.is_err();
        Some(res)
    }
}

/// Reads a whole container file.
pub async fn read_container(path: &Path) -> Result<EntryReader, RechunkError> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| RechunkError::io(path, e))?;
    Ok(EntryReader::new(data))
}

/// Reads every entry of a container file, failing on corrupt framing.
pub async fn read_entries(path: &Path) -> Result<Vec<Entry>, RechunkError> {
    read_container(path)
        .await?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| RechunkError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

/// Writes records into a new container file.
pub async fn write_records(path: &Path, records: &[Record]) -> Result<(), RechunkError> {
    let mut buf = BytesMut::new();
    for r in records {
        let key = r.bbox().to_key();
        put_entry(&mut buf, key.as_bytes(), r.payload()).map_err(|source| RechunkError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
    }
    tokio::fs::write(path, &buf)
        .await
        .map_err(|e| RechunkError::io(path, e))
}
