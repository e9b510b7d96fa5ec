//! N-dimensional geometry for rechunking.
//!
//! Responsibilities:
//! - Axis-aligned boxes in global coordinates and the operations the split
//!   path needs: intersection, offset translation and volume.
//! - The regular chunk grid: row-major iteration, chunk numbering and its
//!   inverse (`grid`).
//! - Strided copies between row-major flat buffers (`copy`).
//!
//! All coordinates are `i64`; a box is non-degenerate when every length is
//! positive. Degenerate boxes never intersect anything.
pub mod copy;
pub mod grid;

use std::fmt;

use crate::error::FormatError;
use crate::key;

pub use copy::{embed_sub_block, extract_sub_block};
pub use grid::{ChunkGrid, ChunkId, ChunkIter};

/// Axis-aligned box: `offset[i] .. offset[i] + length[i]` on every axis.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HyperRectangle {
    offset: Vec<i64>,
    length: Vec<i64>,
}

impl HyperRectangle {
    pub fn new(offset: Vec<i64>, length: Vec<i64>) -> Result<Self, FormatError> {
        if offset.len() != length.len() {
            return Err(FormatError::LengthMismatch {
                offset: offset.len(),
                length: length.len(),
            });
        }
        Ok(Self { offset, length })
    }

    /// Parses a `(o...)(l...)` key.
    pub fn from_key(text: &str) -> Result<Self, FormatError> {
        let (offset, length) = key::decode(text)?;
        Ok(Self { offset, length })
    }

    pub fn to_key(&self) -> String {
        key::encode(&self.offset, &self.length)
    }

    pub fn offset(&self) -> &[i64] {
        &self.offset
    }

    pub fn length(&self) -> &[i64] {
        &self.length
    }

    pub fn dimensions(&self) -> usize {
        self.offset.len()
    }

    /// Exclusive upper bound on `axis`.
    pub fn end(&self, axis: usize) -> i64 {
        self.offset[axis] + self.length[axis]
    }

    /// True when every upper bound is representable, i.e. [`end`](Self::end)
    /// cannot overflow.
    pub fn has_finite_ends(&self) -> bool {
        self.offset
            .iter()
            .zip(&self.length)
            .all(|(o, l)| o.checked_add(*l).is_some())
    }

    pub fn is_degenerate(&self) -> bool {
        self.length.iter().any(|&l| l <= 0)
    }

    pub fn volume(&self) -> u64 {
        volume(&self.length)
    }

    pub fn intersect(&self, other: &HyperRectangle) -> Option<HyperRectangle> {
        intersect(self, other)
    }

    /// `self.offset - reference.offset`, per axis.
    pub fn relative_offset(&self, reference: &HyperRectangle) -> Vec<i64> {
        relative_offset(self, reference)
    }

    pub fn contains(&self, other: &HyperRectangle) -> bool {
        self.dimensions() == other.dimensions()
            && !other.is_degenerate()
            && (0..self.dimensions())
                .all(|i| other.offset[i] >= self.offset[i] && other.end(i) <= self.end(i))
    }
}

impl fmt::Display for HyperRectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_key())
    }
}

/// Product of all lengths. Any non-positive length yields 0.
pub fn volume(length: &[i64]) -> u64 {
    if length.iter().any(|&l| l <= 0) {
        return 0;
    }
    length.iter().map(|&l| l as u64).product()
}

/// [`volume`], or `None` when the product does not fit in a `u64`.
pub fn checked_volume(length: &[i64]) -> Option<u64> {
    if length.iter().any(|&l| l <= 0) {
        return Some(0);
    }
    length
        .iter()
        .try_fold(1u64, |acc, &l| acc.checked_mul(l as u64))
}

/// Overlap of two boxes, or `None` when they are disjoint on at least one
/// axis, have different dimensionality, or either one is degenerate.
pub fn intersect(a: &HyperRectangle, b: &HyperRectangle) -> Option<HyperRectangle> {
    if a.dimensions() != b.dimensions() || a.dimensions() == 0 {
        return None;
    }
    let mut offset = Vec::with_capacity(a.dimensions());
    let mut length = Vec::with_capacity(a.dimensions());
    for i in 0..a.dimensions() {
        let lo = a.offset[i].max(b.offset[i]);
        let hi = a.end(i).min(b.end(i));
        if lo >= hi {
            return None;
        }
        offset.push(lo);
        length.push(hi - lo);
    }
    Some(HyperRectangle { offset, length })
}

pub fn relative_offset(target: &HyperRectangle, reference: &HyperRectangle) -> Vec<i64> {
    target
        .offset
        .iter()
        .zip(&reference.offset)
        .map(|(t, r)| t - r)
        .collect()
}
