//! Regular chunk grid over the global extent.

use super::HyperRectangle;
use crate::error::ConfigError;

/// Row-major linear index of a chunk in its grid.
pub type ChunkId = u64;

/// The lattice of chunks spanning `base .. extent` in steps of `shape`.
///
/// Chunks on the upper boundary are trimmed to the extent, so every chunk box
/// lies inside the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkGrid {
    extent: Vec<i64>,
    base: Vec<i64>,
    shape: Vec<i64>,
    /// Number of chunks per axis.
    grid_size: Vec<u64>,
    /// Row-major strides over `grid_size`.
    grid_stride: Vec<u64>,
    num_chunks: u64,
}

impl ChunkGrid {
    pub fn new(extent: Vec<i64>, base: Vec<i64>, shape: Vec<i64>) -> Result<Self, ConfigError> {
        if extent.is_empty() {
            return Err(ConfigError::EmptyVector {
                name: "GlobalExtent",
            });
        }
        let dims = extent.len();
        for (name, v) in [("ChunkOffsetBase", &base), ("ChunkShape", &shape)] {
            if v.len() != dims {
                return Err(ConfigError::DimensionMismatch {
                    name,
                    expected: dims,
                    actual: v.len(),
                });
            }
        }
        for (name, v) in [("GlobalExtent", &extent), ("ChunkShape", &shape)] {
            if let Some((axis, &value)) = v.iter().enumerate().find(|(_, x)| **x <= 0) {
                return Err(ConfigError::NonPositive { name, axis, value });
            }
        }

        let mut grid_size = Vec::with_capacity(dims);
        for axis in 0..dims {
            if base[axis] >= extent[axis] {
                return Err(ConfigError::BaseOutOfRange {
                    axis,
                    base: base[axis],
                    extent: extent[axis],
                });
            }
            let span = extent[axis]
                .checked_sub(base[axis])
                .ok_or_else(|| ConfigError::GridTooLarge(format!("axis {axis}")))?;
            grid_size.push((span as u64).div_ceil(shape[axis] as u64));
        }

        let mut grid_stride = vec![1u64; dims];
        for axis in (0..dims - 1).rev() {
            grid_stride[axis] = grid_stride[axis + 1]
                .checked_mul(grid_size[axis + 1])
                .ok_or_else(|| ConfigError::GridTooLarge(format!("{grid_size:?}")))?;
        }
        let num_chunks = grid_stride[0]
            .checked_mul(grid_size[0])
            .ok_or_else(|| ConfigError::GridTooLarge(format!("{grid_size:?}")))?;

        Ok(Self {
            extent,
            base,
            shape,
            grid_size,
            grid_stride,
            num_chunks,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.extent.len()
    }

    pub fn extent(&self) -> &[i64] {
        &self.extent
    }

    pub fn base(&self) -> &[i64] {
        &self.base
    }

    pub fn shape(&self) -> &[i64] {
        &self.shape
    }

    pub fn grid_size(&self) -> &[u64] {
        &self.grid_size
    }

    pub fn num_chunks(&self) -> u64 {
        self.num_chunks
    }

    /// Every chunk of the grid in row-major order, last axis fastest.
    /// Each call starts a fresh sequence.
    pub fn iter(&self) -> ChunkIter<'_> {
        ChunkIter::new(self, vec![0; self.dimensions()], self.grid_size.clone())
    }

    /// The chunks of [`iter`](Self::iter) that intersect `region`, in the same
    /// order, without visiting the rest of the grid.
    pub fn overlapping(&self, region: &HyperRectangle) -> ChunkIter<'_> {
        let dims = self.dimensions();
        if region.dimensions() != dims || region.is_degenerate() {
            return ChunkIter::empty(self);
        }
        let mut lo = Vec::with_capacity(dims);
        let mut hi = Vec::with_capacity(dims);
        for axis in 0..dims {
            let start = region.offset()[axis].max(self.base[axis]);
            let end = region.end(axis).min(self.extent[axis]);
            if start >= end {
                return ChunkIter::empty(self);
            }
            lo.push(((start - self.base[axis]) / self.shape[axis]) as u64);
            hi.push(((end - 1 - self.base[axis]) / self.shape[axis]) as u64 + 1);
        }
        ChunkIter::new(self, lo, hi)
    }

    /// Linear id of a chunk coordinate. The coordinate's offset must lie on
    /// the lattice and inside the grid.
    pub fn chunk_id_of(&self, coordinate: &HyperRectangle) -> ChunkId {
        self.chunk_id_of_offset(coordinate.offset())
    }

    pub fn chunk_id_of_offset(&self, offset: &[i64]) -> ChunkId {
        debug_assert_eq!(offset.len(), self.dimensions());
        (0..self.dimensions())
            .map(|axis| {
                let index = (offset[axis] - self.base[axis]) / self.shape[axis];
                debug_assert!(index >= 0 && (index as u64) < self.grid_size[axis]);
                index as u64 * self.grid_stride[axis]
            })
            .sum()
    }

    /// Inverse of [`chunk_id_of`](Self::chunk_id_of).
    pub fn chunk_at(&self, id: ChunkId) -> Option<HyperRectangle> {
        if id >= self.num_chunks {
            return None;
        }
        let index: Vec<u64> = (0..self.dimensions())
            .map(|axis| (id / self.grid_stride[axis]) % self.grid_size[axis])
            .collect();
        Some(self.chunk_box(&index))
    }

    fn chunk_box(&self, index: &[u64]) -> HyperRectangle {
        let mut offset = Vec::with_capacity(index.len());
        let mut length = Vec::with_capacity(index.len());
        for (axis, &i) in index.iter().enumerate() {
            let o = self.base[axis] + i as i64 * self.shape[axis];
            offset.push(o);
            length.push(self.shape[axis].min(self.extent[axis] - o));
        }
        HyperRectangle { offset, length }
    }
}

/// Lazy row-major walk over a rectangular range of grid indices.
pub struct ChunkIter<'a> {
    grid: &'a ChunkGrid,
    lo: Vec<u64>,
    hi: Vec<u64>,
    current: Option<Vec<u64>>,
}

impl<'a> ChunkIter<'a> {
    fn new(grid: &'a ChunkGrid, lo: Vec<u64>, hi: Vec<u64>) -> Self {
        let current = if lo.iter().zip(&hi).all(|(l, h)| l < h) {
            Some(lo.clone())
        } else {
            None
        };
        Self {
            grid,
            lo,
            hi,
            current,
        }
    }

    fn empty(grid: &'a ChunkGrid) -> Self {
        Self {
            grid,
            lo: Vec::new(),
            hi: Vec::new(),
            current: None,
        }
    }
}

impl Iterator for ChunkIter<'_> {
    type Item = HyperRectangle;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.current.as_mut()?;
        let chunk = self.grid.chunk_box(index);

        let mut exhausted = true;
        for axis in (0..index.len()).rev() {
            index[axis] += 1;
            if index[axis] < self.hi[axis] {
                exhausted = false;
                break;
            }
            index[axis] = self.lo[axis];
        }
        if exhausted {
            self.current = None;
        }
        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::intersect;
    use std::collections::HashSet;

    fn rect(offset: &[i64], length: &[i64]) -> HyperRectangle {
        HyperRectangle::new(offset.to_vec(), length.to_vec()).unwrap()
    }

    #[test]
    fn test_iterate_two_by_two() {
        let grid = ChunkGrid::new(vec![64, 64], vec![0, 0], vec![32, 32]).unwrap();
        let chunks: Vec<_> = grid.iter().collect();
        let offsets: Vec<_> = chunks.iter().map(|c| c.offset().to_vec()).collect();
        assert_eq!(
            offsets,
            vec![vec![0, 0], vec![0, 32], vec![32, 0], vec![32, 32]]
        );
        let ids: Vec<_> = chunks.iter().map(|c| grid.chunk_id_of(c)).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(grid.num_chunks(), 4);
        // restartable
        assert_eq!(grid.iter().count(), 4);
    }

    #[test]
    fn test_boundary_chunks_are_trimmed() {
        let grid = ChunkGrid::new(vec![32, 64, 128], vec![0, 0, 0], vec![32, 64, 48]).unwrap();
        let chunks: Vec<_> = grid.iter().collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].offset(), &[0, 0, 96]);
        assert_eq!(chunks[2].length(), &[32, 64, 32]);
        let total: u64 = chunks.iter().map(|c| c.volume()).sum();
        assert_eq!(total, 32 * 64 * 128);
    }

    #[test]
    fn test_nonzero_base() {
        let grid = ChunkGrid::new(vec![10], vec![-3], vec![4]).unwrap();
        let chunks: Vec<_> = grid.iter().collect();
        assert_eq!(grid.grid_size(), &[4]);
        assert_eq!(chunks[0].offset(), &[-3]);
        assert_eq!(chunks[3].offset(), &[9]);
        assert_eq!(chunks[3].length(), &[1]);
        assert_eq!(grid.chunk_id_of(&chunks[2]), 2);
    }

    #[test]
    fn test_chunk_id_is_a_bijection() {
        let grid = ChunkGrid::new(vec![17, 9, 30], vec![1, 0, 2], vec![5, 4, 7]).unwrap();
        let ids: Vec<_> = grid.iter().map(|c| grid.chunk_id_of(&c)).collect();
        let unique: HashSet<_> = ids.iter().copied().collect();
        assert_eq!(ids.len() as u64, grid.num_chunks());
        assert_eq!(unique.len(), ids.len());
        assert_eq!(unique, (0..grid.num_chunks()).collect::<HashSet<_>>());
        // row-major order means ids come out sorted
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        for chunk in grid.iter() {
            assert_eq!(grid.chunk_at(grid.chunk_id_of(&chunk)), Some(chunk));
        }
        assert_eq!(grid.chunk_at(grid.num_chunks()), None);
    }

    #[test]
    fn test_overlapping_matches_exhaustive_scan() {
        let grid = ChunkGrid::new(vec![40, 33, 12], vec![0, -5, 0], vec![8, 10, 5]).unwrap();
        let regions = [
            rect(&[3, 3, 3], &[20, 20, 5]),
            rect(&[-10, -10, -10], &[100, 100, 100]),
            rect(&[39, 27, 11], &[1, 1, 1]),
            rect(&[40, 0, 0], &[5, 5, 5]),
            rect(&[0, 0, 0], &[5, 0, 5]),
        ];
        for region in &regions {
            let expected: Vec<_> = grid
                .iter()
                .filter(|c| intersect(c, region).is_some())
                .collect();
            let fast: Vec<_> = grid.overlapping(region).collect();
            assert_eq!(fast, expected, "region {region}");
        }
    }

    #[test]
    fn test_rejects_bad_configuration() {
        assert_eq!(
            ChunkGrid::new(vec![], vec![], vec![]),
            Err(ConfigError::EmptyVector {
                name: "GlobalExtent"
            })
        );
        assert_eq!(
            ChunkGrid::new(vec![4, 4], vec![0], vec![2, 2]),
            Err(ConfigError::DimensionMismatch {
                name: "ChunkOffsetBase",
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(
            ChunkGrid::new(vec![4, 4], vec![0, 0], vec![2, 0]),
            Err(ConfigError::NonPositive {
                name: "ChunkShape",
                axis: 1,
                value: 0
            })
        );
        assert!(matches!(
            ChunkGrid::new(vec![4], vec![4], vec![2]),
            Err(ConfigError::BaseOutOfRange { .. })
        ));
    }
}
