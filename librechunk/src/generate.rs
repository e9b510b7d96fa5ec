//! Synthetic input for benchmark runs.
//!
//! The extent is tiled with records of a fixed shape on a lattice anchored at
//! `record_offset`; tiles on the dataset border are clipped. Every element's
//! bytes depend only on its global row-major index, so any assembled chunk can
//! be checked against [`expected_element`].

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{ConfigError, RechunkError};
use crate::geometry::{ChunkGrid, HyperRectangle};
use crate::record::{Record, write_records};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSpec {
    pub global_extent: Vec<i64>,
    /// Any point of the record lattice; need not lie inside the extent.
    pub record_offset: Vec<i64>,
    pub record_shape: Vec<i64>,
    pub element_size: usize,
    /// Number of record files; tiles are dealt round-robin.
    pub files: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateSummary {
    pub files: Vec<PathBuf>,
    pub records: u64,
    pub bytes: u64,
}

/// Name of the `index`-th generated record file.
pub fn record_file_name(index: usize) -> String {
    format!("records-{index:05}")
}

/// Row-major index of `coordinate` in a dataset of `extent`.
pub fn global_linear_index(coordinate: &[i64], extent: &[i64]) -> u64 {
    coordinate
        .iter()
        .zip(extent)
        .fold(0u64, |acc, (&c, &e)| acc * e as u64 + c as u64)
}

/// Bytes of the element at global row-major `index`.
pub fn expected_element(index: u64, element_size: usize) -> Vec<u8> {
    (0..element_size as u64)
        .map(|k| (index.wrapping_mul(31).wrapping_add(k * 7) % 251) as u8)
        .collect()
}

/// Payload of the record covering `bbox`.
pub fn record_payload(bbox: &HyperRectangle, extent: &[i64], element_size: usize) -> Vec<u8> {
    let dims = bbox.dimensions();
    let mut payload = Vec::with_capacity(bbox.volume() as usize * element_size);
    let mut coordinate = bbox.offset().to_vec();
    for _ in 0..bbox.volume() {
        payload.extend(expected_element(
            global_linear_index(&coordinate, extent),
            element_size,
        ));
        for axis in (0..dims).rev() {
            coordinate[axis] += 1;
            if coordinate[axis] < bbox.end(axis) {
                break;
            }
            coordinate[axis] = bbox.offset()[axis];
        }
    }
    payload
}

impl DatasetSpec {
    /// The record boxes, row-major, clipped to the extent.
    pub fn tiles(&self) -> Result<Vec<HyperRectangle>, ConfigError> {
        if self.element_size == 0 {
            return Err(ConfigError::ZeroCount("ElementSize"));
        }
        if self.files == 0 {
            return Err(ConfigError::ZeroCount("files"));
        }
        if self.record_shape.len() != self.record_offset.len() {
            return Err(ConfigError::DimensionMismatch {
                name: "RecordShape",
                expected: self.record_offset.len(),
                actual: self.record_shape.len(),
            });
        }
        // pull the lattice anchor down to the first tile touching the origin
        let base: Vec<i64> = self
            .record_offset
            .iter()
            .zip(&self.record_shape)
            .map(|(&o, &s)| {
                let r = o.rem_euclid(s.max(1));
                if r > 0 { r - s } else { 0 }
            })
            .collect();
        let lattice = ChunkGrid::new(
            self.global_extent.clone(),
            base,
            self.record_shape.clone(),
        )?;
        Ok(lattice
            .iter()
            .filter_map(|tile| {
                let (offset, length): (Vec<i64>, Vec<i64>) = (0..tile.dimensions())
                    .map(|axis| {
                        let lo = tile.offset()[axis].max(0);
                        (lo, tile.end(axis) - lo)
                    })
                    .unzip();
                HyperRectangle::new(offset, length).ok()
            })
            .collect())
    }
}

/// Writes the dataset described by `spec` into `dir`.
pub async fn write_dataset(dir: &Path, spec: &DatasetSpec) -> Result<GenerateSummary, RechunkError> {
    let tiles = spec.tiles()?;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| RechunkError::io(dir, e))?;

    let mut per_file: Vec<Vec<Record>> = vec![Vec::new(); spec.files];
    for (i, tile) in tiles.into_iter().enumerate() {
        let payload = record_payload(&tile, &spec.global_extent, spec.element_size);
        per_file[i % spec.files].push(Record::new(tile, payload));
    }

    let mut summary = GenerateSummary::default();
    for (index, records) in per_file.iter().enumerate() {
        let path = dir.join(record_file_name(index));
        write_records(&path, records).await?;
        summary.records += records.len() as u64;
        summary.bytes += records.iter().map(|r| r.payload().len() as u64).sum::<u64>();
        summary.files.push(path);
    }
    info!(
        files = summary.files.len(),
        records = summary.records,
        bytes = summary.bytes,
        "dataset written"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{intersect, volume};
    use crate::record::read_entries;

    fn spec(extent: &[i64], offset: &[i64], shape: &[i64]) -> DatasetSpec {
        DatasetSpec {
            global_extent: extent.to_vec(),
            record_offset: offset.to_vec(),
            record_shape: shape.to_vec(),
            element_size: 2,
            files: 3,
        }
    }

    #[test]
    fn test_tiles_cover_extent_once() {
        let s = spec(&[10, 7], &[3, 5], &[4, 4]);
        let tiles = s.tiles().unwrap();
        let total: u64 = tiles.iter().map(|t| t.volume()).sum();
        assert_eq!(total, volume(&[10, 7]));
        for (i, a) in tiles.iter().enumerate() {
            for b in &tiles[i + 1..] {
                assert!(intersect(a, b).is_none());
            }
        }
        // anchored at 3 on axis 0: the first tile is clipped to rows 0..3
        assert_eq!(tiles[0].offset(), &[0, 0]);
        assert_eq!(tiles[0].length(), &[3, 1]);
    }

    #[test]
    fn test_record_payload_follows_global_index() {
        let bbox = HyperRectangle::new(vec![1, 2], vec![2, 2]).unwrap();
        let payload = record_payload(&bbox, &[4, 5], 1);
        let expected: Vec<u8> = [7u64, 8, 12, 13]
            .iter()
            .flat_map(|&i| expected_element(i, 1))
            .collect();
        assert_eq!(payload, expected);
    }

    #[test]
    fn test_invalid_spec() {
        let mut s = spec(&[8], &[0], &[4]);
        s.files = 0;
        assert_eq!(s.tiles(), Err(ConfigError::ZeroCount("files")));
        let s = spec(&[8, 8], &[0], &[4, 4]);
        assert!(s.tiles().is_err());
    }

    #[tokio::test]
    async fn test_write_dataset() {
        let tmp = tempfile::tempdir().unwrap();
        let s = spec(&[8, 8], &[0, 0], &[2, 8]);
        let summary = write_dataset(tmp.path(), &s).await.unwrap();
        assert_eq!(summary.files.len(), 3);
        assert_eq!(summary.records, 4);
        assert_eq!(summary.bytes, 128);

        let first = read_entries(&summary.files[0]).await.unwrap();
        let keys: Vec<_> = first.iter().map(|e| e.key_str().unwrap().to_string()).collect();
        assert_eq!(keys, vec!["(0,0)(2,8)", "(6,0)(2,8)"]);
    }
}
