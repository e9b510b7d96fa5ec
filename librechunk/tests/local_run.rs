use librechunk::config::{MANIFEST_FILE, RunConfig};
use librechunk::error::{ConfigError, RechunkError};
use librechunk::generate::{DatasetSpec, record_payload, write_dataset};
use librechunk::geometry::{HyperRectangle, embed_sub_block};
use librechunk::record::{Record, write_records};
use librechunk::runner::LocalRunner;
use librechunk::store::{artifact_name, part_name, read_artifact};
use librechunk::Coverage;
use std::path::Path;

const ELEMENT_SIZE: usize = 2;

async fn generate(dir: &Path) {
    let spec = DatasetSpec {
        global_extent: vec![9, 10],
        record_offset: vec![2, 3],
        record_shape: vec![4, 4],
        element_size: ELEMENT_SIZE,
        files: 3,
    };
    write_dataset(dir, &spec).await.unwrap();
}

fn config(input: &Path, output: &Path) -> RunConfig {
    let mut cfg = RunConfig::new(vec![9, 10], vec![0, 0], vec![4, 3], input, output);
    cfg.element_size = ELEMENT_SIZE;
    cfg.worker_count = 3;
    cfg
}

fn rect(offset: &[i64], length: &[i64]) -> HyperRectangle {
    HyperRectangle::new(offset.to_vec(), length.to_vec()).unwrap()
}

#[tokio::test]
async fn test_assembled_chunks_match_the_dataset() {
    let tmp = tempfile::tempdir().unwrap();
    let (input, output) = (tmp.path().join("in"), tmp.path().join("out"));
    generate(&input).await;

    let mut cfg = config(&input, &output);
    cfg.write_enabled = true;
    cfg.checksum = true;
    let grid = cfg.grid().unwrap();
    let summary = LocalRunner::new(cfg).run().await.unwrap();

    assert_eq!(summary.files, 3);
    assert_eq!(summary.stats.skipped_records, 0);
    assert_eq!(summary.chunks() as u64, grid.num_chunks());
    assert_eq!(summary.assembler_invocations, grid.num_chunks());
    assert!(output.join(MANIFEST_FILE).exists());

    for report in &summary.reports {
        assert_eq!(report.coverage, Coverage::Complete);
        assert!(report.checksum.is_some());

        let chunk = grid.chunk_at(report.chunk_id).unwrap();
        let entries = read_artifact(&output.join(artifact_name(report.chunk_id)))
            .await
            .unwrap();
        assert_eq!(entries.len(), report.sub_blocks);

        let mut dense = vec![0u8; chunk.volume() as usize * ELEMENT_SIZE];
        for (key, payload) in &entries {
            let bbox = HyperRectangle::from_key(key).unwrap();
            assert!(chunk.contains(&bbox));
            embed_sub_block(
                payload,
                bbox.length(),
                &mut dense,
                chunk.length(),
                &bbox.relative_offset(&chunk),
                ELEMENT_SIZE,
            );
        }
        assert_eq!(dense, record_payload(&chunk, &[9, 10], ELEMENT_SIZE));
    }
}

#[tokio::test]
async fn test_single_assembler_takes_every_chunk() {
    let tmp = tempfile::tempdir().unwrap();
    let (input, output) = (tmp.path().join("in"), tmp.path().join("out"));
    generate(&input).await;

    let mut cfg = config(&input, &output);
    cfg.single_assembler = true;
    cfg.write_enabled = true;
    let summary = LocalRunner::new(cfg).run().await.unwrap();

    assert_eq!(summary.partitions, 1);
    assert_eq!(summary.assembler_invocations, 1);
    assert_eq!(summary.chunks(), 12);
    let ids: Vec<_> = summary.reports.iter().map(|r| r.chunk_id).collect();
    assert_eq!(ids, (0..12).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_bypass_skips_assembly() {
    let tmp = tempfile::tempdir().unwrap();
    let (input, output) = (tmp.path().join("in"), tmp.path().join("out"));
    generate(&input).await;

    let mut cfg = config(&input, &output);
    cfg.bypass_assembly = true;
    cfg.single_assembler = true;
    let summary = LocalRunner::new(cfg).run().await.unwrap();

    assert_eq!(summary.partitions, 0);
    assert_eq!(summary.assembler_invocations, 0);
    assert!(summary.reports.is_empty());
    assert_eq!(summary.parts, 3);
    assert!(!output.join(artifact_name(0)).exists());

    let mut sub_blocks = 0;
    for index in 0..3 {
        sub_blocks += read_artifact(&output.join(part_name(index)))
            .await
            .unwrap()
            .len() as u64;
    }
    assert_eq!(sub_blocks, summary.stats.sub_blocks);
}

#[tokio::test]
async fn test_validate_only_writes_no_artifacts() {
    let tmp = tempfile::tempdir().unwrap();
    let (input, output) = (tmp.path().join("in"), tmp.path().join("out"));
    generate(&input).await;

    let summary = LocalRunner::new(config(&input, &output)).run().await.unwrap();
    assert_eq!(summary.chunks(), 12);
    assert!(summary.reports.iter().all(|r| !r.persisted));

    let names: Vec<_> = std::fs::read_dir(&output)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(names, vec![MANIFEST_FILE.to_string()]);
}

#[tokio::test]
async fn test_mismatched_record_is_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let (input, output) = (tmp.path().join("in"), tmp.path().join("out"));
    generate(&input).await;
    write_records(
        &input.join("stray"),
        &[
            Record::new(rect(&[0], &[4]), vec![0u8; 8]),
            Record::new(rect(&[0, 0], &[1, 1]), vec![0u8; 3]),
        ],
    )
    .await
    .unwrap();

    let mut cfg = config(&input, &output);
    cfg.write_enabled = true;
    let summary = LocalRunner::new(cfg).run().await.unwrap();
    assert_eq!(summary.files, 4);
    assert_eq!(summary.stats.skipped_records, 2);
    assert!(summary.reports.iter().all(|r| r.coverage == Coverage::Complete));
}

#[tokio::test]
async fn test_invalid_config_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let (input, output) = (tmp.path().join("in"), tmp.path().join("out"));
    generate(&input).await;

    let mut cfg = config(&input, &output);
    cfg.chunk_shape = vec![4, 0];
    let err = LocalRunner::new(cfg).run().await.unwrap_err();
    assert!(matches!(
        err,
        RechunkError::Config(ConfigError::NonPositive {
            name: "ChunkShape",
            axis: 1,
            value: 0
        })
    ));
    assert!(!output.exists());
}

#[tokio::test]
async fn test_missing_input_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = config(&tmp.path().join("nope"), &tmp.path().join("out"));
    let err = LocalRunner::new(cfg).run().await.unwrap_err();
    assert!(matches!(err, RechunkError::Io { .. }));
}
