//! Integration tests for saving and loading raw logs
//!
//! Covers the byte-exact save/load round trip, tolerance of noisy files and
//! that loading always goes through the configured decode path.

mod common;

use common::builders::RawLogBuilder;
use common::harness::virtual_controller;
use proptest::prelude::*;
use serialplot_rs::protocol::Framing;
use serialplot_rs::session;
use serialplot_rs::{Ingestor, PipelineConfig, Sample, SeriesStore};
use std::io::Cursor;

#[test]
fn test_load_counts_per_label() {
    let dir = tempfile::tempdir().unwrap();
    let path = RawLogBuilder::new()
        .frames("a", 3)
        .frames("b", 2)
        .write_to(dir.path(), "data.txt");

    let (mut controller, _device) = virtual_controller(PipelineConfig::default());
    controller.load_file(&path).unwrap();

    assert_eq!(controller.store().series_len("a"), 3);
    assert_eq!(controller.store().series_len("b"), 2);
}

#[test]
fn test_save_load_is_byte_exact() {
    let dir = tempfile::tempdir().unwrap();
    let original = RawLogBuilder::new()
        .line("# bench run 3")
        .line("")
        .frame(0.0, "temp", 21.5)
        .raw("###1.0, temp, 22.0###\r\n")
        .line("garbage ### line")
        .frame(2.0, "rpm", 1200.0)
        .raw("###3.0, temp")
        .write_to(dir.path(), "in.txt");

    let (mut controller, _device) = virtual_controller(PipelineConfig::default());
    controller.load_file(&original).unwrap();

    let saved = dir.path().join("out.txt");
    controller.save_raw_log(&saved).unwrap();
    assert_eq!(
        std::fs::read(&saved).unwrap(),
        std::fs::read(&original).unwrap()
    );
}

#[test]
fn test_load_replaces_previous_contents() {
    let dir = tempfile::tempdir().unwrap();
    let first = RawLogBuilder::new()
        .frames("a", 4)
        .write_to(dir.path(), "first.txt");
    let second = RawLogBuilder::new()
        .frames("b", 1)
        .write_to(dir.path(), "second.txt");

    let (mut controller, _device) = virtual_controller(PipelineConfig::default());
    controller.load_file(&first).unwrap();
    controller.load_file(&second).unwrap();

    assert_eq!(controller.store().series_len("a"), 0);
    assert_eq!(controller.store().series_len("b"), 1);
    assert_eq!(controller.store().raw_log_len(), 1);
}

#[test]
fn test_load_missing_file_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = RawLogBuilder::new()
        .frames("a", 2)
        .write_to(dir.path(), "data.txt");

    let (mut controller, _device) = virtual_controller(PipelineConfig::default());
    controller.load_file(&path).unwrap();
    assert!(controller.load_file(dir.path().join("missing.txt")).is_err());
    assert_eq!(controller.store().series_len("a"), 2);
}

#[test]
fn test_load_uses_configured_framing() {
    let text = RawLogBuilder::new()
        .legacy_frame(1.0, "a", 1.0)
        .frame(2.0, "a", 2.0)
        .build();

    let store = SeriesStore::new();
    let summary = session::load(&store, &Ingestor::default(), Cursor::new(text.clone())).unwrap();
    assert_eq!(summary.samples, 1);

    let unchecked = Ingestor::with_framing(Framing::Unchecked);
    let summary = session::load(&store, &unchecked, Cursor::new(text)).unwrap();
    assert_eq!(summary.samples, 1);
    assert_eq!(store.snapshot("a").timestamps, vec![1.0]);
}

#[test]
fn test_load_applies_post_process() {
    let dir = tempfile::tempdir().unwrap();
    let path = RawLogBuilder::new()
        .frame(1500.0, "a", 1.0)
        .write_to(dir.path(), "ms.txt");

    let config = PipelineConfig::default().with_post_process(|mut s: Sample| {
        s.timestamp /= 1000.0;
        s
    });
    let (mut controller, _device) = virtual_controller(config);
    controller.load_file(&path).unwrap();

    assert_eq!(controller.store().snapshot("a").timestamps, vec![1.5]);
}

#[test]
fn test_invalid_utf8_is_tolerated() {
    let store = SeriesStore::new();
    let mut bytes = b"\xff\xfe not text\n".to_vec();
    bytes.extend_from_slice(RawLogBuilder::new().frame(1.0, "a", 2.0).build().as_bytes());

    let summary = session::load(&store, &Ingestor::default(), Cursor::new(bytes)).unwrap();
    assert_eq!(summary.lines, 2);
    assert_eq!(summary.samples, 1);
}

proptest! {
    #[test]
    fn test_roundtrip_arbitrary_text(
        lines in prop::collection::vec("[ -~\t\r]{0,40}", 0..20),
        trailing_newline in any::<bool>(),
    ) {
        let mut text = lines.join("\n");
        if trailing_newline && !text.is_empty() {
            text.push('\n');
        }

        let store = SeriesStore::new();
        session::load(&store, &Ingestor::default(), Cursor::new(text.clone())).unwrap();

        let mut saved = Vec::new();
        store.write_raw_log(&mut saved).unwrap();
        prop_assert_eq!(String::from_utf8(saved).unwrap(), text);
    }

    #[test]
    fn test_series_lengths_match_frame_counts(labels in prop::collection::vec(0usize..4, 0..60)) {
        let mut builder = RawLogBuilder::new();
        for (i, label) in labels.iter().enumerate() {
            builder = builder.frame(i as f64, &format!("ch{}", label), i as f64);
        }

        let store = SeriesStore::new();
        session::load(&store, &Ingestor::default(), Cursor::new(builder.build())).unwrap();

        for label in 0..4 {
            let expected = labels.iter().filter(|&&l| l == label).count();
            prop_assert_eq!(store.series_len(&format!("ch{}", label)), expected);
        }
    }
}
