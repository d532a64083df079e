//! Raw file validation and event file output.

use std::fs;

use accel_core::format::{encode_record, FileHeader};
use accel_core::{FormatError, Sample, SampleLine};
use accel_storage::{EventWriter, RawFile};

fn header() -> FileHeader {
    FileHeader {
        bus: 0,
        address: 0x19,
        full_scale_g: 100,
        sample_rate_hz: 1000,
        sensitivity_g_per_count: 0.049,
        start_timestamp: 1000.0,
    }
}

fn write_raw(path: &std::path::Path, n: usize, extra: &[u8]) {
    let mut buf = Vec::new();
    header().encode(&mut buf);
    for i in 0..n {
        encode_record(&Sample::new(1000.0 + i as f64 * 0.001, 0.0, 0.0, 1.0), &mut buf);
    }
    buf.extend_from_slice(extra);
    fs::write(path, buf).unwrap();
}

#[test]
fn test_partial_trailing_record_is_truncated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accel_bus0_0x19_1000.dat");
    write_raw(&path, 5, &[1, 2, 3]);

    let raw = RawFile::open(&path).unwrap();
    assert_eq!(raw.header, header());
    assert_eq!(raw.samples.len(), 5);
    assert_eq!(raw.truncated_bytes, 3);
    assert!((raw.duration_secs() - 0.004).abs() < 1e-9);
}

#[test]
fn test_header_only_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accel_bus0_0x19_1000.dat");
    write_raw(&path, 0, &[]);
    assert!(matches!(RawFile::open(&path), Err(FormatError::Empty)));
}

#[test]
fn test_rejects_bad_files() {
    let dir = tempfile::tempdir().unwrap();

    let small = dir.path().join("small.dat");
    fs::write(&small, [0u8; 5]).unwrap();
    assert!(matches!(
        RawFile::open(&small),
        Err(FormatError::TooSmall { size: 5, .. })
    ));

    let garbage = dir.path().join("garbage.dat");
    fs::write(&garbage, [0xAAu8; 200]).unwrap();
    assert!(matches!(
        RawFile::open(&garbage),
        Err(FormatError::BadMagic { .. })
    ));

    let missing = dir.path().join("missing.dat");
    assert!(matches!(
        RawFile::open(&missing),
        Err(FormatError::Io { .. })
    ));
}

#[test]
fn test_event_file_lines() {
    let dir = tempfile::tempdir().unwrap();
    let writer = EventWriter::new(dir.path());
    let samples = vec![
        Sample::new(1_770_778_924.0, 0.049, -0.098, 1.0),
        Sample::new(1_770_778_924.001, 15.0, 0.0, 0.0),
    ];

    let path = writer
        .write_event(0, 0x19, 1_770_778_924.001, &samples)
        .unwrap();
    assert_eq!(
        path.file_name().unwrap(),
        "accel_bus0_0x19_event_1770778924.dat"
    );

    let text = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "1770778924.0000,0,0x19,0.049,-0.098,1.000");
    let parsed = SampleLine::parse(lines[1]).unwrap();
    assert_eq!(parsed.address, 0x19);
    assert_eq!(parsed.sample.ax, 15.0);

    // No staging file left behind
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_event_collision_keeps_both() {
    let dir = tempfile::tempdir().unwrap();
    let writer = EventWriter::new(dir.path());
    let s = [Sample::new(5.5, 0.0, 0.0, 20.0)];
    let a = writer.write_event(0, 0x19, 5.5, &s).unwrap();
    let b = writer.write_event(0, 0x19, 5.9, &s).unwrap();
    assert_ne!(a, b);
    assert!(a.exists() && b.exists());
}
