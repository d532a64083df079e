//! `acceld inspect`: offline look at one raw file.
//!
//! Prints the header and a magnitude summary and, with `--detect`, the
//! event windows the processor would cut. Nothing is written or deleted.

use std::fmt::Write as _;
use std::path::Path;

use accel_core::Sample;
use accel_processor::{detect_events, DetectorConfig};
use accel_storage::RawFile;
use anyhow::{Context, Result};

/// Read `path` and print its report to stdout.
pub fn run(path: &Path, detector: Option<&DetectorConfig>) -> Result<()> {
    let raw = RawFile::open(path).with_context(|| format!("Failed to read {}", path.display()))?;
    print!("{}", render(&raw, detector));
    Ok(())
}

/// Index and magnitude of the largest sample.
fn peak(samples: &[Sample]) -> Option<(usize, f64)> {
    samples
        .iter()
        .map(Sample::magnitude)
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

/// Human-readable report for one file.
pub fn render(raw: &RawFile, detector: Option<&DetectorConfig>) -> String {
    let h = &raw.header;
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "file:         {}", raw.path.display());
    let _ = writeln!(out, "sensor:       bus {} address 0x{:02x}", h.bus, h.address);
    let _ = writeln!(
        out,
        "format:       ±{} g, {} Hz, {} g/count",
        h.full_scale_g, h.sample_rate_hz, h.sensitivity_g_per_count
    );
    let _ = writeln!(out, "start:        {:.4}", h.start_timestamp);
    let _ = writeln!(
        out,
        "samples:      {} over {:.3} s",
        raw.samples.len(),
        raw.duration_secs()
    );
    if raw.truncated_bytes > 0 {
        let _ = writeln!(out, "truncated:    {} trailing bytes", raw.truncated_bytes);
    }

    let mean =
        raw.samples.iter().map(Sample::magnitude).sum::<f64>() / raw.samples.len().max(1) as f64;
    let _ = writeln!(out, "mean |a|:     {mean:.3} g");
    if let Some((i, m)) = peak(&raw.samples) {
        let _ = writeln!(
            out,
            "peak |a|:     {m:.3} g at {:.4}",
            raw.samples[i].timestamp
        );
    }

    if let Some(config) = detector {
        let windows = detect_events(&raw.samples, f64::from(h.sample_rate_hz), config);
        let _ = writeln!(out, "events:       {}", windows.len());
        for (n, w) in windows.iter().enumerate() {
            let slice = w.slice(&raw.samples);
            let peak_g = peak(slice).map_or(0.0, |(_, m)| m);
            let _ = writeln!(
                out,
                "  #{n}: trigger {:.4}, samples {}..={} ({}), peak {peak_g:.3} g",
                w.trigger_timestamp,
                w.start,
                w.end,
                w.len()
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use accel_core::format::encode_record;
    use accel_core::FileHeader;

    fn write_raw(dir: &Path, samples: &[Sample]) -> std::path::PathBuf {
        let mut bytes = Vec::new();
        FileHeader {
            bus: 0,
            address: 0x19,
            full_scale_g: 100,
            sample_rate_hz: 1000,
            sensitivity_g_per_count: 0.049,
            start_timestamp: samples[0].timestamp,
        }
        .encode(&mut bytes);
        for s in samples {
            encode_record(s, &mut bytes);
        }
        let path = dir.join("accel_bus0_0x19_1770778000.dat");
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn spike() -> Vec<Sample> {
        let mut samples: Vec<Sample> = (0..3000)
            .map(|i| Sample::new(1_770_778_000.0 + i as f64 * 0.001, 0.0, 0.0, 1.0))
            .collect();
        samples[1500].az = 15.0;
        samples
    }

    #[test]
    fn test_summary_without_detection() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_raw(dir.path(), &spike());
        let raw = RawFile::open(&path).unwrap();
        let report = render(&raw, None);

        assert!(report.contains("bus 0 address 0x19"));
        assert!(report.contains("samples:      3000"));
        assert!(report.contains("peak |a|:     15.000 g at 1770778001.5000"));
        assert!(!report.contains("events:"));
        // Inspection never consumes the file
        assert!(path.exists());
    }

    #[test]
    fn test_detection_lists_windows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_raw(dir.path(), &spike());
        let raw = RawFile::open(&path).unwrap();
        let report = render(&raw, Some(&DetectorConfig::default()));

        assert!(report.contains("events:       1"));
        assert!(report.contains("#0: trigger 1770778001.5000, samples 0..=2999 (3000), peak 15.000 g"));
    }
}
