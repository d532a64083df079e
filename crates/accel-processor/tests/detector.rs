//! Detection properties on synthetic signals.

use std::time::Duration;

use accel_core::Sample;
use accel_processor::detector::{detect_events, magnitudes, rolling_rms, DetectorConfig};

const T0: f64 = 1_770_778_000.0;

/// `n` samples at 1 kHz resting at 1 g on Z.
fn baseline(n: usize, g: f32) -> Vec<Sample> {
    (0..n)
        .map(|i| Sample::new(T0 + i as f64 * 0.001, 0.0, 0.0, g))
        .collect()
}

#[test]
fn test_single_spike_end_to_end() {
    let mut samples = baseline(3000, 1.0);
    samples[1500].az = 15.0;

    let events = detect_events(&samples, 1000.0, &DetectorConfig::default());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].start, 0);
    assert_eq!(events[0].end, 2999);
    assert_eq!(events[0].trigger_timestamp, samples[1500].timestamp);
}

#[test]
fn test_quiet_signal_has_no_events() {
    let samples = baseline(5000, 1.0);
    assert!(detect_events(&samples, 1000.0, &DetectorConfig::default()).is_empty());
}

#[test]
fn test_absolute_threshold_ignores_rms() {
    // High baseline: 4 x rms is far above the spike
    let mut samples = baseline(1000, 8.0);
    samples[500].az = 10.001;
    let events = detect_events(&samples, 1000.0, &DetectorConfig::default());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].trigger_timestamp, samples[500].timestamp);

    // Exactly at the threshold does not trigger
    samples[500].az = 10.0;
    assert!(detect_events(&samples, 1000.0, &DetectorConfig::default()).is_empty());
}

#[test]
fn test_relative_threshold_below_absolute() {
    let mut samples = baseline(3000, 1.0);
    samples[2500].az = 5.0;
    let events = detect_events(&samples, 1000.0, &DetectorConfig::default());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].trigger_timestamp, samples[2500].timestamp);
}

#[test]
fn test_boundary_clipping() {
    let mut samples = baseline(100, 1.0);
    samples[0].az = 20.0;
    samples[99].az = 20.0;

    let config = DetectorConfig {
        pre_event: Duration::from_millis(10),
        post_event: Duration::from_millis(10),
        merge_gap: Duration::ZERO,
        ..DetectorConfig::default()
    };
    let events = detect_events(&samples, 1000.0, &config);
    assert_eq!(events.len(), 2);
    assert_eq!((events[0].start, events[0].end), (0, 10));
    assert_eq!((events[1].start, events[1].end), (89, 99));
}

#[test]
fn test_context_longer_than_file() {
    let mut samples = baseline(100, 1.0);
    samples[50].az = 20.0;
    // Default context is 5 s either side
    let events = detect_events(&samples, 1000.0, &DetectorConfig::default());
    assert_eq!(events.len(), 1);
    assert_eq!((events[0].start, events[0].end), (0, 99));
    assert_eq!(events[0].slice(&samples).len(), 100);
}

#[test]
fn test_close_spikes_merge_far_spikes_do_not() {
    let config = DetectorConfig {
        pre_event: Duration::from_millis(10),
        post_event: Duration::from_millis(10),
        merge_gap: Duration::from_millis(20),
        ..DetectorConfig::default()
    };

    let mut samples = baseline(1000, 1.0);
    samples[100].az = 20.0;
    samples[140].az = 20.0;
    samples[600].az = 20.0;

    let events = detect_events(&samples, 1000.0, &config);
    assert_eq!(events.len(), 2);
    assert_eq!((events[0].start, events[0].end), (90, 150));
    assert_eq!(events[0].trigger_timestamp, samples[100].timestamp);
    assert_eq!((events[1].start, events[1].end), (590, 610));
}

#[test]
fn test_rms_converges_to_constant() {
    let c = 3.7;
    let samples = baseline(10_000, c);
    let rms = rolling_rms(&magnitudes(&samples), 2000);
    for r in &rms[2000..] {
        assert!((r - f64::from(c)).abs() < 1e-4);
    }
}

#[test]
fn test_rms_after_bootstrap_uses_trailing_window() {
    // Step from 1 to 2: once the window holds only 2s, rms is 2
    let mut values = vec![1.0; 50];
    values.extend(vec![2.0; 50]);
    let rms = rolling_rms(&values, 10);
    assert!((rms[0] - 1.0).abs() < 1e-12);
    assert!((rms[60] - 2.0).abs() < 1e-12);
    assert!(rms[55] > 1.0 && rms[55] < 2.0);
}
