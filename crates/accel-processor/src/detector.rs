//! Dual-threshold shock detection.
//!
//! A sample triggers when its vector magnitude exceeds either an absolute
//! threshold or a multiple of the causal rolling RMS of the magnitudes
//! before it. Every trigger is padded with context on both sides, clipped to
//! the file, and nearby windows are merged.
//!
//! # Rolling RMS
//!
//! For the first `window` samples (the bootstrap window) the RMS is that of
//! the first `min(window, n)` magnitudes. After that, `rms[i]` covers
//! exactly the `window` magnitudes before `i`, so a spike never raises its
//! own baseline.

use std::time::Duration;

use accel_core::config::DetectorSettings;
use accel_core::Sample;

/// Detection thresholds and context lengths.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Absolute magnitude threshold (g)
    pub abs_threshold_g: f64,
    /// Relative threshold as a multiple of the rolling RMS
    pub rel_multiplier: f64,
    /// Rolling RMS window
    pub rms_window: Duration,
    /// Context kept before a trigger
    pub pre_event: Duration,
    /// Context kept after a trigger
    pub post_event: Duration,
    /// Windows closer than this are merged
    pub merge_gap: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::from(&DetectorSettings::default())
    }
}

impl From<&DetectorSettings> for DetectorConfig {
    fn from(settings: &DetectorSettings) -> Self {
        Self {
            abs_threshold_g: settings.abs_threshold_g,
            rel_multiplier: settings.rel_multiplier,
            rms_window: settings.rms_window,
            pre_event: settings.pre_event,
            post_event: settings.post_event,
            merge_gap: settings.merge_gap,
        }
    }
}

/// Durations converted to sample counts at one sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleCounts {
    /// Rolling RMS window (at least 1)
    pub rms_window: usize,
    /// Samples kept before a trigger
    pub pre: usize,
    /// Samples kept after a trigger
    pub post: usize,
    /// Maximum gap between windows that are merged
    pub merge: usize,
}

fn to_samples(duration: Duration, rate_hz: f64) -> usize {
    let n = (duration.as_secs_f64() * rate_hz).round();
    if n.is_finite() && n > 0.0 {
        n as usize
    } else {
        0
    }
}

impl DetectorConfig {
    /// Sample counts at `rate_hz`, rounded to the nearest sample.
    pub fn sample_counts(&self, rate_hz: f64) -> SampleCounts {
        SampleCounts {
            rms_window: to_samples(self.rms_window, rate_hz).max(1),
            pre: to_samples(self.pre_event, rate_hz),
            post: to_samples(self.post_event, rate_hz),
            merge: to_samples(self.merge_gap, rate_hz),
        }
    }
}

/// Inclusive sample range of one event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventWindow {
    /// First sample index
    pub start: usize,
    /// Last sample index (inclusive)
    pub end: usize,
    /// Timestamp of the first trigger in the window
    pub trigger_timestamp: f64,
}

impl EventWindow {
    /// Number of samples covered.
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Always false; a window holds at least its trigger.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The samples this window covers.
    pub fn slice<'a>(&self, samples: &'a [Sample]) -> &'a [Sample] {
        &samples[self.start..=self.end]
    }
}

/// Vector magnitude of every sample.
pub fn magnitudes(samples: &[Sample]) -> Vec<f64> {
    samples.iter().map(Sample::magnitude).collect()
}

/// Causal rolling RMS of `values` over `window` samples.
pub fn rolling_rms(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let window = window.max(1);
    let mut rms = vec![0.0; n];

    let bootstrap = window.min(n);
    let mut sum_sq: f64 = values[..bootstrap].iter().map(|v| v * v).sum();
    let initial = (sum_sq / bootstrap as f64).sqrt();
    rms[..bootstrap].fill(initial);

    if n > window {
        for i in window..n {
            rms[i] = (sum_sq / window as f64).sqrt();
            sum_sq += values[i] * values[i];
            sum_sq -= values[i - window] * values[i - window];
            // Floating point drift
            if sum_sq < 0.0 {
                sum_sq = 0.0;
            }
        }
    }
    rms
}

/// Merge windows (sorted by start) whose gap is at most `merge_samples`.
///
/// A merged window keeps the earlier trigger timestamp.
pub fn merge_windows(windows: Vec<EventWindow>, merge_samples: usize) -> Vec<EventWindow> {
    let mut merged: Vec<EventWindow> = Vec::with_capacity(windows.len());
    for window in windows {
        match merged.last_mut() {
            Some(prev) if window.start <= prev.end.saturating_add(merge_samples) => {
                prev.end = prev.end.max(window.end);
            }
            _ => merged.push(window),
        }
    }
    merged
}

/// Find event windows in `samples` recorded at `rate_hz`.
pub fn detect_events(samples: &[Sample], rate_hz: f64, config: &DetectorConfig) -> Vec<EventWindow> {
    let n = samples.len();
    if n == 0 {
        return Vec::new();
    }

    let counts = config.sample_counts(rate_hz);
    let mags = magnitudes(samples);
    let rms = rolling_rms(&mags, counts.rms_window);

    let windows = mags
        .iter()
        .zip(&rms)
        .enumerate()
        .filter(|&(_, (&m, &r))| m > config.abs_threshold_g || m > config.rel_multiplier * r)
        .map(|(i, _)| EventWindow {
            start: i.saturating_sub(counts.pre),
            end: i.saturating_add(counts.post).min(n - 1),
            trigger_timestamp: samples[i].timestamp,
        })
        .collect();

    merge_windows(windows, counts.merge)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start: usize, end: usize, ts: f64) -> EventWindow {
        EventWindow {
            start,
            end,
            trigger_timestamp: ts,
        }
    }

    #[test]
    fn test_sample_counts_round() {
        let config = DetectorConfig::default();
        let counts = config.sample_counts(1000.0);
        assert_eq!(
            counts,
            SampleCounts {
                rms_window: 2000,
                pre: 5000,
                post: 5000,
                merge: 10000
            }
        );

        let odd = DetectorConfig {
            rms_window: Duration::from_millis(2),
            pre_event: Duration::from_micros(1500),
            ..DetectorConfig::default()
        };
        let counts = odd.sample_counts(1000.0);
        assert_eq!(counts.rms_window, 2);
        assert_eq!(counts.pre, 2);

        assert_eq!(DetectorConfig::default().sample_counts(0.0).rms_window, 1);
    }

    #[test]
    fn test_rms_constant_signal() {
        let values = vec![2.5; 50];
        let rms = rolling_rms(&values, 10);
        assert!(rms.iter().all(|r| (r - 2.5).abs() < 1e-12));
    }

    #[test]
    fn test_rms_is_causal() {
        let mut values = vec![1.0; 20];
        values[15] = 100.0;
        let rms = rolling_rms(&values, 5);
        assert!((rms[15] - 1.0).abs() < 1e-12);
        assert!(rms[16] > 1.0);
    }

    #[test]
    fn test_rms_short_input_uses_bootstrap() {
        let rms = rolling_rms(&[3.0, 4.0], 10);
        let expected = ((9.0 + 16.0) / 2.0f64).sqrt();
        assert_eq!(rms, vec![expected, expected]);
    }

    #[test]
    fn test_merge_example() {
        let merged = merge_windows(vec![window(0, 100, 1.0), window(105, 200, 2.0)], 10);
        assert_eq!(merged, vec![window(0, 200, 1.0)]);

        let separate = merge_windows(vec![window(0, 100, 1.0), window(120, 200, 2.0)], 10);
        assert_eq!(separate.len(), 2);
        assert_eq!(separate[1].trigger_timestamp, 2.0);
    }

    #[test]
    fn test_merge_at_exact_gap() {
        let merged = merge_windows(vec![window(0, 100, 1.0), window(110, 150, 2.0)], 10);
        assert_eq!(merged, vec![window(0, 150, 1.0)]);
    }

    #[test]
    fn test_empty_input() {
        assert!(detect_events(&[], 1000.0, &DetectorConfig::default()).is_empty());
        assert!(rolling_rms(&[], 10).is_empty());
    }

    #[test]
    fn test_window_slice() {
        let samples: Vec<Sample> = (0..10).map(|i| Sample::new(f64::from(i), 0.0, 0.0, 1.0)).collect();
        let w = window(2, 4, 3.0);
        assert_eq!(w.len(), 3);
        assert_eq!(w.slice(&samples)[0].timestamp, 2.0);
    }
}
