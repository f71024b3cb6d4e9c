//! Progress sampling.
//!
//! Rate-limits progress updates and measures throughput over the window
//! since the previous update rather than since the transfer started.

use sidekick_core::format_size;
use std::time::{Duration, Instant};

/// Default minimum spacing between progress updates.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// One progress update for a transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferProgress {
    /// Completion in the range 0..=100. Zero while the total is unknown.
    pub percent: f64,
    /// Throughput over the last sampling window.
    pub bytes_per_sec: f64,
    /// Bytes present in the partial file, including resumed bytes.
    pub downloaded: u64,
    /// Expected final size, when the server reported one.
    pub total: Option<u64>,
}

impl TransferProgress {
    pub(crate) fn new(downloaded: u64, total: Option<u64>, bytes_per_sec: f64) -> Self {
        let percent = match total {
            Some(total) if total > 0 => (downloaded as f64 / total as f64 * 100.0).min(100.0),
            _ => 0.0,
        };
        Self {
            percent,
            bytes_per_sec,
            downloaded,
            total,
        }
    }

    /// Throughput formatted for display, e.g. `3.2 MB/s`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn throughput_label(&self) -> String {
        format!("{}/s", format_size(self.bytes_per_sec.max(0.0) as u64))
    }
}

/// Emits at most one [`TransferProgress`] per interval.
#[derive(Debug)]
pub(crate) struct ProgressSampler {
    interval: Duration,
    last_sample_at: Instant,
    last_sample_bytes: u64,
}

impl ProgressSampler {
    pub(crate) fn new(interval: Duration, start_bytes: u64) -> Self {
        Self {
            interval,
            last_sample_at: Instant::now(),
            last_sample_bytes: start_bytes,
        }
    }

    /// Returns an update if the interval has elapsed since the last one.
    pub(crate) fn sample(
        &mut self,
        downloaded: u64,
        total: Option<u64>,
    ) -> Option<TransferProgress> {
        self.sample_at(Instant::now(), downloaded, total)
    }

    fn sample_at(
        &mut self,
        now: Instant,
        downloaded: u64,
        total: Option<u64>,
    ) -> Option<TransferProgress> {
        let elapsed = now.saturating_duration_since(self.last_sample_at);
        if elapsed < self.interval {
            return None;
        }

        let secs = elapsed.as_secs_f64();
        let delta = downloaded.saturating_sub(self.last_sample_bytes);
        let bytes_per_sec = if secs > 0.0 { delta as f64 / secs } else { 0.0 };

        self.last_sample_at = now;
        self.last_sample_bytes = downloaded;
        Some(TransferProgress::new(downloaded, total, bytes_per_sec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampler_waits_for_interval() {
        let start = Instant::now();
        let mut sampler = ProgressSampler {
            interval: Duration::from_millis(500),
            last_sample_at: start,
            last_sample_bytes: 0,
        };

        assert!(sampler.sample_at(start + Duration::from_millis(100), 10, Some(100)).is_none());
        let update = sampler
            .sample_at(start + Duration::from_millis(500), 50, Some(100))
            .unwrap();
        assert!((update.percent - 50.0).abs() < f64::EPSILON);
        assert!((update.bytes_per_sec - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_throughput_uses_last_window_only() {
        let start = Instant::now();
        let mut sampler = ProgressSampler {
            interval: Duration::from_secs(1),
            last_sample_at: start,
            last_sample_bytes: 0,
        };

        sampler.sample_at(start + Duration::from_secs(1), 1_000_000, None).unwrap();
        let update = sampler
            .sample_at(start + Duration::from_secs(2), 1_000_500, None)
            .unwrap();
        assert!((update.bytes_per_sec - 500.0).abs() < 1e-9);
        assert!(update.percent.abs() < f64::EPSILON);
    }

    #[test]
    fn test_resumed_bytes_do_not_count_as_throughput() {
        let start = Instant::now();
        let mut sampler = ProgressSampler {
            interval: Duration::from_secs(1),
            last_sample_at: start,
            last_sample_bytes: 900,
        };

        let update = sampler
            .sample_at(start + Duration::from_secs(1), 1_000, Some(1_000))
            .unwrap();
        assert!((update.bytes_per_sec - 100.0).abs() < 1e-9);
        assert!((update.percent - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_throughput_label() {
        let progress = TransferProgress::new(0, None, 3_200_000.0);
        assert_eq!(progress.throughput_label(), "3.2 MB/s");
    }
}
