//! Fixed-capacity averaging window.

use helifx_common::consts::CAPTURE_WINDOW_CAPACITY;
use helifx_common::fx::types::Timestamp;
use heapless::Deque;

/// Ring of `(duration_us, captured_at)` samples.
///
/// Pushing into a full window overwrites the oldest slot. Samples older than
/// the averaging window stay in place until overwritten; `average()` skips them.
#[derive(Debug, Default)]
pub struct CaptureWindow {
    samples: Deque<(i32, Timestamp), CAPTURE_WINDOW_CAPACITY>,
}

impl CaptureWindow {
    /// Empty window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample, evicting the oldest when full.
    pub fn push(&mut self, duration_us: i32, captured_at: Timestamp) {
        if self.samples.is_full() {
            self.samples.pop_front();
        }
        // Cannot fail: a slot was freed above.
        let _ = self.samples.push_back((duration_us, captured_at));
    }

    /// Samples held, including expired ones.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if nothing was ever recorded (or after `clear()`).
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Drop every sample.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Rounded mean of the samples captured within `window_ms` before `now`.
    pub fn average(&self, now: Timestamp, window_ms: u32) -> Option<i32> {
        let window_ns = i64::from(window_ms) * 1_000_000;
        let (sum, count) = self
            .samples
            .iter()
            .filter(|(_, at)| now.nanos_since(*at) <= window_ns)
            .fold((0i64, 0i64), |(sum, count), (us, _)| (sum + i64::from(*us), count + 1));

        if count == 0 {
            return None;
        }
        // Samples are positive, so half-up rounding is a plain offset.
        Some(((sum + count / 2) / count) as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_window_has_no_average() {
        let window = CaptureWindow::new();
        assert_eq!(window.average(Timestamp::from_millis(100), 200), None);
    }

    #[test]
    fn average_rounds_to_nearest() {
        let mut window = CaptureWindow::new();
        let now = Timestamp::from_millis(1000);
        window.push(1000, now);
        window.push(1001, now);
        assert_eq!(window.average(now, 200), Some(1001));

        window.push(1001, now);
        assert_eq!(window.average(now, 200), Some(1001));
        window.push(1000, now);
        window.push(1000, now);
        // 5002 / 5 = 1000.4
        assert_eq!(window.average(now, 200), Some(1000));
    }

    #[test]
    fn expired_samples_are_ignored_but_kept() {
        let mut window = CaptureWindow::new();
        window.push(2000, Timestamp::from_millis(0));
        window.push(1000, Timestamp::from_millis(900));
        window.push(1200, Timestamp::from_millis(950));

        let now = Timestamp::from_millis(1000);
        assert_eq!(window.average(now, 200), Some(1100));
        assert_eq!(window.len(), 3);
        assert_eq!(window.average(Timestamp::from_millis(2000), 200), None);
    }

    #[test]
    fn full_window_overwrites_oldest() {
        let mut window = CaptureWindow::new();
        let now = Timestamp::from_millis(10);
        window.push(3000, now);
        for _ in 0..CAPTURE_WINDOW_CAPACITY {
            window.push(1500, now);
        }
        assert_eq!(window.len(), CAPTURE_WINDOW_CAPACITY);
        assert_eq!(window.average(now, 200), Some(1500));
    }
}
