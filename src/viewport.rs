//! Canvas geometry derived from the window, and the resize debouncer.

use std::time::{Duration, Instant};

pub const DEFAULT_RESIZE_DEBOUNCE: Duration = Duration::from_millis(250);

/// Share of the window's inner size given to the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportRatios {
    pub width: f64,
    pub height: f64,
}

impl Default for ViewportRatios {
    fn default() -> Self {
        Self {
            width: 0.9,
            height: 0.7,
        }
    }
}

impl ViewportRatios {
    /// Canvas pixel size for a window size. Never zero.
    pub fn canvas_size(&self, window_width: u32, window_height: u32) -> (u32, u32) {
        let scale = |len: u32, ratio: f64| ((len as f64 * ratio).floor() as u32).max(1);
        (
            scale(window_width, self.width),
            scale(window_height, self.height),
        )
    }
}

/// Coalesces bursts of values into the last one, released after a quiet
/// period.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Replace any pending value and restart the quiet period.
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.delay));
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    /// Take the pending value once its quiet period has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let deadline = self.deadline()?;
        if deadline > now {
            return None;
        }
        self.pending.take().map(|(value, _)| value)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canvas_takes_ratio_of_window() {
        let ratios = ViewportRatios::default();
        assert_eq!(ratios.canvas_size(1920, 1080), (1728, 756));
        assert_eq!(ratios.canvas_size(0, 0), (1, 1));
    }

    #[test]
    fn burst_of_resizes_yields_one_update() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(DEFAULT_RESIZE_DEBOUNCE);
        let mut applied = Vec::new();

        // Ten events within 100ms, polling between each.
        for i in 0..10u32 {
            let now = t0 + Duration::from_millis(i as u64 * 11);
            debouncer.push((1000 + i, 700), now);
            if let Some(size) = debouncer.poll(now) {
                applied.push(size);
            }
        }
        let last = t0 + Duration::from_millis(99);

        assert_eq!(debouncer.poll(last + Duration::from_millis(249)), None);
        if let Some(size) = debouncer.poll(last + Duration::from_millis(250)) {
            applied.push(size);
        }
        assert_eq!(debouncer.poll(last + Duration::from_secs(5)), None);

        assert_eq!(applied, vec![(1009, 700)]);
    }

    #[test]
    fn deadline_follows_the_last_push() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(250));
        assert_eq!(debouncer.deadline(), None);

        debouncer.push(1, t0);
        debouncer.push(2, t0 + Duration::from_millis(100));
        assert_eq!(
            debouncer.deadline(),
            Some(t0 + Duration::from_millis(350))
        );
    }

    #[test]
    fn cancel_drops_the_pending_value() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(10));
        debouncer.push("resize", t0);
        debouncer.cancel();
        assert_eq!(debouncer.poll(t0 + Duration::from_secs(1)), None);
    }
}
