use crate::terminal::host::{ConsoleHost, ViewportMetrics};
use crate::utils::Result;

/// What a viewport poll asks the session to do this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewportDelta {
    pub needs_rescan: bool,
    pub needs_redraw: bool,
}

/// Tracks console geometry between frames
pub struct ViewportTracker {
    current: Option<ViewportMetrics>,
    rescan_every_frame: bool,
}

impl ViewportTracker {
    pub fn new(rescan_every_frame: bool) -> Self {
        Self {
            current: None,
            rescan_every_frame,
        }
    }

    pub fn current(&self) -> Option<&ViewportMetrics> {
        self.current.as_ref()
    }

    /// Query the host and classify the change since the last poll.
    ///
    /// A failed query is returned as is; the previous snapshot is kept.
    pub fn poll(&mut self, host: &mut dyn ConsoleHost) -> Result<ViewportDelta> {
        let metrics = host.metrics()?;
        Ok(self.observe(metrics))
    }

    /// Diff `metrics` against the stored snapshot, then replace it
    pub fn observe(&mut self, metrics: ViewportMetrics) -> ViewportDelta {
        let needs_rescan = match self.current {
            None => true,
            Some(last) => self.rescan_every_frame || Self::moved(&last, &metrics),
        };

        if needs_rescan {
            log::trace!(
                "Viewport changed: window={:?} buffer={:?} cursor={:?}",
                metrics.window,
                metrics.buffer_size,
                metrics.cursor
            );
        }

        self.current = Some(metrics);

        ViewportDelta {
            needs_rescan,
            needs_redraw: needs_rescan,
        }
    }

    fn moved(last: &ViewportMetrics, now: &ViewportMetrics) -> bool {
        last.window.width() != now.window.width()
            || last.window.height() != now.window.height()
            || last.window.top != now.window.top
            || last.cursor != now.cursor
            || last.buffer_size != now.buffer_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::host::{BufferSize, Coord, WindowRect};

    fn base() -> ViewportMetrics {
        ViewportMetrics {
            window: WindowRect {
                left: 0,
                top: 100,
                right: 79,
                bottom: 124,
            },
            buffer_size: BufferSize { cols: 80, rows: 300 },
            cursor: Coord::new(4, 110),
        }
    }

    fn primed() -> ViewportTracker {
        let mut tracker = ViewportTracker::new(false);
        tracker.observe(base());
        tracker
    }

    #[test]
    fn test_first_poll_rescans_and_redraws() {
        let mut tracker = ViewportTracker::new(false);
        let delta = tracker.observe(base());
        assert!(delta.needs_rescan);
        assert!(delta.needs_redraw);
    }

    #[test]
    fn test_unchanged_metrics_are_quiet() {
        let mut tracker = primed();
        assert_eq!(tracker.observe(base()), ViewportDelta::default());
    }

    #[test]
    fn test_rescan_trigger_matrix() {
        let changes: [(&str, fn(&mut ViewportMetrics)); 5] = [
            ("scroll top", |m: &mut ViewportMetrics| {
                m.window.top += 1;
                m.window.bottom += 1;
            }),
            ("visible width", |m: &mut ViewportMetrics| m.window.right -= 10),
            ("visible height", |m: &mut ViewportMetrics| m.window.bottom -= 5),
            ("cursor", |m: &mut ViewportMetrics| m.cursor.x += 1),
            ("buffer size", |m: &mut ViewportMetrics| m.buffer_size.rows += 1),
        ];

        for (name, change) in changes {
            let mut tracker = primed();
            let mut metrics = base();
            change(&mut metrics);

            let delta = tracker.observe(metrics);
            assert!(delta.needs_rescan, "{} should trigger a rescan", name);
            assert!(delta.needs_redraw, "{} should trigger a redraw", name);
        }
    }

    #[test]
    fn test_snapshot_is_always_replaced() {
        let mut tracker = primed();
        let mut moved = base();
        moved.cursor = Coord::new(0, 111);

        assert!(tracker.observe(moved).needs_rescan);
        assert_eq!(tracker.current(), Some(&moved));
        assert!(!tracker.observe(moved).needs_rescan);
    }

    #[test]
    fn test_rescan_every_frame() {
        let mut tracker = ViewportTracker::new(true);
        tracker.observe(base());
        let delta = tracker.observe(base());
        assert!(delta.needs_rescan);
        assert!(delta.needs_redraw);
    }
}
