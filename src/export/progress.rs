//! Progress reporting for long-running exports
//!
//! Record totals are unknown up front (the cursor is lazy), so the tracker
//! shows a spinner with a running count and throughput.

use std::time::Instant;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Progress tracker for a single export
pub struct ProgressTracker {
    /// Start time of the export
    start_time: Instant,
    /// Spinner (absent when progress output is disabled)
    bar: Option<ProgressBar>,
}

impl ProgressTracker {
    /// Create a tracker. With `enable_bar` false every call is a no-op.
    pub fn new(enable_bar: bool) -> Self {
        let bar = enable_bar.then(|| {
            let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
            let style = ProgressStyle::default_spinner()
                .template("{spinner:.green} {pos} records {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            bar.set_style(style);
            bar
        });

        Self {
            start_time: Instant::now(),
            bar,
        }
    }

    /// Record the running total of written records
    pub fn update(&self, count: u64) {
        if let Some(ref bar) = self.bar {
            bar.set_position(count);

            let elapsed = self.start_time.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                bar.set_message(format!("({:.0} records/sec)", count as f64 / elapsed));
            }
        }
    }

    /// Finish and clear the spinner
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_follows_count() {
        let tracker = ProgressTracker::new(true);
        tracker.update(500);
        tracker.update(750);

        let bar = tracker.bar.as_ref().unwrap();
        assert_eq!(bar.position(), 750);
        tracker.finish();
        assert!(bar.is_finished());
    }

    #[test]
    fn test_disabled_tracker_has_no_spinner() {
        let tracker = ProgressTracker::new(false);
        tracker.update(10);
        tracker.finish();
        assert!(tracker.bar.is_none());
    }
}
