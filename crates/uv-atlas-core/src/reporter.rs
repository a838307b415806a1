use crate::pipeline::Stage;
use std::time::{Duration, Instant};
use tracing::info;

/// Receives progress of a pipeline run. Purely informational.
pub trait ProgressObserver {
    fn on_stage(&mut self, _stage: Stage) {}
    fn on_progress(&mut self, _stage: Stage, _done: usize, _total: usize) {}
    fn on_finish(&mut self) {}
}

/// Rate-limited progress log lines with elapsed time and ETA.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    interval: Duration,
    began: Instant,
    last: Option<Instant>,
    done: usize,
    total: usize,
}

impl ProgressReporter {
    pub fn new(interval_secs: f64) -> Self {
        Self {
            interval: Duration::from_secs_f64(interval_secs.max(0.0)),
            began: Instant::now(),
            last: None,
            done: 0,
            total: 0,
        }
    }

    /// Restarts timing for a new unit of work.
    pub fn restart(&mut self, total: usize) {
        self.began = Instant::now();
        self.last = None;
        self.done = 0;
        self.total = total;
    }

    pub fn elapsed(&self) -> Duration {
        self.began.elapsed()
    }

    /// Estimated time left, extrapolated linearly from the progress so far.
    pub fn eta(&self) -> Option<Duration> {
        if self.done == 0 || self.total < self.done {
            return None;
        }
        let per_item = self.elapsed().as_secs_f64() / self.done as f64;
        Some(Duration::from_secs_f64(
            per_item * (self.total - self.done) as f64,
        ))
    }

    /// Records progress and logs it when the interval passed or `force` is set.
    /// Returns true if a line was logged.
    pub fn tick(&mut self, stage: Stage, done: usize, total: usize, force: bool) -> bool {
        self.done = done;
        self.total = total;
        let now = Instant::now();
        let due = self
            .last
            .is_none_or(|last| now.duration_since(last) >= self.interval);
        if !(force || due) {
            return false;
        }
        self.last = Some(now);
        let elapsed = self.elapsed().as_secs_f64();
        match self.eta() {
            Some(eta) => info!(
                %stage,
                done,
                total,
                elapsed = format_args!("{elapsed:.1}s"),
                eta = format_args!("{:.1}s", eta.as_secs_f64()),
                "progress"
            ),
            None => info!(%stage, done, total, elapsed = format_args!("{elapsed:.1}s"), "progress"),
        }
        true
    }
}
