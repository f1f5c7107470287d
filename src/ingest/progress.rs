//! Progress events for long-running stages
//!
//! Workers call [`ProgressReporter::advance`] from any thread. Increments are
//! serialized under a mutex, so listeners see one event per completed unit
//! with a non-decreasing fraction.

use crossbeam_channel::Sender;
use indicatif::ProgressBar;
use std::sync::Mutex;

/// One progress update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEvent {
    /// Units finished so far
    pub completed: usize,
    /// Units in the stage
    pub total: usize,
    /// Overall run progress in `[0, 1]`
    pub fraction: f64,
}

/// Fans progress out to an optional channel and an optional progress bar
pub struct ProgressReporter {
    completed: Mutex<usize>,
    total: usize,
    /// Share of the run covered by `total` units
    span: f64,
    sender: Option<Sender<ProgressEvent>>,
    bar: Option<ProgressBar>,
}

impl ProgressReporter {
    /// Reporter for `total` units covering the first `span` of the run
    pub fn new(total: usize, span: f64) -> Self {
        Self {
            completed: Mutex::new(0),
            total,
            span: span.clamp(0.0, 1.0),
            sender: None,
            bar: None,
        }
    }

    /// Reporter that only counts
    pub fn silent(total: usize) -> Self {
        Self::new(total, 1.0)
    }

    pub fn with_sender(mut self, sender: Sender<ProgressEvent>) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn with_bar(mut self, bar: ProgressBar) -> Self {
        self.bar = Some(bar);
        self
    }

    /// Record one finished unit
    pub fn advance(&self, message: &str) {
        let Ok(mut completed) = self.completed.lock() else {
            return;
        };
        *completed = (*completed + 1).min(self.total.max(1));
        let fraction = if self.total == 0 {
            self.span
        } else {
            self.span * *completed as f64 / self.total as f64
        };

        if let Some(bar) = &self.bar {
            bar.set_message(message.to_string());
            bar.inc(1);
        }
        self.emit(ProgressEvent {
            completed: *completed,
            total: self.total,
            fraction,
        });
    }

    /// Report the end of the run (fraction 1.0)
    pub fn finish(&self) {
        let Ok(mut completed) = self.completed.lock() else {
            return;
        };
        *completed = self.total;

        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
        self.emit(ProgressEvent {
            completed: self.total,
            total: self.total,
            fraction: 1.0,
        });
    }

    pub fn completed(&self) -> usize {
        self.completed.lock().map(|c| *c).unwrap_or(0)
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(sender) = &self.sender {
            // A dropped receiver only means nobody is listening
            let _ = sender.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use rayon::prelude::*;

    #[test]
    fn test_events_are_monotonic_and_end_at_one() {
        let (tx, rx) = unbounded();
        let reporter = ProgressReporter::new(50, 0.9).with_sender(tx);

        (0..50).into_par_iter().for_each(|i| reporter.advance(&i.to_string()));
        reporter.finish();
        drop(reporter);

        let events: Vec<ProgressEvent> = rx.iter().collect();
        assert_eq!(events.len(), 51);
        assert!(events.windows(2).all(|w| w[0].fraction <= w[1].fraction));
        assert!((events[49].fraction - 0.9).abs() < 1e-12);
        assert_eq!(events[50].fraction, 1.0);
        assert_eq!(events[50].completed, 50);
    }

    #[test]
    fn test_empty_stage_still_finishes() {
        let (tx, rx) = unbounded();
        let reporter = ProgressReporter::new(0, 0.9).with_sender(tx);
        reporter.finish();
        drop(reporter);
        let events: Vec<_> = rx.iter().collect();
        assert_eq!(events, vec![ProgressEvent { completed: 0, total: 0, fraction: 1.0 }]);
    }

    #[test]
    fn test_silent_reporter_counts() {
        let reporter = ProgressReporter::silent(3);
        reporter.advance("a");
        reporter.advance("b");
        assert_eq!(reporter.completed(), 2);
    }
}
