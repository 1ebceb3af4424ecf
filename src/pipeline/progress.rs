//! Progress reporting and cancellation for long renders.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver};

/// One progress update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Overall completion, 0-100.
    pub percent: u8,
    pub message: String,
}

pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send>;

/// Forwards progress to an optional callback.
///
/// Percentages never go backwards. [`report_fraction`](Self::report_fraction)
/// maps a stage's own 0..1 progress into the current sub-range.
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    start: u8,
    end: u8,
    last: u8,
}

impl ProgressReporter {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(ProgressEvent) + Send + 'static,
    {
        Self {
            callback: Some(Box::new(callback)),
            ..Self::silent()
        }
    }

    /// Reporter that drops every event.
    pub fn silent() -> Self {
        Self {
            callback: None,
            start: 0,
            end: 100,
            last: 0,
        }
    }

    /// Scope [`report_fraction`](Self::report_fraction) to `start..=end`.
    pub fn set_range(&mut self, start: u8, end: u8) {
        self.start = start.min(100);
        self.end = end.clamp(self.start, 100);
    }

    /// Report an absolute percentage.
    pub fn report(&mut self, percent: u8, message: impl Into<String>) {
        let percent = percent.clamp(self.last, 100);
        self.last = percent;
        if let Some(callback) = &self.callback {
            callback(ProgressEvent {
                percent,
                message: message.into(),
            });
        }
    }

    /// Report stage progress in `[0, 1]`, scaled into the current range.
    ///
    /// `message` is built from the overall percentage actually sent.
    pub fn report_fraction<F>(&mut self, fraction: f64, message: F)
    where
        F: FnOnce(u8) -> String,
    {
        let span = (self.end - self.start) as f64;
        let scaled = self.start as f64 + fraction.clamp(0.0, 1.0) * span;
        let percent = (scaled.floor() as u8).clamp(self.last, 100);
        self.report(percent, message(percent));
    }

    /// Last percentage reported.
    pub fn last_percent(&self) -> u8 {
        self.last
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::silent()
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("has_callback", &self.callback.is_some())
            .field("start", &self.start)
            .field("end", &self.end)
            .field("last", &self.last)
            .finish()
    }
}

/// A reporter whose events arrive on the returned receiver.
///
/// The channel is unbounded, so a slow consumer never stalls rendering.
/// Events sent after the receiver is dropped are discarded.
pub fn progress_channel() -> (ProgressReporter, Receiver<ProgressEvent>) {
    let (sender, receiver) = unbounded();
    let reporter = ProgressReporter::new(move |event| {
        let _ = sender.send(event);
    });
    (reporter, receiver)
}

/// Shared flag for stopping a render between frames.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_maps_into_range() {
        let (mut reporter, rx) = progress_channel();
        reporter.set_range(20, 90);
        reporter.report_fraction(0.0, |p| format!("at {}", p));
        reporter.report_fraction(0.5, |p| format!("at {}", p));
        reporter.report_fraction(1.0, |p| format!("at {}", p));

        let events: Vec<ProgressEvent> = rx.try_iter().collect();
        let percents: Vec<u8> = events.iter().map(|e| e.percent).collect();
        assert_eq!(percents, vec![20, 55, 90]);
        assert_eq!(events[1].message, "at 55");
    }

    #[test]
    fn test_progress_never_decreases() {
        let (mut reporter, rx) = progress_channel();
        reporter.report(50, "half");
        reporter.report(30, "back");
        let events: Vec<ProgressEvent> = rx.try_iter().collect();
        assert_eq!(events[1].percent, 50);
        assert_eq!(events[1].message, "back");
        assert_eq!(reporter.last_percent(), 50);
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (mut reporter, rx) = progress_channel();
        drop(rx);
        reporter.report(10, "nobody listening");
    }

    #[test]
    fn test_cancellation_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
