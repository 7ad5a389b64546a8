//! Progress-callback trait for per-record archive events.
//!
//! Inject an [`Arc<dyn ArchiveProgressCallback>`] via
//! [`crate::config::ArchiveConfigBuilder::progress_callback`] to receive
//! events as the batch processes each record. The
//! [`crate::logger::OutcomeLogger`] is the only caller; it forwards every
//! event it records so a terminal front-end can show coloured status lines
//! while the log artifact is being written.
//!
//! # Example
//!
//! ```rust
//! use pocket2pdf::{ArchiveConfig, ArchiveProgressCallback, LogEntry};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl ArchiveProgressCallback for CountingCallback {
//!     fn on_record_complete(&self, index: usize, total: usize, entry: &LogEntry) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} {} -> {}", index, total, entry.record.url, entry.final_status);
//!     }
//! }
//!
//! let config = ArchiveConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{FetchAttempt, LogEntry, RunSummary};
use crate::record::Record;
use std::sync::Arc;

/// Called by the outcome logger as the batch advances.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `index` is 1-based.
pub trait ArchiveProgressCallback: Send + Sync {
    /// Called once, before the first record.
    fn on_run_start(&self, total_records: usize) {
        let _ = total_records;
    }

    /// Called before the first strategy of a record is tried.
    fn on_record_start(&self, index: usize, total: usize, record: &Record) {
        let _ = (index, total, record);
    }

    /// Called after every strategy attempt, successful or not.
    fn on_attempt(&self, index: usize, total: usize, attempt: &FetchAttempt) {
        let _ = (index, total, attempt);
    }

    /// Called once per record with its classified outcome.
    fn on_record_complete(&self, index: usize, total: usize, entry: &LogEntry) {
        let _ = (index, total, entry);
    }

    /// Called at most once per run, the first time the log artifact cannot
    /// be written.
    fn on_log_error(&self, error: &str) {
        let _ = error;
    }

    /// Called once after every record has been processed.
    fn on_run_complete(&self, summary: &RunSummary) {
        let _ = summary;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ArchiveProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ArchiveConfig`].
pub type ProgressCallback = Arc<dyn ArchiveProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{AttemptStatus, FinalStatus, Strategy};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        attempts: AtomicUsize,
        completes: AtomicUsize,
    }

    impl ArchiveProgressCallback for TrackingCallback {
        fn on_record_start(&self, _index: usize, _total: usize, _record: &Record) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_attempt(&self, _index: usize, _total: usize, _attempt: &FetchAttempt) {
            self.attempts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_record_complete(&self, _index: usize, _total: usize, _entry: &LogEntry) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        let record = Record::new("t", "https://a.example/", vec![]);
        cb.on_run_start(1);
        cb.on_record_start(1, 1, &record);
        cb.on_log_error("disk full");
        cb.on_run_complete(&RunSummary::default());
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        let record = Record::new("t", "https://a.example/", vec![]);
        let attempt = FetchAttempt::new(Strategy::Primary, &record.url, AttemptStatus::Success);
        let entry = LogEntry {
            record: record.clone(),
            target: PathBuf::from("x.pdf"),
            attempts: vec![attempt.clone()],
            final_status: FinalStatus::Success,
        };

        tracker.on_record_start(1, 1, &record);
        tracker.on_attempt(1, 1, &attempt);
        tracker.on_record_complete(1, 1, &entry);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_run_start(10);
    }
}
