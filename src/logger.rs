//! Outcome logger: the persistent per-record log plus the progress events.
//!
//! Every record produces exactly one line in the log artifact, in processing
//! order, and one `on_record_complete` event. A failure to write the
//! artifact is reported once and never aborts the batch.

use crate::output::{FetchAttempt, FinalStatus, LogEntry, RunSummary};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::record::Record;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Writer behind the log artifact. `Sync` so a borrowed logger can cross
/// an `.await` inside a spawned task.
pub type LogSink = Box<dyn Write + Send + Sync>;

/// Records outcomes to an append-only text sink and a progress callback.
///
/// Entries are not retained here; the caller owns the run's
/// [`RunSummary`].
pub struct OutcomeLogger {
    sink: Option<LogSink>,
    callback: ProgressCallback,
    reported_error: bool,
}

impl OutcomeLogger {
    /// Append to the log file at `path`, creating it if needed.
    ///
    /// When the file cannot be opened the logger still works: the failure is
    /// reported through the callback and only the on-disk artifact is lost.
    pub fn open(path: &Path, callback: Option<ProgressCallback>) -> Self {
        let callback = callback.unwrap_or_else(|| Arc::new(NoopProgressCallback));
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Self::with_sink(Box::new(file), callback),
            Err(e) => {
                let mut logger = Self {
                    sink: None,
                    callback,
                    reported_error: false,
                };
                logger.report(&format!("cannot open log file {}: {}", path.display(), e));
                logger
            }
        }
    }

    /// Log to an arbitrary writer.
    pub fn with_sink(sink: LogSink, callback: ProgressCallback) -> Self {
        Self {
            sink: Some(sink),
            callback,
            reported_error: false,
        }
    }

    pub fn run_started(&self, total: usize) {
        self.callback.on_run_start(total);
    }

    pub fn record_started(&self, index: usize, total: usize, record: &Record) {
        self.callback.on_record_start(index, total, record);
    }

    pub fn attempt_finished(&self, index: usize, total: usize, attempt: &FetchAttempt) {
        self.callback.on_attempt(index, total, attempt);
    }

    /// Persist one record's outcome.
    pub fn record(&mut self, index: usize, total: usize, entry: &LogEntry) {
        let line = format_line(entry);
        if let Some(sink) = self.sink.as_mut() {
            let written = sink
                .write_all(line.as_bytes())
                .and_then(|_| sink.flush());
            if let Err(e) = written {
                self.sink = None;
                self.report(&format!("cannot write log file: {e}"));
            }
        }
        self.callback.on_record_complete(index, total, entry);
    }

    pub fn run_finished(&self, summary: &RunSummary) {
        self.callback.on_run_complete(summary);
    }

    fn report(&mut self, message: &str) {
        if self.reported_error {
            return;
        }
        self.reported_error = true;
        warn!("{}", message);
        self.callback.on_log_error(message);
    }
}

/// `<UTC timestamp> <LEVEL>: <entry>` terminated by a newline.
pub fn format_line(entry: &LogEntry) -> String {
    let level = match entry.final_status {
        FinalStatus::Success | FinalStatus::Skipped => "INFO",
        FinalStatus::FallbackSuccess | FinalStatus::Failed => "WARNING",
    };
    format!(
        "{} {}: {}\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"),
        level,
        entry.log_line()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{AttemptStatus, Strategy};
    use crate::progress::ArchiveProgressCallback;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn entry(url: &str, statuses: &[(Strategy, AttemptStatus)]) -> LogEntry {
        let attempts: Vec<FetchAttempt> = statuses
            .iter()
            .map(|(s, st)| FetchAttempt::new(*s, url, *st))
            .collect();
        LogEntry {
            record: Record::new("T", url, vec![]),
            target: PathBuf::from("out/untagged/T-0.pdf"),
            final_status: FinalStatus::from_attempts(&attempts),
            attempts,
        }
    }

    #[derive(Default)]
    struct Counter {
        errors: AtomicUsize,
        completed: AtomicUsize,
    }

    impl ArchiveProgressCallback for Counter {
        fn on_record_complete(&self, _: usize, _: usize, _: &LogEntry) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
        fn on_log_error(&self, _: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk full"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("url_retrieval.log");
        std::fs::write(&path, "previous run\n").unwrap();

        let mut logger = OutcomeLogger::open(&path, None);
        logger.record(1, 2, &entry("https://a.example/", &[(Strategy::Primary, AttemptStatus::Success)]));
        logger.record(
            2,
            2,
            &entry(
                "https://b.example/",
                &[
                    (Strategy::Primary, AttemptStatus::Timeout),
                    (Strategy::Archival, AttemptStatus::NoSnapshot),
                    (Strategy::DirectRetrieval, AttemptStatus::ProcessError),
                ],
            ),
        );
        drop(logger);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "previous run");
        assert!(lines[1].contains(" INFO: url=https://a.example/ status=Success"));
        assert!(lines[2].contains(" WARNING: url=https://b.example/ status=Failed"));
        assert!(lines[2].contains("direct(Direct)=ProcessError"));
    }

    #[test]
    fn write_failure_reported_once_and_batch_continues() {
        let counter = Arc::new(Counter::default());
        let mut logger = OutcomeLogger::with_sink(Box::new(BrokenWriter), counter.clone());
        for i in 1..=3 {
            logger.record(i, 3, &entry("https://a.example/", &[(Strategy::Primary, AttemptStatus::Success)]));
        }
        assert_eq!(counter.errors.load(Ordering::SeqCst), 1);
        assert_eq!(counter.completed.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn logger_can_be_shared_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<OutcomeLogger>();
    }

    #[test]
    fn unopenable_path_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let counter = Arc::new(Counter::default());
        // A directory cannot be opened for appending.
        let mut logger = OutcomeLogger::open(dir.path(), Some(counter.clone()));
        logger.record(1, 1, &entry("https://a.example/", &[(Strategy::Primary, AttemptStatus::Success)]));
        assert_eq!(counter.errors.load(Ordering::SeqCst), 1);
        assert_eq!(counter.completed.load(Ordering::SeqCst), 1);
    }
}
