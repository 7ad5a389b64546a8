//! Outcome types: what happened to each record and to the run as a whole.
//!
//! A [`FetchAttempt`] is produced per strategy tried, summarised into one
//! [`LogEntry`] per record, and every entry ends up in the [`RunSummary`]
//! returned by [`crate::archive::archive`].

use crate::error::ParseWarning;
use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One step of the fixed-order fallback sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    /// Full headless render of the original url.
    Primary,
    /// Full headless render of the most recent archive snapshot.
    Archival,
    /// Simplified render of the original url (legacy headless, no scripts).
    DirectRetrieval,
}

impl Strategy {
    /// Which url the strategy fetches from.
    pub fn source(self) -> AttemptSource {
        match self {
            Strategy::Archival => AttemptSource::Archived,
            Strategy::Primary | Strategy::DirectRetrieval => AttemptSource::Direct,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::Primary => "primary",
            Strategy::Archival => "archival",
            Strategy::DirectRetrieval => "direct",
        })
    }
}

/// Whether an attempt hit the original url or an archived copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptSource {
    Direct,
    Archived,
}

impl fmt::Display for AttemptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AttemptSource::Direct => "Direct",
            AttemptSource::Archived => "Archived",
        })
    }
}

/// Result of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptStatus {
    /// A non-empty PDF is now at the target path.
    Success,
    /// The renderer exceeded its time limit and was killed.
    Timeout,
    /// The renderer could not be launched or exited abnormally.
    ProcessError,
    /// The renderer exited cleanly but left no usable file.
    EmptyOutput,
    /// The archive lookup failed or had no snapshot.
    NoSnapshot,
    /// The reachability probe rejected the url; nothing was rendered.
    Unreachable,
}

impl AttemptStatus {
    pub fn is_success(self) -> bool {
        self == AttemptStatus::Success
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One strategy tried for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchAttempt {
    pub strategy: Strategy,
    pub source: AttemptSource,
    /// The url actually handed to the renderer (the snapshot url for
    /// archival attempts, the original url otherwise).
    pub source_url: String,
    pub status: AttemptStatus,
    pub duration_ms: u64,
}

impl FetchAttempt {
    pub fn new(strategy: Strategy, source_url: impl Into<String>, status: AttemptStatus) -> Self {
        Self {
            strategy,
            source: strategy.source(),
            source_url: source_url.into(),
            status,
            duration_ms: 0,
        }
    }

    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = ms;
        self
    }
}

/// Classified outcome for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalStatus {
    /// The primary render won.
    Success,
    /// The archival or direct-retrieval fallback won.
    FallbackSuccess,
    /// Every strategy failed; no file was written.
    Failed,
    /// `skip_existing` was set and the PDF was already on disk.
    Skipped,
}

impl FinalStatus {
    /// Classify the attempt sequence of a chain run.
    pub fn from_attempts(attempts: &[FetchAttempt]) -> Self {
        match attempts.iter().position(|a| a.status.is_success()) {
            Some(0) => FinalStatus::Success,
            Some(_) => FinalStatus::FallbackSuccess,
            None => FinalStatus::Failed,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, FinalStatus::Success | FinalStatus::FallbackSuccess)
    }
}

impl fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Everything known about one record after its chain completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub record: Record,
    /// Target PDF path; only exists on disk when `final_status` is a success
    /// or `Skipped`.
    pub target: PathBuf,
    pub attempts: Vec<FetchAttempt>,
    pub final_status: FinalStatus,
}

impl LogEntry {
    /// Single-line rendering used by the persistent log artifact.
    pub fn log_line(&self) -> String {
        let attempts: Vec<String> = self
            .attempts
            .iter()
            .map(|a| format!("{}({})={}@{}", a.strategy, a.source, a.status, a.source_url))
            .collect();
        format!(
            "url={} status={} attempts=[{}] target=\"{}\"",
            self.record.url,
            self.final_status,
            attempts.join(", "),
            self.target.display()
        )
    }
}

/// Aggregate result of a batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub fallback: usize,
    pub failed: usize,
    pub skipped: usize,
    pub parse_warnings: Vec<ParseWarning>,
    pub duration_ms: u64,
    pub entries: Vec<LogEntry>,
}

impl RunSummary {
    /// Fold a finished entry into the counters.
    pub fn push(&mut self, entry: LogEntry) {
        self.total += 1;
        match entry.final_status {
            FinalStatus::Success => self.succeeded += 1,
            FinalStatus::FallbackSuccess => self.fallback += 1,
            FinalStatus::Failed => self.failed += 1,
            FinalStatus::Skipped => self.skipped += 1,
        }
        self.entries.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(strategy: Strategy, status: AttemptStatus) -> FetchAttempt {
        FetchAttempt::new(strategy, "https://a.example/", status)
    }

    #[test]
    fn classify_primary_win() {
        let a = vec![attempt(Strategy::Primary, AttemptStatus::Success)];
        assert_eq!(FinalStatus::from_attempts(&a), FinalStatus::Success);
    }

    #[test]
    fn classify_fallback_win() {
        let a = vec![
            attempt(Strategy::Primary, AttemptStatus::Timeout),
            attempt(Strategy::Archival, AttemptStatus::NoSnapshot),
            attempt(Strategy::DirectRetrieval, AttemptStatus::Success),
        ];
        assert_eq!(FinalStatus::from_attempts(&a), FinalStatus::FallbackSuccess);
    }

    #[test]
    fn classify_exhausted() {
        let a = vec![
            attempt(Strategy::Primary, AttemptStatus::ProcessError),
            attempt(Strategy::Archival, AttemptStatus::EmptyOutput),
            attempt(Strategy::DirectRetrieval, AttemptStatus::Timeout),
        ];
        assert_eq!(FinalStatus::from_attempts(&a), FinalStatus::Failed);
        assert_eq!(FinalStatus::from_attempts(&[]), FinalStatus::Failed);
    }

    #[test]
    fn archival_attempt_is_archived_source() {
        assert_eq!(attempt(Strategy::Archival, AttemptStatus::Success).source, AttemptSource::Archived);
        assert_eq!(attempt(Strategy::DirectRetrieval, AttemptStatus::Success).source, AttemptSource::Direct);
    }

    #[test]
    fn log_line_lists_attempts_in_order() {
        let entry = LogEntry {
            record: Record::new("T", "https://a.example/", vec![]),
            target: PathBuf::from("out/untagged/T-a.example-0.pdf"),
            attempts: vec![
                attempt(Strategy::Primary, AttemptStatus::Timeout),
                FetchAttempt::new(Strategy::Archival, "https://web.archive.org/web/1/x", AttemptStatus::Success),
            ],
            final_status: FinalStatus::FallbackSuccess,
        };
        let line = entry.log_line();
        assert!(line.starts_with("url=https://a.example/ status=FallbackSuccess"), "{line}");
        let p = line.find("primary(Direct)=Timeout").expect("primary listed");
        let a = line.find("archival(Archived)=Success@https://web.archive.org").expect("archival listed");
        assert!(p < a);
    }

    #[test]
    fn summary_counts() {
        let mut s = RunSummary::default();
        for status in [FinalStatus::Success, FinalStatus::Failed, FinalStatus::FallbackSuccess, FinalStatus::Skipped] {
            s.push(LogEntry {
                record: Record::new("T", "https://a.example/", vec![]),
                target: PathBuf::new(),
                attempts: vec![],
                final_status: status,
            });
        }
        assert_eq!((s.total, s.succeeded, s.fallback, s.failed, s.skipped), (4, 1, 1, 1, 1));
    }
}
