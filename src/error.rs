//! Error types for the pocket2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ArchiveError`]: **Fatal**: the batch cannot start at all (input
//!   file missing, output root not creatable, no browser binary). Returned
//!   as `Err(ArchiveError)` from the top-level `archive*` functions before
//!   any record is attempted.
//!
//! * [`ParseWarning`]: **Non-fatal**: a single export row was unusable.
//!   The row is skipped and the warning is counted in
//!   [`crate::output::RunSummary`]; every other row is still archived.
//!
//! Failed fetch attempts are neither: they are plain data
//! ([`crate::output::AttemptStatus`]) recorded in the run log.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pocket2pdf library.
#[derive(Debug, Error)]
pub enum ArchiveError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Export file was not found at the given path.
    #[error("Export file not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// Process does not have read permission on the export file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The export file exists but could not be read as UTF-8 text.
    #[error("Failed to read export file '{path}': {source}")]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The output root could not be created.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Renderer errors ───────────────────────────────────────────────────
    /// No headless Chrome/Chromium binary could be located.
    #[error("No Chrome/Chromium binary found{}.\n{hint}", requested.as_ref().map(|r| format!(" for '{r}'")).unwrap_or_default())]
    RendererNotFound {
        requested: Option<String>,
        hint: String,
    },

    // ── Network setup errors ──────────────────────────────────────────────
    /// The HTTP client used for archive lookups could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal problem with a single export entry.
///
/// `line` is the 1-based line (CSV, URL list) or anchor position (HTML) of
/// the offending entry.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ParseWarning {
    /// The entry has no url at all.
    #[error("Entry {line}: missing url, skipped")]
    MissingUrl { line: usize },

    /// The url is present but is not an absolute http(s) URI.
    #[error("Entry {line}: invalid url '{url}', skipped")]
    InvalidUrl { line: usize, url: String },

    /// The CSV reader could not decode the row.
    #[error("Entry {line}: malformed row: {detail}")]
    MalformedRow { line: usize, detail: String },
}

impl ParseWarning {
    /// Position of the entry the warning refers to.
    pub fn line(&self) -> usize {
        match self {
            ParseWarning::MissingUrl { line }
            | ParseWarning::InvalidUrl { line, .. }
            | ParseWarning::MalformedRow { line, .. } => *line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renderer_not_found_mentions_request() {
        let e = ArchiveError::RendererNotFound {
            requested: Some("/opt/chrome".into()),
            hint: "Pass --chrome".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("/opt/chrome"), "got: {msg}");
        assert!(msg.contains("Pass --chrome"), "got: {msg}");
    }

    #[test]
    fn renderer_not_found_without_request() {
        let e = ArchiveError::RendererNotFound {
            requested: None,
            hint: "Install chromium".into(),
        };
        assert!(e.to_string().starts_with("No Chrome/Chromium binary found."));
    }

    #[test]
    fn input_not_found_display() {
        let e = ArchiveError::InputNotFound {
            path: PathBuf::from("/nope/export.csv"),
        };
        assert!(e.to_string().contains("/nope/export.csv"));
    }

    #[test]
    fn parse_warning_line() {
        let w = ParseWarning::InvalidUrl {
            line: 7,
            url: "ftp://x".into(),
        };
        assert_eq!(w.line(), 7);
        assert!(w.to_string().contains("ftp://x"));
    }
}
