//! # pocket2pdf
//!
//! Turn a bookmark export (Pocket CSV/HTML, or a plain URL list) into a
//! folder tree of PDFs, one folder per first tag.
//!
//! ## Why this crate?
//!
//! Saved links rot. A plain HTTP download of a modern page captures little
//! more than a script loader, so each page is printed by a real headless
//! browser instead. When the live page cannot be printed (timeout, crash,
//! empty output) the most recent Wayback Machine snapshot is tried, then a
//! script-free direct render. Every outcome is appended to a log file so a
//! batch of thousands can be audited afterwards.
//!
//! ## Pipeline Overview
//!
//! ```text
//! export
//!  │
//!  ├─ 1. Extract  CSV / HTML / URL list → records + parse warnings
//!  ├─ 2. Name     <root>/<first tag>/<title>-<domain>-<n>.pdf
//!  ├─ 3. Chain    primary render → archive snapshot → direct render
//!  ├─ 4. Render   one browser process per attempt, hard timeout
//!  └─ 5. Log      one line per record + progress events
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pocket2pdf::{archive, ArchiveConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ArchiveConfig::builder()
//!         .output_root("archive")
//!         .render_timeout_secs(30)
//!         .build()?;
//!     let summary = archive("ril_export.html", &config).await?;
//!     eprintln!(
//!         "{} saved, {} via fallback, {} failed",
//!         summary.succeeded, summary.fallback, summary.failed
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pocket2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pocket2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod archive;
pub mod config;
pub mod error;
pub mod logger;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod record;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use archive::{archive, archive_records, archive_sync, inspect, plan, Collaborators};
pub use config::{ArchiveConfig, ArchiveConfigBuilder, NamingPolicy};
pub use error::{ArchiveError, ParseWarning};
pub use logger::{LogSink, OutcomeLogger};
pub use output::{
    AttemptSource, AttemptStatus, FetchAttempt, FinalStatus, LogEntry, RunSummary, Strategy,
};
pub use pipeline::extract::Extraction;
pub use pipeline::lookup::{ReachabilityProbe, SnapshotLookup};
pub use pipeline::render::{PageRenderer, RenderMode};
pub use progress::{ArchiveProgressCallback, NoopProgressCallback, ProgressCallback};
pub use record::{ExportFormat, Record};
