//! Batch entry points.
//!
//! [`archive`] is the whole tool: read the export, extract records, and run
//! each record through the fetch chain in order. Only setup problems are
//! `Err`; once the batch has started, every record ends up as a
//! [`LogEntry`] in the returned [`RunSummary`] no matter what happened to
//! it.

use crate::config::ArchiveConfig;
use crate::error::ArchiveError;
use crate::logger::OutcomeLogger;
use crate::output::{FinalStatus, LogEntry, RunSummary};
use crate::pipeline::chain::FetchChain;
use crate::pipeline::extract::{self, Extraction};
use crate::pipeline::lookup::{HttpProbe, ReachabilityProbe, SnapshotLookup, WaybackLookup};
use crate::pipeline::naming::{NameAllocator, NamingContext};
use crate::pipeline::render::{resolve_chrome_binary, ChromeRenderer, PageRenderer};
use crate::record::{ExportFormat, Record};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// The external services one run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub renderer: Arc<dyn PageRenderer>,
    pub lookup: Arc<dyn SnapshotLookup>,
    /// Only consulted when `preflight` is enabled.
    pub probe: Option<Arc<dyn ReachabilityProbe>>,
}

impl Collaborators {
    /// Resolve collaborators with the priority chain: injected instance,
    /// then the built-in implementation configured from `config`.
    ///
    /// # Errors
    /// [`ArchiveError::RendererNotFound`] when no renderer was injected and
    /// no browser binary can be located.
    pub fn from_config(config: &ArchiveConfig) -> Result<Self, ArchiveError> {
        let renderer: Arc<dyn PageRenderer> = match &config.renderer {
            Some(r) => Arc::clone(r),
            None => {
                let binary = resolve_chrome_binary(config.chrome_path.as_deref())?;
                info!("Using browser: {}", binary.display());
                Arc::new(ChromeRenderer::new(binary).with_extra_args(config.chrome_args.clone()))
            }
        };

        let lookup: Arc<dyn SnapshotLookup> = match &config.snapshot_lookup {
            Some(l) => Arc::clone(l),
            None => Arc::new(WaybackLookup::new(
                config.wayback_endpoint.clone(),
                Duration::from_secs(config.lookup_timeout_secs),
            )?),
        };

        let probe: Option<Arc<dyn ReachabilityProbe>> = if !config.preflight {
            None
        } else {
            match &config.probe {
                Some(p) => Some(Arc::clone(p)),
                None => Some(Arc::new(HttpProbe::new(Duration::from_secs(
                    config.probe_timeout_secs,
                ))?)),
            }
        };

        Ok(Self {
            renderer,
            lookup,
            probe,
        })
    }
}

/// Archive every bookmark in the export at `input`.
///
/// # Returns
/// `Ok(RunSummary)` once every record has been processed, even if all of
/// them failed (check `summary.failed`).
///
/// # Errors
/// Only fatal setup errors:
/// - export missing or unreadable
/// - output root cannot be created
/// - no browser binary found
pub async fn archive(
    input: impl AsRef<Path>,
    config: &ArchiveConfig,
) -> Result<RunSummary, ArchiveError> {
    let started = Instant::now();
    let input = input.as_ref();
    info!("Starting archive run: {}", input.display());

    // ── Step 1: Parse export ─────────────────────────────────────────────
    let extraction = read_and_extract(input, config.format).await?;

    // ── Step 2: Prepare output root ──────────────────────────────────────
    tokio::fs::create_dir_all(&config.output_root)
        .await
        .map_err(|e| ArchiveError::OutputDirFailed {
            path: config.output_root.clone(),
            source: e,
        })?;

    // ── Step 3: Resolve collaborators ────────────────────────────────────
    let collaborators = Collaborators::from_config(config)?;

    // ── Step 4: Open log artifact ────────────────────────────────────────
    let log_path = config.log_path();
    if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        // An unusable log location is reported by the logger itself.
        let _ = tokio::fs::create_dir_all(parent).await;
    }
    let mut logger = OutcomeLogger::open(&log_path, config.progress_callback.clone());

    // ── Step 5: Run the batch ────────────────────────────────────────────
    let mut summary = archive_records(extraction, config, &collaborators, &mut logger).await;
    summary.duration_ms = started.elapsed().as_millis() as u64;

    info!(
        "Archive run complete: {} records, {} direct, {} fallback, {} failed, {} skipped in {}ms",
        summary.total,
        summary.succeeded,
        summary.fallback,
        summary.failed,
        summary.skipped,
        summary.duration_ms
    );
    Ok(summary)
}

/// Run already-extracted records through the fetch chain, strictly in
/// order, one at a time.
///
/// Never fails: every record yields exactly one [`LogEntry`].
pub async fn archive_records(
    extraction: Extraction,
    config: &ArchiveConfig,
    collaborators: &Collaborators,
    logger: &mut OutcomeLogger,
) -> RunSummary {
    let started = Instant::now();
    let Extraction { records, warnings } = extraction;
    let total = records.len();
    let mut allocator = NameAllocator::new(config.naming.clone(), &config.output_root);
    let mut chain = FetchChain::new(
        collaborators.renderer.as_ref(),
        collaborators.lookup.as_ref(),
        Duration::from_secs(config.render_timeout_secs),
    );
    if let Some(probe) = collaborators.probe.as_deref() {
        chain = chain.with_probe(probe);
    }

    let mut summary = RunSummary {
        parse_warnings: warnings,
        ..RunSummary::default()
    };
    logger.run_started(total);

    for (i, record) in records.into_iter().enumerate() {
        let index = i + 1;
        logger.record_started(index, total, &record);

        if config.skip_existing {
            if let Some(existing) = allocator.existing(&record) {
                info!("Skipping {}: {} already exists", record.url, existing.display());
                let entry = LogEntry {
                    record,
                    target: existing,
                    attempts: Vec::new(),
                    final_status: FinalStatus::Skipped,
                };
                logger.record(index, total, &entry);
                summary.push(entry);
                continue;
            }
        }

        let target = allocator.allocate(&record);
        debug!("Target for {}: {}", record.url, target.path.display());

        let entry = match tokio::fs::create_dir_all(config.output_root.join(&target.folder)).await {
            Ok(()) => {
                let outcome = chain
                    .run(&record.url, &target.path, |attempt| {
                        logger.attempt_finished(index, total, attempt)
                    })
                    .await;
                LogEntry {
                    record,
                    target: target.path,
                    attempts: outcome.attempts,
                    final_status: outcome.final_status,
                }
            }
            Err(e) => {
                warn!("Cannot create folder '{}': {}", target.folder, e);
                LogEntry {
                    record,
                    target: target.path,
                    attempts: Vec::new(),
                    final_status: FinalStatus::Failed,
                }
            }
        };

        logger.record(index, total, &entry);
        summary.push(entry);
    }

    summary.duration_ms = started.elapsed().as_millis() as u64;
    logger.run_finished(&summary);
    summary
}

/// Synchronous wrapper around [`archive`].
///
/// Creates a temporary tokio runtime internally.
pub fn archive_sync(
    input: impl AsRef<Path>,
    config: &ArchiveConfig,
) -> Result<RunSummary, ArchiveError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ArchiveError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(archive(input, config))
}

/// Parse an export without fetching anything.
///
/// Does not require a browser or network access.
pub async fn inspect(
    input: impl AsRef<Path>,
    format: Option<ExportFormat>,
) -> Result<Extraction, ArchiveError> {
    read_and_extract(input.as_ref(), format).await
}

/// Targets a run would use for `records`, without touching the filesystem
/// beyond existence checks.
pub fn plan(records: &[Record], config: &ArchiveConfig) -> Vec<NamingContext> {
    let mut allocator = NameAllocator::new(config.naming.clone(), &config.output_root);
    records.iter().map(|r| allocator.allocate(r)).collect()
}

async fn read_and_extract(
    input: &Path,
    format: Option<ExportFormat>,
) -> Result<Extraction, ArchiveError> {
    let content = read_export(input).await?;
    let format = format.unwrap_or_else(|| ExportFormat::detect(input, &content));
    debug!("Export format: {}", format);
    let extraction = extract::extract(&content, format);
    info!(
        "Extracted {} records ({} skipped) from {}",
        extraction.records.len(),
        extraction.warnings.len(),
        input.display()
    );
    Ok(extraction)
}

async fn read_export(path: &Path) -> Result<String, ArchiveError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => ArchiveError::InputNotFound {
            path: path.to_path_buf(),
        },
        ErrorKind::PermissionDenied => ArchiveError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ArchiveError::InputUnreadable {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    String::from_utf8(bytes).map_err(|e| ArchiveError::InputUnreadable {
        path: path.to_path_buf(),
        source: std::io::Error::new(ErrorKind::InvalidData, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_export_is_fatal() {
        let err = inspect("/definitely/not/here.csv", None).await.unwrap_err();
        assert!(matches!(err, ArchiveError::InputNotFound { .. }));
    }

    #[tokio::test]
    async fn non_utf8_export_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0xc3]).unwrap();
        let err = inspect(&path, None).await.unwrap_err();
        assert!(matches!(err, ArchiveError::InputUnreadable { .. }));
    }

    #[tokio::test]
    async fn inspect_detects_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.txt");
        std::fs::write(&path, "# saved\nhttps://a.example/\n\nnot a url\n").unwrap();
        let extraction = inspect(&path, None).await.unwrap();
        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.warnings.len(), 1);
    }

    #[test]
    fn plan_assigns_distinct_targets() {
        let dir = tempfile::tempdir().unwrap();
        let config = ArchiveConfig::builder().output_root(dir.path()).build().unwrap();
        let records = vec![
            Record::new("Same", "https://a.example/1", vec!["t".into()]),
            Record::new("Same", "https://a.example/2", vec!["t".into()]),
        ];
        let targets = plan(&records, &config);
        assert_eq!(targets[0].filename, "Same-a.example-0.pdf");
        assert_eq!(targets[1].filename, "Same-a.example-1.pdf");
        assert!(!dir.path().join("t").exists());
    }

    #[test]
    fn missing_browser_is_fatal() {
        let config = ArchiveConfig::builder()
            .chrome_path("/nonexistent/chrome-binary")
            .build()
            .unwrap();
        let err = Collaborators::from_config(&config).err().unwrap();
        assert!(matches!(err, ArchiveError::RendererNotFound { .. }));
    }
}
