//! Fetch strategy chain: primary render → archive snapshot → direct retrieval.
//!
//! The chain is an explicit ordered list of [`Strategy`] descriptors
//! evaluated one at a time until an attempt succeeds. Every attempt becomes
//! a [`FetchAttempt`]; none is retried within its step.
//!
//! ```text
//! Primary ──fail──▶ Archival ──fail / no snapshot──▶ DirectRetrieval ──fail──▶ Failed
//!    │                  │                                  │
//!  Success        FallbackSuccess                    FallbackSuccess
//! ```

use crate::output::{AttemptStatus, FetchAttempt, FinalStatus, Strategy};
use crate::pipeline::lookup::{ReachabilityProbe, SnapshotLookup};
use crate::pipeline::render::{remove_if_present, PageRenderer, RenderMode};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Strategies in priority order.
pub const STRATEGY_ORDER: [Strategy; 3] = [
    Strategy::Primary,
    Strategy::Archival,
    Strategy::DirectRetrieval,
];

/// Attempts and classification for one record.
#[derive(Debug, Clone)]
pub struct ChainOutcome {
    pub attempts: Vec<FetchAttempt>,
    pub final_status: FinalStatus,
}

/// Drives the strategies for one record at a time.
pub struct FetchChain<'a> {
    renderer: &'a dyn PageRenderer,
    lookup: &'a dyn SnapshotLookup,
    probe: Option<&'a dyn ReachabilityProbe>,
    timeout: Duration,
}

impl<'a> FetchChain<'a> {
    pub fn new(renderer: &'a dyn PageRenderer, lookup: &'a dyn SnapshotLookup, timeout: Duration) -> Self {
        Self {
            renderer,
            lookup,
            probe: None,
            timeout,
        }
    }

    /// Probe the url before the primary render; an unreachable url skips
    /// straight to the archival fallback.
    pub fn with_probe(mut self, probe: &'a dyn ReachabilityProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Try each strategy in order, stopping at the first success.
    ///
    /// `on_attempt` sees every attempt as soon as it finishes.
    pub async fn run(
        &self,
        url: &str,
        target: &Path,
        mut on_attempt: impl FnMut(&FetchAttempt),
    ) -> ChainOutcome {
        let mut attempts = Vec::with_capacity(STRATEGY_ORDER.len());

        for strategy in STRATEGY_ORDER {
            let start = Instant::now();
            let attempt = self
                .attempt(strategy, url, target)
                .await
                .with_duration_ms(start.elapsed().as_millis() as u64);
            debug!(
                "{} attempt for {}: {} in {}ms",
                strategy, url, attempt.status, attempt.duration_ms
            );
            on_attempt(&attempt);

            let won = attempt.status.is_success();
            attempts.push(attempt);
            if won {
                break;
            }
        }

        let final_status = FinalStatus::from_attempts(&attempts);
        ChainOutcome {
            attempts,
            final_status,
        }
    }

    async fn attempt(&self, strategy: Strategy, url: &str, target: &Path) -> FetchAttempt {
        match strategy {
            Strategy::Primary => {
                if let Some(probe) = self.probe {
                    if !probe.is_reachable(url).await {
                        info!("URL not accessible: {}", url);
                        return FetchAttempt::new(strategy, url, AttemptStatus::Unreachable);
                    }
                }
                let status = self.render(url, RenderMode::Full, target).await;
                FetchAttempt::new(strategy, url, status)
            }
            Strategy::Archival => match self.lookup.latest_snapshot(url).await {
                Some(snapshot) => {
                    info!("Found archive snapshot for {}: {}", url, snapshot);
                    let status = self.render(&snapshot, RenderMode::Full, target).await;
                    FetchAttempt::new(strategy, snapshot, status)
                }
                None => {
                    info!("No archive snapshot for {}", url);
                    FetchAttempt::new(strategy, url, AttemptStatus::NoSnapshot)
                }
            },
            Strategy::DirectRetrieval => {
                let status = self.render(url, RenderMode::Direct, target).await;
                FetchAttempt::new(strategy, url, status)
            }
        }
    }

    /// Render and double-check the renderer's claim of success against the
    /// file on disk.
    async fn render(&self, url: &str, mode: RenderMode, target: &Path) -> AttemptStatus {
        let status = self.renderer.render(url, mode, target, self.timeout).await;
        if !status.is_success() {
            return status;
        }
        match tokio::fs::metadata(target).await {
            Ok(meta) if meta.len() > 0 => AttemptStatus::Success,
            _ => {
                // A stray zero-byte target would otherwise look like output.
                remove_if_present(target).await;
                AttemptStatus::EmptyOutput
            }
        }
    }
}
