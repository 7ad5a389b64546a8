//! Render invoker: one headless-browser run, one PDF, one hard deadline.
//!
//! ## Why a staging file?
//!
//! Chrome writes `--print-to-pdf` output incrementally and a crash can
//! leave a zero-byte or truncated file behind. The browser is therefore
//! pointed at `<target>.part`; only a non-empty staging file is renamed onto
//! the target, and every other exit path deletes it. The target itself is
//! created only on [`AttemptStatus::Success`].
//!
//! ## Why kill, not wait?
//!
//! A hung renderer must never freeze the batch. The child is spawned with
//! `kill_on_drop(true)` and awaited under `tokio::time::timeout`; on expiry
//! it is killed and reaped before the invoker returns.
//!
//! Chrome is multi-process, so on unix the child leads its own process
//! group and the whole group is killed. Helpers outlive a killed parent
//! otherwise.

use crate::error::ArchiveError;
use crate::output::AttemptStatus;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

/// How the browser fetches the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// `--headless=new` with scripts enabled; used for the primary and
    /// archival strategies.
    Full,
    /// Legacy `--headless` with JavaScript disabled; gets past pages whose
    /// scripts stall or block automated rendering.
    Direct,
}

/// Produces a PDF for a url. The seam the fetch chain drives.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Render `url` to `output_path` within `timeout`.
    ///
    /// Implementations must create `output_path` only on
    /// [`AttemptStatus::Success`] and must return within `timeout` plus
    /// termination overhead.
    async fn render(
        &self,
        url: &str,
        mode: RenderMode,
        output_path: &Path,
        timeout: Duration,
    ) -> AttemptStatus;
}

/// Headless Chrome/Chromium via `--print-to-pdf`.
#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    binary: PathBuf,
    extra_args: Vec<String>,
}

impl ChromeRenderer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            extra_args: Vec::new(),
        }
    }

    /// Extra flags appended after the built-in ones (e.g. `--no-sandbox`).
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn render(
        &self,
        url: &str,
        mode: RenderMode,
        output_path: &Path,
        timeout: Duration,
    ) -> AttemptStatus {
        let staged = staging_path(output_path);
        let staged_abs = std::path::absolute(&staged).unwrap_or_else(|_| staged.clone());

        // Throwaway profile per launch so a crashed run never leaves a
        // locked profile for the next one.
        let profile = match tempfile::Builder::new()
            .prefix("pocket2pdf-profile.")
            .tempdir()
        {
            Ok(dir) => dir,
            Err(e) => {
                warn!("Failed to create browser profile dir: {}", e);
                return AttemptStatus::ProcessError;
            }
        };

        let mut command = Command::new(&self.binary);
        command
            .args(chrome_args(mode, profile.path(), &staged_abs))
            .args(&self.extra_args)
            .arg(url);
        debug!("Launching {} ({:?}) for {}", self.binary.display(), mode, url);

        invoke(command, &staged, output_path, timeout).await
    }
}

/// Command-line flags for one Chrome launch.
pub fn chrome_args(mode: RenderMode, profile_dir: &Path, pdf_path: &Path) -> Vec<String> {
    let mut args = match mode {
        RenderMode::Full => vec![
            "--headless=new".to_string(),
            "--run-all-compositor-stages-before-draw".to_string(),
        ],
        RenderMode::Direct => vec![
            "--headless".to_string(),
            "--disable-javascript".to_string(),
            "--blink-settings=scriptEnabled=false".to_string(),
        ],
    };
    args.extend([
        "--disable-gpu".to_string(),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-extensions".to_string(),
        "--hide-scrollbars".to_string(),
        "--no-pdf-header-footer".to_string(),
        format!("--user-data-dir={}", profile_dir.display()),
        format!("--print-to-pdf={}", pdf_path.display()),
    ]);
    args
}

/// Appended to the target file name while the browser is writing.
pub const STAGING_SUFFIX: &str = ".part";

/// `<target>.part`, next to the target so the final rename is atomic.
pub fn staging_path(output_path: &Path) -> PathBuf {
    let mut name: OsString = output_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("render"));
    name.push(STAGING_SUFFIX);
    output_path.with_file_name(name)
}

/// Run `command`, which is expected to write `staged`, under a hard deadline.
///
/// | Outcome | Status |
/// |---------|--------|
/// | spawn failed / non-zero exit / wait error | `ProcessError` |
/// | deadline passed (group killed, child reaped) | `Timeout` |
/// | clean exit, `staged` missing or empty     | `EmptyOutput` |
/// | clean exit, `staged` non-empty            | `Success` (`staged` renamed to `output_path`) |
///
/// `staged` never survives a non-success return.
pub async fn invoke(
    mut command: Command,
    staged: &Path,
    output_path: &Path,
    timeout: Duration,
) -> AttemptStatus {
    remove_if_present(staged).await;

    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let start = Instant::now();
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!("Failed to launch renderer: {}", e);
            return AttemptStatus::ProcessError;
        }
    };
    let group = child.id();

    let waited = tokio::time::timeout(timeout, child.wait()).await;
    let status = match waited {
        Ok(Ok(exit)) if exit.success() => finalize(staged, output_path).await,
        Ok(Ok(exit)) => {
            debug!("Renderer exited with {}", exit);
            AttemptStatus::ProcessError
        }
        Ok(Err(e)) => {
            warn!("Failed to wait for renderer: {}", e);
            AttemptStatus::ProcessError
        }
        Err(_) => {
            // kill() also reaps, so no zombie is left behind.
            if let Err(e) = child.kill().await {
                warn!("Failed to kill timed-out renderer: {}", e);
            }
            warn!(
                "Renderer timed out after {}s (killed after {}ms)",
                timeout.as_secs(),
                start.elapsed().as_millis()
            );
            AttemptStatus::Timeout
        }
    };

    // The group outlives its reaped leader while any helper is alive.
    kill_group(group);

    if !status.is_success() {
        remove_if_present(staged).await;
    }
    status
}

/// SIGKILL every process in the renderer's group. ESRCH (group already
/// empty) is the normal case after a clean exit.
#[cfg(unix)]
fn kill_group(pgid: Option<u32>) {
    let Some(pgid) = pgid.and_then(|p| i32::try_from(p).ok()).filter(|p| *p > 1) else {
        return;
    };
    // SAFETY: killpg only sends a signal; the return value is checked.
    let result = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if result == 0 {
        debug!("Killed renderer process group {}", pgid);
        return;
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() != Some(libc::ESRCH) {
        warn!("Failed to kill renderer process group {}: {}", pgid, err);
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: Option<u32>) {}

async fn finalize(staged: &Path, output_path: &Path) -> AttemptStatus {
    match tokio::fs::metadata(staged).await {
        Ok(meta) if meta.len() > 0 => match tokio::fs::rename(staged, output_path).await {
            Ok(()) => AttemptStatus::Success,
            Err(e) => {
                warn!("Failed to move {} into place: {}", staged.display(), e);
                AttemptStatus::ProcessError
            }
        },
        _ => {
            debug!("Renderer produced no output at {}", staged.display());
            AttemptStatus::EmptyOutput
        }
    }
}

/// Delete `path`, treating "already gone" as success and logging anything else.
pub(crate) async fn remove_if_present(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed stale {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

// ── Binary lookup ────────────────────────────────────────────────────────

/// Locate the browser binary.
///
/// Resolution order: `requested` (path or bare name on `PATH`), then the
/// `CHROME_BIN` environment variable, then the platform's standard
/// install locations and executable names.
pub fn resolve_chrome_binary(requested: Option<&str>) -> Result<PathBuf, ArchiveError> {
    if let Some(program) = requested.map(str::trim).filter(|p| !p.is_empty()) {
        return resolve_program_path(Path::new(program)).ok_or_else(|| {
            ArchiveError::RendererNotFound {
                requested: Some(program.to_string()),
                hint: "Pass --chrome with a path to an existing Chrome/Chromium executable.".into(),
            }
        });
    }

    if let Ok(value) = std::env::var("CHROME_BIN") {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return resolve_program_path(Path::new(trimmed)).ok_or_else(|| {
                ArchiveError::RendererNotFound {
                    requested: Some(trimmed.to_string()),
                    hint: "CHROME_BIN does not point at an executable.".into(),
                }
            });
        }
    }

    let candidates = platform_candidates();
    candidates
        .iter()
        .find_map(|c| resolve_program_path(Path::new(c)))
        .ok_or_else(|| ArchiveError::RendererNotFound {
            requested: None,
            hint: format!(
                "Looked for: {}.\nInstall Chrome or Chromium, pass --chrome /path/to/chrome, or set CHROME_BIN.",
                candidates.join(", ")
            ),
        })
}

fn platform_candidates() -> &'static [&'static str] {
    match std::env::consts::OS {
        "macos" => &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "google-chrome",
            "chromium",
            "chrome",
        ],
        "windows" => &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            "chrome.exe",
            "chromium.exe",
        ],
        _ => &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
            "chrome",
        ],
    }
}

/// A path with a separator must exist as a file; a bare name is searched on `PATH`.
pub fn resolve_program_path(program: &Path) -> Option<PathBuf> {
    let has_separator = program.components().count() > 1;
    if has_separator || program.is_absolute() {
        return program.is_file().then(|| program.to_path_buf());
    }
    find_in_path(program.to_str()?)
}

fn find_in_path(program: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
