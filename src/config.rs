//! Configuration types for an archive run.
//!
//! All run behaviour is controlled through [`ArchiveConfig`], built via its
//! [`ArchiveConfigBuilder`]. The external collaborators (renderer, archive
//! lookup, reachability probe, progress sink) are injectable here so the
//! whole pipeline can run against fakes in tests.

use crate::error::ArchiveError;
use crate::pipeline::lookup::{ReachabilityProbe, SnapshotLookup};
use crate::pipeline::render::PageRenderer;
use crate::progress::ProgressCallback;
use crate::record::ExportFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name of the log artifact written under the output root.
pub const DEFAULT_LOG_FILE: &str = "url_retrieval.log";

/// Wayback Machine availability endpoint.
pub const DEFAULT_WAYBACK_ENDPOINT: &str = "https://archive.org/wayback/available";

/// Configuration for a batch run.
///
/// # Example
/// ```rust
/// use pocket2pdf::ArchiveConfig;
///
/// let config = ArchiveConfig::builder()
///     .output_root("archive")
///     .render_timeout_secs(40)
///     .skip_existing(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.render_timeout_secs, 40);
/// ```
#[derive(Clone)]
pub struct ArchiveConfig {
    /// Root directory for tag folders and the log artifact. Default: `.`.
    pub output_root: PathBuf,

    /// Chrome/Chromium executable (bare name or path). None = platform lookup.
    pub chrome_path: Option<String>,

    /// Extra flags appended to every browser invocation.
    pub chrome_args: Vec<String>,

    /// Hard wall-clock limit per render, in seconds. Default: 25.
    ///
    /// The browser is killed and reaped when it runs longer than this.
    pub render_timeout_secs: u64,

    /// Timeout for the archive availability query, in seconds. Default: 10.
    pub lookup_timeout_secs: u64,

    /// Timeout for the reachability probe, in seconds. Default: 10.
    pub probe_timeout_secs: u64,

    /// Archive availability API endpoint. Default: [`DEFAULT_WAYBACK_ENDPOINT`].
    pub wayback_endpoint: String,

    /// Probe the url over HTTP before the primary render. Default: false.
    pub preflight: bool,

    /// Do not fetch records whose PDF already exists. Default: false.
    pub skip_existing: bool,

    /// Log artifact path. None = `<output_root>/url_retrieval.log`.
    pub log_file: Option<PathBuf>,

    /// Force an export format. None = detect from extension/content.
    pub format: Option<ExportFormat>,

    /// Folder/file naming limits.
    pub naming: NamingPolicy,

    /// Pre-constructed renderer. Takes precedence over `chrome_path`.
    pub renderer: Option<Arc<dyn PageRenderer>>,

    /// Pre-constructed archive lookup. Takes precedence over `wayback_endpoint`.
    pub snapshot_lookup: Option<Arc<dyn SnapshotLookup>>,

    /// Pre-constructed reachability probe, used when `preflight` is set.
    pub probe: Option<Arc<dyn ReachabilityProbe>>,

    /// Console/progress sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("."),
            chrome_path: None,
            chrome_args: Vec::new(),
            render_timeout_secs: 25,
            lookup_timeout_secs: 10,
            probe_timeout_secs: 10,
            wayback_endpoint: DEFAULT_WAYBACK_ENDPOINT.to_string(),
            preflight: false,
            skip_existing: false,
            log_file: None,
            format: None,
            naming: NamingPolicy::default(),
            renderer: None,
            snapshot_lookup: None,
            probe: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ArchiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveConfig")
            .field("output_root", &self.output_root)
            .field("chrome_path", &self.chrome_path)
            .field("chrome_args", &self.chrome_args)
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("lookup_timeout_secs", &self.lookup_timeout_secs)
            .field("probe_timeout_secs", &self.probe_timeout_secs)
            .field("wayback_endpoint", &self.wayback_endpoint)
            .field("preflight", &self.preflight)
            .field("skip_existing", &self.skip_existing)
            .field("log_file", &self.log_file)
            .field("format", &self.format)
            .field("naming", &self.naming)
            .field("renderer", &self.renderer.as_ref().map(|_| "<dyn PageRenderer>"))
            .field("snapshot_lookup", &self.snapshot_lookup.as_ref().map(|_| "<dyn SnapshotLookup>"))
            .field("probe", &self.probe.as_ref().map(|_| "<dyn ReachabilityProbe>"))
            .finish()
    }
}

impl ArchiveConfig {
    /// Create a new builder for `ArchiveConfig`.
    pub fn builder() -> ArchiveConfigBuilder {
        ArchiveConfigBuilder {
            config: Self::default(),
        }
    }

    /// Where the log artifact goes for this run.
    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.output_root.join(DEFAULT_LOG_FILE))
    }
}

/// Builder for [`ArchiveConfig`].
#[derive(Debug)]
pub struct ArchiveConfigBuilder {
    config: ArchiveConfig,
}

impl ArchiveConfigBuilder {
    pub fn output_root(mut self, path: impl AsRef<Path>) -> Self {
        self.config.output_root = path.as_ref().to_path_buf();
        self
    }

    pub fn chrome_path(mut self, path: impl Into<String>) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    pub fn chrome_arg(mut self, arg: impl Into<String>) -> Self {
        self.config.chrome_args.push(arg.into());
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs;
        self
    }

    pub fn lookup_timeout_secs(mut self, secs: u64) -> Self {
        self.config.lookup_timeout_secs = secs;
        self
    }

    pub fn probe_timeout_secs(mut self, secs: u64) -> Self {
        self.config.probe_timeout_secs = secs;
        self
    }

    pub fn wayback_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.wayback_endpoint = endpoint.into();
        self
    }

    pub fn preflight(mut self, v: bool) -> Self {
        self.config.preflight = v;
        self
    }

    pub fn skip_existing(mut self, v: bool) -> Self {
        self.config.skip_existing = v;
        self
    }

    pub fn log_file(mut self, path: impl AsRef<Path>) -> Self {
        self.config.log_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn format(mut self, format: ExportFormat) -> Self {
        self.config.format = Some(format);
        self
    }

    pub fn naming(mut self, naming: NamingPolicy) -> Self {
        self.config.naming = naming;
        self
    }

    pub fn max_name_bytes(mut self, n: usize) -> Self {
        self.config.naming.max_name_bytes = n;
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.config.renderer = Some(renderer);
        self
    }

    pub fn snapshot_lookup(mut self, lookup: Arc<dyn SnapshotLookup>) -> Self {
        self.config.snapshot_lookup = Some(lookup);
        self
    }

    pub fn probe(mut self, probe: Arc<dyn ReachabilityProbe>) -> Self {
        self.config.probe = Some(probe);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ArchiveConfig, ArchiveError> {
        let c = &self.config;
        if c.render_timeout_secs == 0 {
            return Err(ArchiveError::InvalidConfig(
                "Render timeout must be ≥ 1 second".into(),
            ));
        }
        if c.lookup_timeout_secs == 0 || c.probe_timeout_secs == 0 {
            return Err(ArchiveError::InvalidConfig(
                "HTTP timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.naming.max_name_bytes < 8 {
            return Err(ArchiveError::InvalidConfig(format!(
                "Maximum name length must be ≥ 8 bytes, got {}",
                c.naming.max_name_bytes
            )));
        }
        if c.naming.fallback_folder.trim().is_empty() || c.naming.extension.trim().is_empty() {
            return Err(ArchiveError::InvalidConfig(
                "Fallback folder and file extension must not be empty".into(),
            ));
        }
        if !(c.wayback_endpoint.starts_with("http://") || c.wayback_endpoint.starts_with("https://")) {
            return Err(ArchiveError::InvalidConfig(format!(
                "Wayback endpoint must be an http(s) URL, got '{}'",
                c.wayback_endpoint
            )));
        }
        Ok(self.config)
    }
}

/// Folder and file naming rules.
///
/// Sanitisation removes `\ / * ? : " < > |` and control characters,
/// collapses whitespace runs to one space and trims leading/trailing
/// spaces and dots. `max_name_bytes` caps the title (and folder) component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingPolicy {
    /// Cap for a sanitised title or folder name, in bytes. Default: 150.
    pub max_name_bytes: usize,
    /// Folder used when a record has no usable tag. Default: `untagged`.
    pub fallback_folder: String,
    /// Title used when the sanitised title is empty. Default: `untitled`.
    pub fallback_title: String,
    /// File extension without the dot. Default: `pdf`.
    pub extension: String,
}

impl Default for NamingPolicy {
    fn default() -> Self {
        Self {
            max_name_bytes: 150,
            fallback_folder: "untagged".to_string(),
            fallback_title: "untitled".to_string(),
            extension: "pdf".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ArchiveConfig::default();
        assert_eq!(c.render_timeout_secs, 25);
        assert_eq!(c.naming.max_name_bytes, 150);
        assert_eq!(c.naming.fallback_folder, "untagged");
        assert!(!c.preflight);
        assert_eq!(c.log_path(), PathBuf::from("./url_retrieval.log"));
    }

    #[test]
    fn log_path_override() {
        let c = ArchiveConfig::builder()
            .output_root("/tmp/out")
            .log_file("/var/log/p2p.log")
            .build()
            .unwrap();
        assert_eq!(c.log_path(), PathBuf::from("/var/log/p2p.log"));
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = ArchiveConfig::builder().render_timeout_secs(0).build().unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidConfig(_)));
    }

    #[test]
    fn tiny_name_limit_rejected() {
        assert!(ArchiveConfig::builder().max_name_bytes(3).build().is_err());
    }

    #[test]
    fn bad_endpoint_rejected() {
        assert!(ArchiveConfig::builder().wayback_endpoint("archive.org").build().is_err());
    }

    #[test]
    fn debug_hides_trait_objects() {
        let s = format!("{:?}", ArchiveConfig::default());
        assert!(s.contains("render_timeout_secs: 25"));
    }
}
