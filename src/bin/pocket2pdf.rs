//! CLI binary for pocket2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ArchiveConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pocket2pdf::{
    archive, inspect, plan, ArchiveConfig, ArchiveProgressCallback, ExportFormat, FetchAttempt,
    FinalStatus, LogEntry, ProgressCallback, Record, RunSummary,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn blue(s: &str) -> String {
    format!("\x1b[34m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// How much the terminal shows during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Console {
    /// Nothing but errors.
    Silent,
    /// Coloured per-record lines on stderr, no bar.
    Lines,
    /// Coloured lines above a progress bar.
    Bar,
}

fn console_mode(cli: &Cli) -> Console {
    if cli.quiet || cli.dry_run {
        Console::Silent
    } else if cli.no_progress || cli.json {
        Console::Lines
    } else {
        Console::Bar
    }
}

/// Terminal progress: a coloured line per event, above a bar when one is
/// shown.
///
/// Blue marks the start of a record, red a failure, green a success (direct
/// or fallback).
struct CliProgressCallback {
    bar: Option<ProgressBar>,
}

impl CliProgressCallback {
    fn for_console(console: Console) -> Option<Arc<Self>> {
        match console {
            Console::Silent => None,
            Console::Lines => Some(Arc::new(Self { bar: None })),
            Console::Bar => Some(Self::with_bar()),
        }
    }

    fn with_bar() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>4}/{len} links  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Archiving");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar: Some(bar) })
    }

    fn line(&self, line: String) {
        match &self.bar {
            Some(bar) => bar.println(line),
            None => eprintln!("{line}"),
        }
    }
}

impl ArchiveProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_records: usize) {
        if let Some(bar) = &self.bar {
            bar.set_length(total_records as u64);
            bar.reset_eta();
        }
        self.line(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Archiving {total_records} links…"))
        ));
    }

    fn on_record_start(&self, index: usize, total: usize, record: &Record) {
        self.line(format!(
            "{} [{:>4}/{:<4}] Processing: {}",
            blue("▶"),
            index,
            total,
            blue(&truncate(&record.url, 100)),
        ));
        if let Some(bar) = &self.bar {
            bar.set_message(truncate(&record.title, 40));
        }
    }

    fn on_attempt(&self, _index: usize, _total: usize, attempt: &FetchAttempt) {
        if !attempt.status.is_success() {
            self.line(format!(
                "    {} {} {}",
                dim(&attempt.strategy.to_string()),
                dim(&attempt.status.to_string()),
                dim(&format!("{:.1}s", attempt.duration_ms as f64 / 1000.0)),
            ));
        }
    }

    fn on_record_complete(&self, _index: usize, _total: usize, entry: &LogEntry) {
        let line = match entry.final_status {
            FinalStatus::Success => format!(
                "  {} Saved {}",
                green("✓"),
                green(&entry.target.display().to_string())
            ),
            FinalStatus::FallbackSuccess => {
                let via = entry
                    .attempts
                    .last()
                    .map(|a| a.strategy.to_string())
                    .unwrap_or_default();
                format!(
                    "  {} Saved {} {}",
                    green("✓"),
                    green(&entry.target.display().to_string()),
                    dim(&format!("(via {via})"))
                )
            }
            FinalStatus::Skipped => format!(
                "  {} Exists {}",
                dim("="),
                dim(&entry.target.display().to_string())
            ),
            FinalStatus::Failed => format!(
                "  {} Failed {}",
                red("✗"),
                red(&truncate(&entry.record.url, 100))
            ),
        };
        self.line(line);
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    fn on_log_error(&self, error: &str) {
        self.line(format!("{} {}", red("!"), red(&format!("Log file unavailable: {error}"))));
    }

    fn on_run_complete(&self, _summary: &RunSummary) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Archive a Pocket HTML export into ./archive
  pocket2pdf --input ril_export.html --output archive

  # CSV export, longer timeout, explicit browser
  pocket2pdf -i part_000000.csv -o archive --timeout 60 --chrome /usr/bin/chromium

  # Re-run without fetching what is already saved
  pocket2pdf -i ril_export.html -o archive --skip-existing

  # Show where every link would be written, without rendering
  pocket2pdf -i ril_export.html -o archive --dry-run

  # Machine-readable summary
  pocket2pdf -i links.txt -o archive --json > summary.json

OUTPUT LAYOUT:
  <output>/<first tag or "untagged">/<title>-<domain>-<n>.pdf
  <output>/url_retrieval.log          one line per link, appended per run

FETCH ORDER (stops at the first success):
  1. primary   headless Chrome render of the live page
  2. archival  render of the latest Wayback Machine snapshot
  3. direct    script-free render of the live page

ENVIRONMENT VARIABLES:
  CHROME_BIN                 Browser executable (same as --chrome)
  POCKET2PDF_OUTPUT          Output root (same as --output)
  POCKET2PDF_TIMEOUT         Render timeout in seconds
  POCKET2PDF_CHROME_ARGS     Extra browser flags, whitespace-separated;
                             ignored when --chrome-arg is given
  RUST_LOG                   Override the tracing filter (e.g. pocket2pdf=debug)
"#;

/// Archive bookmark exports as tagged PDF folders.
#[derive(Parser, Debug)]
#[command(
    name = "pocket2pdf",
    version,
    about = "Archive bookmark exports as tagged PDF folders",
    long_about = "Render every link of a Pocket CSV/HTML export (or a plain URL list) to PDF \
with headless Chrome. Pages that cannot be printed fall back to the latest Wayback Machine \
snapshot, then to a script-free render. Every outcome is appended to url_retrieval.log.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Export file: Pocket CSV, Pocket HTML, or one URL per line.
    #[arg(short, long, env = "POCKET2PDF_INPUT")]
    input: PathBuf,

    /// Root directory for tag folders and the log file.
    #[arg(short, long, env = "POCKET2PDF_OUTPUT")]
    output: PathBuf,

    /// Chrome/Chromium executable (path or name on PATH).
    #[arg(long, env = "CHROME_BIN")]
    chrome: Option<String>,

    /// Extra browser flag, repeatable (e.g. --chrome-arg=--no-sandbox).
    /// Each value is passed through whole, spaces included.
    #[arg(long = "chrome-arg", allow_hyphen_values = true)]
    chrome_args: Vec<String>,

    /// Hard per-render timeout in seconds.
    #[arg(short, long, env = "POCKET2PDF_TIMEOUT", default_value_t = 25,
          value_parser = clap::value_parser!(u64).range(1..=3600))]
    timeout: u64,

    /// Export format; detected from extension/content when omitted.
    #[arg(long, env = "POCKET2PDF_FORMAT", value_enum)]
    format: Option<FormatArg>,

    /// Log file path. Default: <output>/url_retrieval.log.
    #[arg(long, env = "POCKET2PDF_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Skip links whose PDF already exists.
    #[arg(long, env = "POCKET2PDF_SKIP_EXISTING")]
    skip_existing: bool,

    /// Check each URL over HTTP before launching the browser.
    #[arg(long, env = "POCKET2PDF_PREFLIGHT")]
    preflight: bool,

    /// Maximum bytes for a sanitised title or folder name.
    #[arg(long, env = "POCKET2PDF_MAX_NAME_LEN", default_value_t = 150)]
    max_name_len: usize,

    /// Wayback Machine availability endpoint.
    #[arg(long, env = "POCKET2PDF_WAYBACK_ENDPOINT")]
    wayback_endpoint: Option<String>,

    /// Timeout for archive lookups and preflight probes, in seconds.
    #[arg(long, env = "POCKET2PDF_HTTP_TIMEOUT", default_value_t = 10)]
    http_timeout: u64,

    /// Print planned targets only; nothing is rendered.
    #[arg(long)]
    dry_run: bool,

    /// Output the run summary (or dry-run plan) as JSON on stdout.
    #[arg(long, env = "POCKET2PDF_JSON")]
    json: bool,

    /// Disable the progress bar; per-link lines are still printed.
    #[arg(long, env = "POCKET2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "POCKET2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "POCKET2PDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Csv,
    Html,
    #[value(name = "url-list")]
    UrlList,
}

impl From<FormatArg> for ExportFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Html => ExportFormat::Html,
            FormatArg::UrlList => ExportFormat::UrlList,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Per-link console lines replace INFO-level library logs.
    let console = console_mode(&cli);
    let filter = if cli.verbose {
        "debug"
    } else if console == Console::Lines {
        "warn"
    } else {
        "error"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = CliProgressCallback::for_console(console)
        .map(|cb| cb as Arc<dyn ArchiveProgressCallback>);
    let config = build_config(&cli, progress_cb)?;

    // ── Dry run ──────────────────────────────────────────────────────────
    if cli.dry_run {
        let extraction = inspect(&cli.input, config.format)
            .await
            .context("Failed to read export")?;
        let targets = plan(&extraction.records, &config);

        if cli.json {
            let rows: Vec<serde_json::Value> = extraction
                .records
                .iter()
                .zip(&targets)
                .map(|(r, t)| serde_json::json!({ "record": r, "target": t.path }))
                .collect();
            let doc = serde_json::json!({ "plan": rows, "parse_warnings": extraction.warnings });
            println!(
                "{}",
                serde_json::to_string_pretty(&doc).context("Failed to serialise plan")?
            );
        } else {
            for (record, target) in extraction.records.iter().zip(&targets) {
                println!("{}  →  {}", record.url, target.path.display());
            }
            for w in &extraction.warnings {
                eprintln!("{} {}", cyan("⚠"), w);
            }
        }
        return Ok(());
    }

    // ── Run archive ──────────────────────────────────────────────────────
    let summary = archive(&cli.input, &config)
        .await
        .context("Archive run failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?;
        println!("{json}");
    } else if !cli.quiet {
        for w in &summary.parse_warnings {
            eprintln!("{} {}", cyan("⚠"), w);
        }
        eprintln!(
            "{}  {} saved  {} via fallback  {} failed  {} skipped  {}ms  →  {}",
            if summary.failed == 0 {
                green("✔")
            } else if summary.failed == summary.total {
                red("✘")
            } else {
                cyan("⚠")
            },
            bold(&summary.succeeded.to_string()),
            bold(&summary.fallback.to_string()),
            red(&summary.failed.to_string()),
            dim(&summary.skipped.to_string()),
            summary.duration_ms,
            bold(&config.log_path().display().to_string()),
        );
    }

    Ok(())
}

const CHROME_ARGS_ENV: &str = "POCKET2PDF_CHROME_ARGS";

/// Browser flags from the environment, one per whitespace-separated word.
fn split_env_args(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

/// Map CLI args to `ArchiveConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ArchiveConfig> {
    let mut builder = ArchiveConfig::builder()
        .output_root(&cli.output)
        .render_timeout_secs(cli.timeout)
        .lookup_timeout_secs(cli.http_timeout)
        .probe_timeout_secs(cli.http_timeout)
        .skip_existing(cli.skip_existing)
        .preflight(cli.preflight)
        .max_name_bytes(cli.max_name_len);

    if let Some(ref chrome) = cli.chrome {
        builder = builder.chrome_path(chrome);
    }
    let chrome_args = if cli.chrome_args.is_empty() {
        std::env::var(CHROME_ARGS_ENV)
            .map(|v| split_env_args(&v))
            .unwrap_or_default()
    } else {
        cli.chrome_args.clone()
    };
    for arg in chrome_args.iter().filter(|a| !a.is_empty()) {
        builder = builder.chrome_arg(arg);
    }
    if let Some(format) = cli.format {
        builder = builder.format(format.into());
    }
    if let Some(ref log_file) = cli.log_file {
        builder = builder.log_file(log_file);
    }
    if let Some(ref endpoint) = cli.wayback_endpoint {
        builder = builder.wayback_endpoint(endpoint);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Cli {
        let mut args = vec!["pocket2pdf", "-i", "links.txt", "-o", "out"];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn chrome_arg_keeps_spaces() {
        let cli = parse(&["--chrome-arg=--user-agent=Foo Bar", "--chrome-arg", "--no-sandbox"]);
        assert_eq!(cli.chrome_args, vec!["--user-agent=Foo Bar", "--no-sandbox"]);

        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.chrome_args, vec!["--user-agent=Foo Bar", "--no-sandbox"]);
    }

    #[test]
    fn env_chrome_args_split_on_whitespace() {
        assert_eq!(
            split_env_args("  --no-sandbox\t--disable-gpu \n"),
            vec!["--no-sandbox", "--disable-gpu"]
        );
        assert!(split_env_args("   ").is_empty());
    }

    #[test]
    fn console_lines_survive_without_bar() {
        assert_eq!(console_mode(&parse(&[])), Console::Bar);
        assert_eq!(console_mode(&parse(&["--no-progress"])), Console::Lines);
        assert_eq!(console_mode(&parse(&["--json"])), Console::Lines);
        assert_eq!(console_mode(&parse(&["--quiet"])), Console::Silent);
        assert_eq!(console_mode(&parse(&["--dry-run"])), Console::Silent);

        let lines = CliProgressCallback::for_console(Console::Lines).unwrap();
        assert!(lines.bar.is_none());
        assert!(CliProgressCallback::for_console(Console::Silent).is_none());
    }
}
