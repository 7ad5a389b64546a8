//! Export parsing: CSV, HTML or plain URL list → ordered [`Record`]s.
//!
//! Parsing is a pure transform over the file content. Unusable entries are
//! never fatal: they are skipped and reported as [`ParseWarning`]s so one
//! broken row cannot cost the rest of the export.

use crate::error::ParseWarning;
use crate::record::{ExportFormat, Record};
use once_cell::sync::Lazy;
use reqwest::Url;
use scraper::{Html, Selector};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Title given to entries that have none.
pub const UNTITLED: &str = "untitled";

const URL_COLUMNS: &[&str] = &["resolved_url", "given_url", "url"];
const TITLE_COLUMNS: &[&str] = &["resolved_title", "given_title", "title"];
const TAG_COLUMNS: &[&str] = &["tags", "tag", "labels"];
const TAG_ATTRIBUTES: &[&str] = &["tags", "data-tags", "data-tag"];

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("Invalid selector"));

/// Records in export order plus the entries that were skipped.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub records: Vec<Record>,
    pub warnings: Vec<ParseWarning>,
}

impl Extraction {
    fn accept(&mut self, line: usize, url: Option<&str>, title: Option<String>, tags: Vec<String>) {
        let Some(raw) = url.map(str::trim).filter(|u| !u.is_empty()) else {
            self.warnings.push(ParseWarning::MissingUrl { line });
            return;
        };
        if !is_http_url(raw) {
            self.warnings.push(ParseWarning::InvalidUrl {
                line,
                url: raw.to_string(),
            });
            return;
        }
        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNTITLED.to_string());
        self.records.push(Record::new(title, raw, tags));
    }
}

/// Parse `content` according to `format`.
pub fn extract(content: &str, format: ExportFormat) -> Extraction {
    let extraction = match format {
        ExportFormat::Csv => extract_csv(content),
        ExportFormat::Html => extract_html(content),
        ExportFormat::UrlList => extract_url_list(content),
    };
    for w in &extraction.warnings {
        warn!("{}", w);
    }
    debug!(
        "Extracted {} records ({} warnings) from {} export",
        extraction.records.len(),
        extraction.warnings.len(),
        format
    );
    extraction
}

/// Split a tag string on `,` and `|`, trimming and dropping empty tokens.
///
/// `"a, b|c"` → `["a", "b", "c"]`.
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split([',', '|'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// True for absolute `http`/`https` URLs with a host.
pub fn is_http_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some_and(|h| !h.is_empty()))
        .unwrap_or(false)
}

// ── CSV ──────────────────────────────────────────────────────────────────

/// Header-driven CSV parsing; column order is not assumed.
fn extract_csv(content: &str) -> Extraction {
    let mut out = Extraction::default();
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let columns: HashMap<String, usize> = match reader.headers() {
        Ok(headers) => headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim_start_matches('\u{FEFF}').trim().to_ascii_lowercase(), i))
            .collect(),
        Err(e) => {
            out.warnings.push(ParseWarning::MalformedRow {
                line: 1,
                detail: e.to_string(),
            });
            return out;
        }
    };

    let pick = |row: &csv::StringRecord, names: &[&str]| -> Option<String> {
        names
            .iter()
            .filter_map(|name| columns.get(*name))
            .filter_map(|&i| row.get(i))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .map(str::to_string)
    };

    for (n, result) in reader.records().enumerate() {
        // Header is line 1; multi-line quoted fields make the reader's own
        // position the better source when it has one.
        let fallback_line = n + 2;
        match result {
            Ok(row) => {
                let line = row
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(fallback_line);
                let url = pick(&row, URL_COLUMNS);
                let title = pick(&row, TITLE_COLUMNS);
                let tags = pick(&row, TAG_COLUMNS)
                    .map(|t| split_tags(&t))
                    .unwrap_or_default();
                out.accept(line, url.as_deref(), title, tags);
            }
            Err(e) => {
                let line = e
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(fallback_line);
                out.warnings.push(ParseWarning::MalformedRow {
                    line,
                    detail: e.to_string(),
                });
            }
        }
    }
    out
}

// ── HTML ─────────────────────────────────────────────────────────────────

/// Anchor-based HTML parsing: `href` → url, text → title, `tags` attribute → tags.
fn extract_html(content: &str) -> Extraction {
    let mut out = Extraction::default();
    let document = Html::parse_document(content);

    for (i, anchor) in document.select(&ANCHOR).enumerate() {
        let element = anchor.value();
        let title = anchor
            .text()
            .collect::<Vec<_>>()
            .join(" ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let tags = TAG_ATTRIBUTES
            .iter()
            .find_map(|name| element.attr(name))
            .map(split_tags)
            .unwrap_or_default();
        out.accept(i + 1, element.attr("href"), Some(title), tags);
    }
    out
}

// ── URL list ─────────────────────────────────────────────────────────────

/// One url per line; blank lines and `#` comments are ignored.
fn extract_url_list(content: &str) -> Extraction {
    let mut out = Extraction::default();
    for (i, line) in content.lines().enumerate() {
        let line_text = line.trim().trim_start_matches('\u{FEFF}');
        if line_text.is_empty() || line_text.starts_with('#') {
            continue;
        }
        out.accept(i + 1, Some(line_text), None, Vec::new());
    }
    out
}
