//! The unit of work: one saved bookmark.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// A single bookmark from the export.
///
/// Created by [`crate::pipeline::extract`] and read-only afterwards. The
/// extractor only emits records whose `url` parses as an absolute http(s)
/// URI, so `url` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub title: String,
    pub url: String,
    /// Ordered tags; the first one picks the output folder. May be empty.
    pub tags: Vec<String>,
}

impl Record {
    pub fn new(title: impl Into<String>, url: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            tags,
        }
    }

    /// Host of the url without a leading `www.`; empty if the url has no host.
    pub fn domain(&self) -> String {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .map(|h| h.strip_prefix("www.").map(str::to_string).unwrap_or(h))
            .unwrap_or_default()
    }
}

/// The export file flavours the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    /// Header-driven CSV (`title`, `url`, `tags`, or Pocket's
    /// `resolved_*`/`given_*` columns).
    Csv,
    /// HTML list of `<a href>` anchors with a `tags` attribute.
    Html,
    /// One URL per line.
    UrlList,
}

impl ExportFormat {
    /// Pick a format from the file extension, falling back to sniffing the
    /// content when the extension is missing or unknown.
    pub fn detect(path: &Path, content: &str) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => ExportFormat::Csv,
            Some("html") | Some("htm") => ExportFormat::Html,
            Some("txt") | Some("list") => ExportFormat::UrlList,
            _ => Self::sniff(content),
        }
    }

    fn sniff(content: &str) -> Self {
        let head = content.trim_start_matches('\u{FEFF}').trim_start();
        let lower = head.to_ascii_lowercase();
        if head.starts_with('<') || lower.contains("<a ") {
            return ExportFormat::Html;
        }
        let first_line = lower.lines().next().unwrap_or("");
        if first_line.contains(',') && first_line.contains("url") {
            ExportFormat::Csv
        } else {
            ExportFormat::UrlList
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Html => "html",
            ExportFormat::UrlList => "url-list",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_strips_www() {
        let r = Record::new("t", "https://www.example.com/a?b=1", vec![]);
        assert_eq!(r.domain(), "example.com");
        let r = Record::new("t", "https://ok.example/a", vec![]);
        assert_eq!(r.domain(), "ok.example");
    }

    #[test]
    fn domain_of_garbage_is_empty() {
        let r = Record::new("t", "not a url", vec![]);
        assert_eq!(r.domain(), "");
    }

    #[test]
    fn detect_by_extension() {
        assert_eq!(ExportFormat::detect(Path::new("a.CSV"), ""), ExportFormat::Csv);
        assert_eq!(ExportFormat::detect(Path::new("a.htm"), ""), ExportFormat::Html);
        assert_eq!(ExportFormat::detect(Path::new("a.txt"), "<a href>"), ExportFormat::UrlList);
    }

    #[test]
    fn detect_by_content() {
        let p = Path::new("export");
        assert_eq!(
            ExportFormat::detect(p, "<!DOCTYPE html><ul><li><a href=\"x\">x</a></li></ul>"),
            ExportFormat::Html
        );
        assert_eq!(
            ExportFormat::detect(p, "title,url,time_added,tags\nA,https://a.b,1,x\n"),
            ExportFormat::Csv
        );
        assert_eq!(
            ExportFormat::detect(p, "https://a.example/\nhttps://b.example/\n"),
            ExportFormat::UrlList
        );
    }
}
