//! Naming policy: where a record's PDF lands.
//!
//! Layout is `<root>/<folder>/<title>-<domain>-<index>.<ext>` where
//! `folder` is the sanitised first tag (or the fallback folder) and `index`
//! is the smallest non-negative integer whose path is neither on disk nor
//! already handed out during this run. Existing files are therefore never
//! overwritten, within a run or across runs.
//!
//! The whole file name, staging suffix included, fits in
//! [`MAX_FILE_NAME_BYTES`]. The domain gets at most half of that budget and
//! the title the rest.

use crate::config::NamingPolicy;
use crate::pipeline::render::STAGING_SUFFIX;
use crate::record::Record;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

static ILLEGAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/*?:"<>|\x00-\x1F\x7F]"#).expect("Invalid regex"));

/// Strip characters that are illegal on common filesystems, collapse
/// whitespace, trim spaces and dots, and cap the result at `max_bytes`
/// (cut on a char boundary).
pub fn sanitize(name: &str, max_bytes: usize) -> String {
    let spaced = name.split_whitespace().collect::<Vec<_>>().join(" ");
    let cleaned = ILLEGAL.replace_all(&spaced, "");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches([' ', '.']);
    truncate_bytes(trimmed, max_bytes)
        .trim_end_matches([' ', '.'])
        .to_string()
}

/// Per-component limit on ext4, APFS and NTFS.
pub const MAX_FILE_NAME_BYTES: usize = 255;

/// Cut to `max_bytes` and drop separators left dangling at the cut.
fn fit(s: &str, max_bytes: usize) -> String {
    truncate_bytes(s, max_bytes)
        .trim_end_matches([' ', '.', '-'])
        .to_string()
}

fn truncate_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

impl NamingPolicy {
    /// Sanitised first tag, or the fallback folder when there is none.
    pub fn folder(&self, record: &Record) -> String {
        record
            .tags
            .first()
            .map(|t| sanitize(t, self.max_name_bytes))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.fallback_folder.clone())
    }

    /// `<title>-<domain>-<index>.<ext>`, every component sanitised and the
    /// whole name (plus staging suffix) within [`MAX_FILE_NAME_BYTES`].
    pub fn filename(&self, record: &Record, domain: &str, index: usize) -> String {
        let tail = format!("-{index}.{}", self.extension);
        let budget = MAX_FILE_NAME_BYTES.saturating_sub(STAGING_SUFFIX.len() + tail.len());

        let domain = fit(&sanitize(domain, self.max_name_bytes), budget / 2);
        let separator = usize::from(!domain.is_empty());
        let title_budget = budget.saturating_sub(domain.len() + separator);
        let title = Some(fit(&sanitize(&record.title, self.max_name_bytes), title_budget))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| fit(&self.fallback_title, title_budget));

        if domain.is_empty() {
            format!("{title}{tail}")
        } else {
            format!("{title}-{domain}{tail}")
        }
    }
}

/// The resolved target for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingContext {
    pub folder: String,
    pub filename: String,
    pub index: usize,
    /// `<root>/<folder>/<filename>`.
    pub path: PathBuf,
}

/// Hands out collision-free target paths for a run.
///
/// Paths are checked against the filesystem and against every path this
/// allocator already returned, so two records with the same title and
/// domain never share a target even when the first one has not been
/// written yet.
#[derive(Debug)]
pub struct NameAllocator {
    policy: NamingPolicy,
    root: PathBuf,
    reserved: HashSet<PathBuf>,
}

impl NameAllocator {
    pub fn new(policy: NamingPolicy, root: impl AsRef<Path>) -> Self {
        Self {
            policy,
            root: root.as_ref().to_path_buf(),
            reserved: HashSet::new(),
        }
    }

    pub fn policy(&self) -> &NamingPolicy {
        &self.policy
    }

    /// Reserve the next free target for `record`.
    pub fn allocate(&mut self, record: &Record) -> NamingContext {
        let folder = self.policy.folder(record);
        let domain = record.domain();
        let dir = self.root.join(&folder);

        let mut index = 0;
        loop {
            let filename = self.policy.filename(record, &domain, index);
            let path = dir.join(&filename);
            if !self.reserved.contains(&path) && !path.exists() {
                self.reserved.insert(path.clone());
                return NamingContext {
                    folder,
                    filename,
                    index,
                    path,
                };
            }
            index += 1;
        }
    }

    /// Index-0 target for `record` if it is already on disk.
    pub fn existing(&self, record: &Record) -> Option<PathBuf> {
        let path = self
            .root
            .join(self.policy.folder(record))
            .join(self.policy.filename(record, &record.domain(), 0));
        path.is_file().then_some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, tags: &[&str]) -> Record {
        Record::new(
            title,
            "https://www.ok.example/a",
            tags.iter().map(|t| t.to_string()).collect(),
        )
    }

    #[test]
    fn sanitize_strips_illegal() {
        assert_eq!(sanitize(r#"a/b\c:d*e?f"g<h>i|j"#, 150), "abcdefghij");
        assert_eq!(sanitize("  Hello\t\n  World  ", 150), "Hello World");
        assert_eq!(sanitize("...dots...", 150), "dots");
        assert_eq!(sanitize("a : b", 150), "a b");
    }

    #[test]
    fn sanitize_truncates_on_char_boundary() {
        let s = sanitize("ééééé", 5);
        assert_eq!(s, "éé");
        assert!(s.len() <= 5);
        assert_eq!(sanitize(&"x".repeat(400), 150).len(), 150);
    }

    #[test]
    fn folder_uses_first_tag() {
        let p = NamingPolicy::default();
        assert_eq!(p.folder(&record("t", &["tech/news", "other"])), "technews");
        assert_eq!(p.folder(&record("t", &[])), "untagged");
        assert_eq!(p.folder(&record("t", &["???"])), "untagged");
    }

    #[test]
    fn filename_layout() {
        let p = NamingPolicy::default();
        let r = Record::new("Example", "https://ok.example/a", vec!["tech".into()]);
        assert_eq!(p.filename(&r, &r.domain(), 0), "Example-ok.example-0.pdf");
        let r = record("What? Why!", &[]);
        assert_eq!(p.filename(&r, &r.domain(), 3), "What Why!-ok.example-3.pdf");
        let r = record("<>", &[]);
        assert_eq!(p.filename(&r, "", 0), "untitled-0.pdf");
    }

    #[test]
    fn filename_fits_filesystem_limit_with_staging_suffix() {
        let p = NamingPolicy::default();
        let host = format!("{}.{}.example", "h".repeat(60), "k".repeat(60));
        let r = Record::new(
            "T".repeat(200),
            format!("https://{host}/a"),
            vec!["tech".into()],
        );
        for index in [0, 7, 12345] {
            let name = p.filename(&r, &host, index);
            assert!(
                name.len() + STAGING_SUFFIX.len() <= MAX_FILE_NAME_BYTES,
                "{} bytes: {name}",
                name.len()
            );
            assert!(name.starts_with("TTTT"), "{name}");
            assert!(name.ends_with(&format!("-{index}.pdf")), "{name}");
            assert!(!name.contains(".-") && !name.contains("--"), "{name}");
        }

        let wide = Record::new("é".repeat(200), "https://ok.example/a", vec![]);
        let name = p.filename(&wide, "ok.example", 0);
        assert!(name.len() + STAGING_SUFFIX.len() <= MAX_FILE_NAME_BYTES);
        assert!(name.ends_with("-ok.example-0.pdf"), "{name}");
    }

    #[test]
    fn allocator_never_collides_in_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut alloc = NameAllocator::new(NamingPolicy::default(), dir.path());
        let a = alloc.allocate(&record("Same", &["x"]));
        let b = alloc.allocate(&record("Same", &["x"]));
        assert_ne!(a.path, b.path);
        assert_eq!((a.index, b.index), (0, 1));
        let c = alloc.allocate(&record("Same", &["y"]));
        assert_eq!(c.index, 0, "different folder starts from zero");
    }

    #[test]
    fn allocator_skips_files_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("x");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("Same-ok.example-0.pdf"), b"%PDF").unwrap();
        std::fs::write(folder.join("Same-ok.example-1.pdf"), b"%PDF").unwrap();

        let mut alloc = NameAllocator::new(NamingPolicy::default(), dir.path());
        let r = record("Same", &["x"]);
        assert_eq!(alloc.existing(&r), Some(folder.join("Same-ok.example-0.pdf")));
        let ctx = alloc.allocate(&r);
        assert_eq!(ctx.index, 2);
        assert_eq!(ctx.filename, "Same-ok.example-2.pdf");
        assert_eq!(ctx.folder, "x");
    }
}
