use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use scraper::Html;
use url::Url;
use walkdir::WalkDir;

/// A page file and its key relative to the input root (`/`-separated).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePage {
    pub path: PathBuf,
    pub key: String,
}

/// Every `.html`/`.htm` file under `root`, in lexicographic key order.
pub fn discover_pages(root: &Path) -> Result<Vec<SourcePage>> {
    let mut pages = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() || !is_page(entry.path()) {
            continue;
        }
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let key = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        pages.push(SourcePage {
            path: entry.path().to_path_buf(),
            key,
        });
    }
    pages.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(pages)
}

fn is_page(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
}

pub fn load_page(path: &Path) -> Result<Html> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Html::parse_document(&source))
}

/// Canonical URL of a page: its key joined onto the base URL.
pub fn page_url(base: &Url, key: &str) -> Result<Url> {
    base.join(key)
        .with_context(|| format!("Cannot build a URL for `{}` from {}", key, base))
}
