use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static BLOCK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p, pre").unwrap());

pub fn collapse_whitespace(s: &str) -> String {
    WS_RE.replace_all(s.trim(), " ").into_owned()
}

/// Visible text of an element, whitespace collapsed.
pub fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

/// Plain-text first paragraph of a markup fragment.
///
/// Falls back to the whole fragment's text when it holds no `p`/`pre`.
pub fn plain_summary(markup: &str) -> String {
    let fragment = Html::parse_fragment(markup);
    fragment
        .select(&BLOCK_SEL)
        .map(element_text)
        .find(|t| !t.is_empty())
        .unwrap_or_else(|| collapse_whitespace(&fragment.root_element().text().collect::<String>()))
}
