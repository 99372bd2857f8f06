pub mod groups;
pub mod normalize;
pub mod rules;
pub mod text;

use scraper::Html;
use url::Url;

use groups::{GroupRules, PageExtract};

/// Two-pass page pipeline: loaded tree → normalized tree → list groups.
pub fn process_page<R: GroupRules>(doc: &Html, page_url: &Url, rules: &R) -> PageExtract {
    let normalized = normalize::normalize(doc, page_url);
    groups::extract(&normalized, rules)
}
