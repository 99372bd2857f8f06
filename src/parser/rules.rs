use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;

use super::groups::{ArticleCandidate, Disambiguation, DisambiguationEntry, GroupRules};
use super::text::element_text;
use crate::error::RulesError;

/// Selector profile for one documentation format, as written in the
/// `[source]` table of the settings file.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceProfile {
    /// List containers holding the entries.
    pub lists: String,
    /// Element inside an item holding its title.
    pub title: String,
    /// Inline alternate names inside an item.
    #[serde(default)]
    pub aliases: Option<String>,
    #[serde(default)]
    pub categories: Option<String>,
    /// Categories given to every article from this source.
    #[serde(default)]
    pub default_categories: Vec<String>,
    /// "See also" references; their text is taken as a title.
    #[serde(default)]
    pub related: Option<String>,
    /// Marker whose text names the entry this item forwards to.
    #[serde(default)]
    pub redirect: Option<String>,
    /// Container of `li` choices when the item is a disambiguation.
    #[serde(default)]
    pub disambiguation: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// `GroupRules` driven by a [`SourceProfile`], with every selector
/// compiled up front.
pub struct SelectorRules {
    lists: Selector,
    title: Selector,
    aliases: Option<Selector>,
    categories: Option<Selector>,
    default_categories: Vec<String>,
    related: Option<Selector>,
    redirect: Option<Selector>,
    disambiguation: Option<Selector>,
    image: Option<Selector>,
    li: Selector,
    link: Selector,
}

impl SelectorRules {
    pub fn compile(profile: &SourceProfile) -> Result<Self, RulesError> {
        Ok(SelectorRules {
            lists: parse_selector("lists", &profile.lists)?,
            title: parse_selector("title", &profile.title)?,
            aliases: parse_optional("aliases", profile.aliases.as_deref())?,
            categories: parse_optional("categories", profile.categories.as_deref())?,
            default_categories: profile.default_categories.clone(),
            related: parse_optional("related", profile.related.as_deref())?,
            redirect: parse_optional("redirect", profile.redirect.as_deref())?,
            disambiguation: parse_optional("disambiguation", profile.disambiguation.as_deref())?,
            image: parse_optional("image", profile.image.as_deref())?,
            li: parse_selector("li", "li")?,
            link: parse_selector("link", "a, code")?,
        })
    }

    fn texts(&self, item: ElementRef<'_>, selector: &Option<Selector>) -> Vec<String> {
        let Some(selector) = selector else {
            return Vec::new();
        };
        let mut out: Vec<String> = Vec::new();
        for text in item.select(selector).map(element_text) {
            if !text.is_empty() && !out.contains(&text) {
                out.push(text);
            }
        }
        out
    }
}

fn parse_selector(field: &'static str, css: &str) -> Result<Selector, RulesError> {
    Selector::parse(css).map_err(|e| RulesError::Selector {
        field,
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

fn parse_optional(field: &'static str, css: Option<&str>) -> Result<Option<Selector>, RulesError> {
    css.map(|css| parse_selector(field, css)).transpose()
}

impl GroupRules for SelectorRules {
    fn title_of(&self, item: ElementRef<'_>) -> Option<String> {
        item.select(&self.title)
            .map(element_text)
            .find(|t| !t.is_empty())
    }

    fn lists_of<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>> {
        doc.select(&self.lists).collect()
    }

    fn aliases_of(&self, item: ElementRef<'_>, title: &str) -> Vec<String> {
        let mut aliases = self.texts(item, &self.aliases);
        aliases.retain(|a| a != title);
        aliases
    }

    fn categories_of(&self, item: ElementRef<'_>, _article: &ArticleCandidate) -> Vec<String> {
        let mut categories = self.default_categories.clone();
        for c in self.texts(item, &self.categories) {
            if !categories.contains(&c) {
                categories.push(c);
            }
        }
        categories
    }

    fn related_of(&self, item: ElementRef<'_>, article: &ArticleCandidate) -> Vec<String> {
        let mut related = self.texts(item, &self.related);
        related.retain(|r| *r != article.title);
        related
    }

    fn redirect_of(&self, item: ElementRef<'_>, _article: &ArticleCandidate) -> Option<String> {
        let selector = self.redirect.as_ref()?;
        item.select(selector)
            .map(element_text)
            .find(|t| !t.is_empty())
    }

    fn disambiguation_of(
        &self,
        item: ElementRef<'_>,
        article: &ArticleCandidate,
    ) -> Option<Disambiguation> {
        let container = item.select(self.disambiguation.as_ref()?).next()?;
        let entries: Vec<DisambiguationEntry> = container
            .select(&self.li)
            .filter_map(|li| {
                let link = li.select(&self.link).next().map(element_text)?;
                let full = element_text(li);
                let description = full
                    .strip_prefix(link.as_str())
                    .unwrap_or(&full)
                    .trim_start_matches(|c: char| matches!(c, ',' | '-' | ':' | '–') || c.is_whitespace())
                    .to_string();
                Some(DisambiguationEntry { link, description })
            })
            .collect();
        if entries.is_empty() {
            return None;
        }
        Some(Disambiguation {
            title: article.title.clone(),
            entries,
        })
    }

    fn image_of(&self, item: ElementRef<'_>) -> Option<String> {
        let selector = self.image.as_ref()?;
        item.select(selector)
            .find_map(|img| img.value().attr("src"))
            .map(str::to_string)
    }
}
