use std::collections::HashMap;

use tracing::warn;
use url::Url;

use crate::parser::groups::ArticleCandidate;

/// A registered article: the candidate plus where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub title: String,
    pub url: String,
    pub text: String,
    pub categories: Vec<String>,
    pub related: Vec<String>,
    pub image: Option<String>,
}

impl Article {
    /// Attach the page URL, with the candidate's anchor as fragment.
    pub fn from_candidate(candidate: ArticleCandidate, page_url: &Url) -> Self {
        let mut url = page_url.clone();
        if candidate.anchor.is_some() {
            url.set_fragment(candidate.anchor.as_deref());
        }
        Article {
            title: candidate.title,
            url: url.to_string(),
            text: candidate.text,
            categories: candidate.categories,
            related: candidate.related,
            image: candidate.image,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registered {
    Inserted,
    Duplicate,
}

/// Title-keyed article store. Keeps insertion order; the first article
/// with a given title wins.
#[derive(Debug, Default)]
pub struct Registry {
    articles: Vec<Article>,
    by_title: HashMap<String, usize>,
    by_url: HashMap<String, String>,
}

impl Registry {
    pub fn register(&mut self, article: Article) -> Registered {
        if let Some(&existing) = self.by_title.get(&article.title) {
            warn!(
                title = %article.title,
                kept = %self.articles[existing].url,
                dropped = %article.url,
                "duplicate article title, keeping the first"
            );
            return Registered::Duplicate;
        }
        self.by_url
            .entry(article.url.clone())
            .or_insert_with(|| article.title.clone());
        self.by_title.insert(article.title.clone(), self.articles.len());
        self.articles.push(article);
        Registered::Inserted
    }

    pub fn lookup(&self, title: &str) -> Option<&Article> {
        self.by_title.get(title).map(|&i| &self.articles[i])
    }

    pub fn contains(&self, title: &str) -> bool {
        self.by_title.contains_key(title)
    }

    /// Title of the article registered at exactly this source URL.
    pub fn title_for_url(&self, url: &str) -> Option<&str> {
        self.by_url.get(url).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Article> {
        self.articles.iter()
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}
