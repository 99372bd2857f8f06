pub mod aliases;
pub mod registry;

use std::collections::HashSet;

use tracing::{debug, warn};
use url::Url;

use crate::parser::groups::{Disambiguation, PageExtract};
use aliases::AliasGraph;
use registry::{Article, Registered, Registry};

/// What one call to [`Corpus::ingest`] added.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestCounts {
    pub articles: usize,
    pub duplicates: usize,
    pub aliases: usize,
    pub disambiguations: usize,
}

/// Run-scoped state while pages are being extracted.
///
/// Only [`Corpus::ingest`] writes to it. [`Corpus::seal`] ends the
/// extraction phase; resolution and emission work on the sealed value.
#[derive(Debug, Default)]
pub struct Corpus {
    registry: Registry,
    aliases: AliasGraph,
    disambiguations: Vec<Disambiguation>,
    disambiguation_titles: HashSet<String>,
    pages: usize,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, page_url: &Url, extract: PageExtract) -> IngestCounts {
        let mut counts = IngestCounts::default();
        self.pages += 1;

        for candidate in extract.articles {
            match self.registry.register(Article::from_candidate(candidate, page_url)) {
                Registered::Inserted => counts.articles += 1,
                Registered::Duplicate => counts.duplicates += 1,
            }
        }
        for (alias, target) in &extract.aliases {
            self.aliases.add(alias, target);
            counts.aliases += 1;
        }
        for disambiguation in extract.disambiguations {
            if self.disambiguation_titles.contains(&disambiguation.title) {
                warn!(title = %disambiguation.title, page = %page_url, "duplicate disambiguation, keeping the first");
                continue;
            }
            self.disambiguation_titles.insert(disambiguation.title.clone());
            self.disambiguations.push(disambiguation);
            counts.disambiguations += 1;
        }

        debug!(
            page = %page_url,
            articles = counts.articles,
            aliases = counts.aliases,
            disambiguations = counts.disambiguations,
            "page ingested"
        );
        counts
    }

    pub fn seal(self) -> SealedCorpus {
        let Corpus {
            registry,
            aliases,
            disambiguations,
            pages,
            ..
        } = self;

        // Articles and disambiguations share one title space; articles win.
        let mut kept = Vec::with_capacity(disambiguations.len());
        for d in disambiguations {
            if registry.contains(&d.title) {
                warn!(title = %d.title, "disambiguation shadowed by an article, dropped");
            } else {
                kept.push(d);
            }
        }
        let disambiguation_titles = kept.iter().map(|d| d.title.clone()).collect();

        SealedCorpus {
            registry,
            aliases,
            disambiguations: kept,
            disambiguation_titles,
            pages,
        }
    }
}

/// Read-only corpus after extraction has finished.
#[derive(Debug)]
pub struct SealedCorpus {
    registry: Registry,
    aliases: AliasGraph,
    disambiguations: Vec<Disambiguation>,
    disambiguation_titles: HashSet<String>,
    pages: usize,
}

impl SealedCorpus {
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn aliases(&self) -> &AliasGraph {
        &self.aliases
    }

    /// Disambiguations declared in the source pages.
    pub fn disambiguations(&self) -> &[Disambiguation] {
        &self.disambiguations
    }

    pub fn is_disambiguation(&self, title: &str) -> bool {
        self.disambiguation_titles.contains(title)
    }

    pub fn pages(&self) -> usize {
        self.pages
    }
}
