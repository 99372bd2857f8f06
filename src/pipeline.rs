use std::ops::AddAssign;

use indicatif::ProgressBar;
use tracing::{info, warn};
use url::Url;

use crate::corpus::{Corpus, IngestCounts, SealedCorpus};
use crate::emit::{emit, OutputRow, RowKind};
use crate::error::ResolveError;
use crate::parser::{self, groups::GroupRules};
use crate::resolve::resolve;
use crate::sources::{self, SourcePage};

impl AddAssign for IngestCounts {
    fn add_assign(&mut self, other: Self) {
        self.articles += other.articles;
        self.duplicates += other.duplicates;
        self.aliases += other.aliases;
        self.disambiguations += other.disambiguations;
    }
}

/// Result of the extraction phase.
pub struct Extraction {
    pub corpus: Corpus,
    pub counts: IngestCounts,
    pub pages: usize,
    pub failed: usize,
}

/// Rows ready to be written, plus what produced them.
pub struct Compiled {
    pub corpus: SealedCorpus,
    pub rows: Vec<OutputRow>,
}

impl Compiled {
    pub fn count(&self, kind: RowKind) -> usize {
        self.rows.iter().filter(|r| r.kind == kind).count()
    }
}

/// Phase one: load, normalize and extract each page in order, feeding the
/// corpus. A page that fails to load is skipped with a warning.
pub fn extract_pages<R: GroupRules>(
    pages: &[SourcePage],
    base: &Url,
    rules: &R,
    pb: &ProgressBar,
) -> Extraction {
    let mut corpus = Corpus::new();
    let mut counts = IngestCounts::default();
    let mut failed = 0;

    for page in pages {
        let loaded = sources::page_url(base, &page.key)
            .and_then(|url| sources::load_page(&page.path).map(|doc| (url, doc)));
        match loaded {
            Ok((url, doc)) => {
                let extract = parser::process_page(&doc, &url, rules);
                counts += corpus.ingest(&url, extract);
            }
            Err(e) => {
                warn!(page = %page.key, error = %e, "page skipped");
                failed += 1;
            }
        }
        pb.inc(1);
    }

    info!(
        pages = pages.len(),
        failed,
        articles = counts.articles,
        duplicates = counts.duplicates,
        aliases = counts.aliases,
        "extraction finished"
    );
    Extraction {
        corpus,
        counts,
        pages: pages.len(),
        failed,
    }
}

/// Phase two: seal the corpus, resolve aliases and build the rows.
pub fn compile(corpus: Corpus) -> Result<Compiled, ResolveError> {
    let corpus = corpus.seal();
    let records = resolve(&corpus)?;
    let rows = emit(&corpus, &records);
    Ok(Compiled { corpus, rows })
}
