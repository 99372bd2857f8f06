use std::io::Write;
use std::sync::LazyLock;

use anyhow::Result;
use regex::{Captures, Regex};
use serde::Serialize;
use tracing::info;
use url::form_urlencoded;

use crate::corpus::registry::{Article, Registry};
use crate::corpus::SealedCorpus;
use crate::parser::groups::Disambiguation;
use crate::parser::normalize::escape_attr;
use crate::resolve::{Record, Redirect};

/// `href` of an `<a>` start tag. Text content never matches: the normalizer
/// escapes every `<` outside tags, and `"`, `<`, `>` inside attribute values.
static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(<a(?:\s[^>]*?)?\shref=")([^"]*)""#).unwrap());

/// Separator written between items of a multi-value field.
pub const ITEM_SEP: &str = "\\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowKind {
    #[serde(rename = "A")]
    Article,
    #[serde(rename = "R")]
    Redirect,
    #[serde(rename = "D")]
    Disambiguation,
}

impl RowKind {
    pub fn code(self) -> &'static str {
        match self {
            RowKind::Article => "A",
            RowKind::Redirect => "R",
            RowKind::Disambiguation => "D",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "A" => Some(RowKind::Article),
            "R" => Some(RowKind::Redirect),
            "D" => Some(RowKind::Disambiguation),
            _ => None,
        }
    }
}

/// One flat output record. Every field is single-line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRow {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: RowKind,
    pub alias: String,
    pub categories: String,
    pub related: String,
    pub links: String,
    pub disambiguation: String,
    pub image: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    #[serde(rename = "sourceurl")]
    pub source_url: String,
}

impl OutputRow {
    fn empty(title: &str, kind: RowKind) -> Self {
        OutputRow {
            title: flatten(title),
            kind,
            alias: String::new(),
            categories: String::new(),
            related: String::new(),
            links: String::new(),
            disambiguation: String::new(),
            image: String::new(),
            abstract_text: String::new(),
            source_url: String::new(),
        }
    }

    pub fn article(article: &Article, registry: &Registry) -> Self {
        OutputRow {
            categories: article.categories.iter().map(|c| flatten(c)).collect::<Vec<_>>().join(ITEM_SEP),
            related: article
                .related
                .iter()
                .map(|r| format!("[[{}]]", flatten(r)))
                .collect::<Vec<_>>()
                .join(ITEM_SEP),
            image: article.image.as_deref().map(flatten).unwrap_or_default(),
            abstract_text: flatten(&rewrite_links(&article.text, registry)),
            source_url: flatten(&article.url),
            ..OutputRow::empty(&article.title, RowKind::Article)
        }
    }

    pub fn redirect(redirect: &Redirect) -> Self {
        OutputRow {
            alias: flatten(&redirect.target),
            ..OutputRow::empty(&redirect.alias, RowKind::Redirect)
        }
    }

    pub fn disambiguation(d: &Disambiguation) -> Self {
        let entries = d
            .entries
            .iter()
            .map(|e| {
                if e.description.is_empty() {
                    format!("*[[{}]]", flatten(&e.link))
                } else {
                    format!("*[[{}]], {}", flatten(&e.link), flatten(&e.description))
                }
            })
            .collect::<Vec<_>>()
            .join(ITEM_SEP);
        OutputRow {
            disambiguation: entries,
            ..OutputRow::empty(&d.title, RowKind::Disambiguation)
        }
    }

    /// The ten fields in output order.
    pub fn fields(&self) -> [&str; 10] {
        [
            self.title.as_str(),
            self.kind.code(),
            self.alias.as_str(),
            self.categories.as_str(),
            self.related.as_str(),
            self.links.as_str(),
            self.disambiguation.as_str(),
            self.image.as_str(),
            self.abstract_text.as_str(),
            self.source_url.as_str(),
        ]
    }
}

/// Internal lookup reference for a title.
pub fn internal_ref(title: &str) -> String {
    let query: String = form_urlencoded::byte_serialize(title.as_bytes()).collect();
    format!("/?q={}", query)
}

/// Point every `href` that is exactly a registered article's source URL at
/// that article's internal reference. Other links are left alone.
pub fn rewrite_links(markup: &str, registry: &Registry) -> String {
    HREF_RE
        .replace_all(markup, |caps: &Captures| {
            let url = unescape_attr(&caps[2]);
            match registry.title_for_url(&url) {
                Some(title) => {
                    let mut out = caps[1].to_string();
                    escape_attr(&internal_ref(title), &mut out);
                    out.push('"');
                    out
                }
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn unescape_attr(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

/// Make a field single-line: newlines become a literal `\n`, tabs a space.
pub fn flatten(s: &str) -> String {
    s.replace("\r\n", "\n")
        .replace('\n', ITEM_SEP)
        .replace('\t', " ")
}

/// Build every output row: articles, then declared disambiguations, then
/// the resolver's records.
pub fn emit(corpus: &SealedCorpus, records: &[Record]) -> Vec<OutputRow> {
    let registry = corpus.registry();
    let mut rows = Vec::with_capacity(registry.len() + corpus.disambiguations().len() + records.len());

    rows.extend(registry.iter().map(|a| OutputRow::article(a, registry)));
    rows.extend(corpus.disambiguations().iter().map(OutputRow::disambiguation));
    rows.extend(records.iter().map(|r| match r {
        Record::Redirect(redirect) => OutputRow::redirect(redirect),
        Record::Disambiguation(d) => OutputRow::disambiguation(d),
    }));

    info!(rows = rows.len(), articles = registry.len(), "rows emitted");
    rows
}

/// Destination for finished rows.
pub trait RecordSink {
    fn write_row(&mut self, row: &OutputRow) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Tab-separated writer: ten fields per line, no header, no quoting.
pub struct TsvWriter<W: Write> {
    out: W,
    rows: usize,
}

impl<W: Write> TsvWriter<W> {
    pub fn new(out: W) -> Self {
        TsvWriter { out, rows: 0 }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RecordSink for TsvWriter<W> {
    fn write_row(&mut self, row: &OutputRow) -> Result<()> {
        writeln!(self.out, "{}", row.fields().join("\t"))?;
        self.rows += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
