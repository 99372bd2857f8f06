use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use super::normalize::NormalizedDoc;

static NAMED_ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[name]").unwrap());

/// An article as read from one list group, before it gets a URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleCandidate {
    pub title: String,
    pub anchor: Option<String>,
    pub text: String,
    pub categories: Vec<String>,
    pub related: Vec<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisambiguationEntry {
    pub link: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Disambiguation {
    pub title: String,
    pub entries: Vec<DisambiguationEntry>,
}

/// Everything one page contributes, in list order.
#[derive(Debug, Default)]
pub struct PageExtract {
    pub articles: Vec<ArticleCandidate>,
    /// `(alias, target)` pairs.
    pub aliases: Vec<(String, String)>,
    pub disambiguations: Vec<Disambiguation>,
}

/// Per-format hooks for the list-group extractor.
///
/// Only `title_of` has no default. Everything else reads a generic shape:
/// an `li` anchored by an `a[name]`, described by the `p`/`pre` blocks that
/// follow it inside the list (or, failing that, by its own `p`/`pre`
/// children).
pub trait GroupRules {
    fn title_of(&self, item: ElementRef<'_>) -> Option<String>;

    fn link_of(&self, item: ElementRef<'_>) -> Option<String> {
        item.select(&NAMED_ANCHOR_SEL)
            .next()
            .and_then(|a| a.value().attr("name"))
            .or_else(|| item.value().id())
            .map(str::to_string)
    }

    fn text_of(&self, item: ElementRef<'_>) -> String {
        description_blocks(item)
            .into_iter()
            .map(|el| el.html())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// True when the item carries the description shared by its group,
    /// which makes it the last (primary) item of that group.
    fn is_group_boundary(&self, item: ElementRef<'_>) -> bool {
        !description_blocks(item).is_empty()
    }

    fn lists_of<'a>(&self, _doc: &'a Html) -> Vec<ElementRef<'a>> {
        Vec::new()
    }

    fn aliases_of(&self, _item: ElementRef<'_>, _title: &str) -> Vec<String> {
        Vec::new()
    }

    fn categories_of(&self, _item: ElementRef<'_>, _article: &ArticleCandidate) -> Vec<String> {
        Vec::new()
    }

    fn related_of(&self, _item: ElementRef<'_>, _article: &ArticleCandidate) -> Vec<String> {
        Vec::new()
    }

    fn redirect_of(&self, _item: ElementRef<'_>, _article: &ArticleCandidate) -> Option<String> {
        None
    }

    fn disambiguation_of(
        &self,
        _item: ElementRef<'_>,
        _article: &ArticleCandidate,
    ) -> Option<Disambiguation> {
        None
    }

    fn image_of(&self, _item: ElementRef<'_>) -> Option<String> {
        None
    }
}

/// The `p`/`pre` blocks describing an item: its following element siblings
/// up to the next `li`, or else its own direct `p`/`pre` children.
fn description_blocks(item: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let siblings: Vec<_> = item
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .take_while(|el| el.value().name() != "li")
        .filter(is_description_block)
        .collect();
    if !siblings.is_empty() {
        return siblings;
    }
    item.children()
        .filter_map(ElementRef::wrap)
        .filter(is_description_block)
        .collect()
}

fn is_description_block(el: &ElementRef<'_>) -> bool {
    matches!(el.value().name(), "p" | "pre")
}

/// Direct `li` children of a list container.
pub fn list_items(list: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    list.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "li")
        .collect()
}

/// Split `items` into contiguous runs, each closed by a boundary item.
///
/// A trailing run without a boundary still forms a group.
pub fn partition<T>(items: &[T], is_boundary: impl Fn(&T) -> bool) -> Vec<&[T]> {
    let mut groups = Vec::new();
    let mut start = 0;
    for (i, item) in items.iter().enumerate() {
        if is_boundary(item) {
            groups.push(&items[start..=i]);
            start = i + 1;
        }
    }
    if start < items.len() {
        groups.push(&items[start..]);
    }
    groups
}

/// Walk every list container of `doc` and turn its groups into articles,
/// aliases and disambiguations.
pub fn extract<R: GroupRules>(doc: &NormalizedDoc, rules: &R) -> PageExtract {
    let mut out = PageExtract::default();
    for list in rules.lists_of(doc.html()) {
        let items = list_items(list);
        for group in partition(&items, |item| rules.is_group_boundary(*item)) {
            extract_group(group, rules, doc, &mut out);
        }
    }
    out
}

fn extract_group<R: GroupRules>(
    group: &[ElementRef<'_>],
    rules: &R,
    doc: &NormalizedDoc,
    out: &mut PageExtract,
) {
    let Some((&primary, secondary)) = group.split_last() else {
        return;
    };
    let Some(title) = rules.title_of(primary) else {
        warn!(page = %doc.url(), items = group.len(), "list group without a title, skipped");
        return;
    };

    let aliases_before = out.aliases.len();
    let push_alias = |alias: String, out: &mut PageExtract| {
        if alias != title {
            out.aliases.push((alias, title.clone()));
        }
    };

    for &item in secondary {
        if let Some(alt) = rules.title_of(item) {
            for extra in rules.aliases_of(item, &alt) {
                push_alias(extra, out);
            }
            push_alias(alt, out);
        }
    }
    for extra in rules.aliases_of(primary, &title) {
        push_alias(extra, out);
    }

    let mut article = ArticleCandidate {
        title: title.clone(),
        anchor: rules.link_of(primary),
        text: rules.text_of(primary),
        categories: Vec::new(),
        related: Vec::new(),
        image: rules.image_of(primary),
    };
    article.categories = rules.categories_of(primary, &article);
    article.related = rules.related_of(primary, &article);

    if let Some(disambiguation) = rules.disambiguation_of(primary, &article) {
        out.disambiguations.push(disambiguation);
    } else if let Some(target) = rules.redirect_of(primary, &article) {
        if target != title {
            out.aliases.push((title, target));
        }
    } else if article.text.trim().is_empty() {
        warn!(page = %doc.url(), title = %article.title, "article without abstract, skipped");
        out.aliases.truncate(aliases_before);
    } else {
        out.articles.push(article);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::normalize::normalize;
    use url::Url;

    static LIST_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("ul.funcs").unwrap());
    static CODE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("code").unwrap());

    /// Titles from the first `code`, lists from `ul.funcs`, everything
    /// else left at the defaults.
    struct CodeTitles;

    impl GroupRules for CodeTitles {
        fn title_of(&self, item: ElementRef<'_>) -> Option<String> {
            item.select(&CODE_SEL)
                .next()
                .map(crate::parser::text::element_text)
                .filter(|t| !t.is_empty())
        }

        fn lists_of<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>> {
            doc.select(&LIST_SEL).collect()
        }
    }

    fn doc(body: &str) -> NormalizedDoc {
        let base = Url::parse("https://docs.example.org/ref/funcs.html").unwrap();
        normalize(&Html::parse_document(body), &base)
    }

    #[test]
    fn partition_covers_every_item_once() {
        let items = [false, false, true, true, false, true, false];
        let groups = partition(&items, |b| *b);
        assert_eq!(groups.len(), 4);
        assert_eq!(groups.iter().map(|g| g.len()).sum::<usize>(), items.len());
        assert_eq!(groups[0], &[false, false, true]);
        assert_eq!(groups[1], &[true]);
        assert_eq!(groups[2], &[false, true]);
        assert_eq!(groups[3], &[false]);
    }

    #[test]
    fn partition_all_boundaries_is_singletons() {
        let items = [true, true, true];
        let groups = partition(&items, |b| *b);
        assert_eq!(groups.len(), 3);
        assert!(groups.iter().all(|g| g.len() == 1));
    }

    #[test]
    fn partition_empty() {
        let items: [bool; 0] = [];
        assert!(partition(&items, |b| *b).is_empty());
    }

    #[test]
    fn shared_description_makes_aliases() {
        let d = doc(r#"<ul class="funcs">
            <li><a name="baz"></a><code>Baz</code></li>
            <li><a name="bar"></a><code>Bar</code><p>Does bar things.</p></li>
        </ul>"#);
        let out = extract(&d, &CodeTitles);
        assert_eq!(out.articles.len(), 1);
        let a = &out.articles[0];
        assert_eq!(a.title, "Bar");
        assert_eq!(a.anchor.as_deref(), Some("bar"));
        assert_eq!(a.text, "<p>Does bar things.</p>");
        assert_eq!(out.aliases, vec![("Baz".to_string(), "Bar".to_string())]);
    }

    #[test]
    fn sibling_descriptions_close_groups() {
        let d = doc(r#"<ul class="funcs">
            <li><a name="baz"></a><code>Baz</code></li>
            <li><a name="bar"></a><code>Bar</code></li>
            <p>Does bar.</p>
            <li><code>Qux</code></li>
            <p>Does qux.</p>
            <pre>qux()</pre>
        </ul>"#);
        let out = extract(&d, &CodeTitles);
        let titles: Vec<_> = out.articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Bar", "Qux"]);
        assert_eq!(out.articles[0].text, "<p>Does bar.</p>");
        assert_eq!(out.articles[0].anchor.as_deref(), Some("bar"));
        assert_eq!(out.articles[1].text, "<p>Does qux.</p>\n<pre>qux()</pre>");
        assert_eq!(out.aliases, vec![("Baz".to_string(), "Bar".to_string())]);
    }

    #[test]
    fn alias_never_points_at_itself() {
        let d = doc(r#"<ul class="funcs">
            <li><code>open</code></li>
            <li><code>open</code><p>Opens.</p></li>
            <li><code>close</code><p>Closes.</p></li>
        </ul>"#);
        let out = extract(&d, &CodeTitles);
        assert_eq!(out.articles.len(), 2);
        assert!(out.aliases.iter().all(|(alias, target)| alias != target));
        assert!(out.aliases.is_empty());
    }

    #[test]
    fn missing_abstract_skips_group() {
        let d = doc(r#"<ul class="funcs">
            <li><code>a</code><p>Alpha.</p></li>
            <li><code>b1</code></li>
            <li><code>b</code></li>
        </ul>"#);
        let out = extract(&d, &CodeTitles);
        let titles: Vec<_> = out.articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["a"]);
        assert!(out.aliases.is_empty());
    }

    #[test]
    fn no_lists_by_default() {
        struct Bare;
        impl GroupRules for Bare {
            fn title_of(&self, item: ElementRef<'_>) -> Option<String> {
                Some(crate::parser::text::element_text(item))
            }
        }
        let d = doc(r#"<ul><li>x<p>y</p></li></ul>"#);
        let out = extract(&d, &Bare);
        assert!(out.articles.is_empty());
    }

    #[test]
    fn redirect_hook_turns_group_into_alias() {
        struct Redirecting;
        impl GroupRules for Redirecting {
            fn title_of(&self, item: ElementRef<'_>) -> Option<String> {
                CodeTitles.title_of(item)
            }
            fn lists_of<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>> {
                CodeTitles.lists_of(doc)
            }
            fn redirect_of(&self, _item: ElementRef<'_>, article: &ArticleCandidate) -> Option<String> {
                (article.title == "chdir").then(|| "cd".to_string())
            }
        }
        let d = doc(r#"<ul class="funcs">
            <li><code>cd</code><p>Change dir.</p></li>
            <li><code>chdir</code><p>See cd.</p></li>
        </ul>"#);
        let out = extract(&d, &Redirecting);
        assert_eq!(out.articles.len(), 1);
        assert_eq!(out.aliases, vec![("chdir".to_string(), "cd".to_string())]);
    }

    #[test]
    fn disambiguation_hook_suppresses_article() {
        struct Ambiguous;
        impl GroupRules for Ambiguous {
            fn title_of(&self, item: ElementRef<'_>) -> Option<String> {
                CodeTitles.title_of(item)
            }
            fn lists_of<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>> {
                CodeTitles.lists_of(doc)
            }
            fn disambiguation_of(&self, _item: ElementRef<'_>, article: &ArticleCandidate) -> Option<Disambiguation> {
                (article.title == "-X").then(|| Disambiguation {
                    title: article.title.clone(),
                    entries: vec![],
                })
            }
        }
        let d = doc(r#"<ul class="funcs"><li><code>-X</code><p>File tests.</p></li></ul>"#);
        let out = extract(&d, &Ambiguous);
        assert!(out.articles.is_empty());
        assert_eq!(out.disambiguations.len(), 1);
        assert_eq!(out.disambiguations[0].title, "-X");
    }
}
