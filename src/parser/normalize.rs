use scraper::{ElementRef, Html, Node};
use url::Url;

/// Inline wrappers that only carry presentation. Their children are kept.
const UNWRAP_TAGS: &[&str] = &["b", "em", "font", "i", "strong", "u"];
const LINK_ATTRS: &[&str] = &["href", "src"];
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];
/// Content parsed as raw text (scripting enabled) and written back verbatim.
const RAW_TEXT_TAGS: &[&str] = &[
    "iframe", "noembed", "noframes", "noscript", "script", "style", "xmp",
];

/// A page after link absolutization and markup cleanup.
///
/// Keeps both the serialized markup (stable across repeated normalization)
/// and the re-parsed tree that extraction queries.
pub struct NormalizedDoc {
    url: Url,
    markup: String,
    html: Html,
}

impl NormalizedDoc {
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn html(&self) -> &Html {
        &self.html
    }
}

/// Rewrite links against `base`, drop emphasis wrappers and collapse
/// `<code><a>x</a></code>` into `<code>x</code>`.
///
/// Links that fail to resolve are left as they are.
pub fn normalize(doc: &Html, base: &Url) -> NormalizedDoc {
    let mut markup = String::new();
    for child in doc.tree.root().children() {
        write_child(child.value(), ElementRef::wrap(child), "", base, &mut markup);
    }
    let html = Html::parse_document(&markup);
    NormalizedDoc {
        url: base.clone(),
        markup,
        html,
    }
}

fn write_child(value: &Node, element: Option<ElementRef<'_>>, parent: &str, base: &Url, out: &mut String) {
    if let Some(el) = element {
        write_element(el, base, out);
        return;
    }
    match value {
        Node::Doctype(doctype) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(doctype.name());
            out.push('>');
        }
        Node::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(&comment.comment);
            out.push_str("-->");
        }
        Node::Text(text) if RAW_TEXT_TAGS.contains(&parent) => out.push_str(&text.text),
        Node::Text(text) => escape_text(&text.text, out),
        _ => {}
    }
}

fn write_element(el: ElementRef<'_>, base: &Url, out: &mut String) {
    let name = el.value().name();
    if UNWRAP_TAGS.contains(&name) {
        write_children(el, base, out);
        return;
    }
    if name == "code" {
        if let Some(text) = redundant_link_text(el) {
            out.push_str("<code>");
            escape_text(&text, out);
            out.push_str("</code>");
            return;
        }
    }

    out.push('<');
    out.push_str(name);
    let mut attrs: Vec<(&str, &str)> = el.value().attrs().collect();
    attrs.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        if LINK_ATTRS.contains(&key) {
            escape_attr(&absolutize(value, base), out);
        } else {
            escape_attr(value, out);
        }
        out.push('"');
    }
    out.push('>');

    if VOID_TAGS.contains(&name) {
        return;
    }
    // The parser eats one leading newline inside these.
    if matches!(name, "pre" | "textarea" | "listing") {
        let leading_newline = el
            .first_child()
            .and_then(|c| c.value().as_text().map(|t| t.text.starts_with('\n')))
            .unwrap_or(false);
        if leading_newline {
            out.push('\n');
        }
    }
    write_children(el, base, out);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn write_children(el: ElementRef<'_>, base: &Url, out: &mut String) {
    let name = el.value().name();
    for child in el.children() {
        write_child(child.value(), ElementRef::wrap(child), name, base, out);
    }
}

/// Text of a `<code>` whose only content is a link that merely repeats
/// where it points: the link text equals the href's fragment or file stem.
fn redundant_link_text(code: ElementRef<'_>) -> Option<String> {
    let mut link = None;
    for child in code.children() {
        match child.value() {
            Node::Text(t) if t.text.trim().is_empty() => {}
            Node::Element(el) if el.name() == "a" && link.is_none() => link = ElementRef::wrap(child),
            _ => return None,
        }
    }
    let link = link?;
    let href = link.value().attr("href")?;
    let text: String = link.text().collect();
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let (fragment, stem) = href_names(href);
    if fragment == Some(text) || stem == Some(text) {
        Some(text.to_string())
    } else {
        None
    }
}

/// Fragment and last path segment (extension stripped) of an href.
fn href_names(href: &str) -> (Option<&str>, Option<&str>) {
    let (rest, fragment) = match href.split_once('#') {
        Some((rest, frag)) => (rest, Some(frag).filter(|f| !f.is_empty())),
        None => (href, None),
    };
    let path = rest.split('?').next().unwrap_or(rest);
    let segment = path.rsplit('/').next().unwrap_or(path);
    let stem = match segment.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => segment,
    };
    (fragment, Some(stem).filter(|s| !s.is_empty()))
}

fn absolutize(value: &str, base: &Url) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return value.to_string();
    }
    match base.join(trimmed) {
        Ok(url) => url.to_string(),
        Err(_) => value.to_string(),
    }
}

fn escape_text(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

pub(crate) fn escape_attr(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}
