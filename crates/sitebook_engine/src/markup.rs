use std::collections::{HashMap, HashSet};

use ego_tree::{NodeId, NodeRef};
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext", "noscript",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid selector {selector:?}: {message}")]
pub struct SelectorError {
    pub selector: String,
    pub message: String,
}

pub fn parse_selector(selector: &str) -> Result<Selector, SelectorError> {
    Selector::parse(selector).map_err(|err| SelectorError {
        selector: selector.to_string(),
        message: err.to_string(),
    })
}

/// An attribute value that points at an external asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    pub node: NodeId,
    pub attr: &'static str,
    pub value: String,
}

/// Parsed page with pending edits.
///
/// The parsed tree stays untouched; removals, attribute rewrites and extra
/// head styles are applied when the document is serialized.
pub struct PageDocument {
    html: Html,
    removed: HashSet<NodeId>,
    attr_overrides: HashMap<(NodeId, &'static str), String>,
    head_styles: Vec<String>,
}

impl PageDocument {
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
            removed: HashSet::new(),
            attr_overrides: HashMap::new(),
            head_styles: Vec::new(),
        }
    }

    /// `href` values of the elements matching `selector`, in document order.
    pub fn hrefs(&self, selector: &Selector) -> Vec<String> {
        self.live(selector)
            .filter_map(|el| el.value().attr("href"))
            .map(|href| href.trim().to_string())
            .filter(|href| !href.is_empty())
            .collect()
    }

    /// `id` values of the elements matching `selector`; elements without an
    /// id are skipped.
    pub fn ids(&self, selector: &Selector) -> Vec<String> {
        self.live(selector)
            .filter_map(|el| el.value().id())
            .map(str::to_string)
            .collect()
    }

    /// Class names in first-appearance order, without duplicates.
    pub fn class_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        let Ok(all) = Selector::parse("[class]") else {
            return names;
        };
        for el in self.live(&all) {
            for class in el.value().classes() {
                if seen.insert(class.to_string()) {
                    names.push(class.to_string());
                }
            }
        }
        names
    }

    /// Remove the first element with this tag name. Returns false when the
    /// page has none.
    pub fn remove_first(&mut self, tag: &str) -> bool {
        let Ok(sel) = Selector::parse(tag) else {
            return false;
        };
        let first = self.live(&sel).next().map(|el| el.id());
        match first {
            Some(id) => self.removed.insert(id),
            None => false,
        }
    }

    /// Remove every element with this tag name; returns how many.
    pub fn remove_all(&mut self, tag: &str) -> usize {
        let Ok(sel) = Selector::parse(tag) else {
            return 0;
        };
        let ids: Vec<NodeId> = self.live(&sel).map(|el| el.id()).collect();
        let count = ids.len();
        self.removed.extend(ids);
        count
    }

    /// Images and linked stylesheets that are still part of the document.
    pub fn asset_refs(&self) -> Vec<AssetRef> {
        let mut refs = Vec::new();
        if let Ok(images) = Selector::parse("img[src]") {
            for el in self.live(&images) {
                if let Some(src) = el.value().attr("src") {
                    refs.push(AssetRef {
                        node: el.id(),
                        attr: "src",
                        value: src.trim().to_string(),
                    });
                }
            }
        }
        if let Ok(links) = Selector::parse("link[href]") {
            for el in self.live(&links) {
                let is_stylesheet = el
                    .value()
                    .attr("rel")
                    .map(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("stylesheet")))
                    .unwrap_or(false);
                if let (true, Some(href)) = (is_stylesheet, el.value().attr("href")) {
                    refs.push(AssetRef {
                        node: el.id(),
                        attr: "href",
                        value: href.trim().to_string(),
                    });
                }
            }
        }
        refs.retain(|r| !r.value.is_empty());
        refs
    }

    pub fn set_attr(&mut self, node: NodeId, attr: &'static str, value: String) {
        self.attr_overrides.insert((node, attr), value);
    }

    /// Queue a `<style>` block to be written at the end of `<head>`.
    pub fn append_head_style(&mut self, css: impl Into<String>) {
        self.head_styles.push(css.into());
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for child in self.html.tree.root().children() {
            self.write_node(child, &mut out, false);
        }
        out
    }

    fn live<'a>(&'a self, selector: &'a Selector) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        self.html
            .select(selector)
            .filter(move |el| !self.is_removed(el.id()))
    }

    fn is_removed(&self, id: NodeId) -> bool {
        if self.removed.is_empty() {
            return false;
        }
        let Some(node) = self.html.tree.get(id) else {
            return false;
        };
        self.removed.contains(&id) || node.ancestors().any(|a| self.removed.contains(&a.id()))
    }

    fn write_node(&self, node: NodeRef<'_, Node>, out: &mut String, raw_text: bool) {
        if self.removed.contains(&node.id()) {
            return;
        }
        match node.value() {
            Node::Doctype(doctype) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(doctype.name());
                out.push('>');
            }
            Node::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
            Node::Text(text) => {
                if raw_text {
                    out.push_str(text);
                } else {
                    escape_text(text, out);
                }
            }
            Node::Element(element) => {
                let name = element.name();
                out.push('<');
                out.push_str(name);
                for (attr, value) in element.attrs() {
                    out.push(' ');
                    out.push_str(attr);
                    out.push_str("=\"");
                    let value = self
                        .attr_overrides
                        .iter()
                        .find(|((id, a), _)| *id == node.id() && *a == attr)
                        .map(|(_, v)| v.as_str())
                        .unwrap_or(value);
                    escape_attr(value, out);
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&name) {
                    return;
                }
                let raw = RAW_TEXT_ELEMENTS.contains(&name);
                for child in node.children() {
                    self.write_node(child, out, raw);
                }
                if name == "head" {
                    for css in &self.head_styles {
                        out.push_str("<style type=\"text/css\">");
                        out.push_str(css);
                        out.push_str("</style>");
                    }
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            _ => {
                for child in node.children() {
                    self.write_node(child, out, raw_text);
                }
            }
        }
    }
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}
