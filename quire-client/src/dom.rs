//! The slice of the DOM the bootstrap touches.
//!
//! [`Document`] is what a browser binding implements. [`MemoryDocument`] is a
//! small tree that supports the same calls, with selectors limited to tag
//! names, `[attr]` / `[attr="value"]` and the descendant combinator.

use std::fmt::Write;

/// Handle to an element of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

pub trait Document {
    /// First element in document order matching `selector`.
    fn query_selector(&self, selector: &str) -> Option<NodeId> {
        self.query_selector_all(selector).into_iter().next()
    }

    /// Every element matching `selector`, in document order.
    fn query_selector_all(&self, selector: &str) -> Vec<NodeId>;

    fn tag_name(&self, node: NodeId) -> String;
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    fn get_attribute(&self, node: NodeId, name: &str) -> Option<String>;
    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);
    fn remove_attribute(&mut self, node: NodeId, name: &str);

    /// A new element, not yet attached anywhere.
    fn create_element(&mut self, tag: &str) -> NodeId;
    fn append_child(&mut self, parent: NodeId, child: NodeId);

    fn inner_html(&self, node: NodeId) -> String;
    fn set_inner_html(&mut self, node: NodeId, html: &str);
}

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Markup assigned through `set_inner_html`, kept as-is.
    html: String,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            parent: None,
            children: Vec::new(),
            html: String::new(),
        }
    }
}

const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "link", "meta"];

#[derive(Debug, Clone)]
pub struct MemoryDocument {
    nodes: Vec<Element>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// An empty `<html><head></head><body></body></html>`.
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: vec![Element::new("#document")],
            root: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
        };
        let html = doc.create_element("html");
        doc.append_child(doc.root, html);
        doc.head = doc.append_element(html, "head", &[]);
        doc.body = doc.append_element(html, "body", &[]);
        doc
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Create an element with `attributes` and attach it under `parent`.
    pub fn append_element(
        &mut self,
        parent: NodeId,
        tag: &str,
        attributes: &[(&str, &str)],
    ) -> NodeId {
        let node = self.create_element(tag);
        for (name, value) in attributes {
            self.set_attribute(node, name, value);
        }
        self.append_child(parent, node);
        node
    }

    /// The whole document serialized, mostly for debugging failed tests.
    pub fn to_html(&self) -> String {
        self.inner_html(self.root)
    }

    fn element(&self, node: NodeId) -> &Element {
        &self.nodes[node.0]
    }

    fn element_mut(&mut self, node: NodeId) -> &mut Element {
        &mut self.nodes[node.0]
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.element_mut(node).parent.take() {
            self.element_mut(parent).children.retain(|c| *c != node);
        }
    }

    fn descendants(&self, node: NodeId, out: &mut Vec<NodeId>) {
        for &child in &self.element(node).children {
            out.push(child);
            self.descendants(child, out);
        }
    }

    fn matches_compound(&self, node: NodeId, compound: &Compound) -> bool {
        let element = self.element(node);
        if let Some(tag) = &compound.tag {
            if &element.tag != tag {
                return false;
            }
        }
        compound.attributes.iter().all(|(name, wanted)| {
            let found = element.attributes.iter().find(|(n, _)| n == name);
            match (found, wanted) {
                (Some((_, value)), Some(wanted)) => value == wanted,
                (Some(_), None) => true,
                (None, _) => false,
            }
        })
    }

    fn matches(&self, node: NodeId, selector: &[Compound]) -> bool {
        let Some((last, mut ancestors)) = selector.split_last() else {
            return false;
        };
        if !self.matches_compound(node, last) {
            return false;
        }

        let mut current = self.element(node).parent;
        while let Some((wanted, rest)) = ancestors.split_last() {
            loop {
                let Some(id) = current else {
                    return false;
                };
                current = self.element(id).parent;
                if self.matches_compound(id, wanted) {
                    break;
                }
            }
            ancestors = rest;
        }
        true
    }

    fn write_element(&self, node: NodeId, out: &mut String) {
        let element = self.element(node);
        let _ = write!(out, "<{}", element.tag);
        for (name, value) in &element.attributes {
            let _ = write!(
                out,
                " {}=\"{}\"",
                name,
                html_escape::encode_double_quoted_attribute(value)
            );
        }
        out.push('>');
        if VOID_ELEMENTS.contains(&element.tag.as_str()) {
            return;
        }
        out.push_str(&self.inner_html(node));
        let _ = write!(out, "</{}>", element.tag);
    }
}

impl Document for MemoryDocument {
    fn query_selector_all(&self, selector: &str) -> Vec<NodeId> {
        let Some(selector) = parse_selector(selector) else {
            return Vec::new();
        };
        let mut all = Vec::new();
        self.descendants(self.root, &mut all);
        all.into_iter()
            .filter(|node| self.matches(*node, &selector))
            .collect()
    }

    fn tag_name(&self, node: NodeId) -> String {
        self.element(node).tag.clone()
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.element(node).children.clone()
    }

    fn get_attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.element(node)
            .attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        let attributes = &mut self.element_mut(node).attributes;
        match attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => attributes.push((name.to_string(), value.to_string())),
        }
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) {
        self.element_mut(node).attributes.retain(|(n, _)| n != name);
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        self.nodes.push(Element::new(tag));
        NodeId(self.nodes.len() - 1)
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.element_mut(child).parent = Some(parent);
        self.element_mut(parent).children.push(child);
    }

    fn inner_html(&self, node: NodeId) -> String {
        let element = self.element(node);
        let mut out = element.html.clone();
        for &child in &element.children {
            self.write_element(child, &mut out);
        }
        out
    }

    fn set_inner_html(&mut self, node: NodeId, html: &str) {
        for child in self.element(node).children.clone() {
            self.detach(child);
        }
        self.element_mut(node).html = html.to_string();
    }
}

/// One step of a selector: `tag[attr="value"][attr]`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    attributes: Vec<(String, Option<String>)>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.attributes.is_empty()
    }
}

/// Descendant chain of compounds, or `None` for anything unsupported.
fn parse_selector(selector: &str) -> Option<Vec<Compound>> {
    let mut parts = Vec::new();
    let mut current = Compound::default();
    let mut chars = selector.trim().chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            '[' => {
                let name = take_until(&mut chars, |c| c == '=' || c == ']');
                let value = match chars.next()? {
                    ']' => None,
                    '=' => {
                        let value = match chars.peek().copied() {
                            Some(quote @ ('"' | '\'')) => {
                                chars.next();
                                let value = take_until(&mut chars, |c| c == quote);
                                chars.next()?;
                                value
                            }
                            _ => take_until(&mut chars, |c| c == ']'),
                        };
                        if chars.next()? != ']' {
                            return None;
                        }
                        Some(value)
                    }
                    _ => return None,
                };
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                current.attributes.push((name.to_string(), value));
            }
            c if (c.is_ascii_alphanumeric() || c == '-' || c == '_')
                && current.attributes.is_empty() =>
            {
                current
                    .tag
                    .get_or_insert_with(String::new)
                    .push(c.to_ascii_lowercase());
            }
            _ => return None,
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }
    (!parts.is_empty()).then_some(parts)
}

fn take_until(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    stop: impl Fn(char) -> bool,
) -> String {
    let mut out = String::new();
    while let Some(&c) = chars.peek() {
        if stop(c) {
            break;
        }
        out.push(c);
        chars.next();
    }
    out
}

/// Hands out stable [`NodeId`]s for handles owned elsewhere, such as
/// browser elements. The same handle always maps to the same id.
#[cfg(any(feature = "web", test))]
#[derive(Debug, Clone)]
pub(crate) struct NodeArena<T> {
    nodes: Vec<T>,
}

#[cfg(any(feature = "web", test))]
impl<T: PartialEq> NodeArena<T> {
    pub(crate) fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub(crate) fn intern(&mut self, node: T) -> NodeId {
        match self.nodes.iter().position(|known| *known == node) {
            Some(index) => NodeId(index),
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&T> {
        self.nodes.get(id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> MemoryDocument {
        let mut doc = MemoryDocument::new();
        let head = doc.head();
        doc.append_element(head, "meta", &[("property", "og:title"), ("content", "")]);
        doc.append_element(head, "meta", &[("name", "description"), ("content", "")]);
        let body = doc.body();
        let main = doc.append_element(body, "main", &[]);
        let pre = doc.append_element(main, "hljs-pre", &[("class", "elm")]);
        doc.append_element(pre, "code", &[]);
        doc.append_element(body, "code", &[]);
        doc
    }

    #[test]
    fn test_parse_selector() {
        assert_eq!(
            parse_selector(r#"meta[property="og:url"]"#),
            Some(vec![Compound {
                tag: Some("meta".into()),
                attributes: vec![("property".into(), Some("og:url".into()))],
            }])
        );
        assert_eq!(parse_selector("hljs-pre   code").map(|p| p.len()), Some(2));
        assert_eq!(parse_selector("[data-x]").unwrap()[0].attributes[0].1, None);
        assert!(parse_selector("div > p").is_none());
        assert!(parse_selector("meta[name=\"x\"").is_none());
        assert!(parse_selector("   ").is_none());
    }

    #[test]
    fn test_attribute_selectors() {
        let doc = page();
        let og = doc.query_selector(r#"meta[property="og:title"]"#).unwrap();
        assert_eq!(doc.get_attribute(og, "property").as_deref(), Some("og:title"));
        assert!(doc.query_selector(r#"meta[name="og:title"]"#).is_none());
        assert_eq!(doc.query_selector_all("meta[content]").len(), 2);
    }

    #[test]
    fn test_descendant_selector_skips_unrelated_matches() {
        let doc = page();
        assert_eq!(doc.query_selector_all("code").len(), 2);
        assert_eq!(doc.query_selector_all("hljs-pre code").len(), 1);
        assert_eq!(doc.query_selector_all("body main code").len(), 1);
        assert!(doc.query_selector_all("head code").is_empty());
    }

    #[test]
    fn test_set_and_remove_attribute() {
        let mut doc = page();
        let meta = doc.query_selector(r#"meta[name="description"]"#).unwrap();
        doc.set_attribute(meta, "content", "D");
        doc.set_attribute(meta, "content", "E");
        assert_eq!(doc.get_attribute(meta, "content").as_deref(), Some("E"));
        doc.remove_attribute(meta, "content");
        assert_eq!(doc.get_attribute(meta, "content"), None);
    }

    #[test]
    fn test_detached_elements_are_not_found() {
        let mut doc = MemoryDocument::new();
        let orphan = doc.create_element("code");
        assert!(doc.query_selector("code").is_none());
        doc.append_child(doc.body(), orphan);
        assert_eq!(doc.query_selector("code"), Some(orphan));
    }

    #[test]
    fn test_inner_html_round_trip() {
        let mut doc = MemoryDocument::new();
        let body = doc.body();
        let p = doc.append_element(body, "p", &[("title", "a \"b\"")]);
        doc.set_inner_html(p, "<em>hi</em>");
        doc.append_element(body, "meta", &[]);

        assert_eq!(
            doc.inner_html(body),
            "<p title=\"a &quot;b&quot;\"><em>hi</em></p><meta>"
        );

        doc.set_inner_html(body, "gone");
        assert!(doc.query_selector("p").is_none());
        assert_eq!(doc.inner_html(body), "gone");
    }

    #[test]
    fn test_arena_reuses_ids_for_the_same_handle() {
        let mut arena = NodeArena::new();
        let a = arena.intern("head");
        let b = arena.intern("body");
        assert_ne!(a, b);
        assert_eq!(arena.intern("head"), a);
        assert_eq!(arena.get(b), Some(&"body"));
        assert!(arena.get(NodeId(9)).is_none());
    }
}
