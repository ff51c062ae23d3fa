// HTML input: decoding, html5ever parsing and an owned element tree.
//
// The rcdom handles are reference counted and tied to the parsing thread, so
// the parse result is copied once into plain owned nodes that the translator
// reads without touching the parser again.

use crate::error::{ConvertError, Result};
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedNode {
    Element(ParsedElement),
    Text(String),
}

/// An HTML element with lower-cased tag name, attributes in source order and
/// its children in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedElement {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<ParsedNode>,
}

impl ParsedElement {
    pub fn new(tag: &str, attrs: Vec<(String, String)>, children: Vec<ParsedNode>) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs,
            children,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn children(&self) -> &[ParsedNode] {
        &self.children
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &ParsedElement> {
        self.children.iter().filter_map(|c| match c {
            ParsedNode::Element(e) => Some(e),
            ParsedNode::Text(_) => None,
        })
    }

    pub fn has_element_children(&self) -> bool {
        self.child_elements().next().is_some()
    }

    /// Concatenated text of all descendant text nodes, unnormalized.
    pub fn text(&self) -> String {
        fn walk(el: &ParsedElement, out: &mut String) {
            for c in &el.children {
                match c {
                    ParsedNode::Text(t) => out.push_str(t),
                    ParsedNode::Element(e) => walk(e, out),
                }
            }
        }
        let mut out = String::new();
        walk(self, &mut out);
        out
    }
}

/// Nesting depth below `body` kept as elements. Deeper subtrees are
/// flattened into text so that every later recursive pass stays shallow.
pub const MAX_DEPTH: usize = 128;

/// A parsed HTML document reduced to its `body`.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    body: ParsedElement,
    has_markup: bool,
}

impl ParsedDocument {
    pub fn parse(input: &str) -> Self {
        let dom = parse_document(RcDom::default(), Default::default()).one(input);

        // Pre-order walk without recursion: the first body in document order,
        // and whether any tag besides the implied wrapper exists (a lone
        // <title> in head counts).
        let mut body = None;
        let mut has_tags = false;
        let mut pending = vec![dom.document.clone()];
        while let Some(node) = pending.pop() {
            if let Some(name) = element_name(&node) {
                if name == "body" && body.is_none() {
                    body = Some(node.clone());
                }
                has_tags |= !matches!(name.as_str(), "html" | "head" | "body");
            }
            pending.extend(node.children.borrow().iter().rev().cloned());
        }

        let low = input.to_ascii_lowercase();
        let explicit_root = ["<html", "<body", "<head"].iter().any(|t| low.contains(t));
        Self {
            body: body
                .map(|b| owned_element(&b, 0))
                .unwrap_or_else(|| ParsedElement::new("body", Vec::new(), Vec::new())),
            has_markup: has_tags || explicit_root,
        }
    }

    pub fn body(&self) -> &ParsedElement {
        &self.body
    }

    /// Whether the source contained any element tags at all. Plain text only
    /// gets the parser's implied html/head/body wrapper.
    pub fn has_markup(&self) -> bool {
        self.has_markup
    }
}

/// Decodes uploaded bytes as UTF-8, tolerating a byte order mark.
pub fn decode_html(bytes: &[u8]) -> Result<&str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    std::str::from_utf8(bytes).map_err(|_| ConvertError::InvalidEncoding)
}

/// Collapses every run of whitespace into one space.
pub fn collapse_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if !ch.is_whitespace() {
            out.push(ch);
        } else if !out.ends_with(' ') {
            out.push(' ');
        }
    }
    out
}

fn element_name(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.to_ascii_lowercase().to_string()),
        _ => None,
    }
}

fn attributes(node: &Handle) -> Vec<(String, String)> {
    let NodeData::Element { attrs, .. } = &node.data else {
        return Vec::new();
    };
    attrs
        .borrow()
        .iter()
        .map(|attr| (String::from(&*attr.name.local), String::from(&*attr.value)))
        .collect()
}

/// Copies `node` into owned form. Elements below [`MAX_DEPTH`] are replaced
/// by their text.
fn owned_element(node: &Handle, depth: usize) -> ParsedElement {
    let mut children = Vec::new();
    for child in node.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => push_text(&mut children, &contents.borrow()),
            NodeData::Element { .. } if depth < MAX_DEPTH => {
                children.push(ParsedNode::Element(owned_element(child, depth + 1)))
            }
            NodeData::Element { .. } => push_text(&mut children, &flattened_text(child)),
            // comments, doctype, processing instructions
            _ => {}
        }
    }
    ParsedElement::new(
        &element_name(node).unwrap_or_default(),
        attributes(node),
        children,
    )
}

fn push_text(children: &mut Vec<ParsedNode>, text: &str) {
    if let Some(ParsedNode::Text(prev)) = children.last_mut() {
        prev.push_str(text);
    } else if !text.is_empty() {
        children.push(ParsedNode::Text(text.to_owned()));
    }
}

/// Text of a whole subtree, in document order.
fn flattened_text(node: &Handle) -> String {
    let mut out = String::new();
    let mut pending = vec![node.clone()];
    while let Some(node) = pending.pop() {
        if let NodeData::Text { contents } = &node.data {
            out.push_str(&contents.borrow());
        }
        pending.extend(node.children.borrow().iter().rev().cloned());
    }
    out
}
