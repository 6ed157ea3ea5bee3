//! Support for generic XML resource files.
//!
//! The root element only names the document; its children become nested
//! keys, repeated sibling tags become arrays, translatable attributes become
//! `@attr` keys and text sitting next to attributes or child elements is
//! stored under `#text`:
//!
//! ```xml
//! <messages>
//!   <home title="Start">Welcome</home>
//!   <tip>One</tip>
//!   <tip>Two</tip>
//! </messages>
//! ```
//!
//! flattens to `home.@title`, `home.#text`, `tip[0]` and `tip[1]`.
//!
//! Serializing rewrites the existing file in place: comments, other
//! attributes and untouched markup survive, elements whose keys are gone are
//! removed and new keys are appended to the deepest element they belong to.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use serde_json::{Map, Value};

use crate::{
    error::Error,
    flat::{Segment, flatten, join_segments, split_key, unflatten},
    formats::markup,
    traits::Parser,
    types::{FlatDocument, ParseResult, SerializeContext},
};

const NAME: &str = "xml";

const DEFAULT_ROOT: &str = "root";

const TEXT_KEY: &str = "#text";

/// Attributes whose values are user-facing text.
const TRANSLATABLE_ATTRIBUTES: &[&str] = &[
    "title",
    "label",
    "alt",
    "placeholder",
    "description",
    "tooltip",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct Format;

fn translatable_attributes(e: &BytesStart<'_>) -> Result<Map<String, Value>, String> {
    Ok(markup::attributes(e)?
        .into_iter()
        .filter(|(key, _)| TRANSLATABLE_ATTRIBUTES.contains(&key.as_str()))
        .map(|(key, value)| (format!("@{}", key), Value::String(value)))
        .collect())
}

fn push_child(children: &mut Map<String, Value>, name: String, value: Value) {
    match children.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            children.insert(name, value);
        }
    }
}

fn read_element(reader: &mut Reader<&[u8]>, start: &BytesStart<'_>) -> Result<Value, String> {
    let attributes = translatable_attributes(start)?;
    let mut children = Map::new();
    let mut text = String::new();
    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) => {
                let value = read_element(reader, &e)?;
                push_child(&mut children, markup::name_of(&e), value);
            }
            Event::Empty(e) => {
                let attributes = translatable_attributes(&e)?;
                let value = if attributes.is_empty() {
                    Value::String(String::new())
                } else {
                    Value::Object(attributes)
                };
                push_child(&mut children, markup::name_of(&e), value);
            }
            Event::Text(t) => {
                text.push_str(&markup::unescape_lossy(&String::from_utf8_lossy(&t)));
            }
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c)),
            Event::End(_) => break,
            Event::Eof => return Err("unexpected end of file".to_string()),
            _ => {}
        }
    }

    if children.is_empty() && attributes.is_empty() {
        return Ok(Value::String(text));
    }
    let text = if children.is_empty() { text.as_str() } else { text.trim() };
    let mut out = attributes;
    if !text.is_empty() {
        out.insert(TEXT_KEY.to_string(), Value::String(text.to_string()));
    }
    out.extend(children);
    Ok(Value::Object(out))
}

/// Reads the document below the root element, with the root tag name.
fn read_document(raw: &str) -> Result<(String, Value), String> {
    let mut reader = markup::reader(raw);
    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) => {
                let name = markup::name_of(&e);
                let value = match read_element(&mut reader, &e)? {
                    Value::String(text) if text.trim().is_empty() => Value::Object(Map::new()),
                    Value::String(text) => {
                        let mut map = Map::new();
                        map.insert(TEXT_KEY.to_string(), Value::String(text));
                        Value::Object(map)
                    }
                    other => other,
                };
                return Ok((name, value));
            }
            Event::Empty(e) => {
                return Ok((markup::name_of(&e), Value::Object(translatable_attributes(&e)?)));
            }
            Event::Eof => return Ok((DEFAULT_ROOT.to_string(), Value::Object(Map::new()))),
            Event::Text(t) if markup::is_blank(&t) => {}
            Event::Decl(_) | Event::Comment(_) | Event::DocType(_) | Event::PI(_) => {}
            other => return Err(format!("unexpected content before the root element: {:?}", other)),
        }
    }
}

fn write_element(out: &mut String, name: &str, value: &Value, depth: usize) {
    let indent = "  ".repeat(depth);
    match value {
        Value::Array(items) => {
            for item in items {
                write_element(out, name, item, depth);
            }
        }
        Value::Object(map) => {
            let mut open = format!("{}<{}", indent, name);
            let mut text = None;
            let mut children = Vec::new();
            for (key, value) in map {
                match (key.strip_prefix('@'), value) {
                    (Some(attribute), Value::String(s)) => {
                        open.push_str(&format!(" {}=\"{}\"", attribute, markup::escape_attribute(s)));
                    }
                    _ if key == TEXT_KEY => text = value.as_str(),
                    _ => children.push((key, value)),
                }
            }
            let text = text.map(markup::escape_text).unwrap_or_default();
            if children.is_empty() {
                out.push_str(&format!("{}>{}</{}>\n", open, text, name));
                return;
            }
            out.push_str(&format!("{}>", open));
            if !text.is_empty() {
                out.push_str(&text);
            }
            out.push('\n');
            for (key, value) in children {
                write_element(out, key, value, depth + 1);
            }
            out.push_str(&format!("{}</{}>\n", indent, name));
        }
        Value::String(s) => {
            out.push_str(&format!(
                "{}<{}>{}</{}>\n",
                indent,
                name,
                markup::escape_text(s),
                name
            ));
        }
        other => {
            out.push_str(&format!("{}<{}>{}</{}>\n", indent, name, other, name));
        }
    }
}

/// A node of an existing document, written back verbatim unless its keys change.
#[derive(Debug, Clone)]
enum Node {
    Element(Element),
    /// Raw, still escaped text.
    Text(String),
    CData(String),
    /// Comments, processing instructions and declarations.
    Verbatim(String),
}

#[derive(Debug, Clone)]
struct Element {
    name: String,
    /// The start tag as written; `None` once it has to be rebuilt.
    raw_open: Option<String>,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
    self_closing: bool,
}

impl Element {
    fn has_child_elements(&self) -> bool {
        self.children.iter().any(|n| matches!(n, Node::Element(_)))
    }

    fn is_leaf(&self) -> bool {
        !self.has_child_elements()
            && !self
                .attributes
                .iter()
                .any(|(key, _)| TRANSLATABLE_ATTRIBUTES.contains(&key.as_str()))
    }

    /// The text `read_element` would report for this element.
    fn text(&self) -> String {
        let mut text = String::new();
        for node in &self.children {
            match node {
                Node::Text(raw) => text.push_str(&markup::unescape_lossy(raw)),
                Node::CData(content) => text.push_str(content),
                _ => {}
            }
        }
        if self.has_child_elements() {
            text.trim().to_string()
        } else {
            text
        }
    }

    fn open_up(&mut self) {
        if self.self_closing {
            self.self_closing = false;
            self.raw_open = None;
        }
    }

    fn set_leaf_text(&mut self, value: &str) {
        if self.text() == value {
            return;
        }
        self.children.retain(|n| !matches!(n, Node::Text(_) | Node::CData(_)));
        if !value.is_empty() {
            self.open_up();
            self.children.insert(0, Node::Text(markup::escape_text(value).into_owned()));
        }
    }

    fn set_mixed_text(&mut self, value: Option<&str>) {
        let value = value.unwrap_or_default();
        if self.text() == value {
            return;
        }
        if !self.has_child_elements() {
            self.set_leaf_text(value);
            return;
        }
        let mut replaced = value.is_empty();
        for node in self.children.iter_mut() {
            let raw = match node {
                Node::Text(raw) if !markup::is_blank(raw.as_bytes()) => raw.as_str(),
                Node::CData(_) => "",
                _ => continue,
            };
            let lead = &raw[..raw.len() - raw.trim_start().len()];
            let trail = &raw[raw.trim_end().len()..];
            let updated = if replaced {
                lead.to_string()
            } else {
                replaced = true;
                format!("{}{}{}", lead, markup::escape_text(value), trail)
            };
            *node = Node::Text(updated);
        }
        if !replaced {
            self.children.insert(0, Node::Text(markup::escape_text(value).into_owned()));
        }
    }

    /// Appends pre-rendered child markup, keeping the closing tag on its own line.
    fn append_rendered(&mut self, rendered: String, depth: usize) {
        self.open_up();
        match self.children.last_mut() {
            Some(Node::Text(raw)) if markup::is_blank(raw.as_bytes()) => *raw = "\n".to_string(),
            _ => self.children.push(Node::Text("\n".to_string())),
        }
        self.children.push(Node::Verbatim(rendered));
        self.children.push(Node::Text("  ".repeat(depth)));
    }

    fn child_element_mut(&mut self, index: usize) -> Option<&mut Element> {
        match self.children.get_mut(index) {
            Some(Node::Element(e)) => Some(e),
            _ => None,
        }
    }

    fn write(&self, out: &mut String) {
        let closes = self.self_closing && self.children.is_empty();
        match &self.raw_open {
            Some(raw) => out.push_str(raw),
            None => {
                out.push('<');
                out.push_str(&self.name);
                for (key, value) in &self.attributes {
                    out.push_str(&format!(" {}=\"{}\"", key, markup::escape_attribute(value)));
                }
                out.push_str(if closes { "/>" } else { ">" });
            }
        }
        if closes {
            return;
        }
        for node in &self.children {
            node.write(out);
        }
        out.push_str(&format!("</{}>", self.name));
    }
}

impl Node {
    fn write(&self, out: &mut String) {
        match self {
            Node::Element(e) => e.write(out),
            Node::Text(raw) | Node::Verbatim(raw) => out.push_str(raw),
            Node::CData(content) => out.push_str(&format!("<![CDATA[{}]]>", content)),
        }
    }
}

/// An existing document: what precedes the root element, the root and what follows it.
#[derive(Debug, Clone)]
struct Tree {
    prolog: Vec<Node>,
    root: Element,
    epilogue: Vec<Node>,
}

fn position(reader: &Reader<&[u8]>) -> usize {
    reader.buffer_position() as usize
}

fn tree_element(e: &BytesStart<'_>, raw_open: &str, self_closing: bool) -> Result<Element, String> {
    Ok(Element {
        name: markup::name_of(e),
        raw_open: Some(raw_open.to_string()),
        attributes: markup::attributes(e)?,
        children: Vec::new(),
        self_closing,
    })
}

fn read_tree_children(reader: &mut Reader<&[u8]>, raw: &str, element: &mut Element) -> Result<(), String> {
    loop {
        let from = position(reader);
        let event = reader.read_event().map_err(|e| e.to_string())?;
        let text = &raw[from..position(reader)];
        match event {
            Event::Start(e) => {
                let mut child = tree_element(&e, text, false)?;
                read_tree_children(reader, raw, &mut child)?;
                element.children.push(Node::Element(child));
            }
            Event::Empty(e) => element.children.push(Node::Element(tree_element(&e, text, true)?)),
            Event::Text(_) => element.children.push(Node::Text(text.to_string())),
            Event::CData(c) => element
                .children
                .push(Node::CData(String::from_utf8_lossy(&c).into_owned())),
            Event::End(_) => return Ok(()),
            Event::Eof => return Err("unexpected end of file".to_string()),
            _ => element.children.push(Node::Verbatim(text.to_string())),
        }
    }
}

/// Reads a document as a tree, or `None` when it has no root element.
fn read_tree(raw: &str) -> Result<Option<Tree>, String> {
    let mut reader = markup::reader(raw);
    let mut prolog = Vec::new();
    let root = loop {
        let from = position(&reader);
        let event = reader.read_event().map_err(|e| e.to_string())?;
        let text = &raw[from..position(&reader)];
        match event {
            Event::Start(e) => {
                let mut root = tree_element(&e, text, false)?;
                read_tree_children(&mut reader, raw, &mut root)?;
                break root;
            }
            Event::Empty(e) => break tree_element(&e, text, true)?,
            Event::Eof => return Ok(None),
            Event::Text(t) if !markup::is_blank(&t) => {
                return Err("unexpected text before the root element".to_string());
            }
            _ => prolog.push(Node::Verbatim(text.to_string())),
        }
    };

    let mut epilogue = Vec::new();
    loop {
        let from = position(&reader);
        let event = reader.read_event().map_err(|e| e.to_string())?;
        match event {
            Event::Eof => break,
            _ => epilogue.push(Node::Verbatim(raw[from..position(&reader)].to_string())),
        }
    }
    Ok(Some(Tree { prolog, root, epilogue }))
}

/// Applies a flat document to an existing tree, tracking the keys it placed.
struct Rewrite<'a> {
    data: &'a FlatDocument,
    placed: HashSet<String>,
}

impl<'a> Rewrite<'a> {
    fn take(&mut self, path: &[Segment]) -> Option<&'a str> {
        let key = join_segments(path);
        let value = self.data.get(&key)?;
        self.placed.insert(key);
        Some(value.as_str())
    }

    fn take_child(&mut self, path: &mut Vec<Segment>, name: String) -> Option<&'a str> {
        path.push(Segment::Key(name));
        let value = self.take(path);
        path.pop();
        value
    }

    /// Returns whether any key of the element survives.
    fn element(&mut self, element: &mut Element, path: &mut Vec<Segment>) -> bool {
        if !element.is_leaf() {
            return self.object(element, path);
        }
        match self.take(path) {
            Some(value) => {
                element.set_leaf_text(value);
                true
            }
            None => false,
        }
    }

    fn object(&mut self, element: &mut Element, path: &mut Vec<Segment>) -> bool {
        let mut kept = false;

        let mut attributes = Vec::with_capacity(element.attributes.len());
        for (key, value) in std::mem::take(&mut element.attributes) {
            if !TRANSLATABLE_ATTRIBUTES.contains(&key.as_str()) {
                attributes.push((key, value));
                continue;
            }
            match self.take_child(path, format!("@{}", key)) {
                Some(updated) => {
                    kept = true;
                    if updated != value {
                        element.raw_open = None;
                    }
                    attributes.push((key, updated.to_string()));
                }
                None => element.raw_open = None,
            }
        }
        element.attributes = attributes;

        let text = self.take_child(path, TEXT_KEY.to_string());
        kept |= text.is_some();

        let mut counts: HashMap<String, usize> = HashMap::new();
        for node in &element.children {
            if let Node::Element(child) = node {
                *counts.entry(child.name.clone()).or_default() += 1;
            }
        }
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut children = Vec::with_capacity(element.children.len());
        for node in std::mem::take(&mut element.children) {
            let Node::Element(mut child) = node else {
                children.push(node);
                continue;
            };
            let index = seen.entry(child.name.clone()).or_default();
            path.push(Segment::Key(child.name.clone()));
            let repeated = counts.get(&child.name).copied().unwrap_or_default() > 1;
            if repeated {
                path.push(Segment::Index(*index));
            }
            *index += 1;
            let keep = self.element(&mut child, path);
            if repeated {
                path.pop();
            }
            path.pop();

            if keep {
                kept = true;
                children.push(Node::Element(child));
            } else if matches!(children.last(), Some(Node::Text(raw)) if markup::is_blank(raw.as_bytes())) {
                children.pop();
            }
        }
        element.children = children;
        element.set_mixed_text(text);
        kept
    }
}

/// Where a key missing from the tree goes: the index path of the deepest
/// existing element that can hold it, and the key relative to that element.
fn placement(root: &Element, key: &str) -> (Vec<usize>, String) {
    let segments = split_key(key);
    let mut element = root;
    let mut indices = Vec::new();
    let mut depth = 0;
    while depth + 1 < segments.len() {
        let Segment::Key(name) = &segments[depth] else {
            break;
        };
        if matches!(segments[depth + 1], Segment::Index(_)) {
            break;
        }
        let mut matching = element.children.iter().enumerate().filter_map(|(i, node)| match node {
            Node::Element(child) if &child.name == name => Some((i, child)),
            _ => None,
        });
        let (Some((index, child)), None) = (matching.next(), matching.next()) else {
            break;
        };
        if child.is_leaf() {
            break;
        }
        indices.push(index);
        element = child;
        depth += 1;
    }
    (indices, join_segments(&segments[depth..]))
}

fn element_at_mut<'t>(root: &'t mut Element, indices: &[usize]) -> Option<&'t mut Element> {
    indices
        .iter()
        .try_fold(root, |element, &index| element.child_element_mut(index))
}

fn rewrite(mut tree: Tree, data: &FlatDocument) -> String {
    let mut rewrite = Rewrite {
        data,
        placed: HashSet::new(),
    };
    rewrite.object(&mut tree.root, &mut Vec::new());

    let mut pending: IndexMap<Vec<usize>, FlatDocument> = IndexMap::new();
    for (key, value) in data {
        if rewrite.placed.contains(key) {
            continue;
        }
        let (indices, relative) = placement(&tree.root, key);
        pending
            .entry(indices)
            .or_default()
            .insert(relative, value.clone());
    }
    for (indices, additions) in pending {
        let depth = indices.len();
        let Some(element) = element_at_mut(&mut tree.root, &indices) else {
            continue;
        };
        let mut rendered = String::new();
        match unflatten(&additions) {
            Value::Object(map) => {
                for (key, value) in &map {
                    write_element(&mut rendered, key, value, depth + 1);
                }
            }
            other => write_element(&mut rendered, "item", &other, depth + 1),
        }
        element.append_rendered(rendered, depth);
    }

    let mut out = String::new();
    for node in &tree.prolog {
        node.write(&mut out);
    }
    tree.root.write(&mut out);
    for node in &tree.epilogue {
        node.write(&mut out);
    }
    if tree.epilogue.is_empty() {
        out.push('\n');
    }
    out
}

impl Parser for Format {
    fn parse(&self, raw: &str, _locale: &str) -> Result<ParseResult, Error> {
        let (_, value) = read_document(raw).map_err(|e| Error::format(NAME, e))?;
        Ok(flatten(&value).map_err(|e| Error::format(NAME, e))?.into())
    }

    fn serialize(&self, data: &FlatDocument, ctx: &SerializeContext<'_>) -> Result<String, Error> {
        let existing = [ctx.original, ctx.source]
            .into_iter()
            .flatten()
            .filter(|raw| !raw.trim().is_empty())
            .find_map(|raw| read_tree(raw).ok().flatten());
        if let Some(tree) = existing {
            return Ok(rewrite(tree, data));
        }

        let mut out = String::from(markup::XML_DECLARATION);
        match unflatten(data) {
            Value::Object(map) if map.is_empty() => {
                out.push_str(&format!("<{}/>\n", DEFAULT_ROOT));
            }
            Value::Object(map) => {
                out.push_str(&format!("<{}>\n", DEFAULT_ROOT));
                for (key, value) in &map {
                    write_element(&mut out, key, value, 1);
                }
                out.push_str(&format!("</{}>\n", DEFAULT_ROOT));
            }
            other => {
                out.push_str(&format!("<{}>\n", DEFAULT_ROOT));
                write_element(&mut out, "item", &other, 1);
                out.push_str(&format!("</{}>\n", DEFAULT_ROOT));
            }
        }
        Ok(out)
    }
}
