//! Support for HTML documents.
//!
//! Text nodes and a fixed table of user-facing attributes are units. Keys are
//! structural paths below `head` or `body`: `body/1/0` is the first unit-bearing
//! child of the second one, counting visible elements and non-blank text
//! nodes, and
//! `body/2#alt` is the `alt` attribute of an element. Content of `script`,
//! `style`, `noscript`, `template`, `svg` and `code` is never extracted.
//!
//! Serialization rewrites a copy of the original (or source) document in
//! place. Units missing from the data are cleared; keys that do not resolve
//! to a node of that document are appended as `<p>` paragraphs to their
//! container, so they parse back under new paths.

use std::collections::{HashSet, VecDeque};

use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};

use crate::{
    error::Error,
    formats::markup,
    traits::Parser,
    types::{FlatDocument, ParseResult, SerializeContext},
};

const NAME: &str = "html";

const SKELETON: &str = "<!DOCTYPE html>\n<html>\n<head>\n</head>\n<body>\n</body>\n</html>\n";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg", "code"];

/// Elements implicitly closed by an opening sibling of the listed names.
const IMPLIED_END: &[(&str, &[&str])] = &[
    ("p", &["p"]),
    ("li", &["li"]),
    ("option", &["option"]),
    ("dt", &["dt", "dd"]),
    ("dd", &["dt", "dd"]),
    ("tr", &["tr"]),
    ("td", &["td", "th"]),
    ("th", &["td", "th"]),
];

const TRANSLATABLE_ATTRIBUTES: &[(&str, &str)] = &[
    ("meta", "content"),
    ("img", "alt"),
    ("img", "title"),
    ("input", "placeholder"),
    ("input", "title"),
    ("textarea", "placeholder"),
    ("a", "title"),
    ("abbr", "title"),
    ("button", "title"),
    ("option", "label"),
];

const CONTAINERS: [&str; 2] = ["head", "body"];

#[derive(Debug, Clone, Copy, Default)]
pub struct Format;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Element(Element),
    /// Text as found in the document, entities still encoded.
    Text(String),
    Comment(String),
    Doctype(String),
    Instruction(String),
    /// Content of `script`/`style`.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
    self_closing: bool,
    explicit_end: bool,
}

impl Element {
    fn new(name: &str) -> Self {
        Element {
            name: name.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
            self_closing: false,
            explicit_end: true,
        }
    }

    fn from_start(e: &BytesStart<'_>) -> Result<Self, String> {
        let mut element = Element::new(&markup::name_of(e).to_ascii_lowercase());
        for attr in e.html_attributes().with_checks(false) {
            let attr = attr.map_err(|e| e.to_string())?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = decode_entities(&String::from_utf8_lossy(&attr.value));
            element.attributes.push((key, value));
        }
        Ok(element)
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn set_attribute(&mut self, name: &str, value: &str) {
        match self
            .attributes
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
    }

    fn is_translatable_attribute(&self, attribute: &str) -> bool {
        let attribute = attribute.to_ascii_lowercase();
        if !TRANSLATABLE_ATTRIBUTES.contains(&(self.name.as_str(), attribute.as_str())) {
            return false;
        }
        if self.name == "meta" {
            // Only descriptive meta tags carry prose.
            let kind = self.attribute("name").or(self.attribute("property"));
            return kind.is_some_and(|k| !k.eq_ignore_ascii_case("viewport"));
        }
        true
    }
}

#[derive(Debug, Default)]
struct TreeBuilder {
    roots: Vec<Node>,
    open: Vec<Element>,
}

impl TreeBuilder {
    fn push(&mut self, node: Node) {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.roots.push(node),
        }
    }

    fn close_top(&mut self, explicit: bool) {
        if let Some(mut element) = self.open.pop() {
            element.explicit_end = explicit;
            self.push(Node::Element(element));
        }
    }

    fn start(&mut self, element: Element) {
        if let Some((_, closes)) = IMPLIED_END.iter().find(|(name, _)| *name == element.name) {
            if self
                .open
                .last()
                .is_some_and(|top| closes.contains(&top.name.as_str()))
            {
                self.close_top(false);
            }
        }
        if VOID_ELEMENTS.contains(&element.name.as_str()) {
            self.push(Node::Element(element));
        } else {
            self.open.push(element);
        }
    }

    fn end(&mut self, name: &str) {
        if let Some(position) = self.open.iter().rposition(|e| e.name == name) {
            while self.open.len() > position + 1 {
                self.close_top(false);
            }
            self.close_top(true);
        }
    }

    fn finish(mut self) -> Vec<Node> {
        while !self.open.is_empty() {
            self.close_top(false);
        }
        self.roots
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Moves the content of `script` and `style` elements out of the document, so
/// the reader never tokenizes it. Returns the stripped document and the
/// contents in document order.
fn hoist_raw_text(raw: &str) -> (String, VecDeque<String>) {
    let lower = raw.to_ascii_lowercase();
    let mut stripped = String::with_capacity(raw.len());
    let mut contents = VecDeque::new();
    let mut cursor = 0;
    while let Some((open, tag)) = next_raw_text_open(&lower, cursor) {
        let Some(gt) = lower[open..].find('>') else {
            break;
        };
        let body_start = open + gt + 1;
        stripped.push_str(&raw[cursor..body_start]);
        cursor = body_start;
        if lower[open..body_start].ends_with("/>") {
            continue;
        }
        let close = format!("</{}", tag);
        let body_end = lower[body_start..]
            .find(&close)
            .map_or(raw.len(), |i| body_start + i);
        contents.push_back(raw[body_start..body_end].to_string());
        cursor = body_end;
    }
    stripped.push_str(&raw[cursor..]);
    (stripped, contents)
}

fn next_raw_text_open(lower: &str, from: usize) -> Option<(usize, &'static str)> {
    RAW_TEXT_ELEMENTS
        .iter()
        .filter_map(|tag| {
            let needle = format!("<{}", tag);
            let mut offset = from;
            while let Some(i) = lower[offset..].find(&needle) {
                let at = offset + i;
                let next = lower[at + needle.len()..].chars().next();
                if next.is_none_or(|c| c.is_ascii_whitespace() || c == '>' || c == '/') {
                    return Some((at, *tag));
                }
                offset = at + needle.len();
            }
            None
        })
        .min_by_key(|(at, _)| *at)
}

fn parse_dom(raw: &str) -> Result<Vec<Node>, String> {
    let (stripped, mut raw_text) = hoist_raw_text(raw);
    let mut reader = Reader::from_str(&stripped);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut builder = TreeBuilder::default();
    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) => {
                let element = Element::from_start(&e)?;
                let is_raw_text = RAW_TEXT_ELEMENTS.contains(&element.name.as_str());
                builder.start(element);
                if is_raw_text {
                    builder.push(Node::Raw(raw_text.pop_front().unwrap_or_default()));
                }
            }
            Event::Empty(e) => {
                let mut element = Element::from_start(&e)?;
                element.self_closing = true;
                element.explicit_end = false;
                builder.push(Node::Element(element));
            }
            Event::End(e) => builder.end(&lossy(e.name().as_ref()).to_ascii_lowercase()),
            Event::Text(t) => builder.push(Node::Text(lossy(&t))),
            Event::CData(c) => builder.push(Node::Text(markup::escape_text(&lossy(&c)).into_owned())),
            Event::Comment(c) => builder.push(Node::Comment(lossy(&c))),
            Event::DocType(d) => builder.push(Node::Doctype(lossy(&d).trim().to_string())),
            Event::Decl(d) => builder.push(Node::Instruction(lossy(&d))),
            Event::PI(p) => builder.push(Node::Instruction(lossy(&p))),
            Event::Eof => return Ok(builder.finish()),
        }
    }
}

/// Decodes character references, leaving unknown named entities untouched.
fn decode_entities(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest[1..]
            .find(';')
            .filter(|end| *end <= 10)
            .and_then(|end| resolve_entity(&rest[1..=end]).map(|c| (c, end + 2)));
        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn resolve_entity(name: &str) -> Option<char> {
    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse().ok()?,
        };
        return char::from_u32(code);
    }
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "hellip" => '…',
        "mdash" => '—',
        "ndash" => '–',
        "laquo" => '«',
        "raquo" => '»',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        "euro" => '€',
        _ => return None,
    })
}

fn encode_text(text: &str) -> String {
    markup::escape_text(text).replace('\u{a0}', "&nbsp;")
}

/// Where a unit lives in the tree: child indices from the roots, plus the
/// attribute name for attribute units.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Unit {
    key: String,
    path: Vec<usize>,
    attribute: Option<String>,
    value: String,
}

fn is_blank_text(raw: &str) -> bool {
    decode_entities(raw).trim().is_empty()
}

fn collect_units(nodes: &[Node], path: &mut Vec<usize>, key: &str, out: &mut Vec<Unit>) {
    let mut position = 0;
    for (i, node) in nodes.iter().enumerate() {
        match node {
            Node::Text(raw) if !is_blank_text(raw) => {
                path.push(i);
                out.push(Unit {
                    key: format!("{}/{}", key, position),
                    path: path.clone(),
                    attribute: None,
                    value: decode_entities(raw).trim().to_string(),
                });
                path.pop();
                position += 1;
            }
            Node::Element(element) => {
                // Hidden elements take no index.
                if SKIPPED_ELEMENTS.contains(&element.name.as_str()) {
                    continue;
                }
                let element_key = format!("{}/{}", key, position);
                position += 1;
                path.push(i);
                for (attribute, value) in &element.attributes {
                    if element.is_translatable_attribute(attribute) && !value.trim().is_empty() {
                        out.push(Unit {
                            key: format!("{}#{}", element_key, attribute.to_ascii_lowercase()),
                            path: path.clone(),
                            attribute: Some(attribute.clone()),
                            value: value.clone(),
                        });
                    }
                }
                collect_units(&element.children, path, &element_key, out);
                path.pop();
            }
            _ => {}
        }
    }
}

/// Depth-first path to the first element named `name`.
fn find_element(nodes: &[Node], name: &str) -> Option<Vec<usize>> {
    for (i, node) in nodes.iter().enumerate() {
        if let Node::Element(element) = node {
            if element.name == name {
                return Some(vec![i]);
            }
            if let Some(mut rest) = find_element(&element.children, name) {
                rest.insert(0, i);
                return Some(rest);
            }
        }
    }
    None
}

fn node_at_mut<'a>(nodes: &'a mut [Node], path: &[usize]) -> Option<&'a mut Node> {
    let (first, rest) = path.split_first()?;
    let node = nodes.get_mut(*first)?;
    if rest.is_empty() {
        return Some(node);
    }
    match node {
        Node::Element(element) => node_at_mut(&mut element.children, rest),
        _ => None,
    }
}

fn element_at_mut<'a>(nodes: &'a mut [Node], path: &[usize]) -> Option<&'a mut Element> {
    match node_at_mut(nodes, path)? {
        Node::Element(element) => Some(element),
        _ => None,
    }
}

fn units_of(dom: &[Node]) -> Vec<Unit> {
    let mut units = Vec::new();
    let containers: Vec<(&str, Vec<usize>)> = CONTAINERS
        .iter()
        .filter_map(|name| find_element(dom, name).map(|path| (*name, path)))
        .collect();
    if containers.is_empty() {
        // A fragment without head or body is all body.
        collect_units(dom, &mut Vec::new(), "body", &mut units);
        return units;
    }
    for (name, mut path) in containers {
        let mut cursor: &[Node] = dom;
        let mut element = None;
        for index in &path {
            if let Some(Node::Element(e)) = cursor.get(*index) {
                cursor = &e.children;
                element = Some(e);
            }
        }
        if let Some(element) = element {
            collect_units(&element.children, &mut path, name, &mut units);
        }
    }
    units
}

fn replace_text(raw: &str, value: &str) -> String {
    let leading = &raw[..raw.len() - raw.trim_start().len()];
    let trailing = &raw[raw.trim_end().len()..];
    format!("{}{}{}", leading, encode_text(value), trailing)
}

fn write_nodes(out: &mut String, nodes: &[Node]) {
    for node in nodes {
        match node {
            Node::Element(element) => {
                out.push('<');
                out.push_str(&element.name);
                for (key, value) in &element.attributes {
                    out.push_str(&format!(" {}=\"{}\"", key, markup::escape_attribute(value)));
                }
                if element.self_closing {
                    out.push_str("/>");
                    continue;
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&element.name.as_str()) {
                    continue;
                }
                write_nodes(out, &element.children);
                if element.explicit_end || RAW_TEXT_ELEMENTS.contains(&element.name.as_str()) {
                    out.push_str(&format!("</{}>", element.name));
                }
            }
            Node::Text(raw) | Node::Raw(raw) => out.push_str(raw),
            Node::Comment(text) => out.push_str(&format!("<!--{}-->", text)),
            Node::Doctype(text) => out.push_str(&format!("<!DOCTYPE {}>", text)),
            Node::Instruction(text) => out.push_str(&format!("<?{}?>", text)),
        }
    }
}

impl Parser for Format {
    fn parse(&self, raw: &str, _locale: &str) -> Result<ParseResult, Error> {
        let dom = parse_dom(raw).map_err(|e| Error::format(NAME, e))?;
        Ok(units_of(&dom)
            .into_iter()
            .map(|unit| (unit.key, unit.value))
            .collect::<FlatDocument>()
            .into())
    }

    fn serialize(&self, data: &FlatDocument, ctx: &SerializeContext<'_>) -> Result<String, Error> {
        let base = ctx.reference().unwrap_or(SKELETON);
        let mut dom = parse_dom(base).map_err(|e| Error::format(NAME, e))?;

        if let Some(path) = find_element(&dom, "html") {
            if let Some(html) = element_at_mut(&mut dom, &path) {
                html.set_attribute("lang", ctx.locale);
            }
        }

        let units = units_of(&dom);
        let mut resolved = HashSet::new();
        for unit in &units {
            let value = data.get(&unit.key).map(String::as_str).unwrap_or_default();
            resolved.insert(unit.key.as_str());
            match (&unit.attribute, node_at_mut(&mut dom, &unit.path)) {
                (Some(attribute), Some(Node::Element(element))) => {
                    element.set_attribute(attribute, value);
                }
                (None, Some(Node::Text(raw))) => *raw = replace_text(raw, value),
                _ => {}
            }
        }

        for (key, value) in data {
            if resolved.contains(key.as_str()) {
                continue;
            }
            let container = if key.starts_with("head/") { "head" } else { "body" };
            let mut paragraph = Element::new("p");
            paragraph.children.push(Node::Text(encode_text(value)));
            let nodes = match find_element(&dom, container) {
                Some(path) => element_at_mut(&mut dom, &path).map(|e| &mut e.children),
                None => Some(&mut dom),
            };
            if let Some(nodes) = nodes {
                nodes.push(Node::Element(paragraph));
                nodes.push(Node::Text("\n".to_string()));
            }
        }

        let mut out = String::new();
        write_nodes(&mut out, &dom);
        if !out.ends_with('\n') {
            out.push('\n');
        }
        Ok(out)
    }
}
