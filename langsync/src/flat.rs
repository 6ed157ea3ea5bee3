//! Bidirectional mapping between nested documents and flat keys.
//!
//! Objects contribute `.name` segments, arrays contribute `[index]` segments.
//! Property names containing `\`, `.`, `[` or `]` are backslash-escaped so the
//! mapping stays invertible:
//!
//! ```rust
//! use langsync::flat::{flatten, unflatten};
//! use serde_json::json;
//!
//! let doc = json!({ "home": { "title": "Hi", "v1.2": "x" }, "list": ["a", "b"] });
//! let flat = flatten(&doc).unwrap();
//! assert_eq!(flat["home.title"], "Hi");
//! assert_eq!(flat["home.v1\\.2"], "x");
//! assert_eq!(flat["list[1]"], "b");
//! assert_eq!(unflatten(&flat), doc);
//! ```

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::{error::Error, types::FlatDocument};

/// One step of a flattened key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Escapes a single property name for use inside a flat key.
pub fn escape_segment(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(c, '\\' | '.' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Reverses [`escape_segment`].
pub fn unescape_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            out.push(chars.next().unwrap_or('\\'));
        } else {
            out.push(c);
        }
    }
    out
}

/// Splits a flat key into its segments, honouring escapes.
pub fn split_key(key: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    // Whether `current` stands for a (possibly empty) pending key segment.
    let mut pending = true;
    let mut chars = key.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '\\' => {
                current.push(chars.next().map(|(_, n)| n).unwrap_or('\\'));
                pending = true;
            }
            '.' => {
                if pending {
                    segments.push(Segment::Key(std::mem::take(&mut current)));
                }
                pending = true;
            }
            '[' => {
                let mut inner = String::new();
                let mut closed = false;
                for (_, d) in chars.by_ref() {
                    if d == ']' {
                        closed = true;
                        break;
                    }
                    inner.push(d);
                }
                match inner.parse::<usize>() {
                    Ok(index) if closed && inner.bytes().all(|b| b.is_ascii_digit()) => {
                        if pending && pos != 0 {
                            segments.push(Segment::Key(std::mem::take(&mut current)));
                        }
                        segments.push(Segment::Index(index));
                        pending = false;
                    }
                    _ => {
                        current.push('[');
                        current.push_str(&inner);
                        if closed {
                            current.push(']');
                        }
                        pending = true;
                    }
                }
            }
            other => {
                current.push(other);
                pending = true;
            }
        }
    }
    if pending {
        segments.push(Segment::Key(current));
    }
    segments
}

/// Joins segments back into a flat key. Inverse of [`split_key`].
pub fn join_segments(segments: &[Segment]) -> String {
    let mut key = String::new();
    for (i, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Key(name) => {
                if i > 0 {
                    key.push('.');
                }
                key.push_str(&escape_segment(name));
            }
            Segment::Index(index) => {
                key.push('[');
                key.push_str(&index.to_string());
                key.push(']');
            }
        }
    }
    key
}

/// Flattens a tree of objects, arrays and strings into a [`FlatDocument`].
///
/// Empty containers contribute no keys. Any leaf that is not a string yields
/// [`Error::NonStringLeaf`]; parsers wrap it into a format error.
pub fn flatten(value: &Value) -> Result<FlatDocument, Error> {
    let mut out = FlatDocument::new();
    flatten_into(value, None, &mut out)?;
    Ok(out)
}

// `prefix` is `None` only at the root, so empty property names still get a `.` joint.
fn flatten_into(value: &Value, prefix: Option<String>, out: &mut FlatDocument) -> Result<(), Error> {
    match value {
        Value::String(s) => {
            out.insert(prefix.unwrap_or_default(), s.clone());
        }
        Value::Object(map) => {
            for (name, child) in map {
                let key = match &prefix {
                    None => escape_segment(name),
                    Some(prefix) => format!("{}.{}", prefix, escape_segment(name)),
                };
                flatten_into(child, Some(key), out)?;
            }
        }
        Value::Array(items) => {
            let prefix = prefix.unwrap_or_default();
            for (index, child) in items.iter().enumerate() {
                flatten_into(child, Some(format!("{}[{}]", prefix, index)), out)?;
            }
        }
        other => {
            return Err(Error::NonStringLeaf {
                key: prefix.unwrap_or_default(),
                found: kind_of(other),
            });
        }
    }
    Ok(())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

enum Node {
    Leaf(String),
    Object(IndexMap<String, Node>),
    Array(BTreeMap<usize, Node>),
}

impl Node {
    fn insert(&mut self, segments: &[Segment], value: String) {
        let Some((first, rest)) = segments.split_first() else {
            *self = Node::Leaf(value);
            return;
        };
        match first {
            Segment::Key(name) => {
                if !matches!(self, Node::Object(_)) {
                    *self = Node::Object(IndexMap::new());
                }
                if let Node::Object(map) = self {
                    map.entry(name.clone())
                        .or_insert_with(|| Node::Leaf(String::new()))
                        .insert(rest, value);
                }
            }
            Segment::Index(index) => {
                if !matches!(self, Node::Array(_)) {
                    *self = Node::Array(BTreeMap::new());
                }
                if let Node::Array(items) = self {
                    items
                        .entry(*index)
                        .or_insert_with(|| Node::Leaf(String::new()))
                        .insert(rest, value);
                }
            }
        }
    }

    fn into_value(self) -> Value {
        match self {
            Node::Leaf(s) => Value::String(s),
            Node::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, v.into_value()))
                    .collect::<Map<String, Value>>(),
            ),
            // Sparse indices collapse into a dense array, ordered by index.
            Node::Array(items) => Value::Array(items.into_values().map(Node::into_value).collect()),
        }
    }
}

/// Rebuilds the nested document described by a [`FlatDocument`].
///
/// An empty document becomes `{}`; a document whose keys all start with an
/// index becomes an array. Under an object root, a key starting with an index
/// belongs to the empty property name, so `{"": ["y"]}` is only ambiguous
/// when that property is the sole one.
pub fn unflatten(flat: &FlatDocument) -> Value {
    let keys: Vec<Vec<Segment>> = flat.keys().map(|k| split_key(k)).collect();
    let array_root = !keys.is_empty()
        && keys
            .iter()
            .all(|segments| matches!(segments.first(), Some(Segment::Index(_))));

    let mut root = if array_root {
        Node::Array(BTreeMap::new())
    } else {
        Node::Object(IndexMap::new())
    };
    for (mut segments, value) in keys.into_iter().zip(flat.values()) {
        if !array_root && matches!(segments.first(), Some(Segment::Index(_))) {
            segments.insert(0, Segment::Key(String::new()));
        }
        root.insert(&segments, value.clone());
    }
    root.into_value()
}

/// Reorders `data` so keys already present in `reference` keep the reference
/// order; keys only in `data` follow in their own order. Keys only in
/// `reference` are dropped.
pub fn order_like(data: &FlatDocument, reference: &FlatDocument) -> FlatDocument {
    let mut out = FlatDocument::with_capacity(data.len());
    for key in reference.keys() {
        if let Some(value) = data.get(key) {
            out.insert(key.clone(), value.clone());
        }
    }
    for (key, value) in data {
        if !out.contains_key(key) {
            out.insert(key.clone(), value.clone());
        }
    }
    out
}

/// Applies an `{originalKey -> newKey}` rename map, keeping document order.
/// Unmapped keys pass through; a rename onto an existing key overwrites it.
pub fn rekey(doc: &FlatDocument, mapping: &HashMap<String, String>) -> FlatDocument {
    let mut out = FlatDocument::with_capacity(doc.len());
    for (key, value) in doc {
        let key = mapping.get(key).unwrap_or(key);
        out.insert(key.clone(), value.clone());
    }
    out
}

/// Whether an object holds any nested container (i.e. is not already flat).
pub fn is_nested(value: &Value) -> bool {
    match value {
        Value::Object(map) => map
            .values()
            .any(|v| matches!(v, Value::Object(_) | Value::Array(_))),
        Value::Array(_) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flat(pairs: &[(&str, &str)]) -> FlatDocument {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_unflatten_mixed_root_keeps_object() {
        let doc = json!({ "": ["y", "z"], "title": "Hi" });
        let out = flatten(&doc).unwrap();
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["[0]", "[1]", "title"]);
        assert_eq!(unflatten(&out), doc);

        let nested = json!({ "a": { "": ["y"] }, "b": "x" });
        assert_eq!(unflatten(&flatten(&nested).unwrap()), nested);

        let list = json!(["y", { "": "z" }]);
        assert_eq!(unflatten(&flatten(&list).unwrap()), list);
    }

    #[test]
    fn test_flatten_nested_objects_and_arrays() {
        let doc = json!({
            "menu": { "open": "Open", "items": ["New", { "label": "Save" }] },
            "title": "Editor"
        });
        let out = flatten(&doc).unwrap();
        assert_eq!(
            out,
            flat(&[
                ("menu.open", "Open"),
                ("menu.items[0]", "New"),
                ("menu.items[1].label", "Save"),
                ("title", "Editor"),
            ])
        );
    }

    #[test]
    fn test_flatten_escapes_dots_in_names() {
        let doc = json!({ "a.b": { "c": "x" } });
        let out = flatten(&doc).unwrap();
        assert_eq!(out, flat(&[("a\\.b.c", "x")]));
        assert_eq!(unflatten(&out), doc);
    }

    #[test]
    fn test_flatten_drops_empty_containers() {
        let doc = json!({ "empty": {}, "none": [], "ok": "yes" });
        assert_eq!(flatten(&doc).unwrap(), flat(&[("ok", "yes")]));
    }

    #[test]
    fn test_flatten_rejects_non_string_leaves() {
        let doc = json!({ "count": { "max": 3 } });
        match flatten(&doc) {
            Err(Error::NonStringLeaf { key, found }) => {
                assert_eq!(key, "count.max");
                assert_eq!(found, "number");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_root_array_round_trip() {
        let doc = json!(["a", ["b", "c"]]);
        let out = flatten(&doc).unwrap();
        assert_eq!(out, flat(&[("[0]", "a"), ("[1][0]", "b"), ("[1][1]", "c")]));
        assert_eq!(unflatten(&out), doc);
    }

    #[test]
    fn test_unflatten_compacts_sparse_indices() {
        let out = unflatten(&flat(&[("list[5]", "z"), ("list[1]", "a")]));
        assert_eq!(out, json!({ "list": ["a", "z"] }));
    }

    #[test]
    fn test_unflatten_empty_document_is_empty_object() {
        assert_eq!(unflatten(&FlatDocument::new()), json!({}));
    }

    #[test]
    fn test_split_and_join_are_inverse() {
        for key in ["a", "a.b", "a[0].b", "[2]", "x\\.y.z", "we\\[ird\\]", "a.", ".b", "a.[0]"] {
            assert_eq!(join_segments(&split_key(key)), key, "key {}", key);
        }
    }

    #[test]
    fn test_split_key_treats_non_numeric_brackets_as_text() {
        assert_eq!(
            split_key("apples[one]"),
            vec![Segment::Key("apples[one]".to_string())]
        );
    }

    #[test]
    fn test_empty_property_names_survive() {
        let doc = json!({ "": { "": "x" }, "a": { "": ["y"] } });
        let out = flatten(&doc).unwrap();
        assert_eq!(unflatten(&out), doc);
    }

    #[test]
    fn test_order_like_keeps_reference_order_and_appends() {
        let data = flat(&[("c", "3"), ("a", "1"), ("new", "n")]);
        let reference = flat(&[("a", "x"), ("b", "y"), ("c", "z")]);
        let ordered = order_like(&data, &reference);
        assert_eq!(
            ordered.keys().collect::<Vec<_>>(),
            vec!["a", "c", "new"]
        );
    }

    #[test]
    fn test_rekey_renames_in_place() {
        let doc = flat(&[("text_1", "Save"), ("other", "x")]);
        let mapping = HashMap::from([("text_1".to_string(), "toolbar.save".to_string())]);
        let out = rekey(&doc, &mapping);
        assert_eq!(out, flat(&[("toolbar.save", "Save"), ("other", "x")]));
    }

    #[test]
    fn test_is_nested() {
        assert!(is_nested(&json!({ "a": { "b": "c" } })));
        assert!(!is_nested(&json!({ "a.b": "c" })));
    }
}
