//! Support for Android `strings.xml` localization format.
//!
//! `<string name="k">` becomes key `k`, `<string-array name="k">` items become
//! `k[0]`, `k[1]`, ... and `<plurals name="k">` items become `k[one]`,
//! `k[other]`, ... Entries marked `translatable="false"` are skipped.
//!
//! Values containing inner markup (`<b>`, `<xliff:g>`) are kept verbatim so
//! the tags survive translation; plain values are unescaped, including the
//! Android backslash escapes for quotes and newlines.
//!
//! Serialization follows the resource order of the existing file and repeats
//! the comment written right before each resource.

use std::collections::HashMap;

use lazy_static::lazy_static;
use quick_xml::{
    Reader, Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use regex::Regex;

use crate::{
    error::Error,
    formats::markup,
    traits::Parser,
    flat::order_like,
    types::{FlatDocument, ParseResult, PluralCategory, SerializeContext},
};

const NAME: &str = "android";

lazy_static! {
    static ref INDEXED_KEY: Regex = Regex::new(r"^(.+)\[(\d+)\]$").unwrap();
    static ref PLURAL_KEY: Regex = Regex::new(r"^(.+)\[(zero|one|two|few|many|other)\]$").unwrap();
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Format;

/// One top-level resource element, as regrouped from flat keys.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resource {
    String { name: String, value: String },
    Array { name: String, items: Vec<String> },
    Plurals { name: String, items: Vec<(PluralCategory, String)> },
}

impl Resource {
    fn name(&self) -> &str {
        match self {
            Resource::String { name, .. }
            | Resource::Array { name, .. }
            | Resource::Plurals { name, .. } => name,
        }
    }
}

fn required_name(e: &BytesStart<'_>) -> Result<String, Error> {
    markup::attribute(e, "name")
        .map_err(|e| Error::format(NAME, e))?
        .ok_or_else(|| {
            Error::format(
                NAME,
                format!("<{}> element is missing `name`", markup::name_of(e)),
            )
        })
}

fn is_translatable(e: &BytesStart<'_>) -> Result<bool, Error> {
    Ok(markup::attribute(e, "translatable")
        .map_err(|e| Error::format(NAME, e))?
        .is_none_or(|v| v != "false"))
}

fn read_value(reader: &mut Reader<&[u8]>, e: &BytesStart<'_>) -> Result<String, Error> {
    let raw = markup::raw_inner(reader, e).map_err(|e| Error::format(NAME, e))?;
    if raw.contains('<') {
        return Ok(raw.into_owned());
    }
    Ok(unescape_android(&markup::unescape_lossy(&raw)))
}

/// Reads `<item>` children until the end of the enclosing element.
fn read_items(
    reader: &mut Reader<&[u8]>,
) -> Result<Vec<(Option<String>, String)>, Error> {
    let mut items = Vec::new();
    loop {
        match reader.read_event().map_err(|e| Error::format(NAME, e))? {
            Event::Start(e) if e.name().as_ref() == b"item" => {
                let quantity =
                    markup::attribute(&e, "quantity").map_err(|e| Error::format(NAME, e))?;
                items.push((quantity, read_value(reader, &e)?));
            }
            Event::Empty(e) if e.name().as_ref() == b"item" => {
                let quantity =
                    markup::attribute(&e, "quantity").map_err(|e| Error::format(NAME, e))?;
                items.push((quantity, String::new()));
            }
            Event::End(_) => return Ok(items),
            Event::Eof => return Err(Error::format(NAME, "unexpected end of file")),
            _ => {}
        }
    }
}

fn parse_resources(raw: &str) -> Result<FlatDocument, Error> {
    let mut reader = markup::reader(raw);
    let mut document = FlatDocument::new();
    loop {
        match reader.read_event().map_err(|e| Error::format(NAME, e))? {
            Event::Start(e) if e.name().as_ref() == b"string" => {
                let name = required_name(&e)?;
                if is_translatable(&e)? {
                    document.insert(name, read_value(&mut reader, &e)?);
                } else {
                    markup::raw_inner(&mut reader, &e).map_err(|e| Error::format(NAME, e))?;
                }
            }
            Event::Empty(e) if e.name().as_ref() == b"string" => {
                let name = required_name(&e)?;
                if is_translatable(&e)? {
                    document.insert(name, String::new());
                }
            }
            Event::Start(e) if matches!(e.name().as_ref(), b"string-array" | b"array") => {
                let name = required_name(&e)?;
                let translatable = is_translatable(&e)?;
                let items = read_items(&mut reader)?;
                if translatable {
                    for (i, (_, value)) in items.into_iter().enumerate() {
                        document.insert(format!("{}[{}]", name, i), value);
                    }
                }
            }
            Event::Start(e) if e.name().as_ref() == b"plurals" => {
                let name = required_name(&e)?;
                let translatable = is_translatable(&e)?;
                let items = read_items(&mut reader)?;
                if translatable {
                    for (quantity, value) in items {
                        let quantity = quantity.ok_or_else(|| {
                            Error::format(NAME, format!("plural item of `{}` has no quantity", name))
                        })?;
                        let category: PluralCategory = quantity.parse().map_err(|_| {
                            Error::format(NAME, format!("unknown plural quantity `{}`", quantity))
                        })?;
                        document.insert(format!("{}[{}]", name, category), value);
                    }
                }
            }
            Event::Eof => return Ok(document),
            _ => {}
        }
    }
}

/// The comment directly preceding each named resource of `raw`.
fn resource_comments(raw: &str) -> Result<HashMap<String, String>, Error> {
    let mut reader = markup::reader(raw);
    let mut comments = HashMap::new();
    let mut pending: Option<String> = None;
    loop {
        match reader.read_event().map_err(|e| Error::format(NAME, e))? {
            Event::Comment(c) => pending = Some(String::from_utf8_lossy(&c).into_owned()),
            Event::Text(t) if markup::is_blank(&t) => {}
            Event::Start(e) if e.name().as_ref() == b"resources" => pending = None,
            Event::Start(e) => {
                let name = markup::attribute(&e, "name").map_err(|e| Error::format(NAME, e))?;
                markup::raw_inner(&mut reader, &e).map_err(|e| Error::format(NAME, e))?;
                if let (Some(name), Some(comment)) = (name, pending.take()) {
                    comments.insert(name, comment);
                }
            }
            Event::Empty(e) => {
                let name = markup::attribute(&e, "name").map_err(|e| Error::format(NAME, e))?;
                if let (Some(name), Some(comment)) = (name, pending.take()) {
                    comments.insert(name, comment);
                }
            }
            Event::Eof => return Ok(comments),
            _ => pending = None,
        }
    }
}

fn unescape_android(text: &str) -> String {
    let text = if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        &text[1..text.len() - 1]
    } else {
        text
    };
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn escape_android(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '@' | '?' if i == 0 => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    markup::escape_text(&out).into_owned()
}

fn value_event(value: &str) -> Event<'static> {
    if markup::is_markup_fragment(value) {
        Event::Text(BytesText::from_escaped(value.to_string()))
    } else {
        Event::Text(BytesText::from_escaped(escape_android(value)))
    }
}

/// Regroups flat keys into resource elements, in first-seen order.
fn group(data: &FlatDocument) -> Vec<Resource> {
    let mut resources: Vec<Resource> = Vec::new();
    for (key, value) in data {
        if let Some(caps) = PLURAL_KEY.captures(key) {
            let name = caps[1].to_string();
            let Ok(category) = caps[2].parse::<PluralCategory>() else {
                continue;
            };
            match resources.iter_mut().find(|r| r.name() == name) {
                Some(Resource::Plurals { items, .. }) => items.push((category, value.clone())),
                _ => resources.push(Resource::Plurals {
                    name,
                    items: vec![(category, value.clone())],
                }),
            }
        } else if let Some(caps) = INDEXED_KEY.captures(key) {
            let name = caps[1].to_string();
            match resources.iter_mut().find(|r| r.name() == name) {
                Some(Resource::Array { items, .. }) => items.push(value.clone()),
                _ => resources.push(Resource::Array {
                    name,
                    items: vec![value.clone()],
                }),
            }
        } else {
            resources.push(Resource::String {
                name: key.clone(),
                value: value.clone(),
            });
        }
    }
    resources
}

fn write_resources(
    resources: &[Resource],
    comments: &HashMap<String, String>,
) -> Result<String, String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(|e| e.to_string())?;
    if resources.is_empty() {
        writer
            .write_event(Event::Empty(BytesStart::new("resources")))
            .map_err(|e| e.to_string())?;
    } else {
        writer
            .write_event(Event::Start(BytesStart::new("resources")))
            .map_err(|e| e.to_string())?;
        for resource in resources {
            if let Some(comment) = comments.get(resource.name()) {
                writer
                    .write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))
                    .map_err(|e| e.to_string())?;
            }
            write_resource(&mut writer, resource).map_err(|e| e.to_string())?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("resources")))
            .map_err(|e| e.to_string())?;
    }
    let mut out = String::from_utf8(writer.into_inner()).map_err(|e| e.to_string())?;
    out.push('\n');
    Ok(out)
}

fn write_resource(writer: &mut Writer<Vec<u8>>, resource: &Resource) -> std::io::Result<()> {
    match resource {
        Resource::String { name, value } => {
            let mut start = BytesStart::new("string");
            start.push_attribute(("name", name.as_str()));
            writer.write_event(Event::Start(start))?;
            writer.write_event(value_event(value))?;
            writer.write_event(Event::End(BytesEnd::new("string")))?;
        }
        Resource::Array { name, items } => {
            let mut start = BytesStart::new("string-array");
            start.push_attribute(("name", name.as_str()));
            writer.write_event(Event::Start(start))?;
            for item in items {
                writer.write_event(Event::Start(BytesStart::new("item")))?;
                writer.write_event(value_event(item))?;
                writer.write_event(Event::End(BytesEnd::new("item")))?;
            }
            writer.write_event(Event::End(BytesEnd::new("string-array")))?;
        }
        Resource::Plurals { name, items } => {
            let mut start = BytesStart::new("plurals");
            start.push_attribute(("name", name.as_str()));
            writer.write_event(Event::Start(start))?;
            for (category, value) in items {
                let mut item = BytesStart::new("item");
                item.push_attribute(("quantity", category.as_str()));
                writer.write_event(Event::Start(item))?;
                writer.write_event(value_event(value))?;
                writer.write_event(Event::End(BytesEnd::new("item")))?;
            }
            writer.write_event(Event::End(BytesEnd::new("plurals")))?;
        }
    }
    Ok(())
}

impl Parser for Format {
    fn parse(&self, raw: &str, _locale: &str) -> Result<ParseResult, Error> {
        Ok(parse_resources(raw)?.into())
    }

    fn serialize(&self, data: &FlatDocument, ctx: &SerializeContext<'_>) -> Result<String, Error> {
        let (ordered, comments) = match ctx.reference() {
            Some(reference) => match (parse_resources(reference), resource_comments(reference)) {
                (Ok(existing), Ok(comments)) => (order_like(data, &existing), comments),
                _ => (data.clone(), HashMap::new()),
            },
            None => (data.clone(), HashMap::new()),
        };
        write_resources(&group(&ordered), &comments).map_err(|e| Error::format(NAME, e))
    }
}
