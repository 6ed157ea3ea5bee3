//! Support for XLIFF 1.2 files.
//!
//! Each `<trans-unit>` is keyed by its `id`. Its value is the `<target>` text
//! when one is present, otherwise the `<source>` text, so a source-only file
//! parses to the source strings.

use std::collections::HashMap;

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

const NAME: &str = "xliff";

const DEFAULT_SOURCE_LANGUAGE: &str = "en";

#[derive(Debug, Clone, Copy, Default)]
pub struct Format;

#[derive(Debug, Clone, PartialEq, Eq)]
struct TransUnit {
    id: String,
    source: String,
    target: Option<String>,
}

#[derive(Debug, Default)]
struct Document {
    source_language: Option<String>,
    original: Option<String>,
    units: Vec<TransUnit>,
}

fn read_text(reader: &mut Reader<&[u8]>, e: &BytesStart<'_>) -> Result<String, String> {
    let raw = markup::raw_inner(reader, e)?;
    if raw.contains('<') {
        Ok(raw.into_owned())
    } else {
        Ok(markup::unescape_lossy(&raw).into_owned())
    }
}

fn read_unit(reader: &mut Reader<&[u8]>, id: String) -> Result<TransUnit, String> {
    let mut unit = TransUnit {
        id,
        source: String::new(),
        target: None,
    };
    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) => match e.name().as_ref() {
                b"source" => unit.source = read_text(reader, &e)?,
                b"target" => unit.target = Some(read_text(reader, &e)?),
                _ => {
                    markup::raw_inner(reader, &e)?;
                }
            },
            Event::Empty(e) if e.name().as_ref() == b"target" => unit.target = Some(String::new()),
            Event::End(_) => return Ok(unit),
            Event::Eof => return Err(format!("unterminated trans-unit `{}`", unit.id)),
            _ => {}
        }
    }
}

fn read_document(raw: &str) -> Result<Document, String> {
    let mut reader = markup::reader(raw);
    let mut document = Document::default();
    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"file" => {
                if document.source_language.is_none() {
                    document.source_language = markup::attribute(&e, "source-language")?;
                    document.original = markup::attribute(&e, "original")?;
                }
            }
            Event::Start(e) if e.name().as_ref() == b"trans-unit" => {
                let id = match markup::attribute(&e, "id")? {
                    Some(id) => id,
                    None => markup::attribute(&e, "resname")?
                        .ok_or_else(|| "trans-unit is missing `id`".to_string())?,
                };
                document.units.push(read_unit(&mut reader, id)?);
            }
            Event::Eof => return Ok(document),
            _ => {}
        }
    }
}

fn text(value: &str) -> String {
    if markup::is_markup_fragment(value) {
        value.to_string()
    } else {
        markup::escape_text(value).into_owned()
    }
}

impl Parser for Format {
    fn parse(&self, raw: &str, _locale: &str) -> Result<ParseResult, Error> {
        let document = read_document(raw).map_err(|e| Error::format(NAME, e))?;
        Ok(document
            .units
            .into_iter()
            .map(|unit| {
                let value = unit.target.filter(|t| !t.is_empty()).unwrap_or(unit.source);
                (unit.id, value)
            })
            .collect::<FlatDocument>()
            .into())
    }

    fn serialize(&self, data: &FlatDocument, ctx: &SerializeContext<'_>) -> Result<String, Error> {
        let reference = ctx
            .reference()
            .and_then(|raw| read_document(raw).ok())
            .unwrap_or_default();
        let source_document = ctx.source.and_then(|raw| read_document(raw).ok());
        let source_language = ctx
            .source_locale
            .map(str::to_string)
            .or(reference.source_language.clone())
            .unwrap_or_else(|| DEFAULT_SOURCE_LANGUAGE.to_string());
        let original = reference.original.as_deref().unwrap_or("messages");

        // Source text per id: the source file wins, then the reference's <source>.
        let mut sources: HashMap<&str, &str> = reference
            .units
            .iter()
            .map(|u| (u.id.as_str(), u.source.as_str()))
            .collect();
        if let Some(document) = &source_document {
            for unit in &document.units {
                let value = unit.target.as_deref().filter(|t| !t.is_empty());
                sources.insert(unit.id.as_str(), value.unwrap_or(unit.source.as_str()));
            }
        }
        let is_source = ctx.locale == source_language;

        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str("<xliff version=\"1.2\" xmlns=\"urn:oasis:names:tc:xliff:document:1.2\">\n");
        out.push_str(&format!(
            "  <file source-language=\"{}\"",
            markup::escape_attribute(&source_language)
        ));
        if !is_source {
            out.push_str(&format!(
                " target-language=\"{}\"",
                markup::escape_attribute(ctx.locale)
            ));
        }
        out.push_str(&format!(
            " datatype=\"plaintext\" original=\"{}\">\n",
            markup::escape_attribute(original)
        ));
        if data.is_empty() {
            out.push_str("    <body/>\n");
        } else {
            out.push_str("    <body>\n");
            for (key, value) in data {
                out.push_str(&format!(
                    "      <trans-unit id=\"{}\">\n",
                    markup::escape_attribute(key)
                ));
                if is_source {
                    out.push_str(&format!("        <source>{}</source>\n", text(value)));
                } else {
                    let source = sources.get(key.as_str()).copied().unwrap_or(value.as_str());
                    out.push_str(&format!("        <source>{}</source>\n", text(source)));
                    out.push_str(&format!("        <target>{}</target>\n", text(value)));
                }
                out.push_str("      </trans-unit>\n");
            }
            out.push_str("    </body>\n");
        }
        out.push_str("  </file>\n</xliff>\n");
        Ok(out)
    }
}
