//! Support for nested JSON localization files (`{"home": {"title": "..."}}`).
//!
//! Objects and arrays are flattened with [`crate::flat`]; every leaf must be a
//! string. Output indentation mirrors the original (or source) file.

use serde::Serialize;
use serde_json::{Value, ser::PrettyFormatter};

use crate::{
    error::Error,
    flat::{flatten, unflatten},
    traits::Parser,
    types::{FlatDocument, ParseResult, SerializeContext},
};

const NAME: &str = "json";

#[derive(Debug, Clone, Copy, Default)]
pub struct Format;

impl Parser for Format {
    fn parse(&self, raw: &str, _locale: &str) -> Result<ParseResult, Error> {
        if raw.trim().is_empty() {
            return Ok(ParseResult::default());
        }
        let value: Value = serde_json::from_str(raw).map_err(|e| Error::format(NAME, e))?;
        if !matches!(value, Value::Object(_) | Value::Array(_)) {
            return Err(Error::format(NAME, "root must be an object or an array"));
        }
        let document = flatten(&value).map_err(|e| Error::format(NAME, e))?;
        Ok(document.into())
    }

    fn serialize(&self, data: &FlatDocument, ctx: &SerializeContext<'_>) -> Result<String, Error> {
        let indent = ctx.reference().map(detect_indent).unwrap_or_else(|| "  ".to_string());
        to_pretty_string(&unflatten(data), &indent)
    }
}

/// Pretty-prints with the given indentation and a trailing newline.
pub(crate) fn to_pretty_string<T: Serialize>(value: &T, indent: &str) -> Result<String, Error> {
    let mut out = Vec::new();
    let formatter = PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| Error::format(NAME, e))?;
    let mut text = String::from_utf8(out).map_err(|e| Error::format(NAME, e))?;
    text.push('\n');
    Ok(text)
}

/// Indentation of the first indented line, two spaces when there is none.
pub(crate) fn detect_indent(raw: &str) -> String {
    raw.lines()
        .skip(1)
        .find_map(|line| {
            let indent: String = line.chars().take_while(|c| *c == ' ' || *c == '\t').collect();
            (!indent.is_empty() && indent.len() < line.len()).then_some(indent)
        })
        .unwrap_or_else(|| "  ".to_string())
}
