//! Support for Flutter Application Resource Bundle (`.arb`) files.
//!
//! ARB is flat JSON: every non-`@` key is a message, `@key` objects carry its
//! description/placeholders and `@@locale` names the bundle locale. Metadata
//! is never translated; it is carried over from the original (or source) file.

use serde_json::{Map, Value};

use crate::{
    error::Error,
    formats::json::{detect_indent, to_pretty_string},
    traits::Parser,
    types::{FlatDocument, ParseResult, SerializeContext},
};

const NAME: &str = "arb";

#[derive(Debug, Clone, Copy, Default)]
pub struct Format;

fn parse_object(raw: &str) -> Result<Map<String, Value>, Error> {
    match serde_json::from_str::<Value>(raw).map_err(|e| Error::format(NAME, e))? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::format(NAME, "root must be an object")),
    }
}

impl Parser for Format {
    fn parse(&self, raw: &str, _locale: &str) -> Result<ParseResult, Error> {
        if raw.trim().is_empty() {
            return Ok(ParseResult::default());
        }
        let mut document = FlatDocument::new();
        for (key, value) in parse_object(raw)? {
            if key.starts_with('@') {
                continue;
            }
            match value {
                Value::String(s) => {
                    document.insert(key, s);
                }
                other => {
                    return Err(Error::format(
                        NAME,
                        format!("message `{}` must be a string, found {}", key, other),
                    ));
                }
            }
        }
        Ok(document.into())
    }

    fn serialize(&self, data: &FlatDocument, ctx: &SerializeContext<'_>) -> Result<String, Error> {
        // Message metadata from the original target wins over the source's.
        let mut metadata = Map::new();
        for raw in [ctx.source, ctx.original].into_iter().flatten() {
            if raw.trim().is_empty() {
                continue;
            }
            if let Ok(map) = parse_object(raw) {
                for (key, value) in map {
                    if key.starts_with('@') && !key.starts_with("@@") {
                        metadata.insert(key, value);
                    }
                }
            }
        }

        let mut out = Map::new();
        out.insert("@@locale".to_string(), Value::String(ctx.locale.to_string()));
        for (key, value) in data {
            out.insert(key.clone(), Value::String(value.clone()));
            let meta_key = format!("@{}", key);
            if let Some(meta) = metadata.get(&meta_key) {
                out.insert(meta_key, meta.clone());
            }
        }

        let indent = ctx.reference().map(detect_indent).unwrap_or_else(|| "  ".to_string());
        to_pretty_string(&Value::Object(out), &indent)
    }
}
