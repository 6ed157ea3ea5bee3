//! Support for Apple `.stringsdict` property lists.
//!
//! Top-level `<string>` entries become plain keys. A top-level `<dict>` (the
//! usual `NSStringLocalizedFormatKey` plural bundle) is kept whole as a
//! JSON-encoded string under its key and decoded again on serialization.

use quick_xml::{Reader, events::Event};
use serde_json::{Map, Number, Value};

use crate::{
    error::Error,
    formats::markup,
    traits::Parser,
    types::{FlatDocument, ParseResult, SerializeContext},
};

const NAME: &str = "stringsdict";

const HEADER: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
    "<!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" ",
    "\"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n",
    "<plist version=\"1.0\">\n",
);

#[derive(Debug, Clone, Copy, Default)]
pub struct Format;

fn next_significant<'i>(reader: &mut Reader<&'i [u8]>) -> Result<Event<'i>, String> {
    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Text(t) if markup::is_blank(&t) => continue,
            Event::Comment(_) | Event::Decl(_) | Event::DocType(_) | Event::PI(_) => continue,
            event => return Ok(event),
        }
    }
}

fn read_value(reader: &mut Reader<&[u8]>, event: Event<'_>) -> Result<Value, String> {
    match event {
        Event::Start(e) => {
            let name = markup::name_of(&e);
            match name.as_str() {
                "dict" => read_dict(reader),
                "array" => read_array(reader),
                "string" | "date" | "data" => {
                    let raw = markup::raw_inner(reader, &e)?;
                    Ok(Value::String(markup::unescape_lossy(&raw).into_owned()))
                }
                "integer" | "real" => {
                    let raw = markup::raw_inner(reader, &e)?;
                    let text = raw.trim();
                    let number = match text.parse::<i64>() {
                        Ok(i) => Some(Number::from(i)),
                        Err(_) => text.parse::<f64>().ok().and_then(Number::from_f64),
                    };
                    number
                        .map(Value::Number)
                        .ok_or_else(|| format!("invalid number `{}`", text))
                }
                "true" | "false" => {
                    markup::raw_inner(reader, &e)?;
                    Ok(Value::Bool(name == "true"))
                }
                other => Err(format!("unexpected element <{}>", other)),
            }
        }
        Event::Empty(e) => match markup::name_of(&e).as_str() {
            "dict" => Ok(Value::Object(Map::new())),
            "array" => Ok(Value::Array(Vec::new())),
            "string" => Ok(Value::String(String::new())),
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            other => Err(format!("unexpected element <{}/>", other)),
        },
        Event::Eof => Err("unexpected end of file".to_string()),
        other => Err(format!("unexpected content {:?}", other)),
    }
}

fn read_dict(reader: &mut Reader<&[u8]>) -> Result<Value, String> {
    let mut map = Map::new();
    loop {
        match next_significant(reader)? {
            Event::End(_) => return Ok(Value::Object(map)),
            Event::Start(e) if e.name().as_ref() == b"key" => {
                let raw = markup::raw_inner(reader, &e)?;
                let key = markup::unescape_lossy(&raw).into_owned();
                let event = next_significant(reader)?;
                map.insert(key, read_value(reader, event)?);
            }
            other => return Err(format!("expected <key> in <dict>, found {:?}", other)),
        }
    }
}

fn read_array(reader: &mut Reader<&[u8]>) -> Result<Value, String> {
    let mut items = Vec::new();
    loop {
        match next_significant(reader)? {
            Event::End(_) => return Ok(Value::Array(items)),
            event => items.push(read_value(reader, event)?),
        }
    }
}

/// Reads the root dictionary of a property list.
fn read_plist(raw: &str) -> Result<Map<String, Value>, String> {
    let mut reader = markup::reader(raw);
    loop {
        match next_significant(&mut reader)? {
            Event::Eof => return Ok(Map::new()),
            Event::Empty(e) if e.name().as_ref() == b"plist" => return Ok(Map::new()),
            Event::Start(e) if e.name().as_ref() == b"plist" => {
                let event = next_significant(&mut reader)?;
                if let Event::End(_) = event {
                    return Ok(Map::new());
                }
                return match read_value(&mut reader, event)? {
                    Value::Object(map) => Ok(map),
                    _ => Err("root must be a <dict>".to_string()),
                };
            }
            other => return Err(format!("expected <plist>, found {:?}", other)),
        }
    }
}

fn write_value(out: &mut String, value: &Value, depth: usize) {
    let indent = "\t".repeat(depth);
    match value {
        Value::Object(map) if map.is_empty() => {
            out.push_str(&format!("{}<dict/>\n", indent));
        }
        Value::Object(map) => {
            out.push_str(&format!("{}<dict>\n", indent));
            for (key, value) in map {
                out.push_str(&format!("{}\t<key>{}</key>\n", indent, markup::escape_text(key)));
                write_value(out, value, depth + 1);
            }
            out.push_str(&format!("{}</dict>\n", indent));
        }
        Value::Array(items) if items.is_empty() => {
            out.push_str(&format!("{}<array/>\n", indent));
        }
        Value::Array(items) => {
            out.push_str(&format!("{}<array>\n", indent));
            for item in items {
                write_value(out, item, depth + 1);
            }
            out.push_str(&format!("{}</array>\n", indent));
        }
        Value::String(s) => {
            out.push_str(&format!("{}<string>{}</string>\n", indent, markup::escape_text(s)));
        }
        Value::Number(n) if n.is_f64() => {
            out.push_str(&format!("{}<real>{}</real>\n", indent, n));
        }
        Value::Number(n) => {
            out.push_str(&format!("{}<integer>{}</integer>\n", indent, n));
        }
        Value::Bool(b) => {
            out.push_str(&format!("{}<{}/>\n", indent, b));
        }
        Value::Null => {
            out.push_str(&format!("{}<string/>\n", indent));
        }
    }
}

/// A leaf holding a JSON object is a plural bundle; anything else is text.
fn decode_leaf(value: &str) -> Value {
    if value.trim_start().starts_with('{') {
        if let Ok(bundle @ Value::Object(_)) = serde_json::from_str::<Value>(value) {
            return bundle;
        }
    }
    Value::String(value.to_string())
}

impl Parser for Format {
    fn parse(&self, raw: &str, _locale: &str) -> Result<ParseResult, Error> {
        let root = read_plist(raw).map_err(|e| Error::format(NAME, e))?;
        let mut document = FlatDocument::new();
        for (key, value) in root {
            let text = match value {
                Value::String(s) => s,
                bundle @ Value::Object(_) => {
                    serde_json::to_string(&bundle).map_err(|e| Error::format(NAME, e))?
                }
                other => {
                    return Err(Error::format(
                        NAME,
                        format!("entry `{}` must be a string or a dict, found {}", key, other),
                    ));
                }
            };
            document.insert(key, text);
        }
        Ok(document.into())
    }

    fn serialize(&self, data: &FlatDocument, _ctx: &SerializeContext<'_>) -> Result<String, Error> {
        let root: Map<String, Value> = data
            .iter()
            .map(|(key, value)| (key.clone(), decode_leaf(value)))
            .collect();
        let mut out = String::from(HEADER);
        write_value(&mut out, &Value::Object(root), 0);
        out.push_str("</plist>\n");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const SAMPLE: &str = indoc! {r#"
        <?xml version="1.0" encoding="UTF-8"?>
        <!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
        <plist version="1.0">
        <dict>
        	<key>title</key>
        	<string>Messages &amp; more</string>
        	<key>files</key>
        	<dict>
        		<key>NSStringLocalizedFormatKey</key>
        		<string>%#@count@</string>
        		<key>count</key>
        		<dict>
        			<key>NSStringFormatSpecTypeKey</key>
        			<string>NSStringPluralRuleType</string>
        			<key>NSStringFormatValueTypeKey</key>
        			<string>d</string>
        			<key>one</key>
        			<string>%d file</string>
        			<key>other</key>
        			<string>%d files</string>
        		</dict>
        	</dict>
        </dict>
        </plist>
    "#};

    #[test]
    fn test_parse_strings_and_bundles() {
        let doc = Format.parse(SAMPLE, "en").unwrap().document;
        assert_eq!(doc["title"], "Messages & more");
        let bundle: Value = serde_json::from_str(&doc["files"]).unwrap();
        assert_eq!(bundle["count"]["one"], "%d file");
        assert_eq!(bundle["NSStringLocalizedFormatKey"], "%#@count@");
    }

    #[test]
    fn test_round_trip_keeps_bundle_structure() {
        let doc = Format.parse(SAMPLE, "en").unwrap().document;
        let out = Format.serialize(&doc, &SerializeContext::new("fr")).unwrap();
        assert!(out.starts_with(HEADER));
        assert!(out.contains("\t\t\t<key>one</key>\n\t\t\t<string>%d file</string>\n"));
        assert!(out.contains("<string>Messages &amp; more</string>"));
        assert_eq!(Format.parse(&out, "fr").unwrap().document, doc);
    }

    #[test]
    fn test_empty_plist() {
        assert!(Format.parse("", "en").unwrap().document.is_empty());
        let out = Format
            .serialize(&FlatDocument::new(), &SerializeContext::new("fr"))
            .unwrap();
        assert!(out.ends_with("<plist version=\"1.0\">\n<dict/>\n</plist>\n"));
        assert!(Format.parse(&out, "fr").unwrap().document.is_empty());
    }

    #[test]
    fn test_malformed_plist_is_error() {
        assert!(Format.parse("<plist><dict><string>x</string></dict></plist>", "en").is_err());
    }
}
