//! Support for TypeScript/JavaScript modules exporting an object literal.
//!
//! Modules are read with [`crate::literal`], never evaluated. A literal with
//! nested objects or arrays is flattened like JSON; a flat literal keeps its
//! property names verbatim as keys, so `"home.title": "..."` stays
//! `home.title`.

use serde_json::Value;

use crate::{
    error::Error,
    flat::{flatten, is_nested, unflatten},
    formats::json::detect_indent,
    literal::{self, is_identifier},
    traits::Parser,
    types::{FlatDocument, ParseResult, SerializeContext},
};

const NAME: &str = "typescript";

const DEFAULT_PREFIX: &str = "export default ";
const DEFAULT_SUFFIX: &str = ";\n";

#[derive(Debug, Clone, Copy, Default)]
pub struct Format;

fn property_key(name: &str) -> Result<String, Error> {
    if is_identifier(name) {
        Ok(name.to_string())
    } else {
        string_literal(name)
    }
}

fn string_literal(text: &str) -> Result<String, Error> {
    serde_json::to_string(text).map_err(|e| Error::format(NAME, e))
}

fn render_flat(data: &FlatDocument, indent: &str) -> Result<String, Error> {
    if data.is_empty() {
        return Ok("{}".to_string());
    }
    let mut out = String::from("{\n");
    for (key, value) in data {
        out.push_str(&format!(
            "{}{}: {},\n",
            indent,
            property_key(key)?,
            string_literal(value)?
        ));
    }
    out.push('}');
    Ok(out)
}

fn render_value(value: &Value, indent: &str, level: usize, out: &mut String) -> Result<(), Error> {
    let inner = indent.repeat(level + 1);
    match value {
        Value::Object(map) if map.is_empty() => out.push_str("{}"),
        Value::Object(map) => {
            out.push_str("{\n");
            for (key, child) in map {
                out.push_str(&format!("{}{}: ", inner, property_key(key)?));
                render_value(child, indent, level + 1, out)?;
                out.push_str(",\n");
            }
            out.push_str(&indent.repeat(level));
            out.push('}');
        }
        Value::Array(items) if items.is_empty() => out.push_str("[]"),
        Value::Array(items) => {
            out.push_str("[\n");
            for child in items {
                out.push_str(&inner);
                render_value(child, indent, level + 1, out)?;
                out.push_str(",\n");
            }
            out.push_str(&indent.repeat(level));
            out.push(']');
        }
        Value::String(s) => out.push_str(&string_literal(s)?),
        other => return Err(Error::format(NAME, format!("cannot render {}", other))),
    }
    Ok(())
}

impl Parser for Format {
    fn parse(&self, raw: &str, _locale: &str) -> Result<ParseResult, Error> {
        if raw.trim().is_empty() {
            return Ok(ParseResult::default());
        }
        let module = literal::parse_module(raw).map_err(|e| Error::format(NAME, e))?;
        if is_nested(&module.value) {
            let document = flatten(&module.value).map_err(|e| Error::format(NAME, e))?;
            return Ok(document.into());
        }
        let Value::Object(map) = module.value else {
            return Ok(ParseResult::default());
        };
        Ok(map
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(s) => Some((key, s)),
                _ => None,
            })
            .collect::<FlatDocument>()
            .into())
    }

    fn serialize(&self, data: &FlatDocument, ctx: &SerializeContext<'_>) -> Result<String, Error> {
        let reference = ctx
            .reference()
            .and_then(|raw| literal::parse_module(raw).ok().map(|module| (raw, module)));

        let (prefix, suffix, nested, indent) = match &reference {
            Some((raw, module)) => (
                module.prefix.as_str(),
                module.suffix.as_str(),
                is_nested(&module.value),
                detect_indent(raw),
            ),
            None => (DEFAULT_PREFIX, DEFAULT_SUFFIX, false, "  ".to_string()),
        };

        let body = if nested {
            let mut out = String::new();
            render_value(&unflatten(data), &indent, 0, &mut out)?;
            out
        } else {
            render_flat(data, &indent)?
        };

        let mut out = format!("{}{}{}", prefix, body, suffix);
        if !out.ends_with('\n') {
            out.push('\n');
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const NESTED: &str = indoc! {r#"
        import type { Messages } from "./types";

        export const en: Messages = {
            nav: {
                home: "Home",
                "sign-in": 'Sign in',
            },
            steps: ["One", "Two"],
        } as const;
    "#};

    #[test]
    fn test_parse_nested_module() {
        let doc = Format.parse(NESTED.split_once("\n\n").unwrap().1, "en").unwrap().document;
        assert_eq!(doc["nav.home"], "Home");
        assert_eq!(doc["nav.sign-in"], "Sign in");
        assert_eq!(doc["steps[1]"], "Two");
    }

    #[test]
    fn test_imports_are_rejected() {
        assert!(Format.parse(NESTED, "en").is_err());
    }

    #[test]
    fn test_serialize_nested_keeps_prefix_suffix_and_indent() {
        let reference = NESTED.split_once("\n\n").unwrap().1;
        let mut data = Format.parse(reference, "en").unwrap().document;
        data.insert("nav.home".to_string(), "Accueil".to_string());
        data.shift_remove("steps[0]");
        data.shift_remove("steps[1]");
        let out = Format
            .serialize(&data, &SerializeContext::new("fr").with_source(reference))
            .unwrap();
        assert_eq!(
            out,
            indoc! {r#"
                export const en: Messages = {
                    nav: {
                        home: "Accueil",
                        "sign-in": "Sign in",
                    },
                } as const;
            "#}
        );
        assert_eq!(Format.parse(&out, "fr").unwrap().document, data);
    }

    #[test]
    fn test_flat_keys_stay_verbatim() {
        let raw = "export default {\n  \"home.title\": \"Welcome\",\n  cta: \"Go\",\n};\n";
        let doc = Format.parse(raw, "en").unwrap().document;
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["home.title", "cta"]);

        let out = Format
            .serialize(&doc, &SerializeContext::new("fr").with_original(raw))
            .unwrap();
        assert_eq!(out, raw);
    }

    #[test]
    fn test_defaults_to_flat_dotted_keys_without_reference() {
        let mut data = FlatDocument::new();
        data.insert("home.title".to_string(), "Bienvenue".to_string());
        data.insert("quote".to_string(), "Il a dit \"oui\"".to_string());
        let out = Format.serialize(&data, &SerializeContext::new("fr")).unwrap();
        assert_eq!(
            out,
            "export default {\n  \"home.title\": \"Bienvenue\",\n  quote: \"Il a dit \\\"oui\\\"\",\n};\n"
        );
        assert_eq!(Format.parse(&out, "fr").unwrap().document, data);
    }

    #[test]
    fn test_empty_module() {
        assert!(Format.parse("", "en").unwrap().document.is_empty());
        let out = Format
            .serialize(&FlatDocument::new(), &SerializeContext::new("fr"))
            .unwrap();
        assert_eq!(out, "export default {};\n");
        assert!(Format.parse(&out, "fr").unwrap().document.is_empty());
    }
}
