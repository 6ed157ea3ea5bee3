//! Support for Xcode String Catalogs (`.xcstrings`).
//!
//! A catalog holds every locale in one JSON file. Parsing reads the slice of
//! the requested locale: `stringUnit` values under the item key and plural
//! variations under `key#category`. Serializing is additive: only the target
//! locale's localizations are rewritten, everything else in the catalog
//! (other locales, comments, unknown fields) is left as found.

use std::{collections::HashSet, io};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, ser::Formatter};

use crate::{
    error::Error,
    traits::Parser,
    types::{FlatDocument, ParseResult, PluralCategory, SerializeContext},
};

const NAME: &str = "xcstrings";

const TRANSLATED: &str = "translated";

#[derive(Debug, Clone, Copy, Default)]
pub struct Format;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub source_language: String,
    #[serde(default)]
    pub strings: IndexMap<String, Item>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Catalog {
    fn new(source_language: &str) -> Self {
        Catalog {
            source_language: source_language.to_string(),
            strings: IndexMap::new(),
            version: default_version(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_state: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub localizations: IndexMap<String, Localization>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_translate: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Localization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_unit: Option<StringUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variations: Option<Variations>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StringUnit {
    pub state: String,
    pub value: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StringUnit {
    fn translated(value: &str) -> Self {
        StringUnit {
            state: TRANSLATED.to_string(),
            value: value.to_string(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Variations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural: Option<IndexMap<String, Variation>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Variation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_unit: Option<StringUnit>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn parse_catalog(raw: &str) -> Result<Catalog, Error> {
    serde_json::from_str(raw).map_err(|e| Error::format(NAME, e))
}

/// Splits `key#category` into its item key and plural category.
fn split_plural_key(key: &str) -> Option<(&str, PluralCategory)> {
    let (base, suffix) = key.rsplit_once('#')?;
    let category = suffix.parse().ok()?;
    Some((base, category))
}

impl Parser for Format {
    fn parse(&self, raw: &str, locale: &str) -> Result<ParseResult, Error> {
        if raw.trim().is_empty() {
            return Ok(ParseResult::default());
        }
        let catalog = parse_catalog(raw)?;
        let mut document = FlatDocument::new();
        for (key, item) in &catalog.strings {
            if item.should_translate == Some(false) {
                continue;
            }
            match item.localizations.get(locale) {
                Some(Localization {
                    string_unit: Some(unit),
                    ..
                }) => {
                    document.insert(key.clone(), unit.value.clone());
                }
                Some(Localization {
                    variations:
                        Some(Variations {
                            plural: Some(plural),
                            ..
                        }),
                    ..
                }) => {
                    for (category, variation) in plural {
                        if let Some(unit) = &variation.string_unit {
                            document.insert(format!("{}#{}", key, category), unit.value.clone());
                        }
                    }
                }
                _ if locale == catalog.source_language && !key.is_empty() => {
                    // Source strings without a localization are the key itself.
                    document.insert(key.clone(), key.clone());
                }
                _ => {}
            }
        }
        Ok(document.into())
    }

    fn serialize(&self, data: &FlatDocument, ctx: &SerializeContext<'_>) -> Result<String, Error> {
        let mut catalog = match ctx.reference() {
            Some(raw) => parse_catalog(raw)?,
            None => Catalog::new(ctx.source_locale.unwrap_or(ctx.locale)),
        };
        let locale = ctx.locale;
        let is_source = locale == catalog.source_language;

        let mut singular: IndexMap<&str, &str> = IndexMap::new();
        let mut plural: IndexMap<&str, Vec<(PluralCategory, &str)>> = IndexMap::new();
        for (key, value) in data {
            match split_plural_key(key) {
                Some((base, category)) if !catalog.strings.contains_key(key.as_str()) => {
                    plural.entry(base).or_default().push((category, value.as_str()));
                }
                _ => {
                    singular.insert(key.as_str(), value.as_str());
                }
            }
        }

        let present: HashSet<&str> = singular.keys().chain(plural.keys()).copied().collect();
        let deleted: Vec<String> = catalog
            .strings
            .iter()
            .filter(|(key, item)| {
                item.should_translate != Some(false) && !present.contains(key.as_str())
            })
            .map(|(key, _)| key.clone())
            .collect();
        for key in deleted {
            if is_source {
                catalog.strings.shift_remove(&key);
            } else if let Some(item) = catalog.strings.get_mut(&key) {
                item.localizations.shift_remove(locale);
            }
        }

        for (key, value) in singular {
            let item = catalog.strings.entry(key.to_string()).or_default();
            if is_source && key == value && !item.localizations.contains_key(locale) {
                continue;
            }
            let localization = item.localizations.entry(locale.to_string()).or_default();
            localization.variations = None;
            match &mut localization.string_unit {
                Some(unit) if unit.value == value => {}
                Some(unit) => {
                    unit.value = value.to_string();
                    unit.state = TRANSLATED.to_string();
                }
                None => localization.string_unit = Some(StringUnit::translated(value)),
            }
        }

        for (key, forms) in plural {
            let item = catalog.strings.entry(key.to_string()).or_default();
            let localization = item.localizations.entry(locale.to_string()).or_default();
            localization.string_unit = None;
            let variations = localization.variations.get_or_insert_with(Variations::default);
            let mut previous = variations.plural.take().unwrap_or_default();
            let mut rebuilt = IndexMap::new();
            for (category, value) in forms {
                let mut variation = previous.shift_remove(category.as_str()).unwrap_or_default();
                variation.string_unit = Some(StringUnit::translated(value));
                rebuilt.insert(category.to_string(), variation);
            }
            variations.plural = Some(rebuilt);
        }

        to_xcode_json(&catalog)
    }
}

/// Renders a catalog the way Xcode does: two-space indent and ` : ` between
/// keys and values.
fn to_xcode_json(catalog: &Catalog) -> Result<String, Error> {
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, XcodeFormatter::default());
    catalog
        .serialize(&mut serializer)
        .map_err(|e| Error::format(NAME, e))?;
    let mut out = String::from_utf8(buf).map_err(|e| Error::format(NAME, e))?;
    out.push('\n');
    Ok(out)
}

#[derive(Debug, Default)]
struct XcodeFormatter {
    depth: usize,
    has_value: bool,
}

impl XcodeFormatter {
    fn indent<W: ?Sized + io::Write>(&self, writer: &mut W) -> io::Result<()> {
        for _ in 0..self.depth {
            writer.write_all(b"  ")?;
        }
        Ok(())
    }

    fn open<W: ?Sized + io::Write>(&mut self, writer: &mut W, token: &[u8]) -> io::Result<()> {
        self.depth += 1;
        self.has_value = false;
        writer.write_all(token)
    }

    fn close<W: ?Sized + io::Write>(&mut self, writer: &mut W, token: &[u8]) -> io::Result<()> {
        self.depth -= 1;
        if self.has_value {
            writer.write_all(b"\n")?;
            self.indent(writer)?;
        }
        writer.write_all(token)
    }

    fn entry<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        writer.write_all(if first { b"\n" } else { b",\n" })?;
        self.indent(writer)
    }
}

impl Formatter for XcodeFormatter {
    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.open(writer, b"[")
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.close(writer, b"]")
    }

    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.entry(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, _writer: &mut W) -> io::Result<()> {
        self.has_value = true;
        Ok(())
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.open(writer, b"{")
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.close(writer, b"}")
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.entry(writer, first)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b" : ")
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, _writer: &mut W) -> io::Result<()> {
        self.has_value = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const CATALOG: &str = indoc! {r#"
        {
          "sourceLanguage" : "en",
          "strings" : {
            "Cancel" : {
              "comment" : "Button title",
              "extractionState" : "manual"
            },
            "greeting" : {
              "localizations" : {
                "en" : {
                  "stringUnit" : {
                    "state" : "translated",
                    "value" : "Hello"
                  }
                },
                "de" : {
                  "stringUnit" : {
                    "state" : "translated",
                    "value" : "Hallo"
                  }
                }
              }
            },
            "files" : {
              "localizations" : {
                "en" : {
                  "variations" : {
                    "plural" : {
                      "one" : { "stringUnit" : { "state" : "translated", "value" : "%lld file" } },
                      "other" : { "stringUnit" : { "state" : "translated", "value" : "%lld files" } }
                    }
                  }
                }
              }
            },
            "internal_id" : {
              "shouldTranslate" : false
            }
          },
          "version" : "1.0",
          "futureField" : true
        }
    "#};

    #[test]
    fn test_parse_source_locale() {
        let doc = Format.parse(CATALOG, "en").unwrap().document;
        assert_eq!(doc["Cancel"], "Cancel");
        assert_eq!(doc["greeting"], "Hello");
        assert_eq!(doc["files#one"], "%lld file");
        assert_eq!(doc["files#other"], "%lld files");
        assert!(!doc.contains_key("internal_id"));
    }

    #[test]
    fn test_parse_target_locale_slice() {
        let doc = Format.parse(CATALOG, "de").unwrap().document;
        assert_eq!(doc.len(), 1);
        assert_eq!(doc["greeting"], "Hallo");
    }

    #[test]
    fn test_serialize_is_additive_across_locales() {
        let mut data = FlatDocument::new();
        data.insert("Cancel".to_string(), "Annuler".to_string());
        data.insert("files#one".to_string(), "%lld fichier".to_string());
        data.insert("files#other".to_string(), "%lld fichiers".to_string());
        let ctx = SerializeContext::new("fr").with_original(CATALOG);
        let out = Format.serialize(&data, &ctx).unwrap();

        assert!(out.contains("\"sourceLanguage\" : \"en\""));
        assert!(out.contains("\"futureField\" : true"));
        // Other locales are untouched.
        assert_eq!(Format.parse(&out, "de").unwrap().document["greeting"], "Hallo");
        assert_eq!(Format.parse(&out, "en").unwrap().document["greeting"], "Hello");
        assert_eq!(Format.parse(&out, "fr").unwrap().document, data);

        let catalog = parse_catalog(&out).unwrap();
        assert_eq!(catalog.strings["Cancel"].comment.as_deref(), Some("Button title"));
        assert_eq!(catalog.strings["internal_id"].should_translate, Some(false));
    }

    #[test]
    fn test_deleted_keys_are_removed_for_the_target_locale_only() {
        let data = FlatDocument::new();
        let ctx = SerializeContext::new("de").with_original(CATALOG);
        let out = Format.serialize(&data, &ctx).unwrap();
        assert!(Format.parse(&out, "de").unwrap().document.is_empty());
        assert_eq!(Format.parse(&out, "en").unwrap().document["greeting"], "Hello");
    }

    #[test]
    fn test_serialize_empty_catalog() {
        let ctx = SerializeContext::new("fr").with_source_locale("en");
        let out = Format.serialize(&FlatDocument::new(), &ctx).unwrap();
        assert_eq!(
            out,
            "{\n  \"sourceLanguage\" : \"en\",\n  \"strings\" : {},\n  \"version\" : \"1.0\"\n}\n"
        );
        assert!(Format.parse(&out, "fr").unwrap().document.is_empty());
    }

    #[test]
    fn test_invalid_json_is_format_error() {
        assert!(matches!(
            Format.parse("{ nope", "en"),
            Err(Error::Format { .. })
        ));
    }
}
