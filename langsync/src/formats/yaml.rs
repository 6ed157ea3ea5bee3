//! Support for YAML localization files.
//!
//! Two layouts share this implementation: a plain nested document, and the
//! Rails-style layout whose single root key is the locale code:
//!
//! ```yaml
//! en:
//!   home:
//!     title: Welcome
//! ```

use serde_json::{Map, Number, Value};

use crate::{
    error::Error,
    flat::{flatten, unflatten},
    traits::Parser,
    types::{FlatDocument, ParseResult, SerializeContext},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
    root_key: bool,
}

impl Format {
    pub fn nested() -> Self {
        Format { root_key: false }
    }

    /// The document lives under a `<locale>:` root key.
    pub fn root_key() -> Self {
        Format { root_key: true }
    }

    pub fn is_root_key(&self) -> bool {
        self.root_key
    }

    fn name(&self) -> &'static str {
        if self.root_key { "yaml-root-key" } else { "yaml" }
    }
}

impl Parser for Format {
    fn parse(&self, raw: &str, locale: &str) -> Result<ParseResult, Error> {
        if raw.trim().is_empty() {
            return Ok(ParseResult::default());
        }
        let parsed: serde_yaml::Value =
            serde_yaml::from_str(raw).map_err(|e| Error::format(self.name(), e))?;
        let mut value = yaml_to_json(parsed).map_err(|e| Error::format(self.name(), e))?;

        if self.root_key {
            value = match value {
                Value::Object(mut map) => {
                    if let Some(inner) = map.shift_remove(locale) {
                        inner
                    } else if map.len() == 1 {
                        map.into_iter().next().map(|(_, v)| v).unwrap_or(Value::Null)
                    } else if map.is_empty() {
                        Value::Null
                    } else {
                        return Err(Error::format(
                            self.name(),
                            format!("no root key for locale `{}`", locale),
                        ));
                    }
                }
                Value::Null => Value::Null,
                _ => return Err(Error::format(self.name(), "root must be a mapping")),
            };
        }

        match value {
            Value::Null => Ok(ParseResult::default()),
            Value::Object(_) | Value::Array(_) => Ok(flatten(&value)
                .map_err(|e| Error::format(self.name(), e))?
                .into()),
            _ => Err(Error::format(self.name(), "root must be a mapping or a sequence")),
        }
    }

    fn serialize(&self, data: &FlatDocument, ctx: &SerializeContext<'_>) -> Result<String, Error> {
        let mut value = unflatten(data);
        if self.root_key {
            let mut root = Map::new();
            root.insert(ctx.locale.to_string(), value);
            value = Value::Object(root);
        }
        serde_yaml::to_string(&value).map_err(|e| Error::format(self.name(), e))
    }
}

/// Converts a YAML tree into the JSON model the flattener understands.
/// Scalar keys are stringified; scalar values keep their type so the
/// flattener can report non-string leaves with their path.
fn yaml_to_json(value: serde_yaml::Value) -> Result<Value, String> {
    Ok(match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else {
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, value) in mapping {
                let key = match key {
                    serde_yaml::Value::String(s) => s,
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    other => return Err(format!("unsupported mapping key: {:?}", other)),
                };
                map.insert(key, yaml_to_json(value)?);
            }
            Value::Object(map)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}
