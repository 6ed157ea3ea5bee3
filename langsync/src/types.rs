//! Core, format-agnostic types for langsync.
//! Parsers decode into these; serializers consume these.

use std::{fmt::Display, str::FromStr};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The canonical `key -> string` representation every format converts to/from.
///
/// Insertion order is meaningful: serializers emit keys in this order.
pub type FlatDocument = IndexMap<String, String>;

/// One key/source text pair awaiting translation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationUnit {
    /// Flattened key, unique within `source_file`.
    pub key: String,
    pub source_text: String,
    pub source_file: String,
}

impl TranslationUnit {
    pub fn new(
        key: impl Into<String>,
        source_text: impl Into<String>,
        source_file: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            source_text: source_text.into(),
            source_file: source_file.into(),
        }
    }

    /// Builds units for `keys` (in that order) out of a parsed source document.
    /// Keys missing from the document are skipped.
    pub fn from_document<'a>(
        source_file: &str,
        document: &FlatDocument,
        keys: impl IntoIterator<Item = &'a String>,
    ) -> Vec<Self> {
        keys.into_iter()
            .filter_map(|key| {
                document
                    .get(key)
                    .map(|text| TranslationUnit::new(key.clone(), text.clone(), source_file))
            })
            .collect()
    }
}

/// Per-row data a format wants back on `serialize` but that is not translatable,
/// e.g. the extra columns of a tabular file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SideMetadata {
    /// Passenger column names, in header order.
    pub columns: Vec<String>,
    /// Passenger values per key, aligned with `columns`.
    pub rows: IndexMap<String, Vec<String>>,
}

impl SideMetadata {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.rows.is_empty()
    }
}

/// Output of [`crate::traits::Parser::parse`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseResult {
    pub document: FlatDocument,
    pub metadata: SideMetadata,
}

impl From<FlatDocument> for ParseResult {
    fn from(document: FlatDocument) -> Self {
        ParseResult {
            document,
            metadata: SideMetadata::default(),
        }
    }
}

/// A source/target locale code pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct LocalePair {
    pub source: String,
    pub target: String,
}

impl LocalePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Everything a serializer may consult besides the data itself.
#[derive(Debug, Clone, Copy)]
pub struct SerializeContext<'a> {
    /// Locale the output file is written for.
    pub locale: &'a str,
    pub source_locale: Option<&'a str>,
    /// Previous raw content of the file being written, if any.
    pub original: Option<&'a str>,
    /// Raw content of the source-locale file.
    pub source: Option<&'a str>,
    pub metadata: Option<&'a SideMetadata>,
}

impl<'a> SerializeContext<'a> {
    pub fn new(locale: &'a str) -> Self {
        Self {
            locale,
            source_locale: None,
            original: None,
            source: None,
            metadata: None,
        }
    }

    pub fn with_source_locale(mut self, source_locale: &'a str) -> Self {
        self.source_locale = Some(source_locale);
        self
    }

    pub fn with_original(mut self, original: &'a str) -> Self {
        self.original = Some(original);
        self
    }

    pub fn with_source(mut self, source: &'a str) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_metadata(mut self, metadata: &'a SideMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// The raw document structural decisions should mirror: the original
    /// target file when there is one, else the source file.
    pub fn reference(&self) -> Option<&'a str> {
        self.original
            .filter(|raw| !raw.trim().is_empty())
            .or(self.source.filter(|raw| !raw.trim().is_empty()))
    }
}

/// CLDR plural categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PluralCategory {
    Zero,
    One,
    Two,
    Few,
    Many,
    Other,
}

impl PluralCategory {
    pub const ALL: [PluralCategory; 6] = [
        PluralCategory::Zero,
        PluralCategory::One,
        PluralCategory::Two,
        PluralCategory::Few,
        PluralCategory::Many,
        PluralCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PluralCategory::Zero => "zero",
            PluralCategory::One => "one",
            PluralCategory::Two => "two",
            PluralCategory::Few => "few",
            PluralCategory::Many => "many",
            PluralCategory::Other => "other",
        }
    }
}

impl Display for PluralCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluralCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PluralCategory::ALL
            .iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| Error::format("plural", format!("unknown plural category `{}`", s)))
    }
}
