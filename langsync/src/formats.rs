//! All supported localization file formats for langsync.
//!
//! [`FormatType`] is the closed set of format identifiers; [`create_parser`]
//! maps an identifier to its [`FormatParser`] variant. Adding a format means
//! adding a variant to both enums.

pub mod android_strings;
pub mod arb;
pub mod csv;
pub mod document;
pub mod html;
pub mod json;
mod markup;
pub mod po;
pub mod properties;
pub mod strings;
pub mod stringsdict;
pub mod subtitles;
pub mod typescript;
pub mod xcstrings;
pub mod xliff;
pub mod xml;
pub mod yaml;

use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use tracing::debug;

use crate::{
    error::Error,
    flat::order_like,
    traits::Parser,
    types::{FlatDocument, ParseResult, SerializeContext},
};

/// Identifier of every supported localization file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FormatType {
    Json,
    Yaml,
    /// YAML whose single root key is the locale code (`en: {...}`).
    YamlRootKey,
    /// Flutter Application Resource Bundle.
    Arb,
    Properties,
    /// Apple `.strings`.
    Strings,
    /// Apple `.stringsdict` property list.
    Stringsdict,
    /// Xcode string catalog, one file for every locale.
    Xcstrings,
    /// Android `strings.xml`.
    Android,
    Xml,
    Csv,
    /// gettext catalog.
    Po,
    Xliff,
    Srt,
    Vtt,
    Html,
    Markdown,
    Mdx,
    /// A TypeScript module exporting an object literal.
    Typescript,
}

impl FormatType {
    pub const ALL: [FormatType; 19] = [
        FormatType::Json,
        FormatType::Yaml,
        FormatType::YamlRootKey,
        FormatType::Arb,
        FormatType::Properties,
        FormatType::Strings,
        FormatType::Stringsdict,
        FormatType::Xcstrings,
        FormatType::Android,
        FormatType::Xml,
        FormatType::Csv,
        FormatType::Po,
        FormatType::Xliff,
        FormatType::Srt,
        FormatType::Vtt,
        FormatType::Html,
        FormatType::Markdown,
        FormatType::Mdx,
        FormatType::Typescript,
    ];

    /// The identifier used in configuration files.
    pub fn id(&self) -> &'static str {
        match self {
            FormatType::Json => "json",
            FormatType::Yaml => "yaml",
            FormatType::YamlRootKey => "yaml-root-key",
            FormatType::Arb => "arb",
            FormatType::Properties => "properties",
            FormatType::Strings => "strings",
            FormatType::Stringsdict => "stringsdict",
            FormatType::Xcstrings => "xcstrings",
            FormatType::Android => "android",
            FormatType::Xml => "xml",
            FormatType::Csv => "csv",
            FormatType::Po => "po",
            FormatType::Xliff => "xliff",
            FormatType::Srt => "srt",
            FormatType::Vtt => "vtt",
            FormatType::Html => "html",
            FormatType::Markdown => "markdown",
            FormatType::Mdx => "mdx",
            FormatType::Typescript => "typescript",
        }
    }

    /// Returns the typical file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            FormatType::Json => "json",
            FormatType::Yaml | FormatType::YamlRootKey => "yml",
            FormatType::Arb => "arb",
            FormatType::Properties => "properties",
            FormatType::Strings => "strings",
            FormatType::Stringsdict => "stringsdict",
            FormatType::Xcstrings => "xcstrings",
            FormatType::Android | FormatType::Xml => "xml",
            FormatType::Csv => "csv",
            FormatType::Po => "po",
            FormatType::Xliff => "xlf",
            FormatType::Srt => "srt",
            FormatType::Vtt => "vtt",
            FormatType::Html => "html",
            FormatType::Markdown => "md",
            FormatType::Mdx => "mdx",
            FormatType::Typescript => "ts",
        }
    }

    /// Whole-document formats translate the entire file as one unit.
    pub fn is_whole_document(&self) -> bool {
        matches!(self, FormatType::Markdown | FormatType::Mdx)
    }

    /// Multi-locale formats keep every locale in one file, so the target
    /// file is the source file itself.
    pub fn is_multi_locale(&self) -> bool {
        matches!(self, FormatType::Xcstrings)
    }
}

impl Display for FormatType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Accepts the identifiers returned by [`FormatType::id`] case-insensitively,
/// plus a few common aliases.
///
/// ```rust
/// use langsync::FormatType;
/// assert_eq!("json".parse::<FormatType>().unwrap(), FormatType::Json);
/// assert_eq!("xcode-strings".parse::<FormatType>().unwrap(), FormatType::Strings);
/// assert!("docx".parse::<FormatType>().is_err());
/// ```
impl FromStr for FormatType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase().replace('_', "-");
        match s.as_str() {
            "json" => Ok(FormatType::Json),
            "yaml" | "yml" => Ok(FormatType::Yaml),
            "yaml-root-key" => Ok(FormatType::YamlRootKey),
            "arb" | "flutter" => Ok(FormatType::Arb),
            "properties" => Ok(FormatType::Properties),
            "strings" | "xcode-strings" => Ok(FormatType::Strings),
            "stringsdict" | "xcode-stringsdict" => Ok(FormatType::Stringsdict),
            "xcstrings" | "xcode-xcstrings" => Ok(FormatType::Xcstrings),
            "android" | "androidstrings" => Ok(FormatType::Android),
            "xml" => Ok(FormatType::Xml),
            "csv" => Ok(FormatType::Csv),
            "po" | "gettext" => Ok(FormatType::Po),
            "xliff" | "xlf" => Ok(FormatType::Xliff),
            "srt" => Ok(FormatType::Srt),
            "vtt" | "webvtt" => Ok(FormatType::Vtt),
            "html" => Ok(FormatType::Html),
            "markdown" | "md" => Ok(FormatType::Markdown),
            "mdx" => Ok(FormatType::Mdx),
            "typescript" | "ts" => Ok(FormatType::Typescript),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

/// The closed set of format implementations, selected by [`FormatType`].
#[derive(Debug, Clone)]
pub enum FormatParser {
    Json(json::Format),
    Yaml(yaml::Format),
    Arb(arb::Format),
    Properties(properties::Format),
    Strings(strings::Format),
    Stringsdict(stringsdict::Format),
    Xcstrings(xcstrings::Format),
    Android(android_strings::Format),
    Xml(xml::Format),
    Csv(csv::Format),
    Po(po::Format),
    Xliff(xliff::Format),
    Subtitles(subtitles::Format),
    Html(html::Format),
    Document(document::Format),
    Typescript(typescript::Format),
}

/// Constructs the parser for a format identifier.
pub fn create_parser(format: FormatType) -> FormatParser {
    match format {
        FormatType::Json => FormatParser::Json(json::Format),
        FormatType::Yaml => FormatParser::Yaml(yaml::Format::nested()),
        FormatType::YamlRootKey => FormatParser::Yaml(yaml::Format::root_key()),
        FormatType::Arb => FormatParser::Arb(arb::Format),
        FormatType::Properties => FormatParser::Properties(properties::Format),
        FormatType::Strings => FormatParser::Strings(strings::Format),
        FormatType::Stringsdict => FormatParser::Stringsdict(stringsdict::Format),
        FormatType::Xcstrings => FormatParser::Xcstrings(xcstrings::Format),
        FormatType::Android => FormatParser::Android(android_strings::Format),
        FormatType::Xml => FormatParser::Xml(xml::Format),
        FormatType::Csv => FormatParser::Csv(csv::Format),
        FormatType::Po => FormatParser::Po(po::Format),
        FormatType::Xliff => FormatParser::Xliff(xliff::Format),
        FormatType::Srt => FormatParser::Subtitles(subtitles::Format::Srt),
        FormatType::Vtt => FormatParser::Subtitles(subtitles::Format::Vtt),
        FormatType::Html => FormatParser::Html(html::Format),
        FormatType::Markdown => FormatParser::Document(document::Format::Markdown),
        FormatType::Mdx => FormatParser::Document(document::Format::Mdx),
        FormatType::Typescript => FormatParser::Typescript(typescript::Format),
    }
}

/// Parses a format identifier and constructs its parser, failing fast on
/// unknown identifiers.
pub fn create_parser_by_id(id: &str) -> Result<FormatParser, Error> {
    Ok(create_parser(id.parse()?))
}

impl FormatParser {
    pub fn format_type(&self) -> FormatType {
        match self {
            FormatParser::Json(_) => FormatType::Json,
            FormatParser::Yaml(f) if f.is_root_key() => FormatType::YamlRootKey,
            FormatParser::Yaml(_) => FormatType::Yaml,
            FormatParser::Arb(_) => FormatType::Arb,
            FormatParser::Properties(_) => FormatType::Properties,
            FormatParser::Strings(_) => FormatType::Strings,
            FormatParser::Stringsdict(_) => FormatType::Stringsdict,
            FormatParser::Xcstrings(_) => FormatType::Xcstrings,
            FormatParser::Android(_) => FormatType::Android,
            FormatParser::Xml(_) => FormatType::Xml,
            FormatParser::Csv(_) => FormatType::Csv,
            FormatParser::Po(_) => FormatType::Po,
            FormatParser::Xliff(_) => FormatType::Xliff,
            FormatParser::Subtitles(subtitles::Format::Srt) => FormatType::Srt,
            FormatParser::Subtitles(subtitles::Format::Vtt) => FormatType::Vtt,
            FormatParser::Html(_) => FormatType::Html,
            FormatParser::Document(document::Format::Markdown) => FormatType::Markdown,
            FormatParser::Document(document::Format::Mdx) => FormatType::Mdx,
            FormatParser::Typescript(_) => FormatType::Typescript,
        }
    }

    fn parse_variant(&self, raw: &str, locale: &str) -> Result<ParseResult, Error> {
        match self {
            FormatParser::Json(f) => f.parse(raw, locale),
            FormatParser::Yaml(f) => f.parse(raw, locale),
            FormatParser::Arb(f) => f.parse(raw, locale),
            FormatParser::Properties(f) => f.parse(raw, locale),
            FormatParser::Strings(f) => f.parse(raw, locale),
            FormatParser::Stringsdict(f) => f.parse(raw, locale),
            FormatParser::Xcstrings(f) => f.parse(raw, locale),
            FormatParser::Android(f) => f.parse(raw, locale),
            FormatParser::Xml(f) => f.parse(raw, locale),
            FormatParser::Csv(f) => f.parse(raw, locale),
            FormatParser::Po(f) => f.parse(raw, locale),
            FormatParser::Xliff(f) => f.parse(raw, locale),
            FormatParser::Subtitles(f) => f.parse(raw, locale),
            FormatParser::Html(f) => f.parse(raw, locale),
            FormatParser::Document(f) => f.parse(raw, locale),
            FormatParser::Typescript(f) => f.parse(raw, locale),
        }
    }

    fn serialize_variant(
        &self,
        data: &FlatDocument,
        ctx: &SerializeContext<'_>,
    ) -> Result<String, Error> {
        match self {
            FormatParser::Json(f) => f.serialize(data, ctx),
            FormatParser::Yaml(f) => f.serialize(data, ctx),
            FormatParser::Arb(f) => f.serialize(data, ctx),
            FormatParser::Properties(f) => f.serialize(data, ctx),
            FormatParser::Strings(f) => f.serialize(data, ctx),
            FormatParser::Stringsdict(f) => f.serialize(data, ctx),
            FormatParser::Xcstrings(f) => f.serialize(data, ctx),
            FormatParser::Android(f) => f.serialize(data, ctx),
            FormatParser::Xml(f) => f.serialize(data, ctx),
            FormatParser::Csv(f) => f.serialize(data, ctx),
            FormatParser::Po(f) => f.serialize(data, ctx),
            FormatParser::Xliff(f) => f.serialize(data, ctx),
            FormatParser::Subtitles(f) => f.serialize(data, ctx),
            FormatParser::Html(f) => f.serialize(data, ctx),
            FormatParser::Document(f) => f.serialize(data, ctx),
            FormatParser::Typescript(f) => f.serialize(data, ctx),
        }
    }
}

impl Parser for FormatParser {
    fn parse(&self, raw: &str, locale: &str) -> Result<ParseResult, Error> {
        self.parse_variant(raw, locale)
            .map_err(|e| wrap_format_error(self.format_type(), e))
    }

    /// Reorders `data` after the key order of `ctx.original` and recovers side
    /// metadata from it when the caller did not thread any, then delegates to
    /// the format implementation.
    fn serialize(&self, data: &FlatDocument, ctx: &SerializeContext<'_>) -> Result<String, Error> {
        let original = match ctx.original.filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => match self.parse_variant(raw, ctx.locale) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    debug!("ignoring unparsable original {} file: {}", self.format_type(), e);
                    None
                }
            },
            None => None,
        };

        let ordered;
        let mut ctx = *ctx;
        let data = match &original {
            Some(parsed) => {
                ordered = order_like(data, &parsed.document);
                if ctx.metadata.is_none() && !parsed.metadata.is_empty() {
                    ctx.metadata = Some(&parsed.metadata);
                }
                &ordered
            }
            None => data,
        };

        self.serialize_variant(data, &ctx)
            .map_err(|e| wrap_format_error(self.format_type(), e))
    }
}

fn wrap_format_error(format: FormatType, error: Error) -> Error {
    match error {
        Error::Format { .. } => error,
        other => Error::format(format, other),
    }
}
