//! Traits for format-agnostic parsing and serialization in langsync.

use std::{fs::File, io::Read, path::Path};

use crate::{
    error::Error,
    types::{FlatDocument, ParseResult, SerializeContext},
};

/// One `parse`/`serialize` contract shared by every supported format.
///
/// # Example
///
/// ```rust
/// use langsync::{FormatType, SerializeContext, create_parser, traits::Parser};
///
/// let parser = create_parser(FormatType::Json);
/// let parsed = parser.parse(r#"{"home": {"title": "Welcome"}}"#, "en")?;
/// assert_eq!(parsed.document["home.title"], "Welcome");
///
/// let output = parser.serialize(&parsed.document, &SerializeContext::new("fr"))?;
/// assert!(output.contains("\"title\": \"Welcome\""));
/// Ok::<(), langsync::Error>(())
/// ```
pub trait Parser {
    /// Parses raw file content into a flat document.
    ///
    /// `locale` selects the relevant slice of multi-locale files; single-locale
    /// formats ignore it.
    fn parse(&self, raw: &str, locale: &str) -> Result<ParseResult, Error>;

    /// Renders `data` for `ctx.locale`. Deterministic for a given input.
    fn serialize(&self, data: &FlatDocument, ctx: &SerializeContext<'_>) -> Result<String, Error>;

    /// Parses a file, transparently decoding UTF-16/UTF-8 BOMs.
    fn parse_file<P: AsRef<Path>>(&self, path: P, locale: &str) -> Result<ParseResult, Error>
    where
        Self: Sized,
    {
        let raw = read_to_string(path)?;
        self.parse(&raw, locale)
    }
}

/// Reads a file as text, honouring a byte order mark when present
/// (Apple `.strings` files are frequently UTF-16).
pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String, Error> {
    let file = File::open(path).map_err(Error::Io)?;
    let mut decoder = encoding_rs_io::DecodeReaderBytesBuilder::new()
        .encoding(Some(encoding_rs::UTF_8))
        .bom_override(true)
        .strip_bom(true)
        .build(file);

    let mut decoded = String::new();
    decoder.read_to_string(&mut decoded).map_err(Error::Io)?;
    Ok(decoded)
}
