//! Whole-document formats (Markdown, MDX).
//!
//! The file is a single unit under the key `content`; its structure is left
//! to the translator.

use crate::{
    error::Error,
    traits::Parser,
    types::{FlatDocument, ParseResult, SerializeContext},
};

pub const CONTENT_KEY: &str = "content";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Markdown,
    Mdx,
}

impl Format {
    fn name(&self) -> &'static str {
        match self {
            Format::Markdown => "markdown",
            Format::Mdx => "mdx",
        }
    }
}

impl Parser for Format {
    fn parse(&self, raw: &str, _locale: &str) -> Result<ParseResult, Error> {
        let mut document = FlatDocument::new();
        if !raw.trim().is_empty() {
            document.insert(CONTENT_KEY.to_string(), raw.to_string());
        }
        Ok(document.into())
    }

    fn serialize(&self, data: &FlatDocument, _ctx: &SerializeContext<'_>) -> Result<String, Error> {
        if let Some(extra) = data.keys().find(|key| *key != CONTENT_KEY) {
            return Err(Error::format(
                self.name(),
                format!("unexpected key `{}`, only `{}` is allowed", extra, CONTENT_KEY),
            ));
        }
        Ok(data.get(CONTENT_KEY).cloned().unwrap_or_default())
    }
}
