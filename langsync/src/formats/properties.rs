//! Support for Java `.properties` files.
//!
//! Handles `=`, `:` and whitespace separators, `#`/`!` comments, backslash
//! line continuations and the usual escapes (`\n`, `\t`, `\uXXXX`, ...).
//! Comment lines directly above a key travel with it.

use std::collections::HashMap;

use crate::{
    error::Error,
    traits::Parser,
    types::{FlatDocument, ParseResult, SerializeContext},
};

const NAME: &str = "properties";

#[derive(Debug, Clone, Copy, Default)]
pub struct Format;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Property {
    key: String,
    value: String,
    comments: Vec<String>,
}

fn parse_properties(raw: &str) -> Result<Vec<Property>, Error> {
    let mut properties = Vec::new();
    let mut comments = Vec::new();
    let mut lines = raw.lines();

    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            comments.clear();
            continue;
        }
        if trimmed.starts_with('#') || trimmed.starts_with('!') {
            comments.push(trimmed.to_string());
            continue;
        }

        let mut logical = trimmed.to_string();
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        let (key, value) = split_key_value(&logical);
        properties.push(Property {
            key: unescape(&key)?,
            value: unescape(&value)?,
            comments: std::mem::take(&mut comments),
        });
    }
    Ok(properties)
}

fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_key_value(line: &str) -> (String, String) {
    let mut key = String::new();
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                key.push(c);
                if let Some(n) = chars.next() {
                    key.push(n);
                }
            }
            '=' | ':' => {
                let value: String = chars.collect();
                return (key, value.trim_start().to_string());
            }
            c if c.is_whitespace() => {
                while chars.peek().is_some_and(|c| c.is_whitespace()) {
                    chars.next();
                }
                if chars.peek().is_some_and(|c| *c == '=' || *c == ':') {
                    chars.next();
                }
                let value: String = chars.collect();
                return (key, value.trim_start().to_string());
            }
            c => key.push(c),
        }
    }
    (key, String::new())
}

fn unescape(text: &str) -> Result<String, Error> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&hex, 16)
                    .map_err(|_| Error::format(NAME, format!("invalid unicode escape `\\u{}`", hex)))?;
                // Surrogates cannot be represented; keep a replacement char.
                out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    Ok(out)
}

fn escape(text: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{c}' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' if is_key => {
                out.push('\\');
                out.push(c);
            }
            ' ' if is_key || i == 0 => out.push_str("\\ "),
            c => out.push(c),
        }
    }
    out
}

impl Parser for Format {
    fn parse(&self, raw: &str, _locale: &str) -> Result<ParseResult, Error> {
        Ok(parse_properties(raw)?
            .into_iter()
            .map(|p| (p.key, p.value))
            .collect::<FlatDocument>()
            .into())
    }

    fn serialize(&self, data: &FlatDocument, ctx: &SerializeContext<'_>) -> Result<String, Error> {
        let mut comments: HashMap<String, Vec<String>> = HashMap::new();
        for raw in [ctx.source, ctx.original].into_iter().flatten() {
            if let Ok(properties) = parse_properties(raw) {
                for p in properties.into_iter().filter(|p| !p.comments.is_empty()) {
                    comments.insert(p.key, p.comments);
                }
            }
        }

        let mut out = String::new();
        for (key, value) in data {
            if let Some(lines) = comments.get(key) {
                for line in lines {
                    out.push_str(line);
                    out.push('\n');
                }
            }
            out.push_str(&escape(key, true));
            out.push('=');
            out.push_str(&escape(value, false));
            out.push('\n');
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn test_parse_separators_comments_and_continuations() {
        let raw = indoc! {r"
            # Main screen
            app.title = My App
            app.subtitle: Subtitle
            app.motto  Keep going
            ! another comment
            long = first \
                   second
            unicode=caf\u00e9
            escaped\ key=a\=b
        "};
        let doc = Format.parse(raw, "en").unwrap().document;
        assert_eq!(doc["app.title"], "My App");
        assert_eq!(doc["app.subtitle"], "Subtitle");
        assert_eq!(doc["app.motto"], "Keep going");
        assert_eq!(doc["long"], "first second");
        assert_eq!(doc["unicode"], "café");
        assert_eq!(doc["escaped key"], "a=b");
    }

    #[test]
    fn test_invalid_unicode_escape_is_format_error() {
        assert!(Format.parse("bad=\\uZZZZ\n", "en").is_err());
    }

    #[test]
    fn test_serialize_escapes_and_keeps_comments() {
        let source = "# Greeting shown on launch\nhello=Hello\n";
        let mut data = FlatDocument::new();
        data.insert("hello".to_string(), "Bonjour\nà tous".to_string());
        data.insert("key with:colon".to_string(), " lead".to_string());
        let out = Format
            .serialize(&data, &SerializeContext::new("fr").with_source(source))
            .unwrap();
        assert_eq!(
            out,
            "# Greeting shown on launch\nhello=Bonjour\\nà tous\nkey\\ with\\:colon=\\ lead\n"
        );
        assert_eq!(Format.parse(&out, "fr").unwrap().document, data);
    }
}
