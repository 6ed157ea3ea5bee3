//! Support for Apple `.strings` localization format.
//!
//! `"key" = "value";` pairs with C-style escapes, optionally preceded by a
//! `/* ... */` or `// ...` comment which is carried over on serialization.

use std::{collections::HashMap, iter::Peekable, str::Chars};

use crate::{
    error::Error,
    traits::Parser,
    types::{FlatDocument, ParseResult, SerializeContext},
};

const NAME: &str = "strings";

#[derive(Debug, Clone, Copy, Default)]
pub struct Format;

/// A single key-value pair in a `.strings` file, possibly with an associated comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub key: String,
    pub value: String,
    /// The comment immediately preceding the pair, markers included.
    pub comment: Option<String>,
}

impl std::fmt::Display for Pair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(comment) = &self.comment {
            writeln!(f, "{}", comment)?;
        }
        write!(f, "\"{}\" = \"{}\";", escape(&self.key), escape(&self.value))
    }
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(raw: &'a str) -> Self {
        Lexer {
            chars: raw.chars().peekable(),
            line: 1,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn error(&self, message: impl std::fmt::Display) -> Error {
        Error::format(NAME, format!("line {}: {}", self.line, message))
    }

    /// Skips whitespace and returns the last comment seen, if any.
    fn skip_trivia(&mut self) -> Result<Option<String>, Error> {
        let mut comment = None;
        loop {
            match self.chars.peek().copied() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') => {
                    self.bump();
                    match self.bump() {
                        Some('/') => {
                            let mut text = String::from("//");
                            while let Some(&c) = self.chars.peek() {
                                if c == '\n' {
                                    break;
                                }
                                text.push(c);
                                self.bump();
                            }
                            comment = Some(text.trim_end().to_string());
                        }
                        Some('*') => {
                            let mut text = String::from("/*");
                            loop {
                                match self.bump() {
                                    Some('*') if self.chars.peek() == Some(&'/') => {
                                        self.bump();
                                        text.push_str("*/");
                                        break;
                                    }
                                    Some(c) => text.push(c),
                                    None => return Err(self.error("unterminated comment")),
                                }
                            }
                            comment = Some(text);
                        }
                        _ => return Err(self.error("unexpected `/`")),
                    }
                }
                _ => return Ok(comment),
            }
        }
    }

    fn string(&mut self) -> Result<String, Error> {
        match self.chars.peek().copied() {
            Some('"') => {
                self.bump();
                let mut out = String::new();
                loop {
                    match self.bump() {
                        Some('"') => return Ok(out),
                        Some('\\') => match self.bump() {
                            Some('n') => out.push('\n'),
                            Some('t') => out.push('\t'),
                            Some('r') => out.push('\r'),
                            Some('0') => out.push('\0'),
                            Some('U') | Some('u') => {
                                let hex: String = (0..4).filter_map(|_| self.bump()).collect();
                                let code = u32::from_str_radix(&hex, 16).map_err(|_| {
                                    self.error(format!("invalid unicode escape `{}`", hex))
                                })?;
                                out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
                            }
                            Some(c) => out.push(c),
                            None => return Err(self.error("unterminated string")),
                        },
                        Some(c) => out.push(c),
                        None => return Err(self.error("unterminated string")),
                    }
                }
            }
            Some(c) if c.is_alphanumeric() || c == '_' || c == '.' => {
                let mut out = String::new();
                while let Some(&c) = self.chars.peek() {
                    if !(c.is_alphanumeric() || c == '_' || c == '.' || c == '-') {
                        break;
                    }
                    out.push(c);
                    self.bump();
                }
                Ok(out)
            }
            Some(c) => Err(self.error(format!("expected a string, found `{}`", c))),
            None => Err(self.error("expected a string, found end of file")),
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), Error> {
        self.skip_trivia()?;
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected `{}`, found `{}`", expected, c))),
            None => Err(self.error(format!("expected `{}`, found end of file", expected))),
        }
    }
}

/// Parses every pair of a `.strings` file, in file order.
pub fn parse_pairs(raw: &str) -> Result<Vec<Pair>, Error> {
    let mut lexer = Lexer::new(raw);
    let mut pairs = Vec::new();
    loop {
        let comment = lexer.skip_trivia()?;
        if lexer.chars.peek().is_none() {
            return Ok(pairs);
        }
        let key = lexer.string()?;
        lexer.expect('=')?;
        lexer.skip_trivia()?;
        let value = lexer.string()?;
        lexer.expect(';')?;
        pairs.push(Pair {
            key,
            value,
            comment,
        });
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

impl Parser for Format {
    fn parse(&self, raw: &str, _locale: &str) -> Result<ParseResult, Error> {
        Ok(parse_pairs(raw)?
            .into_iter()
            .map(|pair| (pair.key, pair.value))
            .collect::<FlatDocument>()
            .into())
    }

    fn serialize(&self, data: &FlatDocument, ctx: &SerializeContext<'_>) -> Result<String, Error> {
        let mut comments = HashMap::new();
        for raw in [ctx.source, ctx.original].into_iter().flatten() {
            if let Ok(pairs) = parse_pairs(raw) {
                for pair in pairs {
                    if let Some(comment) = pair.comment {
                        comments.insert(pair.key, comment);
                    }
                }
            }
        }

        let mut out = String::new();
        for (key, value) in data {
            let pair = Pair {
                key: key.clone(),
                value: value.clone(),
                comment: comments.get(key).cloned(),
            };
            if pair.comment.is_some() && !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&pair.to_string());
            out.push('\n');
        }
        Ok(out)
    }
}
