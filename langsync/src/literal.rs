//! A parser for translation modules written in TypeScript or JavaScript.
//!
//! Only a small, data-only subset of the language is accepted:
//!
//! ```text
//! module  := { import } [ "export" "default" | "export" "const" NAME [ ":" TYPE ] "=" ] object
//!            [ "as" "const" | "satisfies" TYPE ] [ ";" ]
//! import  := "import" ( "type" BINDINGS | "{" "type" NAME { "," "type" NAME } "}" )
//!            "from" string [ ";" ]
//! value   := string | template | object | array
//! object  := "{" [ key ":" value { "," key ":" value } [ "," ] ] "}"
//! array   := "[" [ value { "," value } [ "," ] ] "]"
//! key     := identifier | string
//! ```
//!
//! Comments are allowed anywhere whitespace is. Imports may only bring in
//! types, since they vanish when the module is compiled. Template literals
//! must not interpolate. Numbers, booleans, identifiers, calls and spreads are
//! rejected: nothing in the module is ever evaluated.
//!
//! ```rust
//! use langsync::literal::parse_module;
//!
//! let module = parse_module("export const en = { title: 'Hi', // greeting\n} as const;\n").unwrap();
//! assert_eq!(module.prefix, "export const en = ");
//! assert_eq!(module.value["title"], "Hi");
//! assert_eq!(module.suffix, " as const;\n");
//! ```

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at line {line}, column {column}")]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

/// A module split around its exported object literal.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    /// Source text before the literal, e.g. `export default `.
    pub prefix: String,
    pub value: Value,
    /// Source text after the literal, e.g. ` as const;\n`.
    pub suffix: String,
}

/// Parses a whole module.
pub fn parse_module(src: &str) -> Result<Module, SyntaxError> {
    let mut cursor = Cursor::new(src);
    cursor.skip_trivia()?;
    while cursor.eat_keyword("import") {
        cursor.type_import()?;
        cursor.skip_trivia()?;
    }

    if cursor.eat_keyword("export") {
        cursor.skip_trivia()?;
        if cursor.eat_keyword("default") {
            // nothing else to consume
        } else if cursor.eat_keyword("const") {
            cursor.skip_trivia()?;
            if cursor.identifier().is_none() {
                return Err(cursor.error("expected a binding name after `const`"));
            }
            cursor.skip_trivia()?;
            if cursor.eat(":") {
                cursor.skip_type(&['='])?;
            }
            cursor.expect('=')?;
        } else {
            return Err(cursor.error("expected `default` or `const` after `export`"));
        }
        cursor.skip_trivia()?;
    }

    if cursor.peek() != Some('{') {
        return Err(cursor.error("expected an object literal"));
    }
    let start = cursor.pos;
    let value = cursor.object()?;
    let end = cursor.pos;

    cursor.skip_trivia()?;
    if cursor.eat_keyword("as") {
        cursor.skip_trivia()?;
        if !cursor.eat_keyword("const") {
            return Err(cursor.error("only `as const` is supported"));
        }
    } else if cursor.eat_keyword("satisfies") {
        cursor.skip_type(&[';'])?;
    }
    cursor.skip_trivia()?;
    cursor.eat(";");
    cursor.skip_trivia()?;
    if cursor.peek().is_some() {
        return Err(cursor.error("unexpected content after the exported literal"));
    }

    Ok(Module {
        prefix: src[..start].to_string(),
        value,
        suffix: src[end..].to_string(),
    })
}

/// Parses a single literal value with nothing around it.
pub fn parse_value(src: &str) -> Result<Value, SyntaxError> {
    let mut cursor = Cursor::new(src);
    cursor.skip_trivia()?;
    let value = cursor.value()?;
    cursor.skip_trivia()?;
    match cursor.peek() {
        None => Ok(value),
        Some(_) => Err(cursor.error("unexpected content after the literal")),
    }
}

/// Whether `name` can be written as a bare property name.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(is_identifier_start) && chars.all(is_identifier_char)
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Cursor { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let rest = self.rest();
        let bounded = rest
            .strip_prefix(keyword)
            .is_some_and(|after| !after.chars().next().is_some_and(is_identifier_char));
        if bounded {
            self.pos += keyword.len();
        }
        bounded
    }

    fn expect(&mut self, c: char) -> Result<(), SyntaxError> {
        match self.peek() {
            Some(found) if found == c => {
                self.bump();
                Ok(())
            }
            _ => Err(self.error(format!("expected `{}`", c))),
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        let consumed = &self.src[..self.pos];
        let line_start = consumed.rfind('\n').map_or(0, |i| i + 1);
        SyntaxError {
            message: message.into(),
            line: consumed.matches('\n').count() + 1,
            column: consumed[line_start..].chars().count() + 1,
        }
    }

    fn skip_trivia(&mut self) -> Result<(), SyntaxError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.rest().starts_with("//") => {
                    let len = self.rest().find('\n').unwrap_or(self.rest().len());
                    self.pos += len;
                }
                Some('/') if self.rest().starts_with("/*") => {
                    let Some(len) = self.rest()[2..].find("*/") else {
                        return Err(self.error("unterminated block comment"));
                    };
                    self.pos += len + 4;
                }
                _ => return Ok(()),
            }
        }
    }

    fn identifier(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        let mut chars = rest.char_indices();
        match chars.next() {
            Some((_, c)) if is_identifier_start(c) => {}
            _ => return None,
        }
        let len = chars
            .find(|(_, c)| !is_identifier_char(*c))
            .map_or(rest.len(), |(i, _)| i);
        self.pos += len;
        Some(&rest[..len])
    }

    /// The rest of an `import` declaration, which must bring in nothing but
    /// types.
    fn type_import(&mut self) -> Result<(), SyntaxError> {
        self.skip_trivia()?;
        if self.eat_keyword("type") {
            self.skip_trivia()?;
            if self.peek() == Some('{') {
                let Some(len) = self.rest().find('}') else {
                    return Err(self.error("expected `}`"));
                };
                self.pos += len + 1;
            } else {
                if self.eat("*") {
                    self.skip_trivia()?;
                    if !self.eat_keyword("as") {
                        return Err(self.error("expected `as`"));
                    }
                    self.skip_trivia()?;
                }
                if self.identifier().is_none() {
                    return Err(self.error("expected an imported name"));
                }
            }
        } else if self.eat("{") {
            loop {
                self.skip_trivia()?;
                if self.eat("}") {
                    break;
                }
                if !self.eat_keyword("type") {
                    return Err(self.error("only type imports are supported"));
                }
                self.skip_trivia()?;
                if self.identifier().is_none() {
                    return Err(self.error("expected an imported name"));
                }
                self.skip_trivia()?;
                if self.eat_keyword("as") {
                    self.skip_trivia()?;
                    if self.identifier().is_none() {
                        return Err(self.error("expected a local name after `as`"));
                    }
                    self.skip_trivia()?;
                }
                if self.eat(",") {
                    continue;
                }
                self.expect('}')?;
                break;
            }
        } else {
            return Err(self.error("only type imports are supported"));
        }

        self.skip_trivia()?;
        if !self.eat_keyword("from") {
            return Err(self.error("expected `from`"));
        }
        self.skip_trivia()?;
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                self.string(quote)?;
            }
            _ => return Err(self.error("expected a module path")),
        }
        self.skip_trivia()?;
        self.eat(";");
        Ok(())
    }

    /// Skips a type expression up to one of `stop` at nesting depth zero.
    fn skip_type(&mut self, stop: &[char]) -> Result<(), SyntaxError> {
        let mut depth = 0usize;
        loop {
            self.skip_trivia()?;
            let Some(c) = self.peek() else {
                return Ok(());
            };
            if depth == 0 && stop.contains(&c) && !self.rest().starts_with("=>") {
                return Ok(());
            }
            match c {
                '(' | '[' | '{' | '<' => depth += 1,
                ')' | ']' | '}' | '>' => depth = depth.saturating_sub(1),
                '=' if self.rest().starts_with("=>") => {
                    self.bump();
                }
                '"' | '\'' => {
                    self.bump();
                    self.string(c)?;
                    continue;
                }
                _ => {}
            }
            self.bump();
        }
    }

    fn value(&mut self) -> Result<Value, SyntaxError> {
        match self.peek() {
            Some('{') => self.object(),
            Some('[') => self.array(),
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                self.string(quote).map(Value::String)
            }
            Some('`') => {
                self.bump();
                self.template().map(Value::String)
            }
            Some('.') if self.rest().starts_with("...") => {
                Err(self.error("spread elements are not supported"))
            }
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' => {
                Err(self.error("numbers are not supported, use a string"))
            }
            Some(c) if is_identifier_start(c) => {
                let start = self.pos;
                let word = self.identifier().unwrap_or_default();
                let message = match word {
                    "true" | "false" => "booleans are not supported, use a string".to_string(),
                    _ if self.rest().trim_start().starts_with('(') => {
                        format!("call to `{}` is not supported", word)
                    }
                    _ => format!("identifier `{}` is not supported as a value", word),
                };
                self.pos = start;
                Err(self.error(message))
            }
            Some(c) => Err(self.error(format!("unexpected character `{}`", c))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn object(&mut self) -> Result<Value, SyntaxError> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_trivia()?;
            if self.eat("}") {
                break;
            }
            if self.rest().starts_with("...") {
                return Err(self.error("spread elements are not supported"));
            }
            let key = match self.peek() {
                Some(quote @ ('"' | '\'')) => {
                    self.bump();
                    self.string(quote)?
                }
                Some('[') => return Err(self.error("computed property names are not supported")),
                _ => match self.identifier() {
                    Some(name) => name.to_string(),
                    None => return Err(self.error("expected a property name")),
                },
            };
            self.skip_trivia()?;
            if !self.eat(":") {
                return Err(self.error(format!("expected `:` after property `{}`", key)));
            }
            self.skip_trivia()?;
            let value = self.value()?;
            map.insert(key, value);
            self.skip_trivia()?;
            if self.eat(",") {
                continue;
            }
            if self.eat("}") {
                break;
            }
            return Err(self.error("expected `,` or `}`"));
        }
        Ok(Value::Object(map))
    }

    fn array(&mut self) -> Result<Value, SyntaxError> {
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_trivia()?;
            if self.eat("]") {
                break;
            }
            items.push(self.value()?);
            self.skip_trivia()?;
            if self.eat(",") {
                continue;
            }
            if self.eat("]") {
                break;
            }
            return Err(self.error("expected `,` or `]`"));
        }
        Ok(Value::Array(items))
    }

    /// Reads a quoted string whose opening quote was consumed.
    fn string(&mut self, quote: char) -> Result<String, SyntaxError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(out),
                Some('\\') => self.escape(&mut out)?,
                Some('\n') | None => return Err(self.error("unterminated string literal")),
                Some(c) => out.push(c),
            }
        }
    }

    fn template(&mut self) -> Result<String, SyntaxError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('`') => return Ok(out),
                Some('\\') => self.escape(&mut out)?,
                Some('$') if self.peek() == Some('{') => {
                    return Err(self.error("template interpolation is not supported"));
                }
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated template literal")),
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<(), SyntaxError> {
        match self.bump() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('v') => out.push('\u{b}'),
            Some('0') => out.push('\0'),
            Some('x') => {
                let code = self.hex_digits(2)?;
                out.push(self.char_from(code)?);
            }
            Some('u') => {
                let code = self.unicode_escape()?;
                out.push(self.char_from(code)?);
            }
            // Line continuation.
            Some('\r') => {
                self.eat("\n");
            }
            Some('\n') => {}
            Some(c) => out.push(c),
            None => return Err(self.error("unterminated escape sequence")),
        }
        Ok(())
    }

    fn unicode_escape(&mut self) -> Result<u32, SyntaxError> {
        if self.eat("{") {
            let len = self.rest().find('}').ok_or_else(|| self.error("unterminated unicode escape"))?;
            let code = u32::from_str_radix(&self.rest()[..len], 16)
                .map_err(|_| self.error("invalid unicode escape"))?;
            self.pos += len + 1;
            return Ok(code);
        }
        let high = self.hex_digits(4)?;
        if (0xD800..0xDC00).contains(&high) && self.eat("\\u") {
            let low = self.hex_digits(4)?;
            if (0xDC00..0xE000).contains(&low) {
                return Ok(0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00));
            }
            return Err(self.error("invalid surrogate pair"));
        }
        Ok(high)
    }

    fn hex_digits(&mut self, count: usize) -> Result<u32, SyntaxError> {
        let digits = self
            .rest()
            .get(..count)
            .filter(|d| d.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| self.error("invalid hexadecimal escape"))?;
        let code = u32::from_str_radix(digits, 16).map_err(|_| self.error("invalid hexadecimal escape"))?;
        self.pos += count;
        Ok(code)
    }

    fn char_from(&self, code: u32) -> Result<char, SyntaxError> {
        char::from_u32(code).ok_or_else(|| self.error(format!("invalid code point {:#x}", code)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use serde_json::json;

    #[test]
    fn test_parse_nested_module_with_comments_and_trailing_commas() {
        let src = indoc! {r#"
            // Generated once, edited by hand since.
            export default {
              home: {
                title: "Welcome",
                /* shown below the title */
                'sub-title': 'It\'s here',
              },
              steps: [`One`, "Two",],
            };
        "#};
        let module = parse_module(src).unwrap();
        assert_eq!(
            module.value,
            json!({
                "home": { "title": "Welcome", "sub-title": "It's here" },
                "steps": ["One", "Two"]
            })
        );
        assert!(module.prefix.ends_with("export default "));
        assert_eq!(module.suffix, ";\n");
    }

    #[test]
    fn test_parse_typed_const_with_satisfies() {
        let src = "export const fr: Record<string, string> = {\n  \"a.b\": \"x\"\n} satisfies Messages<\"fr\">;\n";
        let module = parse_module(src).unwrap();
        assert_eq!(module.prefix, "export const fr: Record<string, string> = ");
        assert_eq!(module.value, json!({ "a.b": "x" }));
        assert_eq!(module.suffix, " satisfies Messages<\"fr\">;\n");
    }

    #[test]
    fn test_bare_object_literal() {
        let module = parse_module("{ a: 'b' }").unwrap();
        assert_eq!(module.prefix, "");
        assert_eq!(module.suffix, "");
    }

    #[test]
    fn test_escapes() {
        assert_eq!(
            parse_value(r#""line\nnext é \u{1F600} 😀 \x41 \\""#).unwrap(),
            json!("line\nnext é 😀 😀 A \\")
        );
        assert_eq!(parse_value("`multi\nline`").unwrap(), json!("multi\nline"));
    }

    #[test]
    fn test_rejects_anything_executable() {
        for (src, needle) in [
            ("export default { a: t('x') }", "call to `t`"),
            ("export default { ...base }", "spread"),
            ("export default { a: 1 }", "numbers"),
            ("export default { a: true }", "booleans"),
            ("export default { a: other }", "identifier `other`"),
            ("export default { a: `hi ${name}` }", "interpolation"),
            ("export default { [key]: 'x' }", "computed"),
            ("export default { a }", "expected `:`"),
            ("export default { a: 'x' }; console.log(1)", "unexpected content"),
            ("export function f() {}", "expected `default` or `const`"),
            ("import { t } from './i18n';\nexport default {}", "only type imports"),
            ("import base from './base';\nexport default {}", "only type imports"),
            ("import { type A, b } from './x';\nexport default {}", "only type imports"),
        ] {
            let err = parse_module(src).unwrap_err();
            assert!(err.message.contains(needle), "{}: {}", src, err);
        }
    }

    #[test]
    fn test_type_imports_are_skipped() {
        let src = indoc! {"
            import type { Messages } from './types';
            import { type Locale, type Plural as P } from \"./locale\";
            import type * as Schema from './schema'

            export const en: Messages = { title: 'Hi' };
        "};
        let module = parse_module(src).unwrap();
        assert_eq!(module.value["title"], "Hi");
        assert!(module.prefix.starts_with("import type { Messages }"));
        assert!(module.prefix.ends_with("export const en: Messages = "));
    }

    #[test]
    fn test_error_position() {
        let err = parse_module("export default {\n  a: 'x',\n  b: 42,\n}").unwrap_err();
        assert_eq!((err.line, err.column), (3, 6));
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("title"));
        assert!(is_identifier("_$x1"));
        assert!(!is_identifier("sub-title"));
        assert!(!is_identifier("1st"));
        assert!(!is_identifier(""));
    }
}
