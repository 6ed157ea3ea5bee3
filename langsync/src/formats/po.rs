//! Support for gettext `.po` catalogs.
//!
//! Keys are the `msgid`, prefixed with `msgctxt` and an EOT (`\u{4}`)
//! separator when a context is present, the same convention gettext uses in
//! compiled catalogs. Plural entries produce one key per form: `msgid[0]`,
//! `msgid[1]`, ... An empty `msgstr` falls back to the `msgid` (or
//! `msgid_plural` for forms past the first), which is what source catalogs
//! look like.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    error::Error,
    traits::Parser,
    types::{FlatDocument, ParseResult, SerializeContext},
};

const NAME: &str = "po";

/// Separates `msgctxt` from `msgid` in keys.
pub const CONTEXT_SEPARATOR: char = '\u{4}';

lazy_static! {
    static ref PLURAL_FORM_KEY: Regex = Regex::new(r"(?s)^(.*)\[(\d+)\]$").unwrap();
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Format;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Entry {
    comments: Vec<String>,
    msgctxt: Option<String>,
    msgid: String,
    msgid_plural: Option<String>,
    /// One string per plural form; singular entries use index 0.
    msgstr: Vec<String>,
}

impl Entry {
    fn key(&self) -> String {
        match &self.msgctxt {
            Some(ctxt) => format!("{}{}{}", ctxt, CONTEXT_SEPARATOR, self.msgid),
            None => self.msgid.clone(),
        }
    }

    fn is_header(&self) -> bool {
        self.msgid.is_empty() && self.msgctxt.is_none()
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Context,
    Id,
    IdPlural,
    Str(usize),
}

#[derive(Debug, Default)]
struct Catalog {
    header: Option<Entry>,
    entries: Vec<Entry>,
}

fn unquote(text: &str, line: usize) -> Result<String, Error> {
    let inner = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .filter(|_| text.len() >= 2)
        .ok_or_else(|| Error::format(NAME, format!("line {}: expected a quoted string", line)))?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => return Err(Error::format(NAME, format!("line {}: dangling escape", line))),
        }
    }
    Ok(out)
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
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
    out.push('"');
    out
}

fn flush(current: &mut Entry, started: &mut bool, catalog: &mut Catalog) {
    if !*started {
        return;
    }
    let entry = std::mem::take(current);
    if entry.is_header() && catalog.header.is_none() && catalog.entries.is_empty() {
        catalog.header = Some(entry);
    } else {
        catalog.entries.push(entry);
    }
    *started = false;
}

fn parse_catalog(raw: &str) -> Result<Catalog, Error> {
    let mut catalog = Catalog::default();
    let mut current = Entry::default();
    let mut started = false;
    let mut field: Option<Field> = None;

    for (index, line) in raw.lines().enumerate() {
        let number = index + 1;
        let line = line.trim();
        if line.is_empty() {
            flush(&mut current, &mut started, &mut catalog);
            field = None;
            continue;
        }
        if line.starts_with("#~") {
            continue;
        }
        if line.starts_with('#') {
            flush(&mut current, &mut started, &mut catalog);
            field = None;
            current.comments.push(line.to_string());
            continue;
        }
        if line.starts_with('"') {
            let text = unquote(line, number)?;
            match field {
                Some(Field::Context) => current.msgctxt.get_or_insert_default().push_str(&text),
                Some(Field::Id) => current.msgid.push_str(&text),
                Some(Field::IdPlural) => current.msgid_plural.get_or_insert_default().push_str(&text),
                Some(Field::Str(n)) => current.msgstr[n].push_str(&text),
                None => {
                    return Err(Error::format(
                        NAME,
                        format!("line {}: string without a keyword", number),
                    ));
                }
            }
            continue;
        }

        let (keyword, rest) = line
            .split_once(char::is_whitespace)
            .ok_or_else(|| Error::format(NAME, format!("line {}: expected a keyword", number)))?;
        let text = unquote(rest.trim(), number)?;
        if matches!(keyword, "msgctxt" | "msgid") && !current.msgstr.is_empty() {
            flush(&mut current, &mut started, &mut catalog);
        }
        started = true;
        field = Some(match keyword {
            "msgctxt" => {
                current.msgctxt = Some(text);
                Field::Context
            }
            "msgid" => {
                current.msgid = text;
                Field::Id
            }
            "msgid_plural" => {
                current.msgid_plural = Some(text);
                Field::IdPlural
            }
            "msgstr" => {
                if current.msgstr.is_empty() {
                    current.msgstr.push(String::new());
                }
                current.msgstr[0] = text;
                Field::Str(0)
            }
            other => {
                let n = other
                    .strip_prefix("msgstr[")
                    .and_then(|rest| rest.strip_suffix(']'))
                    .and_then(|n| n.parse::<usize>().ok())
                    .ok_or_else(|| {
                        Error::format(NAME, format!("line {}: unknown keyword `{}`", number, other))
                    })?;
                if current.msgstr.len() <= n {
                    current.msgstr.resize(n + 1, String::new());
                }
                current.msgstr[n] = text;
                Field::Str(n)
            }
        });
    }
    flush(&mut current, &mut started, &mut catalog);
    Ok(catalog)
}

fn to_document(catalog: &Catalog) -> FlatDocument {
    let mut document = FlatDocument::new();
    for entry in &catalog.entries {
        let key = entry.key();
        match &entry.msgid_plural {
            Some(plural) => {
                let forms = entry.msgstr.len().max(2);
                for n in 0..forms {
                    let value = entry.msgstr.get(n).filter(|s| !s.is_empty());
                    let fallback = if n == 0 { &entry.msgid } else { plural };
                    document.insert(
                        format!("{}[{}]", key, n),
                        value.unwrap_or(fallback).clone(),
                    );
                }
            }
            None => {
                let value = entry.msgstr.first().filter(|s| !s.is_empty());
                document.insert(key, value.unwrap_or(&entry.msgid).clone());
            }
        }
    }
    document
}

fn split_key(key: &str) -> (Option<String>, String) {
    match key.split_once(CONTEXT_SEPARATOR) {
        Some((ctxt, msgid)) => (Some(ctxt.to_string()), msgid.to_string()),
        None => (None, key.to_string()),
    }
}

/// Header with its `Language:` line set to `locale`.
fn header_for(reference: Option<&Entry>, locale: &str) -> Entry {
    let mut header = reference.cloned().unwrap_or_else(|| Entry {
        msgstr: vec!["Content-Type: text/plain; charset=UTF-8\n".to_string()],
        ..Entry::default()
    });
    let body = header.msgstr.first().cloned().unwrap_or_default();
    let mut lines: Vec<String> = body
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    let language = format!("Language: {}", locale);
    match lines.iter_mut().find(|line| line.starts_with("Language:")) {
        Some(line) => *line = language,
        None => lines.push(language),
    }
    header.msgstr = vec![lines.iter().map(|line| format!("{}\n", line)).collect()];
    header
}

fn write_entry(out: &mut String, entry: &Entry) {
    for comment in &entry.comments {
        out.push_str(comment);
        out.push('\n');
    }
    if let Some(ctxt) = &entry.msgctxt {
        out.push_str(&format!("msgctxt {}\n", quote(ctxt)));
    }
    out.push_str(&format!("msgid {}\n", quote(&entry.msgid)));
    match &entry.msgid_plural {
        Some(plural) => {
            out.push_str(&format!("msgid_plural {}\n", quote(plural)));
            for (n, text) in entry.msgstr.iter().enumerate() {
                out.push_str(&format!("msgstr[{}] {}\n", n, quote(text)));
            }
        }
        None if entry.is_header() => {
            out.push_str("msgstr \"\"\n");
            for line in entry.msgstr.first().into_iter().flat_map(|s| s.split_inclusive('\n')) {
                out.push_str(&quote(line));
                out.push('\n');
            }
        }
        None => {
            let text = entry.msgstr.first().map(String::as_str).unwrap_or_default();
            out.push_str(&format!("msgstr {}\n", quote(text)));
        }
    }
}

impl Parser for Format {
    fn parse(&self, raw: &str, _locale: &str) -> Result<ParseResult, Error> {
        Ok(to_document(&parse_catalog(raw)?).into())
    }

    fn serialize(&self, data: &FlatDocument, ctx: &SerializeContext<'_>) -> Result<String, Error> {
        let reference = match ctx.reference() {
            Some(raw) => parse_catalog(raw).unwrap_or_default(),
            None => Catalog::default(),
        };
        let known: HashMap<String, &Entry> = reference
            .entries
            .iter()
            .map(|entry| (entry.key(), entry))
            .collect();

        let mut entries: Vec<Entry> = Vec::new();
        let mut plural_index: HashMap<String, usize> = HashMap::new();
        for (key, value) in data {
            let plural = PLURAL_FORM_KEY.captures(key).and_then(|caps| {
                let base = caps[1].to_string();
                let n: usize = caps[2].parse().ok()?;
                let is_plural = match (known.get(key.as_str()), known.get(&base)) {
                    (Some(entry), _) if entry.msgid_plural.is_none() => false,
                    (_, Some(entry)) => entry.msgid_plural.is_some(),
                    // Plural entries always carry at least two forms.
                    _ => {
                        data.contains_key(&format!("{}[0]", base))
                            && data.contains_key(&format!("{}[1]", base))
                    }
                };
                is_plural.then_some((base, n))
            });

            match plural {
                Some((base, n)) => {
                    let index = match plural_index.get(&base) {
                        Some(index) => *index,
                        None => {
                            let (msgctxt, msgid) = split_key(&base);
                            let previous = known.get(&base);
                            entries.push(Entry {
                                comments: previous.map(|e| e.comments.clone()).unwrap_or_default(),
                                msgid_plural: Some(
                                    previous
                                        .and_then(|e| e.msgid_plural.clone())
                                        .unwrap_or_else(|| msgid.clone()),
                                ),
                                msgctxt,
                                msgid,
                                msgstr: Vec::new(),
                            });
                            plural_index.insert(base, entries.len() - 1);
                            entries.len() - 1
                        }
                    };
                    let msgstr = &mut entries[index].msgstr;
                    if msgstr.len() <= n {
                        msgstr.resize(n + 1, String::new());
                    }
                    msgstr[n] = value.clone();
                }
                None => {
                    let (msgctxt, msgid) = split_key(key);
                    entries.push(Entry {
                        comments: known.get(key).map(|e| e.comments.clone()).unwrap_or_default(),
                        msgctxt,
                        msgid,
                        msgid_plural: None,
                        msgstr: vec![value.clone()],
                    });
                }
            }
        }

        let mut out = String::new();
        write_entry(&mut out, &header_for(reference.header.as_ref(), ctx.locale));
        for entry in &entries {
            out.push('\n');
            write_entry(&mut out, entry);
        }
        Ok(out)
    }
}
