//! Small quick-xml helpers shared by the markup based formats.

use std::borrow::Cow;

use quick_xml::{
    Reader,
    escape::{escape, partial_escape, unescape},
    events::{BytesStart, Event},
};

pub(crate) const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";

/// A reader over an in-memory document that keeps whitespace intact.
pub(crate) fn reader(raw: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(raw);
    reader.config_mut().trim_text(false);
    reader
}

pub(crate) fn name_of(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

/// All attributes of an element, unescaped, in document order.
pub(crate) fn attributes(e: &BytesStart<'_>) -> Result<Vec<(String, String)>, String> {
    let mut out = Vec::new();
    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| e.to_string())?.into_owned();
        out.push((key, value));
    }
    Ok(out)
}

pub(crate) fn attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, String> {
    Ok(attributes(e)?
        .into_iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value))
}

/// Unescapes entity references, keeping the raw text when an entity is unknown.
pub(crate) fn unescape_lossy(raw: &str) -> Cow<'_, str> {
    unescape(raw).unwrap_or(Cow::Borrowed(raw))
}

/// Escapes `&`, `<` and `>` for element content.
pub(crate) fn escape_text(text: &str) -> Cow<'_, str> {
    partial_escape(text)
}

/// Escapes text for use inside a double-quoted attribute value.
pub(crate) fn escape_attribute(text: &str) -> Cow<'_, str> {
    escape(text)
}

/// Raw (still escaped) content between `start` and its matching end tag.
pub(crate) fn raw_inner<'i>(
    reader: &mut Reader<&'i [u8]>,
    start: &BytesStart<'_>,
) -> Result<Cow<'i, str>, String> {
    reader.read_text(start.name()).map_err(|e| e.to_string())
}

/// Whether `text` contains child markup that parses as a well-formed fragment,
/// in which case it can be written back verbatim.
pub(crate) fn is_markup_fragment(text: &str) -> bool {
    if !text.contains('<') {
        return false;
    }
    let wrapped = format!("<fragment>{}</fragment>", text);
    let mut reader = Reader::from_str(&wrapped);
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => return true,
            Ok(Event::Text(t)) => {
                let raw = String::from_utf8_lossy(t.as_ref()).into_owned();
                if unescape(&raw).is_err() {
                    return false;
                }
            }
            Ok(_) => {}
            Err(_) => return false,
        }
    }
}

/// Whether the text between two tags is only indentation.
pub(crate) fn is_blank(text: &[u8]) -> bool {
    text.iter().all(u8::is_ascii_whitespace)
}
