//! Support for CSV localization tables.
//!
//! The header must name an `id` and a `value` column. Any other column is a
//! passenger: it is not translated, but it is returned as side metadata and
//! written back next to the row it came from.

use crate::{
    error::Error,
    traits::Parser,
    types::{FlatDocument, ParseResult, SerializeContext},
};

const NAME: &str = "csv";

const ID_COLUMN: &str = "id";
const VALUE_COLUMN: &str = "value";

#[derive(Debug, Clone, Copy, Default)]
pub struct Format;

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize, Error> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| Error::format(NAME, format!("missing `{}` column", name)))
}

impl Parser for Format {
    fn parse(&self, raw: &str, _locale: &str) -> Result<ParseResult, Error> {
        if raw.trim().is_empty() {
            return Ok(ParseResult::default());
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(raw.as_bytes());
        let headers = reader.headers().map_err(|e| Error::format(NAME, e))?.clone();
        let id = column_index(&headers, ID_COLUMN)?;
        let value = column_index(&headers, VALUE_COLUMN)?;
        let passengers: Vec<usize> = (0..headers.len()).filter(|i| *i != id && *i != value).collect();

        let mut result = ParseResult::default();
        result.metadata.columns = passengers.iter().map(|i| headers[*i].to_string()).collect();
        for record in reader.records() {
            let record = record.map_err(|e| Error::format(NAME, e))?;
            let Some(key) = record.get(id).filter(|k| !k.is_empty()) else {
                continue;
            };
            let text = record.get(value).unwrap_or_default();
            result.document.insert(key.to_string(), text.to_string());
            if !passengers.is_empty() {
                let extra = passengers
                    .iter()
                    .map(|i| record.get(*i).unwrap_or_default().to_string())
                    .collect();
                result.metadata.rows.insert(key.to_string(), extra);
            }
        }
        Ok(result)
    }

    fn serialize(&self, data: &FlatDocument, ctx: &SerializeContext<'_>) -> Result<String, Error> {
        let recovered;
        let metadata = match ctx.metadata {
            Some(metadata) => metadata,
            None => {
                recovered = ctx
                    .source
                    .and_then(|raw| self.parse(raw, ctx.locale).ok())
                    .map(|parsed| parsed.metadata)
                    .unwrap_or_default();
                &recovered
            }
        };

        let mut writer = csv::Writer::from_writer(Vec::new());
        let mut header = vec![ID_COLUMN, VALUE_COLUMN];
        header.extend(metadata.columns.iter().map(String::as_str));
        writer.write_record(&header).map_err(|e| Error::format(NAME, e))?;

        for (key, value) in data {
            let mut row = vec![key.as_str(), value.as_str()];
            match metadata.rows.get(key) {
                Some(extra) => {
                    row.extend(extra.iter().map(String::as_str));
                    row.resize(header.len(), "");
                }
                None => row.resize(header.len(), ""),
            }
            writer.write_record(&row).map_err(|e| Error::format(NAME, e))?;
        }

        let bytes = writer.into_inner().map_err(|e| Error::format(NAME, e))?;
        String::from_utf8(bytes).map_err(|e| Error::format(NAME, e))
    }
}
