//! Support for SubRip (`.srt`) and WebVTT (`.vtt`) subtitles.
//!
//! Every cue becomes one key, `<index>#<start>-<end>`, whose value is the cue
//! text with lines joined by `\n`. The index comes from the cue's numeric
//! identifier, or its position when it has none.

use std::collections::HashMap;

use crate::{
    error::Error,
    traits::Parser,
    types::{FlatDocument, ParseResult, SerializeContext},
};

const VTT_HEADER: &str = "WEBVTT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Srt,
    Vtt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Cue {
    index: usize,
    start: String,
    end: String,
    /// WebVTT cue settings following the end time, e.g. `align:start`.
    settings: String,
    text: String,
}

impl Cue {
    fn key(&self) -> String {
        format!("{}#{}-{}", self.index, self.start, self.end)
    }
}

#[derive(Debug, Default)]
struct Track {
    header: Option<String>,
    cues: Vec<Cue>,
}

impl Format {
    fn name(&self) -> &'static str {
        match self {
            Format::Srt => "srt",
            Format::Vtt => "vtt",
        }
    }

    fn read(&self, raw: &str) -> Result<Track, Error> {
        let normalized = raw.replace("\r\n", "\n");
        let normalized = normalized.trim_start_matches('\u{feff}');
        let mut track = Track::default();
        let mut blocks = normalized
            .split("\n\n")
            .map(|block| block.trim_matches('\n'))
            .filter(|block| !block.trim().is_empty());

        if *self == Format::Vtt {
            match blocks.next() {
                Some(first) if first.starts_with(VTT_HEADER) => {
                    track.header = first.lines().next().map(str::to_string);
                }
                Some(_) => return Err(Error::format(self.name(), "missing WEBVTT header")),
                None => return Ok(track),
            }
        }

        for block in blocks {
            if *self == Format::Vtt
                && ["NOTE", "STYLE", "REGION"]
                    .iter()
                    .any(|kw| block.starts_with(kw))
            {
                continue;
            }
            let mut lines = block.lines().peekable();
            let mut identifier = None;
            if lines.peek().is_some_and(|line| !line.contains("-->")) {
                identifier = lines.next();
            }
            let timing = lines.next().filter(|line| line.contains("-->")).ok_or_else(|| {
                Error::format(self.name(), format!("cue without timing line: `{}`", block))
            })?;
            let (start, rest) = timing
                .split_once("-->")
                .map(|(s, r)| (s.trim(), r.trim()))
                .unwrap_or_default();
            let (end, settings) = match rest.split_once(char::is_whitespace) {
                Some((end, settings)) => (end, settings.trim()),
                None => (rest, ""),
            };
            if start.is_empty() || end.is_empty() {
                return Err(Error::format(
                    self.name(),
                    format!("invalid timing line `{}`", timing),
                ));
            }
            let index = identifier
                .and_then(|id| id.trim().parse::<usize>().ok())
                .unwrap_or(track.cues.len() + 1);
            track.cues.push(Cue {
                index,
                start: start.to_string(),
                end: end.to_string(),
                settings: settings.to_string(),
                text: lines.collect::<Vec<_>>().join("\n"),
            });
        }
        Ok(track)
    }

    fn cue_from_key(&self, key: &str, text: &str) -> Result<Cue, Error> {
        let invalid = || Error::format(self.name(), format!("invalid cue key `{}`", key));
        let (index, timing) = key.split_once('#').ok_or_else(invalid)?;
        let (start, end) = timing.split_once('-').ok_or_else(invalid)?;
        Ok(Cue {
            index: index.parse().map_err(|_| invalid())?,
            start: start.to_string(),
            end: end.to_string(),
            settings: String::new(),
            text: text.to_string(),
        })
    }
}

impl Parser for Format {
    fn parse(&self, raw: &str, _locale: &str) -> Result<ParseResult, Error> {
        Ok(self
            .read(raw)?
            .cues
            .into_iter()
            .map(|cue| (cue.key(), cue.text))
            .collect::<FlatDocument>()
            .into())
    }

    fn serialize(&self, data: &FlatDocument, ctx: &SerializeContext<'_>) -> Result<String, Error> {
        let reference = ctx
            .reference()
            .and_then(|raw| self.read(raw).ok())
            .unwrap_or_default();
        let settings: HashMap<String, String> = reference
            .cues
            .iter()
            .map(|cue| (cue.key(), cue.settings.clone()))
            .collect();

        let mut blocks = Vec::with_capacity(data.len());
        for (key, text) in data {
            let mut cue = self.cue_from_key(key, text)?;
            if let Some(found) = settings.get(key) {
                cue.settings = found.clone();
            }
            let block = match self {
                Format::Srt => format!(
                    "{}\n{} --> {}\n{}",
                    cue.index,
                    cue.start,
                    cue.end,
                    cue.text
                ),
                Format::Vtt => {
                    let mut timing = format!("{} --> {}", cue.start, cue.end);
                    if !cue.settings.is_empty() {
                        timing.push(' ');
                        timing.push_str(&cue.settings);
                    }
                    format!("{}\n{}\n{}", cue.index, timing, cue.text)
                }
            };
            blocks.push(block);
        }

        let mut out = String::new();
        if *self == Format::Vtt {
            out.push_str(reference.header.as_deref().unwrap_or(VTT_HEADER));
            out.push('\n');
            if !blocks.is_empty() {
                out.push('\n');
            }
        }
        if !blocks.is_empty() {
            out.push_str(&blocks.join("\n\n"));
            out.push('\n');
        }
        Ok(out)
    }
}
