//! Translation backends.
//!
//! The engine hands a backend one chunk at a time and expects a translation
//! back for every key in it. Backends never retry; the run command does.

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use langsync::TranslationUnit;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub source_locale: String,
    pub target_locale: String,
    /// Instructions that accompany the chunk.
    pub instructions: String,
    pub units: Vec<TranslationUnit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatedUnit {
    pub key: String,
    pub translated_text: String,
}

#[async_trait]
pub trait TranslationBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn translate(&self, request: TranslateRequest) -> Result<Vec<TranslatedUnit>, String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendKind {
    /// Offline, deterministic pseudo-localization
    Pseudo,
    /// An external program speaking JSON over stdin/stdout
    Command,
}

pub fn create_backend(
    kind: BackendKind,
    command: Option<&str>,
) -> Result<Box<dyn TranslationBackend>, String> {
    match kind {
        BackendKind::Pseudo => Ok(Box::new(PseudoBackend)),
        BackendKind::Command => {
            let command = command
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| "--backend command requires --command".to_string())?;
            Ok(Box::new(CommandBackend::new(command)?))
        }
    }
}

const PLAIN_LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
const ACCENTED_LOWER: &str = "áƀçðéƒĝĥíĵķļɱñöþǫŕšţüṽŵẋýž";
const PLAIN_UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ACCENTED_UPPER: &str = "ÁƁÇÐÉƑĜĤÍĴĶĻṀÑÖÞǪŔŠŢÜṼŴẊÝŽ";

/// Replaces ASCII letters with accented look-alikes so untranslated or
/// truncated strings stand out in the UI.
#[derive(Debug, Clone, Copy, Default)]
pub struct PseudoBackend;

impl PseudoBackend {
    fn accent(c: char) -> char {
        let lookup = |plain: &str, accented: &str| {
            plain
                .chars()
                .position(|p| p == c)
                .and_then(|i| accented.chars().nth(i))
        };
        lookup(PLAIN_LOWER, ACCENTED_LOWER)
            .or_else(|| lookup(PLAIN_UPPER, ACCENTED_UPPER))
            .unwrap_or(c)
    }

    /// Pseudo-localizes `text`, leaving placeholders (`{name}`, `%d`, `%1$@`),
    /// tags, entities, code spans and link targets intact.
    pub fn pseudo_localize(text: &str) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len() * 2);
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            let protected_end = match c {
                '{' => find(&chars, i + 1, '}'),
                '<' => find(&chars, i + 1, '>'),
                '`' => find(&chars, i + 1, '`'),
                '&' => find(&chars, i + 1, ';').filter(|&end| {
                    end - i <= 10 && chars[i + 1..end].iter().all(|c| c.is_ascii_alphanumeric() || *c == '#')
                }),
                '%' => format_specifier_end(&chars, i),
                '(' if i > 0 && chars[i - 1] == ']' => find(&chars, i + 1, ')'),
                _ => None,
            };
            match protected_end {
                Some(end) => {
                    out.extend(&chars[i..=end]);
                    i = end + 1;
                }
                None => {
                    out.push(Self::accent(c));
                    i += 1;
                }
            }
        }
        out
    }

    /// Pseudo-localizes a unit. Plural bundles arrive as JSON objects; only
    /// their string leaves are localized, and `NSString*` entries (format
    /// keys, spec and value types) are left alone.
    pub fn pseudo_localize_unit(text: &str) -> String {
        if !text.trim_start().starts_with('{') {
            return Self::pseudo_localize(text);
        }
        match serde_json::from_str::<Map<String, Value>>(text) {
            Ok(mut bundle) => {
                Self::localize_leaves(&mut bundle);
                Value::Object(bundle).to_string()
            }
            Err(_) => Self::pseudo_localize(text),
        }
    }

    fn localize_leaves(map: &mut Map<String, Value>) {
        for (key, value) in map.iter_mut() {
            if key.starts_with("NSString") {
                continue;
            }
            match value {
                Value::String(s) => *s = Self::pseudo_localize(s),
                Value::Object(inner) => Self::localize_leaves(inner),
                _ => {}
            }
        }
    }
}

fn find(chars: &[char], from: usize, target: char) -> Option<usize> {
    chars[from.min(chars.len())..]
        .iter()
        .position(|&c| c == target)
        .map(|offset| from + offset)
}

// %d, %@, %1$s, %.2f, %lld, %%
fn format_specifier_end(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < chars.len() && (chars[i].is_ascii_digit() || matches!(chars[i], '$' | '.' | '-' | '+')) {
        i += 1;
    }
    while i < chars.len() && matches!(chars[i], 'l' | 'h' | 'z' | 'q') {
        i += 1;
    }
    match chars.get(i) {
        Some(c) if c.is_ascii_alphabetic() || *c == '@' || *c == '%' => Some(i),
        _ => None,
    }
}

#[async_trait]
impl TranslationBackend for PseudoBackend {
    fn name(&self) -> &str {
        "pseudo"
    }

    async fn translate(&self, request: TranslateRequest) -> Result<Vec<TranslatedUnit>, String> {
        Ok(request
            .units
            .into_iter()
            .map(|unit| TranslatedUnit {
                translated_text: Self::pseudo_localize_unit(&unit.source_text),
                key: unit.key,
            })
            .collect())
    }
}

/// Runs an external program once per chunk. The request is written to its
/// stdin as JSON; it must print a `{ "key": "translation" }` object.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    program: String,
    args: Vec<String>,
}

impl CommandBackend {
    pub fn new(command: &str) -> Result<Self, String> {
        let mut words = command.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| "Backend command cannot be empty".to_string())?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }
}

#[async_trait]
impl TranslationBackend for CommandBackend {
    fn name(&self) -> &str {
        &self.program
    }

    async fn translate(&self, request: TranslateRequest) -> Result<Vec<TranslatedUnit>, String> {
        let payload = serde_json::to_vec(&request)
            .map_err(|e| format!("Failed to encode backend request: {}", e))?;

        debug!(
            "running {} for {} unit(s) ({} -> {})",
            self.program,
            request.units.len(),
            request.source_locale,
            request.target_locale
        );
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("Failed to start backend '{}': {}", self.program, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A program that exits without reading is judged by its exit status.
            if let Err(e) = stdin.write_all(&payload).await {
                if e.kind() != io::ErrorKind::BrokenPipe {
                    return Err(format!("Failed to write to backend '{}': {}", self.program, e));
                }
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| format!("Backend '{}' failed: {}", self.program, e))?;
        if !output.status.success() {
            return Err(format!(
                "Backend '{}' exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        let reply: Map<String, Value> = serde_json::from_slice(&output.stdout)
            .map_err(|e| format!("Backend '{}' returned invalid JSON: {}", self.program, e))?;

        let mut translated = Vec::with_capacity(request.units.len());
        for unit in request.units {
            match reply.get(&unit.key) {
                Some(Value::String(text)) => translated.push(TranslatedUnit {
                    key: unit.key,
                    translated_text: text.clone(),
                }),
                Some(other) => warn!(
                    "backend '{}' returned a non-string value for `{}`: {}",
                    self.program, unit.key, other
                ),
                None => {}
            }
        }
        Ok(translated)
    }
}
