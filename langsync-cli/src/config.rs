//! Project configuration (`i18n.json` or `i18n.toml`).
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "locale": { "source": "en", "targets": ["fr", "de"] },
//!   "buckets": { "json": { "include": ["locales/[locale].json"] } },
//!   "lockFile": "i18n.lock",
//!   "batch": { "inputTokens": 16000, "outputTokens": 4000 },
//!   "concurrency": 4
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use langsync::chunk::{DEFAULT_INPUT_TOKENS, DEFAULT_OUTPUT_TOKENS};
use langsync::lock::DEFAULT_LOCK_FILE;
use langsync::{ChunkPlanner, FormatType};
use serde::{Deserialize, Deserializer, Serialize};

use crate::validation::{validate_format_id, validate_locales};

/// File names looked up in the working directory when `--config` is absent.
pub const CONFIG_FILE_NAMES: [&str; 2] = ["i18n.json", "i18n.toml"];

pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_version", deserialize_with = "version_string")]
    pub version: String,
    pub locale: LocaleConfig,
    #[serde(default)]
    pub buckets: BTreeMap<String, BucketConfig>,
    #[serde(default = "default_lock_file")]
    pub lock_file: String,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocaleConfig {
    pub source: String,
    #[serde(default)]
    pub targets: Vec<String>,
}

/// File patterns of one format. Patterns are relative to the directory of the
/// configuration file and may contain `[locale]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketConfig {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchConfig {
    #[serde(default = "default_input_tokens")]
    pub input_tokens: usize,
    #[serde(default = "default_output_tokens")]
    pub output_tokens: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_tokens: DEFAULT_INPUT_TOKENS,
            output_tokens: DEFAULT_OUTPUT_TOKENS,
        }
    }
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_lock_file() -> String {
    DEFAULT_LOCK_FILE.to_string()
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_input_tokens() -> usize {
    DEFAULT_INPUT_TOKENS
}

fn default_output_tokens() -> usize {
    DEFAULT_OUTPUT_TOKENS
}

/// Accepts `"version": "1.5"` as well as `"version": 1.5`.
fn version_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Version {
        Text(String),
        Integer(i64),
        Float(f64),
    }

    Ok(match Version::deserialize(deserializer)? {
        Version::Text(s) => s,
        Version::Integer(n) => n.to_string(),
        Version::Float(n) => n.to_string(),
    })
}

impl Config {
    /// Parses configuration text; `.toml` paths are read as TOML, everything
    /// else as JSON.
    pub fn from_str_with_path(raw: &str, path: &Path) -> Result<Self, String> {
        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        let config: Config = if is_toml {
            toml::from_str(raw).map_err(|e| format!("Invalid config {}: {}", path.display(), e))?
        } else {
            serde_json::from_str(raw)
                .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
        Self::from_str_with_path(&raw, path)
    }

    /// Finds the configuration file: `explicit` when given, else the first of
    /// [`CONFIG_FILE_NAMES`] present in `dir`.
    pub fn locate(explicit: Option<&str>, dir: &Path) -> Result<PathBuf, String> {
        if let Some(path) = explicit {
            crate::validation::validate_file_path(path)?;
            return Ok(PathBuf::from(path));
        }
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| {
                format!(
                    "No configuration found in {} (looked for {})",
                    dir.display(),
                    CONFIG_FILE_NAMES.join(", ")
                )
            })
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_locales(&self.locale.source, &self.locale.targets)?;

        for (id, bucket) in &self.buckets {
            validate_format_id(id)?;
            if bucket.include.is_empty() {
                return Err(format!("buckets.{}: include must not be empty", id));
            }
        }

        if self.concurrency == 0 {
            return Err("concurrency must be at least 1".to_string());
        }

        self.planner().validate().map_err(|e| format!("batch: {}", e))?;
        Ok(())
    }

    /// Buckets with their parsed format, ordered by format identifier.
    pub fn formats(&self) -> Result<Vec<(FormatType, &BucketConfig)>, String> {
        self.buckets
            .iter()
            .map(|(id, bucket)| Ok((validate_format_id(id)?, bucket)))
            .collect()
    }

    pub fn planner(&self) -> ChunkPlanner {
        ChunkPlanner::new(self.batch.input_tokens, self.batch.output_tokens)
    }
}
