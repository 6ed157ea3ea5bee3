use std::collections::HashSet;
use std::path::{Path, PathBuf};

use langsync::locale_path::{LOCALE_PLACEHOLDER, expand_locale_placeholder, transform};
use langsync::traits::{Parser, read_to_string};
use langsync::{FormatParser, FormatType, LockStore, ParseResult, create_parser};
use tracing::{debug, warn};

use crate::config::Config;
use crate::path_glob::{expand_patterns, relative_to};

/// A loaded configuration and the directory its paths are relative to.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub config: Config,
}

/// A source-locale file claimed by a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// `/`-separated path relative to the workspace root; the lock file key.
    pub relative: String,
    pub format: FormatType,
    /// Whether the include pattern carried `[locale]`. Files matched without
    /// it get the target locale inserted into their file name.
    pub localized_path: bool,
}

/// A parsed source file.
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub file: SourceFile,
    pub raw: String,
    pub parsed: ParseResult,
}

impl SourceFile {
    pub fn parser(&self) -> FormatParser {
        create_parser(self.format)
    }

    /// `<file> (<format>): <message>`
    pub fn describe_error(&self, message: impl std::fmt::Display) -> String {
        format!("{} ({}): {}", self.relative, self.format, message)
    }
}

impl Workspace {
    /// Locates and loads the configuration. `explicit` is the `--config`
    /// argument; without it the current directory is searched.
    pub fn load(explicit: Option<&str>) -> Result<Self, String> {
        let cwd = std::env::current_dir()
            .map_err(|e| format!("Cannot determine current directory: {}", e))?;
        let path = Config::locate(explicit, &cwd)?;
        let config = Config::load(&path)?;
        let root = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => cwd,
        };
        debug!("loaded {} (root {})", path.display(), root.display());
        Ok(Self { root, config })
    }

    pub fn source_locale(&self) -> &str {
        &self.config.locale.source
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(&self.config.lock_file)
    }

    /// Opens the lock store, reporting a discarded lock file on stderr.
    pub fn open_lock(&self) -> LockStore {
        let lock = LockStore::open(self.lock_path());
        if let Some(issue) = lock.integrity_issue() {
            eprintln!("⚠️  {}; every key will be treated as new", issue);
        }
        lock
    }

    /// Target locales to process: all configured ones, or the `requested`
    /// subset, which must be configured.
    pub fn target_locales(&self, requested: &[String]) -> Result<Vec<String>, String> {
        let configured = &self.config.locale.targets;
        if requested.is_empty() {
            return Ok(configured.clone());
        }
        requested
            .iter()
            .map(|locale| {
                configured
                    .iter()
                    .find(|c| langsync::locale_path::same_locale(c, locale))
                    .cloned()
                    .ok_or_else(|| format!("Locale '{}' is not a configured target", locale))
            })
            .collect()
    }

    /// Every source-locale file matched by the buckets, in bucket then path
    /// order. A file matched by two buckets belongs to the first.
    pub fn source_files(&self) -> Result<Vec<SourceFile>, String> {
        let source = self.source_locale();
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut files = Vec::new();

        for (format, bucket) in self.config.formats()? {
            for pattern in &bucket.include {
                let localized_path = pattern.contains(LOCALE_PLACEHOLDER);
                let include = [expand_locale_placeholder(pattern, source)];
                let exclude: Vec<String> = bucket
                    .exclude
                    .iter()
                    .map(|p| expand_locale_placeholder(p, source))
                    .collect();

                for path in expand_patterns(&self.root, &include, &exclude)? {
                    if !seen.insert(path.clone()) {
                        warn!("{} is matched by more than one pattern", path.display());
                        continue;
                    }
                    files.push(SourceFile {
                        relative: relative_to(&self.root, &path),
                        path,
                        format,
                        localized_path,
                    });
                }
            }
        }
        debug!("found {} source file(s)", files.len());
        Ok(files)
    }

    /// Where the `locale` version of `file` lives. Multi-locale formats keep
    /// every locale in the source file itself.
    pub fn target_path(&self, file: &SourceFile, locale: &str) -> Result<PathBuf, String> {
        if file.format.is_multi_locale() {
            return Ok(file.path.clone());
        }
        let source_locale = if file.localized_path { self.source_locale() } else { "" };
        let relative = transform(&file.path, source_locale, locale, &self.root);
        if relative == file.relative {
            return Err(file.describe_error(format!(
                "cannot derive a {} path; add [locale] to the include pattern",
                locale
            )));
        }
        Ok(self.root.join(relative))
    }

    /// Reads and parses a source file in the source locale.
    pub fn load_source(&self, file: &SourceFile) -> Result<LoadedSource, String> {
        let raw = read_to_string(&file.path).map_err(|e| file.describe_error(e))?;
        let parsed = file
            .parser()
            .parse(&raw, self.source_locale())
            .map_err(|e| file.describe_error(e))?;
        Ok(LoadedSource {
            file: file.clone(),
            raw,
            parsed,
        })
    }

    /// Every source file that loads, plus the errors of those that do not.
    pub fn load_sources(&self) -> Result<(Vec<LoadedSource>, Vec<String>), String> {
        let mut loaded = Vec::new();
        let mut failures = Vec::new();
        for file in self.source_files()? {
            match self.load_source(&file) {
                Ok(source) => loaded.push(source),
                Err(e) => failures.push(e),
            }
        }
        Ok((loaded, failures))
    }
}

/// Existing content of a target file, if any.
pub fn read_existing(path: &Path) -> Result<Option<String>, String> {
    if !path.is_file() {
        return Ok(None);
    }
    read_to_string(path)
        .map(Some)
        .map_err(|e| format!("Cannot read {}: {}", path.display(), e))
}
