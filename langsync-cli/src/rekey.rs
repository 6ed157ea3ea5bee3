use std::collections::{HashMap, HashSet};

use langsync::flat::rekey;
use langsync::traits::Parser;
use langsync::SerializeContext;

use crate::validation::validate_file_path;
use crate::workspace::{Workspace, read_existing};

#[derive(Debug, Clone, Default)]
pub struct RekeyOptions {
    /// JSON file mapping original keys to new ones.
    pub mapping: String,
    /// Restrict the rename to one source file (relative to the workspace root).
    pub file: Option<String>,
    pub dry_run: bool,
}

/// Reads a `{ "originalKey": "newKey" }` mapping.
pub fn load_mapping(path: &str) -> Result<HashMap<String, String>, String> {
    validate_file_path(path)?;
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read mapping {}: {}", path, e))?;
    let mapping: HashMap<String, String> = serde_json::from_str(&raw)
        .map_err(|e| format!("Invalid mapping {}: expected an object of strings ({})", path, e))?;

    let mut targets = HashSet::new();
    for (old, new) in &mapping {
        if old.is_empty() || new.is_empty() {
            return Err(format!("Invalid mapping {}: keys cannot be empty", path));
        }
        if !targets.insert(new) {
            return Err(format!(
                "Invalid mapping {}: more than one key is renamed to `{}`",
                path, new
            ));
        }
    }
    Ok(mapping)
}

/// Renames keys in the lock file and in existing target files, so renamed
/// source keys keep their translations.
pub fn run_rekey_command(config: Option<&str>, opts: RekeyOptions) -> Result<(), String> {
    let workspace = Workspace::load(config)?;
    let mapping = load_mapping(&opts.mapping)?;
    let mut lock = workspace.open_lock();

    let files: Vec<String> = lock
        .files()
        .filter(|file| opts.file.as_deref().is_none_or(|only| only == *file))
        .map(str::to_string)
        .collect();
    if let Some(only) = &opts.file {
        if files.is_empty() {
            return Err(format!("{} has no entries in the lock file", only));
        }
    }

    let mut renamed_in_lock = 0;
    let mut renamed_in_targets = 0;
    for source in workspace
        .source_files()?
        .into_iter()
        .filter(|s| files.contains(&s.relative))
    {
        let parser = source.parser();
        for locale in &workspace.config.locale.targets {
            let path = workspace.target_path(&source, locale)?;
            let Some(original) = read_existing(&path)? else {
                continue;
            };
            let document = parser
                .parse(&original, locale)
                .map_err(|e| source.describe_error(e))?
                .document;
            let hits = document.keys().filter(|k| mapping.contains_key(*k)).count();
            if hits == 0 {
                continue;
            }
            println!("{} [{}]: {} key(s) renamed", path.display(), locale, hits);
            renamed_in_targets += hits;
            if opts.dry_run {
                continue;
            }
            // Multi-locale files may have been rewritten by the previous locale.
            let current = read_existing(&path)?.unwrap_or(original);
            let ctx = SerializeContext::new(locale)
                .with_source_locale(workspace.source_locale())
                .with_original(&current);
            let output = parser
                .serialize(&rekey(&document, &mapping), &ctx)
                .map_err(|e| source.describe_error(e))?;
            std::fs::write(&path, output)
                .map_err(|e| format!("Cannot write {}: {}", path.display(), e))?;
        }
    }

    for file in &files {
        let hits = lock
            .hashes(file)
            .map(|hashes| hashes.keys().filter(|k| mapping.contains_key(*k)).count())
            .unwrap_or(0);
        if hits == 0 {
            continue;
        }
        println!("{}: {} fingerprint(s) renamed", file, hits);
        renamed_in_lock += if opts.dry_run {
            hits
        } else {
            lock.rename_keys(file, &mapping).map_err(|e| e.to_string())?
        };
    }

    if opts.dry_run {
        println!("Dry-run mode: no files were changed");
    }
    println!(
        "✅ Renamed {} fingerprint(s) and {} translated key(s)",
        renamed_in_lock, renamed_in_targets
    );
    Ok(())
}
