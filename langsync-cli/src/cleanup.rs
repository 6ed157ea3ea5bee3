//! The `cleanup` command: delete keys that no longer exist in the source.
//!
//! Keys are removed from every target file and from the lock file. Nothing is
//! deleted without confirmation, and confirmation needs a terminal unless
//! `--yes` is given.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use langsync::traits::Parser;
use langsync::{FlatDocument, LockStore, SerializeContext};

use crate::path_glob::relative_to;
use crate::workspace::{LoadedSource, Workspace, read_existing};

#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupOptions {
    pub yes: bool,
    pub dry_run: bool,
}

/// Keys to delete from one target file.
#[derive(Debug, Clone)]
struct TargetCleanup {
    locale: String,
    path: PathBuf,
    kept: FlatDocument,
    removed: Vec<String>,
}

#[derive(Debug, Clone)]
struct FileCleanup {
    source: LoadedSource,
    /// Fingerprinted keys gone from the source.
    stale: Vec<String>,
    targets: Vec<TargetCleanup>,
}

impl FileCleanup {
    fn is_empty(&self) -> bool {
        self.stale.is_empty() && self.targets.is_empty()
    }
}

fn plan_cleanup(
    workspace: &Workspace,
    lock: &LockStore,
    sources: Vec<LoadedSource>,
) -> (Vec<FileCleanup>, Vec<String>) {
    let mut plans = Vec::new();
    let mut failures = Vec::new();

    'files: for source in sources {
        let document = &source.parsed.document;
        let stale = lock.stale_keys(&source.file.relative, document);
        let parser = source.file.parser();

        let mut targets = Vec::new();
        for locale in &workspace.config.locale.targets {
            let path = match workspace.target_path(&source.file, locale) {
                Ok(path) => path,
                Err(e) => {
                    failures.push(e);
                    continue 'files;
                }
            };
            let original = match read_existing(&path) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    failures.push(source.file.describe_error(e));
                    continue 'files;
                }
            };
            let parsed = match parser.parse(&original, locale) {
                Ok(parsed) => parsed.document,
                Err(e) => {
                    failures.push(source.file.describe_error(e));
                    continue 'files;
                }
            };

            let (kept, removed): (Vec<_>, Vec<_>) = parsed
                .into_iter()
                .partition(|(key, _)| document.contains_key(key));
            if removed.is_empty() {
                continue;
            }
            targets.push(TargetCleanup {
                locale: locale.clone(),
                path,
                kept: kept.into_iter().collect(),
                removed: removed.into_iter().map(|(key, _)| key).collect(),
            });
        }

        let plan = FileCleanup {
            source,
            stale,
            targets,
        };
        if !plan.is_empty() {
            plans.push(plan);
        }
    }
    (plans, failures)
}

fn confirm(prompt: &str) -> Result<bool, String> {
    if !atty::is(atty::Stream::Stdin) {
        return Err(
            "Refusing to delete keys without confirmation: stdin is not a terminal (pass --yes)"
                .to_string(),
        );
    }
    print!("{} [y/N] ", prompt);
    io::stdout().flush().map_err(|e| e.to_string())?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .map_err(|e| format!("Failed to read answer: {}", e))?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn apply(
    workspace: &Workspace,
    lock: &mut LockStore,
    plans: &[FileCleanup],
) -> Result<(usize, usize), String> {
    let mut removed_from_targets = 0;
    let mut removed_from_lock = 0;

    for plan in plans {
        let file = &plan.source.file;
        let parser = file.parser();
        for target in &plan.targets {
            // Re-read: every locale of a multi-locale file writes the same path.
            let original = read_existing(&target.path)?.unwrap_or_default();
            let ctx = SerializeContext::new(&target.locale)
                .with_source_locale(workspace.source_locale())
                .with_original(&original)
                .with_source(&plan.source.raw);
            let output = parser
                .serialize(&target.kept, &ctx)
                .map_err(|e| file.describe_error(e))?;
            std::fs::write(&target.path, output)
                .map_err(|e| format!("Cannot write {}: {}", target.path.display(), e))?;
            removed_from_targets += target.removed.len();
        }
        removed_from_lock += lock
            .remove_keys(&file.relative, &plan.stale)
            .map_err(|e| e.to_string())?;
    }
    Ok((removed_from_targets, removed_from_lock))
}

pub fn run_cleanup_command(config: Option<&str>, opts: CleanupOptions) -> Result<(), String> {
    let workspace = Workspace::load(config)?;
    let (sources, mut failures) = workspace.load_sources()?;
    let mut lock = workspace.open_lock();
    let (plans, plan_failures) = plan_cleanup(&workspace, &lock, sources);
    failures.extend(plan_failures);
    for failure in &failures {
        eprintln!("❌ {}", failure);
    }

    if plans.is_empty() {
        println!("Nothing to clean up");
        return Ok(());
    }

    for plan in &plans {
        if !plan.stale.is_empty() {
            println!(
                "{}: {} stale key(s) in the lock file: {}",
                plan.source.file.relative,
                plan.stale.len(),
                plan.stale.join(", ")
            );
        }
        for target in &plan.targets {
            println!(
                "{} [{}]: remove {}",
                relative_to(&workspace.root, &target.path),
                target.locale,
                target.removed.join(", ")
            );
        }
    }

    if opts.dry_run {
        println!("Dry-run mode: no files were changed");
        return Ok(());
    }

    if !opts.yes && !confirm("Delete these keys?")? {
        println!("Aborted; nothing was deleted");
        return Ok(());
    }

    let (from_targets, from_lock) = apply(&workspace, &mut lock, &plans)?;
    println!(
        "✅ Removed {} key(s) from target files and {} from the lock file",
        from_targets, from_lock
    );
    Ok(())
}
