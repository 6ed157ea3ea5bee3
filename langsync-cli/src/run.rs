//! The `run` command: translate what changed since the last run.
//!
//! Every (source file, target locale) pair is an independent job. Jobs run
//! concurrently up to the configured limit; the fingerprints of a source file
//! are committed by whichever of its jobs finishes last, and only when all of
//! them succeeded.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use langsync::traits::Parser;
use langsync::{
    ChunkPlanner, FlatDocument, LocalePair, LockStore, PromptContext, SerializeContext,
    SharedLockStore, TranslationUnit, create_parser,
};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info};

use crate::backend::{BackendKind, TranslateRequest, TranslationBackend, create_backend};
use crate::path_glob::relative_to;
use crate::validation::validate_output_path;
use crate::workspace::{LoadedSource, Workspace, read_existing};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config: Option<String>,
    pub locales: Vec<String>,
    pub backend: BackendKind,
    pub command: Option<String>,
    pub force: bool,
    pub frozen: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub jobs: usize,
    pub translated_keys: usize,
    pub written: Vec<PathBuf>,
    pub committed_files: usize,
    pub failures: Vec<String>,
}

/// One (source file, target locale) unit of work.
#[derive(Debug, Clone)]
struct Job {
    source: Arc<LoadedSource>,
    locales: LocalePair,
    target: PathBuf,
    /// Keys to send to the backend, in source order.
    keys: Vec<String>,
    /// Whether the target file differs from what this run would write even
    /// without translating anything (new file, deleted keys).
    needs_write: bool,
}

impl Job {
    fn is_pending(&self) -> bool {
        !self.keys.is_empty() || self.needs_write
    }
}

#[derive(Debug, Default)]
struct FileProgress {
    remaining: AtomicUsize,
    failed: AtomicBool,
}

#[derive(Debug)]
struct JobReport {
    translated: usize,
    wrote: bool,
}

/// Decides, per source file and locale, which keys need translating.
/// Returns the jobs and the errors of files that could not be planned.
fn plan_jobs(
    workspace: &Workspace,
    lock: &LockStore,
    sources: Vec<LoadedSource>,
    locales: &[String],
    force: bool,
) -> (Vec<Job>, Vec<String>) {
    let source_locale = workspace.source_locale();
    let mut jobs = Vec::new();
    let mut failures = Vec::new();

    for source in sources {
        let source = Arc::new(source);
        let document = &source.parsed.document;
        let changed: HashSet<&String> = if force {
            document.keys().collect()
        } else {
            lock.get_changes(&source.file.relative, document)
                .keys_in(document)
                .into_iter()
                .collect()
        };

        let mut file_jobs = Vec::new();
        let planned: Result<(), String> = locales.iter().try_for_each(|locale| {
            let target = workspace.target_path(&source.file, locale)?;
            let existing = read_existing(&target)?;
            let existing_doc = match &existing {
                Some(raw) => {
                    source
                        .file
                        .parser()
                        .parse(raw, locale)
                        .map_err(|e| {
                            source.file.describe_error(format!(
                                "target {}: {}",
                                relative_to(&workspace.root, &target),
                                e
                            ))
                        })?
                        .document
                }
                None => FlatDocument::new(),
            };

            let keys: Vec<String> = document
                .keys()
                .filter(|key| changed.contains(key) || !existing_doc.contains_key(*key))
                .cloned()
                .collect();
            let needs_write = existing.is_none()
                || existing_doc.keys().any(|key| !document.contains_key(key));

            file_jobs.push(Job {
                source: Arc::clone(&source),
                locales: LocalePair::new(source_locale, locale.as_str()),
                target,
                keys,
                needs_write,
            });
            Ok(())
        });

        match planned {
            Ok(()) => jobs.extend(file_jobs),
            Err(e) => failures.push(e),
        }
    }

    (jobs, failures)
}

fn print_plan(workspace: &Workspace, jobs: &[Job], planner: &ChunkPlanner) -> Result<(), String> {
    for job in jobs.iter().filter(|j| j.is_pending()) {
        let units = units_for(job);
        let context = prompt_context(job);
        let plan = planner
            .plan_chunks(&units, &context)
            .map_err(|e| e.to_string())?;
        println!(
            "{} -> {} [{}]: {} key(s) in {} chunk(s)",
            job.source.file.relative,
            relative_to(&workspace.root, &job.target),
            job.locales.target,
            units.len(),
            plan.chunks.len()
        );
    }
    Ok(())
}

fn units_for(job: &Job) -> Vec<TranslationUnit> {
    TranslationUnit::from_document(
        &job.source.file.relative,
        &job.source.parsed.document,
        job.keys.iter(),
    )
}

fn prompt_context(job: &Job) -> PromptContext {
    PromptContext::new(
        job.locales.source.as_str(),
        job.locales.target.as_str(),
        job.source.file.format,
    )
}

async fn request_all(
    backend: &dyn TranslationBackend,
    job: &Job,
    chunks: Vec<Vec<TranslationUnit>>,
    translated: &mut HashMap<String, String>,
) -> Result<(), String> {
    let instructions = prompt_context(job).preamble();
    for units in chunks {
        let reply = backend
            .translate(TranslateRequest {
                source_locale: job.locales.source.clone(),
                target_locale: job.locales.target.clone(),
                instructions: instructions.clone(),
                units,
            })
            .await
            .map_err(|e| job.source.file.describe_error(e))?;
        translated.extend(reply.into_iter().map(|u| (u.key, u.translated_text)));
    }
    Ok(())
}

async fn execute(
    job: &Job,
    backend: &dyn TranslationBackend,
    planner: ChunkPlanner,
    write_guard: &Mutex<()>,
) -> Result<JobReport, String> {
    if !job.is_pending() {
        return Ok(JobReport {
            translated: 0,
            wrote: false,
        });
    }

    let file = &job.source.file;
    let units = units_for(job);
    let plan = planner
        .plan_chunks(&units, &prompt_context(job))
        .map_err(|e| file.describe_error(e))?;

    let mut translated: HashMap<String, String> = HashMap::new();
    request_all(backend, job, plan.chunks, &mut translated).await?;

    // One more request for whatever the backend skipped.
    let missing: Vec<TranslationUnit> = units
        .iter()
        .filter(|u| !translated.contains_key(&u.key))
        .cloned()
        .collect();
    if !missing.is_empty() {
        debug!(
            "retrying {} untranslated key(s) of {} [{}]",
            missing.len(),
            file.relative,
            job.locales.target
        );
        request_all(backend, job, vec![missing], &mut translated).await?;
        let still_missing: Vec<&str> = units
            .iter()
            .filter(|u| !translated.contains_key(&u.key))
            .map(|u| u.key.as_str())
            .collect();
        if !still_missing.is_empty() {
            return Err(file.describe_error(format!(
                "no {} translation for {} key(s): {}",
                job.locales.target,
                still_missing.len(),
                still_missing.join(", ")
            )));
        }
    }

    // Multi-locale files are shared by every job of the file.
    let _guard = write_guard.lock().await;
    let parser = create_parser(file.format);
    let existing = read_existing(&job.target)?;
    let existing_doc = match &existing {
        Some(raw) => parser
            .parse(raw, &job.locales.target)
            .map_err(|e| file.describe_error(e))?
            .document,
        None => FlatDocument::new(),
    };

    let merged: FlatDocument = job
        .source
        .parsed
        .document
        .iter()
        .map(|(key, source_text)| {
            let value = translated
                .get(key)
                .or_else(|| existing_doc.get(key))
                .unwrap_or(source_text);
            (key.clone(), value.clone())
        })
        .collect();

    let mut ctx = SerializeContext::new(&job.locales.target)
        .with_source_locale(&job.locales.source)
        .with_source(&job.source.raw);
    match &existing {
        Some(raw) => ctx = ctx.with_original(raw),
        None if !job.source.parsed.metadata.is_empty() => {
            ctx = ctx.with_metadata(&job.source.parsed.metadata)
        }
        None => {}
    }
    let output = parser
        .serialize(&merged, &ctx)
        .map_err(|e| file.describe_error(e))?;

    let wrote = existing.as_deref() != Some(output.as_str());
    if wrote {
        validate_output_path(&job.target)?;
        std::fs::write(&job.target, output)
            .map_err(|e| file.describe_error(format!("cannot write {}: {}", job.target.display(), e)))?;
    }

    Ok(JobReport {
        translated: units.len(),
        wrote,
    })
}

pub async fn run_translate_command(opts: RunOptions) -> Result<RunSummary, String> {
    let workspace = Workspace::load(opts.config.as_deref())?;
    let locales = workspace.target_locales(&opts.locales)?;
    let planner = workspace.config.planner();
    planner.validate().map_err(|e| e.to_string())?;

    if locales.is_empty() {
        println!("No target locales configured; nothing to do");
        return Ok(RunSummary::default());
    }

    let (sources, mut failures) = workspace.load_sources()?;
    let lock_store = workspace.open_lock();
    let (jobs, plan_failures) = plan_jobs(&workspace, &lock_store, sources, &locales, opts.force);
    failures.extend(plan_failures);
    for failure in &failures {
        eprintln!("❌ {}", failure);
    }

    let pending: Vec<&Job> = jobs.iter().filter(|j| j.is_pending()).collect();
    let pending_keys: usize = pending.iter().map(|j| j.keys.len()).sum();

    if opts.frozen {
        if !pending.is_empty() {
            let files: HashSet<&str> = pending
                .iter()
                .map(|j| j.source.file.relative.as_str())
                .collect();
            return Err(format!(
                "Frozen run: {} key(s) in {} file(s) need translation; run without --frozen",
                pending_keys,
                files.len()
            ));
        }
        if !failures.is_empty() {
            return Err(format!("{} file(s) failed", failures.len()));
        }
        println!("✅ Everything is up to date");
        return Ok(RunSummary::default());
    }

    if opts.dry_run {
        print_plan(&workspace, &jobs, &planner)?;
        println!(
            "Dry-run mode: {} key(s) across {} job(s) would be translated; no files were written",
            pending_keys,
            pending.len()
        );
        return Ok(RunSummary {
            jobs: pending.len(),
            failures,
            ..RunSummary::default()
        });
    }

    let backend: Arc<dyn TranslationBackend> =
        Arc::from(create_backend(opts.backend, opts.command.as_deref())?);
    let lock = SharedLockStore::new(lock_store);
    let semaphore = Arc::new(Semaphore::new(workspace.config.concurrency));

    let mut progress: HashMap<String, Arc<FileProgress>> = HashMap::new();
    let mut write_guards: HashMap<PathBuf, Arc<Mutex<()>>> = HashMap::new();
    for job in &jobs {
        progress
            .entry(job.source.file.relative.clone())
            .or_default()
            .remaining
            .fetch_add(1, Ordering::SeqCst);
        write_guards.entry(job.target.clone()).or_default();
    }

    info!(
        "running {} job(s) with backend {} (concurrency {})",
        jobs.len(),
        backend.name(),
        workspace.config.concurrency
    );

    let mut handles = Vec::with_capacity(jobs.len());
    for job in jobs {
        let backend = Arc::clone(&backend);
        let semaphore = Arc::clone(&semaphore);
        let lock = lock.clone();
        let file_progress = Arc::clone(&progress[&job.source.file.relative]);
        let guard = Arc::clone(&write_guards[&job.target]);
        let root = workspace.root.clone();

        handles.push(tokio::spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => execute(&job, backend.as_ref(), planner, &guard).await,
                Err(e) => Err(e.to_string()),
            };
            let target = relative_to(&root, &job.target);
            match &result {
                Ok(report) if report.translated > 0 => println!(
                    "✅ {} [{}]: {} key(s) translated",
                    target, job.locales.target, report.translated
                ),
                Ok(report) if report.wrote => {
                    println!("✅ {} [{}]: updated", target, job.locales.target)
                }
                Ok(_) => debug!("{} [{}] is up to date", target, job.locales.target),
                Err(_) => file_progress.failed.store(true, Ordering::SeqCst),
            }

            let mut lock_error = None;
            let last = file_progress.remaining.fetch_sub(1, Ordering::SeqCst) == 1;
            if last && !file_progress.failed.load(Ordering::SeqCst) {
                let file = &job.source.file.relative;
                match lock.commit(file, &job.source.parsed.document) {
                    Ok(()) => debug!("committed fingerprints of {}", file),
                    Err(e) => lock_error = Some(e.to_string()),
                }
            }
            (job, result, last, lock_error)
        }));
    }

    let mut summary = RunSummary {
        jobs: handles.len(),
        failures,
        ..RunSummary::default()
    };
    for handle in handles {
        let (job, result, last, lock_error) = handle.await.map_err(|e| e.to_string())?;
        match result {
            Ok(report) => {
                summary.translated_keys += report.translated;
                if report.wrote {
                    summary.written.push(job.target.clone());
                }
            }
            Err(e) => {
                eprintln!("❌ {}", e);
                summary.failures.push(e);
            }
        }
        if let Some(e) = lock_error {
            // The translations are on disk; the next run recomputes the diff.
            eprintln!("⚠️  {}: could not update the lock file: {}", job.source.file.relative, e);
        } else if last && !progress[&job.source.file.relative].failed.load(Ordering::SeqCst) {
            summary.committed_files += 1;
        }
    }

    println!(
        "Translated {} key(s); wrote {} file(s); {} failure(s)",
        summary.translated_keys,
        summary.written.len(),
        summary.failures.len()
    );
    if !summary.failures.is_empty() {
        return Err(format!("{} failure(s); see above", summary.failures.len()));
    }
    Ok(summary)
}
