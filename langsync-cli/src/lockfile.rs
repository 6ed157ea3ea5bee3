use crate::workspace::Workspace;

/// Record the fingerprints of the current source files without translating
/// anything. An existing lock file is only replaced with `force`.
pub fn run_lockfile_command(config: Option<&str>, force: bool) -> Result<usize, String> {
    let workspace = Workspace::load(config)?;
    let lock_path = workspace.lock_path();

    if lock_path.exists() && !force {
        println!(
            "Lock file {} already exists; use --force to regenerate it",
            lock_path.display()
        );
        return Ok(0);
    }

    let (sources, failures) = workspace.load_sources()?;
    for failure in &failures {
        eprintln!("❌ {}", failure);
    }

    let mut lock = workspace.open_lock();
    let stale: Vec<String> = lock
        .files()
        .filter(|file| !sources.iter().any(|s| s.file.relative == *file))
        .map(str::to_string)
        .collect();
    for file in &stale {
        let keys: Vec<String> = lock
            .hashes(file)
            .map(|hashes| hashes.keys().cloned().collect())
            .unwrap_or_default();
        lock.remove_keys(file, &keys).map_err(|e| e.to_string())?;
    }

    let mut keys = 0;
    for source in &sources {
        lock.commit(&source.file.relative, &source.parsed.document)
            .map_err(|e| e.to_string())?;
        keys += source.parsed.document.len();
    }

    println!(
        "✅ Recorded {} key(s) from {} file(s) in {}",
        keys,
        sources.len(),
        lock_path.display()
    );
    if failures.is_empty() {
        Ok(sources.len())
    } else {
        Err(format!("{} file(s) could not be read", failures.len()))
    }
}
