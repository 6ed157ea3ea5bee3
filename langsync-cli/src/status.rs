use serde::Serialize;
use serde_json::json;

use crate::workspace::Workspace;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStatus {
    pub file: String,
    pub format: String,
    pub keys: usize,
    pub added: usize,
    pub changed: usize,
    pub stale: usize,
}

impl FileStatus {
    pub fn is_clean(&self) -> bool {
        self.added == 0 && self.changed == 0 && self.stale == 0
    }
}

/// Per source file counts of added, changed and stale keys.
pub fn collect_status(workspace: &Workspace) -> Result<(Vec<FileStatus>, Vec<String>), String> {
    let lock = workspace.open_lock();
    let (sources, failures) = workspace.load_sources()?;

    let statuses = sources
        .iter()
        .map(|source| {
            let file = &source.file.relative;
            let document = &source.parsed.document;
            let changes = lock.get_changes(file, document);
            FileStatus {
                file: file.clone(),
                format: source.file.format.to_string(),
                keys: document.len(),
                added: changes.added_keys.len(),
                changed: changes.value_changes.len(),
                stale: lock.stale_keys(file, document).len(),
            }
        })
        .collect();
    Ok((statuses, failures))
}

pub fn run_status_command(config: Option<&str>, json_output: bool) -> Result<(), String> {
    let workspace = Workspace::load(config)?;
    let (statuses, failures) = collect_status(&workspace)?;

    if json_output {
        let body = json!({
            "sourceLocale": workspace.source_locale(),
            "targetLocales": workspace.config.locale.targets,
            "files": statuses,
            "errors": failures,
        });
        let text = serde_json::to_string_pretty(&body)
            .map_err(|e| format!("Failed to serialize status JSON: {}", e))?;
        println!("{}", text);
    } else {
        println!("=== Status ===");
        println!(
            "Locales: {} -> {}",
            workspace.source_locale(),
            workspace.config.locale.targets.join(", ")
        );
        println!("Source files: {}", statuses.len());
        for status in &statuses {
            let marker = if status.is_clean() { "✓" } else { "•" };
            println!(
                "{} {} ({}): {} key(s), added {}, changed {}, stale {}",
                marker,
                status.file,
                status.format,
                status.keys,
                status.added,
                status.changed,
                status.stale
            );
        }
        for failure in &failures {
            eprintln!("❌ {}", failure);
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(format!("{} file(s) could not be read", failures.len()))
    }
}
