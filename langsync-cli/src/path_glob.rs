use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use rayon::prelude::*;

fn has_glob_meta(s: &str) -> bool {
    s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
}

// Static directory prefix before the first glob meta-character
fn static_prefix_dir(root: &Path, pattern: &str) -> PathBuf {
    let idx = pattern
        .bytes()
        .position(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
        .unwrap_or(pattern.len());
    let prefix = &pattern[..idx];
    let dir = match prefix.rfind('/') {
        Some(slash) => &prefix[..slash],
        None => "",
    };
    root.join(dir)
}

fn build_set(patterns: &[String]) -> Result<GlobSet, String> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        // literal_separator keeps `*` from matching across '/'
        let glob = GlobBuilder::new(pat.trim_start_matches("./"))
            .literal_separator(true)
            .build()
            .map_err(|e| format!("Invalid glob pattern '{}': {}", pat, e))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| format!("Failed to build glob set: {}", e))
}

/// `/`-separated path of `path` relative to `root`.
pub fn relative_to(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Expand include patterns (relative to `root`) into the files they match,
/// minus those matched by an exclude pattern. Uses ignore + globset for fast,
/// parallel, .gitignore-aware traversal; literal paths are kept even when
/// ignored. The result is sorted and free of duplicates.
pub fn expand_patterns(
    root: &Path,
    include: &[String],
    exclude: &[String],
) -> Result<Vec<PathBuf>, String> {
    let include_set = build_set(include)?;
    let exclude_set = build_set(exclude)?;

    let mut found: BTreeSet<PathBuf> = BTreeSet::new();

    // Literal patterns need no walk
    for pat in include.iter().filter(|p| !has_glob_meta(p)) {
        let path = root.join(pat.trim_start_matches("./"));
        if path.is_file() {
            found.insert(path);
        }
    }

    // Collect unique roots to minimize directory walks
    let mut roots: Vec<PathBuf> = Vec::new();
    for pat in include.iter().filter(|p| has_glob_meta(p)) {
        let dir = static_prefix_dir(root, pat.trim_start_matches("./"));
        if dir.is_dir() && !roots.iter().any(|r| dir.starts_with(r)) {
            roots.retain(|r| !r.starts_with(&dir));
            roots.push(dir);
        }
    }

    // Walk roots in parallel and match files against the GlobSet
    let walked: Vec<PathBuf> = roots
        .par_iter()
        .map(|walk_root| {
            let mut out: Vec<PathBuf> = Vec::new();
            let walker = WalkBuilder::new(walk_root)
                .git_ignore(true)
                .git_global(true)
                .git_exclude(true)
                .hidden(false)
                .ignore(true)
                .parents(true)
                .build();

            for dent in walker {
                let Ok(dent) = dent else { continue };
                if !dent.file_type().is_some_and(|t| t.is_file()) {
                    continue;
                }
                let relative = relative_to(root, dent.path());
                if include_set.is_match(&relative) {
                    out.push(dent.into_path());
                }
            }
            out
        })
        .flatten()
        .collect();
    found.extend(walked);

    Ok(found
        .into_iter()
        .filter(|path| !exclude_set.is_match(relative_to(root, path)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "{}").unwrap();
    }

    fn names(root: &Path, paths: &[PathBuf]) -> Vec<String> {
        paths.iter().map(|p| relative_to(root, p)).collect()
    }

    #[test]
    fn test_expand_literal_and_glob() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "locales/en.json");
        touch(root, "docs/en/intro.md");
        touch(root, "docs/en/guide/setup.md");
        touch(root, "docs/fr/intro.md");

        let found = expand_patterns(root, &["locales/en.json".to_string()], &[]).unwrap();
        assert_eq!(names(root, &found), vec!["locales/en.json"]);

        let found = expand_patterns(root, &["docs/en/*.md".to_string()], &[]).unwrap();
        assert_eq!(names(root, &found), vec!["docs/en/intro.md"]);

        let found = expand_patterns(root, &["docs/en/**/*.md".to_string()], &[]).unwrap();
        assert_eq!(names(root, &found), vec!["docs/en/guide/setup.md", "docs/en/intro.md"]);
    }

    #[test]
    fn test_exclude_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "docs/en/intro.md");
        touch(root, "docs/en/draft.md");

        let found = expand_patterns(
            root,
            &["docs/en/*.md".to_string(), "missing.json".to_string()],
            &["docs/en/draft.md".to_string()],
        )
        .unwrap();
        assert_eq!(names(root, &found), vec!["docs/en/intro.md"]);
    }

    #[test]
    fn test_invalid_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let err = expand_patterns(dir.path(), &["docs/{en".to_string()], &[]).unwrap_err();
        assert!(err.contains("Invalid glob pattern"));
    }
}
