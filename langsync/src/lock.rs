//! Fingerprints of translated source strings, used to translate only what
//! changed since the last successful run.
//!
//! The lock file is YAML:
//!
//! ```yaml
//! version: 1
//! checksums:
//!   locales/en.json:
//!     home.title: 9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08
//! ```
//!
//! Unknown top-level fields are ignored on read and written back untouched.

use std::{
    collections::{BTreeMap, HashMap},
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::{error::Error, types::FlatDocument};

pub const DEFAULT_LOCK_FILE: &str = "i18n.lock";
pub const LOCK_VERSION: u32 = 1;

const HEADER: &str = "# This file is generated by langsync. Do not edit it by hand.\n";

/// SHA-256 of `value`, hex encoded.
pub fn content_hash(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LockFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    checksums: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_yaml::Value>,
}

fn default_version() -> u32 {
    LOCK_VERSION
}

impl Default for LockFile {
    fn default() -> Self {
        LockFile {
            version: LOCK_VERSION,
            checksums: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueChange {
    pub key: String,
    pub old_hash: String,
    pub new_hash: String,
}

/// Keys of a document that need translating, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Changes {
    pub added_keys: Vec<String>,
    pub value_changes: Vec<ValueChange>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.added_keys.is_empty() && self.value_changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added_keys.len() + self.value_changes.len()
    }

    /// Added and changed keys together, following the order of `document`.
    pub fn keys_in<'a>(&self, document: &'a FlatDocument) -> Vec<&'a String> {
        document
            .keys()
            .filter(|key| {
                self.added_keys.contains(key) || self.value_changes.iter().any(|c| &c.key == *key)
            })
            .collect()
    }
}

#[derive(Debug)]
pub struct LockStore {
    path: PathBuf,
    data: LockFile,
    integrity_issue: Option<String>,
}

impl LockStore {
    /// Loads the lock file at `path`.
    ///
    /// A missing file gives an empty store. An unreadable or corrupt one is
    /// logged and also treated as empty, so every key counts as added; the
    /// problem stays available through [`LockStore::integrity_issue`].
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut store = LockStore {
            path,
            data: LockFile::default(),
            integrity_issue: None,
        };
        let raw = match fs::read_to_string(&store.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return store,
            Err(e) => {
                store.degrade(e.to_string());
                return store;
            }
        };
        if raw.trim().is_empty() {
            return store;
        }
        match serde_yaml::from_str::<LockFile>(&raw) {
            Ok(data) => store.data = data,
            Err(e) => store.degrade(e.to_string()),
        }
        store
    }

    fn degrade(&mut self, message: String) {
        warn!(
            "ignoring lock file {}: {}; every key will be treated as new",
            self.path.display(),
            message
        );
        self.integrity_issue = Some(message);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The reason the lock file was discarded on open, if it was.
    pub fn integrity_issue(&self) -> Option<Error> {
        self.integrity_issue.as_ref().map(|message| Error::LockIntegrity {
            path: self.path.clone(),
            message: message.clone(),
        })
    }

    /// Source files that have fingerprints.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.data.checksums.keys().map(String::as_str)
    }

    pub fn hashes(&self, file: &str) -> Option<&BTreeMap<String, String>> {
        self.data.checksums.get(file)
    }

    /// Compares `document` against the stored fingerprints of `file`.
    /// Keys that are stored but gone from the document are not reported; see
    /// [`LockStore::stale_keys`].
    pub fn get_changes(&self, file: &str, document: &FlatDocument) -> Changes {
        let stored = self.data.checksums.get(file);
        let mut changes = Changes::default();
        for (key, value) in document {
            let new_hash = content_hash(value);
            match stored.and_then(|hashes| hashes.get(key)) {
                None => changes.added_keys.push(key.clone()),
                Some(old_hash) if *old_hash != new_hash => changes.value_changes.push(ValueChange {
                    key: key.clone(),
                    old_hash: old_hash.clone(),
                    new_hash,
                }),
                Some(_) => {}
            }
        }
        changes
    }

    /// Keys with a fingerprint that no longer exist in `document`.
    pub fn stale_keys(&self, file: &str, document: &FlatDocument) -> Vec<String> {
        self.data
            .checksums
            .get(file)
            .map(|hashes| {
                hashes
                    .keys()
                    .filter(|key| !document.contains_key(*key))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Replaces the fingerprints of `file` with those of `document` and
    /// persists the store. On failure nothing changes, in memory or on disk.
    pub fn commit(&mut self, file: &str, document: &FlatDocument) -> Result<(), Error> {
        let hashes = document
            .iter()
            .map(|(key, value)| (key.clone(), content_hash(value)))
            .collect();
        self.transaction(|data| {
            data.checksums.insert(file.to_string(), hashes);
        })?;
        debug!("committed {} fingerprint(s) for {}", document.len(), file);
        Ok(())
    }

    /// Drops the fingerprints of `keys` and persists. Returns how many existed.
    pub fn remove_keys(&mut self, file: &str, keys: &[String]) -> Result<usize, Error> {
        let mut removed = 0;
        self.transaction(|data| {
            if let Some(hashes) = data.checksums.get_mut(file) {
                for key in keys {
                    removed += usize::from(hashes.remove(key).is_some());
                }
                if hashes.is_empty() {
                    data.checksums.remove(file);
                }
            }
        })?;
        Ok(removed)
    }

    /// Moves fingerprints from old to new keys and persists. Returns how
    /// many keys were renamed.
    pub fn rename_keys(
        &mut self,
        file: &str,
        mapping: &HashMap<String, String>,
    ) -> Result<usize, Error> {
        let mut renamed = 0;
        self.transaction(|data| {
            if let Some(hashes) = data.checksums.get_mut(file) {
                for (old, new) in mapping {
                    if let Some(hash) = hashes.remove(old) {
                        hashes.insert(new.clone(), hash);
                        renamed += 1;
                    }
                }
            }
        })?;
        Ok(renamed)
    }

    fn transaction(&mut self, change: impl FnOnce(&mut LockFile)) -> Result<(), Error> {
        let snapshot = self.data.clone();
        change(&mut self.data);
        if let Err(e) = self.persist() {
            self.data = snapshot;
            return Err(e);
        }
        Ok(())
    }

    /// Writes to a temporary file next to the lock file, then renames it over.
    fn persist(&self) -> Result<(), Error> {
        let yaml = serde_yaml::to_string(&self.data).map_err(io::Error::other)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let temp = temp_path(&self.path);
        let written = (|| -> io::Result<()> {
            let mut file = File::create(&temp)?;
            file.write_all(HEADER.as_bytes())?;
            file.write_all(yaml.as_bytes())?;
            file.sync_all()?;
            drop(file);
            fs::rename(&temp, &self.path)
        })();
        if let Err(e) = written {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_LOCK_FILE.to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
}

/// A [`LockStore`] shared between concurrent workers. Every call holds the
/// lock for its whole duration, so commits never interleave.
#[derive(Debug, Clone)]
pub struct SharedLockStore(Arc<Mutex<LockStore>>);

impl SharedLockStore {
    pub fn new(store: LockStore) -> Self {
        SharedLockStore(Arc::new(Mutex::new(store)))
    }

    pub fn lock(&self) -> MutexGuard<'_, LockStore> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_changes(&self, file: &str, document: &FlatDocument) -> Changes {
        self.lock().get_changes(file, document)
    }

    pub fn commit(&self, file: &str, document: &FlatDocument) -> Result<(), Error> {
        self.lock().commit(file, document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn doc(pairs: &[(&str, &str)]) -> FlatDocument {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_content_hash_is_sha256_hex() {
        assert_eq!(
            content_hash("test"),
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = tempdir().unwrap();
        let store = LockStore::open(dir.path().join("i18n.lock"));
        assert!(store.integrity_issue().is_none());
        assert_eq!(store.files().count(), 0);
        let changes = store.get_changes("en.json", &doc(&[("a", "1")]));
        assert_eq!(changes.added_keys, vec!["a"]);
    }

    #[test]
    fn test_added_and_changed_keys() {
        let dir = tempdir().unwrap();
        let mut store = LockStore::open(dir.path().join("i18n.lock"));
        store.commit("en.json", &doc(&[("k1", "v1")])).unwrap();

        let changes = store.get_changes("en.json", &doc(&[("k1", "v1"), ("k2", "v2")]));
        assert_eq!(changes.added_keys, vec!["k2"]);
        assert!(changes.value_changes.is_empty());

        let changes = store.get_changes("en.json", &doc(&[("k1", "v1 edited"), ("k2", "v2")]));
        assert_eq!(changes.added_keys, vec!["k2"]);
        assert_eq!(
            changes.value_changes,
            vec![ValueChange {
                key: "k1".to_string(),
                old_hash: content_hash("v1"),
                new_hash: content_hash("v1 edited"),
            }]
        );
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn test_commit_persists_and_reopens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/i18n.lock");
        let mut store = LockStore::open(&path);
        store.commit("en.json", &doc(&[("a", "1"), ("b", "2")])).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with(HEADER));
        assert!(raw.contains("version: 1"));

        let reopened = LockStore::open(&path);
        assert!(reopened.get_changes("en.json", &doc(&[("a", "1"), ("b", "2")])).is_empty());
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_stale_keys_are_reported_separately() {
        let dir = tempdir().unwrap();
        let mut store = LockStore::open(dir.path().join("i18n.lock"));
        store.commit("en.json", &doc(&[("a", "1"), ("gone", "x")])).unwrap();
        let current = doc(&[("a", "1")]);
        assert!(store.get_changes("en.json", &current).is_empty());
        assert_eq!(store.stale_keys("en.json", &current), vec!["gone"]);

        assert_eq!(store.remove_keys("en.json", &["gone".to_string()]).unwrap(), 1);
        assert!(store.stale_keys("en.json", &current).is_empty());
    }

    #[test]
    fn test_corrupt_file_degrades_to_all_added() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("i18n.lock");
        fs::write(&path, "checksums: [not, a, map\n").unwrap();
        let mut store = LockStore::open(&path);
        match store.integrity_issue() {
            Some(Error::LockIntegrity { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected: {:?}", other),
        }
        let changes = store.get_changes("en.json", &doc(&[("a", "1")]));
        assert_eq!(changes.added_keys, vec!["a"]);

        store.commit("en.json", &doc(&[("a", "1")])).unwrap();
        assert!(LockStore::open(&path).integrity_issue().is_none());
    }

    #[test]
    fn test_unknown_fields_survive_a_commit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("i18n.lock");
        fs::write(&path, "version: 1\nchecksums: {}\nfuture:\n  field: true\n").unwrap();
        let mut store = LockStore::open(&path);
        assert!(store.integrity_issue().is_none());
        store.commit("en.json", &doc(&[("a", "1")])).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("future:"));
    }

    #[test]
    fn test_failed_commit_rolls_back() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();
        let mut store = LockStore::open(blocker.join("i18n.lock"));
        assert!(store.commit("en.json", &doc(&[("a", "1")])).is_err());
        assert_eq!(
            store.get_changes("en.json", &doc(&[("a", "1")])).added_keys,
            vec!["a"]
        );
    }

    #[test]
    fn test_rename_keys() {
        let dir = tempdir().unwrap();
        let mut store = LockStore::open(dir.path().join("i18n.lock"));
        store.commit("en.json", &doc(&[("text_1", "Save")])).unwrap();
        let mapping = HashMap::from([("text_1".to_string(), "toolbar.save".to_string())]);
        assert_eq!(store.rename_keys("en.json", &mapping).unwrap(), 1);
        assert!(store
            .get_changes("en.json", &doc(&[("toolbar.save", "Save")]))
            .is_empty());
    }

    #[test]
    fn test_shared_store_commits_from_threads() {
        let dir = tempdir().unwrap();
        let shared = SharedLockStore::new(LockStore::open(dir.path().join("i18n.lock")));
        std::thread::scope(|scope| {
            for i in 0..8 {
                let shared = shared.clone();
                scope.spawn(move || {
                    let file = format!("file{}.json", i);
                    shared.commit(&file, &doc(&[("k", "v")])).unwrap();
                });
            }
        });
        let reopened = LockStore::open(dir.path().join("i18n.lock"));
        assert_eq!(reopened.files().count(), 8);
    }
}
