use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use langsync::traits::Parser;
use langsync::{FormatType, LockStore, create_parser};
use serde_json::Value;
use tempfile::TempDir;

fn langsync_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("langsync"));
    cmd.current_dir(dir).env_remove("RUST_LOG");
    cmd
}

fn run(dir: &Path, args: &[&str]) -> Output {
    langsync_cmd(dir)
        .args(args)
        .output()
        .expect("Failed to execute command")
}

fn assert_success(out: &Output) {
    assert!(
        out.status.success(),
        "stdout: {}\nstderr: {}",
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
}

fn write(dir: &Path, relative: &str, content: &str) {
    let path = dir.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn read_json(dir: &Path, relative: &str) -> Value {
    let raw = fs::read_to_string(dir.join(relative)).unwrap();
    serde_json::from_str(&raw).unwrap()
}

/// A project with one JSON bucket, `en` -> `fr`.
fn json_project(source: &str) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    write(
        temp_dir.path(),
        "i18n.json",
        r#"{
            "version": "1.0",
            "locale": { "source": "en", "targets": ["fr"] },
            "buckets": { "json": { "include": ["locales/[locale].json"] } }
        }"#,
    );
    write(temp_dir.path(), "locales/en.json", source);
    temp_dir
}

#[test]
fn test_run_with_pseudo_backend_writes_target_and_lock() {
    let temp_dir = json_project(r#"{"a": "Apple", "nested": {"b": "Banana"}}"#);
    let dir = temp_dir.path();

    let out = run(dir, &["run"]);
    assert_success(&out);

    let fr = read_json(dir, "locales/fr.json");
    assert_eq!(fr["a"], "Áþþļé");
    assert_eq!(fr["nested"]["b"], "Ɓáñáñá");

    let lock = LockStore::open(dir.join("i18n.lock"));
    assert!(lock.integrity_issue().is_none());
    let hashes = lock.hashes("locales/en.json").unwrap();
    assert_eq!(hashes.len(), 2);
    assert!(hashes.contains_key("nested.b"));

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("locales/fr.json [fr]: 2 key(s) translated"), "{}", stdout);
}

#[test]
fn test_second_run_only_translates_changes() {
    let temp_dir = json_project(r#"{"a": "Apple", "b": "Banana"}"#);
    let dir = temp_dir.path();
    assert_success(&run(dir, &["run"]));

    // A hand-edited translation survives as long as its source is unchanged.
    write(dir, "locales/fr.json", "{\n  \"a\": \"Pomme\",\n  \"b\": \"Ɓáñáñá\"\n}\n");
    write(dir, "locales/en.json", r#"{"a": "Apple", "b": "Blueberry", "c": "Cherry"}"#);

    let out = run(dir, &["run"]);
    assert_success(&out);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("2 key(s) translated"), "{}", stdout);

    let fr = read_json(dir, "locales/fr.json");
    assert_eq!(fr["a"], "Pomme");
    assert_eq!(fr["b"], "Ɓļüéƀéŕŕý");
    assert_eq!(fr["c"], "Çĥéŕŕý");
}

#[test]
fn test_run_is_idempotent() {
    let temp_dir = json_project(r#"{"a": "Apple"}"#);
    let dir = temp_dir.path();
    assert_success(&run(dir, &["run"]));
    let before = fs::read_to_string(dir.join("locales/fr.json")).unwrap();

    let out = run(dir, &["run"]);
    assert_success(&out);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Translated 0 key(s); wrote 0 file(s)"), "{}", stdout);
    assert_eq!(fs::read_to_string(dir.join("locales/fr.json")).unwrap(), before);
}

#[test]
fn test_deleted_source_keys_leave_the_target() {
    let temp_dir = json_project(r#"{"a": "Apple", "b": "Banana"}"#);
    let dir = temp_dir.path();
    assert_success(&run(dir, &["run"]));

    write(dir, "locales/en.json", r#"{"a": "Apple"}"#);
    assert_success(&run(dir, &["run"]));

    let fr = read_json(dir, "locales/fr.json");
    assert_eq!(fr, serde_json::json!({"a": "Áþþļé"}));
}

#[test]
fn test_frozen_fails_when_translations_are_pending() {
    let temp_dir = json_project(r#"{"a": "Apple"}"#);
    let dir = temp_dir.path();

    let out = run(dir, &["run", "--frozen"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Frozen run: 1 key(s) in 1 file(s)"), "{}", stderr);
    assert!(!dir.join("locales/fr.json").exists());
    assert!(!dir.join("i18n.lock").exists());

    assert_success(&run(dir, &["run"]));
    assert_success(&run(dir, &["run", "--frozen"]));

    write(dir, "locales/en.json", r#"{"a": "Apricot"}"#);
    assert!(!run(dir, &["run", "--frozen"]).status.success());
}

#[test]
fn test_dry_run_writes_nothing() {
    let temp_dir = json_project(r#"{"a": "Apple", "b": "Banana"}"#);
    let dir = temp_dir.path();

    let out = run(dir, &["run", "--dry-run"]);
    assert_success(&out);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("locales/en.json -> locales/fr.json [fr]: 2 key(s) in 1 chunk(s)"), "{}", stdout);
    assert!(!dir.join("locales/fr.json").exists());
    assert!(!dir.join("i18n.lock").exists());
}

#[test]
fn test_force_retranslates_everything() {
    let temp_dir = json_project(r#"{"a": "Apple"}"#);
    let dir = temp_dir.path();
    assert_success(&run(dir, &["run"]));
    write(dir, "locales/fr.json", "{\n  \"a\": \"Pomme\"\n}\n");

    assert_success(&run(dir, &["run"]));
    assert_eq!(read_json(dir, "locales/fr.json")["a"], "Pomme");

    assert_success(&run(dir, &["run", "--force"]));
    assert_eq!(read_json(dir, "locales/fr.json")["a"], "Áþþļé");
}

#[test]
fn test_broken_source_does_not_block_siblings() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    write(
        dir,
        "i18n.json",
        r#"{"locale": {"source": "en", "targets": ["fr"]},
            "buckets": {"json": {"include": ["*/[locale].json"]}}}"#,
    );
    write(dir, "good/en.json", r#"{"a": "Apple"}"#);
    write(dir, "bad/en.json", r#"{"a": "#);

    let out = run(dir, &["run"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("bad/en.json (json):"), "{}", stderr);

    assert_eq!(read_json(dir, "good/fr.json")["a"], "Áþþļé");
    let lock = LockStore::open(dir.join("i18n.lock"));
    assert!(lock.hashes("good/en.json").is_some());
    assert!(lock.hashes("bad/en.json").is_none());
}

#[test]
fn test_corrupt_lock_file_degrades_to_full_translation() {
    let temp_dir = json_project(r#"{"a": "Apple"}"#);
    let dir = temp_dir.path();
    write(dir, "i18n.lock", "checksums: [unclosed\n");

    let out = run(dir, &["run"]);
    assert_success(&out);
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("corrupt"), "{}", stderr);
    assert_eq!(read_json(dir, "locales/fr.json")["a"], "Áþþļé");

    let lock = LockStore::open(dir.join("i18n.lock"));
    assert!(lock.integrity_issue().is_none());
    assert!(lock.hashes("locales/en.json").is_some());
}

#[test]
fn test_status_reports_changes() {
    let temp_dir = json_project(r#"{"a": "Apple", "b": "Banana"}"#);
    let dir = temp_dir.path();

    let out = run(dir, &["status", "--json"]);
    assert_success(&out);
    let body: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(body["sourceLocale"], "en");
    assert_eq!(body["files"][0]["file"], "locales/en.json");
    assert_eq!(body["files"][0]["added"], 2);

    assert_success(&run(dir, &["run"]));
    write(dir, "locales/en.json", r#"{"a": "Avocado", "c": "Cherry"}"#);

    let out = run(dir, &["status", "--json"]);
    let body: Value = serde_json::from_slice(&out.stdout).unwrap();
    let file = &body["files"][0];
    assert_eq!((file["added"].as_u64(), file["changed"].as_u64(), file["stale"].as_u64()), (Some(1), Some(1), Some(1)));

    let out = run(dir, &["status"]);
    assert_success(&out);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("locales/en.json (json): 2 key(s), added 1, changed 1, stale 1"), "{}", stdout);
}

#[test]
fn test_lockfile_records_without_translating() {
    let temp_dir = json_project(r#"{"a": "Apple"}"#);
    let dir = temp_dir.path();

    assert_success(&run(dir, &["lockfile"]));
    assert!(!dir.join("locales/fr.json").exists());
    let lock = LockStore::open(dir.join("i18n.lock"));
    assert_eq!(lock.hashes("locales/en.json").unwrap().len(), 1);

    write(dir, "locales/en.json", r#"{"a": "Apple", "b": "Banana"}"#);
    let out = run(dir, &["lockfile"]);
    assert_success(&out);
    assert!(String::from_utf8_lossy(&out.stdout).contains("already exists"));
    assert_eq!(LockStore::open(dir.join("i18n.lock")).hashes("locales/en.json").unwrap().len(), 1);

    assert_success(&run(dir, &["lockfile", "--force"]));
    assert_eq!(LockStore::open(dir.join("i18n.lock")).hashes("locales/en.json").unwrap().len(), 2);
}

#[test]
fn test_cleanup_removes_stale_keys() {
    let temp_dir = json_project(r#"{"a": "Apple", "b": "Banana"}"#);
    let dir = temp_dir.path();
    assert_success(&run(dir, &["run"]));

    // Deleting from the source alone leaves the lock and target untouched until cleanup.
    write(dir, "locales/en.json", r#"{"a": "Apple"}"#);

    let out = run(dir, &["cleanup", "--dry-run"]);
    assert_success(&out);
    assert!(String::from_utf8_lossy(&out.stdout).contains("locales/fr.json [fr]: remove b"));
    assert!(read_json(dir, "locales/fr.json").get("b").is_some());

    // stdin is not a terminal here, so confirmation is impossible.
    let out = run(dir, &["cleanup"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Refusing to delete"));

    assert_success(&run(dir, &["cleanup", "--yes"]));
    assert!(read_json(dir, "locales/fr.json").get("b").is_none());
    let lock = LockStore::open(dir.join("i18n.lock"));
    assert!(!lock.hashes("locales/en.json").unwrap().contains_key("b"));

    let out = run(dir, &["cleanup", "--yes"]);
    assert!(String::from_utf8_lossy(&out.stdout).contains("Nothing to clean up"));
}

#[test]
fn test_rekey_keeps_translations() {
    let temp_dir = json_project(r#"{"k1": "Apple"}"#);
    let dir = temp_dir.path();
    assert_success(&run(dir, &["run"]));

    write(dir, "locales/en.json", r#"{"fruit": {"apple": "Apple"}}"#);
    write(dir, "mapping.json", r#"{"k1": "fruit.apple"}"#);
    assert_success(&run(dir, &["rekey", "--mapping", "mapping.json"]));

    let raw = fs::read_to_string(dir.join("locales/fr.json")).unwrap();
    let fr = create_parser(FormatType::Json).parse(&raw, "fr").unwrap().document;
    assert_eq!(fr["fruit.apple"], "Áþþļé");
    assert!(!fr.contains_key("k1"));

    let out = run(dir, &["run", "--frozen"]);
    assert_success(&out);
}

#[test]
fn test_unknown_format_in_config_aborts() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    write(
        dir,
        "i18n.json",
        r#"{"locale": {"source": "en", "targets": ["fr"]},
            "buckets": {"docx": {"include": ["docs/[locale].docx"]}}}"#,
    );
    let out = run(dir, &["run"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("unsupported format `docx`"));
}

#[test]
fn test_missing_config_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let out = run(temp_dir.path(), &["status"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("No configuration found"));
}

#[test]
fn test_explicit_toml_config_and_locale_filter() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    write(
        dir,
        "project/langsync.toml",
        "[locale]\nsource = \"en\"\ntargets = [\"fr\", \"de\"]\n\n[buckets.properties]\ninclude = [\"[locale]/messages.properties\"]\n",
    );
    write(dir, "project/en/messages.properties", "greeting=Hello\n");

    let out = run(dir, &["run", "--config", "project/langsync.toml", "--locale", "de"]);
    assert_success(&out);
    assert!(dir.join("project/de/messages.properties").exists());
    assert!(!dir.join("project/fr/messages.properties").exists());
    let de = fs::read_to_string(dir.join("project/de/messages.properties")).unwrap();
    assert!(de.contains("greeting=Ĥéļļö"), "{}", de);

    let out = run(dir, &["run", "--config", "project/langsync.toml", "--locale", "es"]);
    assert!(!out.status.success());
}

#[test]
fn test_xcstrings_locales_share_one_file() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    write(
        dir,
        "i18n.json",
        r#"{"locale": {"source": "en", "targets": ["fr", "de"]},
            "buckets": {"xcstrings": {"include": ["App/Localizable.xcstrings"]}},
            "concurrency": 2}"#,
    );
    write(
        dir,
        "App/Localizable.xcstrings",
        r#"{
  "sourceLanguage" : "en",
  "strings" : {
    "greeting" : {
      "localizations" : {
        "en" : { "stringUnit" : { "state" : "translated", "value" : "Hello" } }
      }
    }
  },
  "version" : "1.0"
}
"#,
    );

    assert_success(&run(dir, &["run"]));
    let raw = fs::read_to_string(dir.join("App/Localizable.xcstrings")).unwrap();
    let parser = create_parser(FormatType::Xcstrings);
    assert_eq!(parser.parse(&raw, "en").unwrap().document["greeting"], "Hello");
    assert_eq!(parser.parse(&raw, "fr").unwrap().document["greeting"], "Ĥéļļö");
    assert_eq!(parser.parse(&raw, "de").unwrap().document["greeting"], "Ĥéļļö");
}

#[test]
fn test_markdown_is_translated_as_one_document() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    write(
        dir,
        "i18n.json",
        r#"{"locale": {"source": "en", "targets": ["fr"]},
            "buckets": {"markdown": {"include": ["docs/[locale]/*.md"]}}}"#,
    );
    write(dir, "docs/en/intro.md", "# Welcome\n\nRead the [docs](https://example.com).\n");

    assert_success(&run(dir, &["run"]));
    let fr = fs::read_to_string(dir.join("docs/fr/intro.md")).unwrap();
    assert!(fr.starts_with("# Ŵéļçöɱé"), "{}", fr);
    assert!(fr.contains("(https://example.com)"), "{}", fr);
}

#[cfg(unix)]
#[test]
fn test_command_backend() {
    let temp_dir = json_project(r#"{"a": "Apple", "b": "Banana"}"#);
    let dir = temp_dir.path();
    write(
        dir,
        "translate.sh",
        "#!/bin/sh\ncat > /dev/null\nprintf '{\"a\": \"Pomme\", \"b\": \"Banane\"}'\n",
    );

    let out = run(dir, &["run", "--backend", "command", "--command", "sh translate.sh"]);
    assert_success(&out);
    let fr = read_json(dir, "locales/fr.json");
    assert_eq!(fr["a"], "Pomme");
    assert_eq!(fr["b"], "Banane");

    let out = run(dir, &["run", "--backend", "command"]);
    assert!(!out.status.success());
}

#[test]
fn test_completions() {
    let temp_dir = TempDir::new().unwrap();
    let out = run(temp_dir.path(), &["completions", "bash"]);
    assert_success(&out);
    assert!(String::from_utf8_lossy(&out.stdout).contains("langsync"));
}
