use std::collections::BTreeMap;

use langsync::flat::{flatten, unflatten};
use langsync::lock::LockStore;
use langsync::locale_path::transform;
use langsync::traits::Parser;
use langsync::{
    ChunkPlanner, FlatDocument, FormatType, PromptContext, SerializeContext, TranslationUnit,
    create_parser,
};
use proptest::prelude::*;
use serde_json::{Map, Value};

fn name_strategy() -> impl Strategy<Value = String> {
    // Includes the empty name and the characters flat keys have to escape.
    proptest::string::string_regex("[a-z0-9 _.\\[\\]\\\\-]{0,6}").expect("valid name regex")
}

fn text_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z0-9 ,.!?%@'\"]{0,20}").expect("valid text regex")
}

fn object(entries: BTreeMap<String, Value>) -> Value {
    Value::Object(entries.into_iter().collect::<Map<String, Value>>())
}

/// Nested documents with string leaves and no empty containers.
fn document_strategy() -> impl Strategy<Value = Value> {
    let tree = text_strategy()
        .prop_map(Value::String)
        .prop_recursive(3, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 1..4).prop_map(Value::Array),
                prop::collection::btree_map(name_strategy(), inner, 1..4).prop_map(object),
            ]
        });
    prop::collection::btree_map(name_strategy(), tree, 1..5)
        .prop_filter("a lone empty name holding an array reads back as a root array", |map| {
            !(map.len() == 1 && map.get("").is_some_and(Value::is_array))
        })
        .prop_map(object)
}

/// Flat documents whose keys never collide with one another's prefixes.
fn flat_strategy() -> impl Strategy<Value = BTreeMap<String, String>> {
    let key = proptest::string::string_regex("[a-z]{1,4}(\\.[a-z]{1,4}){0,2}").expect("valid key regex");
    prop::collection::btree_map(key, text_strategy(), 1..10).prop_filter(
        "no key may be the parent of another",
        |map| {
            map.keys().all(|a| {
                map.keys()
                    .all(|b| a == b || !b.starts_with(&format!("{}.", a)))
            })
        },
    )
}

fn units_strategy() -> impl Strategy<Value = Vec<TranslationUnit>> {
    prop::collection::vec(text_strategy(), 0..300).prop_map(|texts| {
        texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| TranslationUnit::new(format!("key{}", i), text, "en.json"))
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_unflatten_inverts_flatten(doc in document_strategy()) {
        let flat = flatten(&doc).unwrap();
        prop_assert_eq!(unflatten(&flat), doc);
    }

    #[test]
    fn prop_flatten_inverts_unflatten(pairs in flat_strategy()) {
        let flat: FlatDocument = pairs.clone().into_iter().collect();
        let again: BTreeMap<String, String> = flatten(&unflatten(&flat)).unwrap().into_iter().collect();
        prop_assert_eq!(again, pairs);
    }

    #[test]
    fn prop_json_round_trip(doc in document_strategy()) {
        let parser = create_parser(FormatType::Json);
        let flat = flatten(&doc).unwrap();
        let out = parser.serialize(&flat, &SerializeContext::new("fr")).unwrap();
        prop_assert_eq!(parser.parse(&out, "fr").unwrap().document, flat);
    }

    #[test]
    fn prop_chunk_plans_are_deterministic_and_ordered(
        units in units_strategy(),
        input in 2usize..50_000,
        ratio in 1usize..99,
    ) {
        let output = (input * ratio / 100).max(1);
        prop_assume!(output < input);
        let planner = ChunkPlanner::new(input, output);
        let context = PromptContext::new("en", "fr", FormatType::Json);
        let first = planner.plan_chunks(&units, &context).unwrap();
        let second = planner.plan_chunks(&units, &context).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert!((1..=100).contains(&first.chunk_size));
        prop_assert_eq!(first.chunks.concat(), units);
        prop_assert!(first.chunks.iter().all(|c| !c.is_empty() && c.len() <= first.chunk_size));
    }

    #[test]
    fn prop_transform_to_the_same_locale_is_identity(
        dirs in prop::collection::vec("[a-z]{1,8}", 0..4),
        locale in prop::sample::select(vec!["en", "fr", "pt-BR", "zh-Hans"]),
    ) {
        let relative = dirs
            .iter()
            .cloned()
            .chain([locale.to_string(), "messages.json".to_string()])
            .collect::<Vec<_>>()
            .join("/");
        let path = format!("/ws/{}", relative);
        prop_assert_eq!(transform(&path, locale, locale, "/ws"), relative);
    }
}

#[test]
fn test_lock_diff_example() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = LockStore::open(dir.path().join("i18n.lock"));
    let mut doc = FlatDocument::new();
    doc.insert("k1".to_string(), "v1".to_string());
    store.commit("en.json", &doc).unwrap();

    doc.insert("k2".to_string(), "v2".to_string());
    let changes = store.get_changes("en.json", &doc);
    assert_eq!(changes.added_keys, vec!["k2"]);
    assert!(changes.value_changes.is_empty());

    doc.insert("k1".to_string(), "v1 changed".to_string());
    let changes = store.get_changes("en.json", &doc);
    assert_eq!(changes.added_keys, vec!["k2"]);
    assert_eq!(changes.value_changes.len(), 1);
    assert_eq!(changes.value_changes[0].key, "k1");
}

#[test]
fn test_lock_is_scoped_per_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("i18n.lock");
    let mut doc = FlatDocument::new();
    doc.insert("title".to_string(), "Hello".to_string());

    let mut store = LockStore::open(&path);
    store.commit("a/en.json", &doc).unwrap();

    let reopened = LockStore::open(&path);
    assert!(reopened.get_changes("a/en.json", &doc).is_empty());
    assert_eq!(reopened.get_changes("b/en.json", &doc).added_keys, vec!["title"]);
}

#[test]
fn test_documented_path_examples() {
    assert_eq!(
        transform("/ws/content/docs/en/test.md", "en", "fr", "/ws"),
        "content/docs/fr/test.md"
    );
    assert_eq!(transform("/ws/content/ui.json", "", "fr", "/ws"), "content/ui.fr.json");
    assert_eq!(
        transform("/ws/App/en.lproj/Main.strings", "en", "fr", "/ws"),
        "App/fr.lproj/Main.strings"
    );
}
