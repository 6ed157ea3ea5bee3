//! Maps a source-locale file path to the path of its target-locale sibling.
//!
//! Locale codes compare case-insensitively with `-` and `_` treated alike,
//! and always as whole tags: `en` never matches `english` or `en-US`.

use std::{
    path::{Component, Path},
    str::FromStr,
};

use unic_langid::LanguageIdentifier;

use crate::error::Error;

/// Placeholder for the locale code in include patterns.
pub const LOCALE_PLACEHOLDER: &str = "[locale]";

const BUNDLE_SUFFIX: &str = ".lproj";

/// Validates a locale code and returns its canonical BCP-47 form
/// (`zh_hans_cn` becomes `zh-Hans-CN`).
///
/// ```rust
/// use langsync::locale_path::normalize_locale;
///
/// assert_eq!(normalize_locale("pt_br").unwrap(), "pt-BR");
/// assert!(normalize_locale("not a locale").is_err());
/// ```
pub fn normalize_locale(code: &str) -> Result<String, Error> {
    let canonical = code.trim().replace('_', "-");
    LanguageIdentifier::from_str(&canonical)
        .map(|id| id.to_string())
        .map_err(|_| Error::InvalidLocale(code.to_string()))
}

/// Whether two locale codes name the same tag.
pub fn same_locale(a: &str, b: &str) -> bool {
    !a.is_empty() && a.replace('_', "-").eq_ignore_ascii_case(&b.replace('_', "-"))
}

/// Substitutes every `[locale]` in an include pattern.
pub fn expand_locale_placeholder(pattern: &str, locale: &str) -> String {
    pattern.replace(LOCALE_PLACEHOLDER, locale)
}

/// Computes where the `target_locale` version of `source_path` lives, as a
/// `/`-separated path relative to `workspace_root`.
///
/// Rules, first match wins:
/// 1. a path segment equal to the source locale is replaced;
/// 2. a `<locale>.lproj` bundle directory is renamed;
/// 3. a dot-delimited locale part of the file name (`ui.en.json`, `en.json`)
///    is replaced, or, when `source_locale` is empty, the target locale is
///    inserted before the extension;
/// 4. otherwise the path is returned unchanged.
///
/// ```rust
/// use langsync::locale_path::transform;
///
/// assert_eq!(transform("/ws/content/docs/en/test.md", "en", "fr", "/ws"), "content/docs/fr/test.md");
/// assert_eq!(transform("/ws/content/ui.json", "", "fr", "/ws"), "content/ui.fr.json");
/// assert_eq!(transform("/ws/App/en.lproj/Main.strings", "en", "fr", "/ws"), "App/fr.lproj/Main.strings");
/// ```
pub fn transform(
    source_path: impl AsRef<Path>,
    source_locale: &str,
    target_locale: &str,
    workspace_root: impl AsRef<Path>,
) -> String {
    let mut segments = relative_segments(source_path.as_ref(), workspace_root.as_ref());

    let mut replaced = false;
    for segment in segments.iter_mut() {
        if same_locale(segment, source_locale) {
            *segment = target_locale.to_string();
            replaced = true;
        }
    }
    if replaced {
        return segments.join("/");
    }

    for segment in segments.iter_mut() {
        let Some(stem) = strip_suffix_ignore_case(segment, BUNDLE_SUFFIX) else {
            continue;
        };
        if same_locale(stem, source_locale) {
            let suffix = segment[stem.len()..].to_string();
            *segment = format!("{}{}", target_locale, suffix);
            return segments.join("/");
        }
    }

    if let Some(file_name) = segments.last_mut() {
        if let Some(renamed) = replace_file_infix(file_name, source_locale, target_locale) {
            *file_name = renamed;
        }
    }
    segments.join("/")
}

fn relative_segments(path: &Path, root: &Path) -> Vec<String> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect()
}

fn strip_suffix_ignore_case<'a>(text: &'a str, suffix: &str) -> Option<&'a str> {
    let split = text.len().checked_sub(suffix.len())?;
    let (stem, tail) = (text.get(..split)?, text.get(split..)?);
    (tail.eq_ignore_ascii_case(suffix) && !stem.is_empty()).then_some(stem)
}

fn replace_file_infix(file_name: &str, source_locale: &str, target_locale: &str) -> Option<String> {
    let mut parts: Vec<&str> = file_name.split('.').collect();
    if source_locale.is_empty() {
        if parts.len() == 1 || parts[0].is_empty() {
            return Some(format!("{}.{}", file_name, target_locale));
        }
        parts.insert(parts.len() - 1, target_locale);
        return Some(parts.join("."));
    }
    // The extension itself is never a locale.
    let candidates = parts.len().saturating_sub(1);
    let index = (0..candidates).find(|i| same_locale(parts[*i], source_locale))?;
    parts[index] = target_locale;
    Some(parts.join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_segment() {
        assert_eq!(
            transform("/ws/content/docs/en/test.md", "en", "fr", "/ws"),
            "content/docs/fr/test.md"
        );
        assert_eq!(
            transform("/ws/locales/EN_us/app.json", "en-US", "de-DE", "/ws"),
            "locales/de-DE/app.json"
        );
    }

    #[test]
    fn test_complex_tags_match_whole() {
        assert_eq!(
            transform("/ws/i18n/zh-Hans-CN/app.json", "zh-Hans-CN", "ja", "/ws"),
            "i18n/ja/app.json"
        );
        assert_eq!(
            transform("/ws/i18n/zh-Hans-CN/app.json", "zh", "ja", "/ws"),
            "i18n/zh-Hans-CN/app.json"
        );
    }

    #[test]
    fn test_no_substring_matches() {
        assert_eq!(
            transform("/ws/english/entry.md", "en", "fr", "/ws"),
            "english/entry.md"
        );
        assert_eq!(
            transform("/ws/docs/en-guide.md", "en", "fr", "/ws"),
            "docs/en-guide.md"
        );
    }

    #[test]
    fn test_lproj_bundle() {
        assert_eq!(
            transform("/ws/App/en.lproj/Main.strings", "en", "fr", "/ws"),
            "App/fr.lproj/Main.strings"
        );
        assert_eq!(
            transform("/ws/App/zh_Hans.LPROJ/Main.strings", "zh-Hans", "pt-BR", "/ws"),
            "App/pt-BR.LPROJ/Main.strings"
        );
    }

    #[test]
    fn test_file_name_infix() {
        assert_eq!(
            transform("/ws/content/ui.en.json", "en", "fr", "/ws"),
            "content/ui.fr.json"
        );
        assert_eq!(transform("/ws/messages/en.json", "en", "es", "/ws"), "messages/es.json");
        assert_eq!(transform("/ws/en", "en", "es", "/ws"), "es");
    }

    #[test]
    fn test_insertion_without_source_locale() {
        assert_eq!(
            transform("/ws/content/ui.json", "", "fr", "/ws"),
            "content/ui.fr.json"
        );
        assert_eq!(
            transform("/ws/app.config.json", "", "fr", "/ws"),
            "app.config.fr.json"
        );
        assert_eq!(transform("/ws/LICENSE", "", "fr", "/ws"), "LICENSE.fr");
    }

    #[test]
    fn test_locale_agnostic_path_is_unchanged() {
        assert_eq!(
            transform("/ws/content/strings.json", "en", "fr", "/ws"),
            "content/strings.json"
        );
        assert_eq!(transform("relative/x.po", "en", "fr", "/ws"), "relative/x.po");
    }

    #[test]
    fn test_normalize_locale() {
        assert_eq!(normalize_locale("en").unwrap(), "en");
        assert_eq!(normalize_locale("zh_hans_cn").unwrap(), "zh-Hans-CN");
        match normalize_locale("english please") {
            Err(Error::InvalidLocale(code)) => assert_eq!(code, "english please"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_expand_locale_placeholder() {
        assert_eq!(
            expand_locale_placeholder("locales/[locale]/*.json", "en"),
            "locales/en/*.json"
        );
        assert_eq!(expand_locale_placeholder("docs/**/*.md", "en"), "docs/**/*.md");
    }
}
