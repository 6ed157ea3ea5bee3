use std::path::Path;

use langsync::FormatType;
use unic_langid::LanguageIdentifier;

/// Validate file path exists and is readable
pub fn validate_file_path(path: &str) -> Result<(), String> {
    let path_obj = Path::new(path);

    if !path_obj.exists() {
        return Err(format!("File does not exist: {}", path));
    }

    if !path_obj.is_file() {
        return Err(format!("Path is not a file: {}", path));
    }

    Ok(())
}

/// Validate output directory exists or can be created
pub fn validate_output_path(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Cannot create output directory: {}", e))?;
        }
    }

    Ok(())
}

/// Validate a locale code the same way the library does (BCP 47 via unic-langid).
pub fn validate_locale_code(lang: &str) -> Result<(), String> {
    if lang.trim().is_empty() {
        return Err("Locale code cannot be empty".to_string());
    }

    match lang.replace('_', "-").parse::<LanguageIdentifier>() {
        Ok(id) if !id.language.is_empty() => Ok(()),
        _ => Err(format!(
            "Invalid locale code: {}. Expected a BCP 47 language identifier",
            lang
        )),
    }
}

/// Validate a bucket name names a supported format.
pub fn validate_format_id(id: &str) -> Result<FormatType, String> {
    id.parse::<FormatType>().map_err(|e| {
        let supported = FormatType::ALL
            .iter()
            .map(|f| f.id())
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}. Supported formats: {}", e, supported)
    })
}

/// Validate the source and target locales of a project.
pub fn validate_locales(source: &str, targets: &[String]) -> Result<(), String> {
    validate_locale_code(source).map_err(|e| format!("locale.source: {}", e))?;

    for (i, target) in targets.iter().enumerate() {
        validate_locale_code(target).map_err(|e| format!("locale.targets[{}]: {}", i, e))?;
        if langsync::locale_path::same_locale(source, target) {
            return Err(format!(
                "locale.targets[{}]: target locale '{}' is the source locale",
                i, target
            ));
        }
        if targets[..i]
            .iter()
            .any(|other| langsync::locale_path::same_locale(other, target))
        {
            return Err(format!(
                "locale.targets[{}]: duplicate target locale '{}'",
                i, target
            ));
        }
    }

    Ok(())
}
