//! Naming rules shared by variants, source sets, and tasks.

use crate::error::VariantError;

/// Upper-case the first character of `s`.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lower-case the first character of `s`.
pub fn decapitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Join the alphanumeric runs of `s`, each capitalized.
///
/// `"com.android.support appcompat-v7 22.0.0"` becomes
/// `"ComAndroidSupportAppcompatV72200"`.
pub fn camel_case(s: &str) -> String {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(capitalize)
        .collect()
}

/// Reject build type and flavor names that clash with generated names.
///
/// `kind` is `"build type"` or `"flavor"` and only appears in the error.
///
/// # Errors
/// Returns `VariantError::ReservedName` when `name` starts with
/// `androidTest` or `test`, or equals `lint`.
pub fn check_name(kind: &'static str, name: &str) -> Result<(), VariantError> {
    let reason = if name.starts_with("androidTest") {
        "start with 'androidTest'"
    } else if name.starts_with("test") {
        "start with 'test'"
    } else if name == "lint" {
        "be 'lint'"
    } else {
        return Ok(());
    };
    Err(VariantError::ReservedName {
        kind,
        name: name.to_owned(),
        reason,
    })
}

/// Configuration name for `source_set` with the given role suffix.
///
/// The `main` source set owns the bare role (`compile`); every other source
/// set prefixes it (`freeCompile`, `androidTestCompile`).
pub fn configuration_name(source_set: &str, role: &str) -> String {
    if source_set == "main" {
        decapitalize(role)
    } else {
        format!("{source_set}{}", capitalize(role))
    }
}
