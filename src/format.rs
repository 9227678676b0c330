//! Input format classification.

use crate::model::{FormatToken, ACCEPTED_UPLOAD_EXTENSIONS};
use std::path::Path;

fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Map a file name to the engine's format token.
///
/// Total: unknown or missing extensions degrade to [`FormatToken::Test`].
pub fn classify(file_name: &str) -> FormatToken {
    match extension_of(file_name).as_deref() {
        Some("csv") => FormatToken::Csv,
        Some("xml") => FormatToken::Fhir,
        _ => FormatToken::Test,
    }
}

impl FormatToken {
    /// Resolve a presentation-supplied hint. Explicit tokens win; an empty,
    /// `auto` or unrecognised hint falls back to [`classify`].
    pub fn from_hint(hint: &str, file_name: &str) -> FormatToken {
        match hint.trim().to_ascii_uppercase().as_str() {
            "CSV" => FormatToken::Csv,
            "FHIR" => FormatToken::Fhir,
            "TEST" => FormatToken::Test,
            _ => classify(file_name),
        }
    }
}

/// Whether the presentation layer accepts this file for upload.
pub fn is_accepted_upload(file_name: &str) -> bool {
    extension_of(file_name)
        .map(|ext| ACCEPTED_UPLOAD_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}
