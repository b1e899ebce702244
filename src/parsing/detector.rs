//! Cheap dialect classification over a bounded prefix of the response.

use super::delimited::{file_open_re, metadata_open_re};
use super::repair::strip_to_json;
use crate::models::Dialect;
use crate::utils::config::ParserConfig;
use regex::Regex;
use std::sync::OnceLock;

fn version_two_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""version"\s*:\s*"?v?2"#).expect("valid regex"))
}

/// The first `limit` bytes of `text`, cut back to a char boundary.
pub(crate) fn window(text: &str, limit: usize) -> &str {
    let mut end = text.len().min(limit);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn detect_envelope(prefix: &str) -> Option<Dialect> {
    let body = strip_to_json(prefix);
    if !body.starts_with('{') {
        return None;
    }
    if !(body.contains("\"meta\"") || body.contains("\"files\"")) {
        return None;
    }
    let has_version = body.contains("\"version\"") || body.contains("\"format\"");
    let has_batch_keys = ["\"batch\"", "\"manifest\"", "\"plan\""]
        .iter()
        .any(|key| body.contains(key));

    if version_two_re().is_match(body) || has_batch_keys {
        Some(Dialect::EnvelopeV2)
    } else if has_version || body.contains("\"files\"") {
        Some(Dialect::EnvelopeV1)
    } else {
        None
    }
}

fn detect_delimited(prefix: &str) -> Option<Dialect> {
    if !file_open_re().is_match(prefix) {
        return None;
    }
    if metadata_open_re().is_match(prefix) {
        Some(Dialect::DelimitedV2)
    } else {
        Some(Dialect::DelimitedV1)
    }
}

/// Classifies `raw` by looking only at its first `detection_window` bytes.
pub fn detect_dialect(raw: &str, config: &ParserConfig) -> Dialect {
    let trimmed = raw.trim_start();
    if trimmed.is_empty() {
        return Dialect::Unknown;
    }
    let prefix = window(trimmed, config.detection_window);

    let dialect = detect_envelope(prefix)
        .or_else(|| detect_delimited(prefix))
        .unwrap_or_else(|| {
            if prefix.contains("```") {
                Dialect::Fallback
            } else {
                Dialect::Unknown
            }
        });
    log::debug!("Detected dialect {} from {} byte prefix", dialect, prefix.len());
    dialect
}
