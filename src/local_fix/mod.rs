//! Deterministic repairs for a generated file set, driven by one error message.
//!
//! Strategies run in a fixed order and the first that produces a patch wins.
//! A strategy that cannot help returns `None` and leaves nothing behind; the
//! caller's file map is never touched.

pub mod bare_specifier;
pub mod imports;
pub mod missing_import;
pub mod symbols;
pub mod undefined_variable;

pub use symbols::{SymbolTable, WellKnownSymbol, WELL_KNOWN_SYMBOLS};

use crate::models::{normalize_path, FixKind, LocalFixResult};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

/// Everything a strategy may look at.
#[derive(Debug, Clone, Copy)]
pub struct FixRequest<'a> {
    pub error_message: &'a str,
    pub error_stack: Option<&'a str>,
    pub target_path: &'a str,
    pub files: &'a BTreeMap<String, String>,
}

impl FixRequest<'_> {
    /// Message and stack together, for patterns that may appear in either.
    pub fn error_text(&self) -> String {
        match self.error_stack {
            Some(stack) => format!("{}\n{}", self.error_message, stack),
            None => self.error_message.to_string(),
        }
    }

    pub fn target(&self) -> Option<(String, &str)> {
        let path = normalize_path(self.target_path);
        let content = self.files.get(&path)?;
        Some((path, content.as_str()))
    }
}

/// Changed files plus a human-readable note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub files: BTreeMap<String, String>,
    pub explanation: String,
}

fn identifier_res() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r#"Cannot find name ['"](?P<name>[A-Za-z_$][\w$]*)['"]"#,
            r#"['"](?P<name>[A-Za-z_$][\w$]*)['"] is not defined"#,
            r"Can't find variable: (?P<name>[A-Za-z_$][\w$]*)",
            r"\b(?P<name>[A-Za-z_$][\w$]*) is not defined",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("valid regex"))
        .collect()
    })
}

/// The undefined identifier an error message complains about.
pub fn extract_identifier(message: &str) -> Option<String> {
    identifier_res()
        .iter()
        .find_map(|re| re.captures(message))
        .map(|caps| caps["name"].to_string())
}

pub struct LocalFixEngine {
    symbols: Arc<SymbolTable>,
}

impl LocalFixEngine {
    pub fn new(symbols: Arc<SymbolTable>) -> Self {
        LocalFixEngine { symbols }
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn attempt(&self, request: &FixRequest<'_>) -> LocalFixResult {
        log::debug!("Trying local fixes for: {}", request.error_message);

        if let Some(patch) = bare_specifier::repair(request) {
            return LocalFixResult::applied(FixKind::BareSpecifier, patch.files, patch.explanation);
        }
        if let Some(patch) = missing_import::repair(request, &self.symbols) {
            return LocalFixResult::applied(FixKind::MissingImport, patch.files, patch.explanation);
        }
        if let Some(patch) = undefined_variable::repair(request, &self.symbols) {
            return LocalFixResult::applied(
                FixKind::UndefinedVariable,
                patch.files,
                patch.explanation,
            );
        }

        log::debug!("No local fix applies");
        LocalFixResult::no_fix("No local fix available; the file needs to be regenerated")
    }
}
