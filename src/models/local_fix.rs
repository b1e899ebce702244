use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which strategy produced a patch. `None` means a full regeneration is needed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FixKind {
    BareSpecifier,
    MissingImport,
    UndefinedVariable,
    None,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LocalFixResult {
    pub applied: bool,
    /// Only the files that changed, with their full new content.
    pub patched_files: BTreeMap<String, String>,
    pub explanation: String,
    pub kind: FixKind,
}

impl LocalFixResult {
    pub fn applied(
        kind: FixKind,
        patched_files: BTreeMap<String, String>,
        explanation: String,
    ) -> Self {
        LocalFixResult {
            applied: true,
            patched_files,
            explanation,
            kind,
        }
    }

    pub fn no_fix(explanation: impl Into<String>) -> Self {
        LocalFixResult {
            applied: false,
            patched_files: BTreeMap::new(),
            explanation: explanation.into(),
            kind: FixKind::None,
        }
    }
}
