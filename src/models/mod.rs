pub mod local_fix;
pub mod parse_result;

pub use local_fix::{FixKind, LocalFixResult};
pub use parse_result::{ParseResult, RecoveryStatus, ResultBuilder};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Producer formats a raw response can be written in.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    EnvelopeV2,
    EnvelopeV1,
    DelimitedV2,
    DelimitedV1,
    Fallback,
    Unknown,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dialect::EnvelopeV2 => "envelope-v2",
            Dialect::EnvelopeV1 => "envelope-v1",
            Dialect::DelimitedV2 => "delimited-v2",
            Dialect::DelimitedV1 => "delimited-v1",
            Dialect::Fallback => "fallback",
            Dialect::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    pub content: String,
    pub complete: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    #[serde(alias = "add", alias = "new", alias = "CREATE")]
    Create,
    #[serde(alias = "modify", alias = "edit", alias = "UPDATE")]
    Update,
    #[serde(alias = "remove", alias = "DELETE")]
    Delete,
}

impl FileAction {
    /// Lenient parse used by the key/value metadata blocks.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "create" | "add" | "new" => Some(FileAction::Create),
            "update" | "modify" | "edit" => Some(FileAction::Update),
            "delete" | "remove" => Some(FileAction::Delete),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub path: String,
    pub action: FileAction,
    pub declared_lines: u32,
    pub declared_tokens: u32,
}

/// The producer's stated intention. Advisory only, never used for extraction.
pub type Manifest = Vec<ManifestEntry>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct PlanEntry {
    pub path: String,
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Plan {
    pub summary: Option<String>,
    pub entries: Vec<PlanEntry>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchInfo {
    pub current: u32,
    pub total: u32,
    pub is_complete: bool,
    pub completed_paths: Vec<String>,
    pub remaining_paths: Vec<String>,
    pub hint: Option<String>,
}

/// Normalizes a producer-written path into a project-relative, slash-separated one.
pub fn normalize_path(raw: &str) -> String {
    let mut path = raw.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`').replace('\\', "/");
    while let Some(stripped) = path.strip_prefix("./") {
        path = stripped.to_string();
    }
    path.trim_start_matches('/').to_string()
}
