use super::{normalize_path, BatchInfo, Dialect, FileEntry, Manifest, Plan};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How usable a [`ParseResult`] is.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RecoveryStatus {
    /// Parsed without any repair and every file is whole.
    Clean,
    /// Repair heuristics rewrote the text before it parsed; every file is whole.
    Repaired,
    /// Some files were recovered but at least one is cut off.
    PartialRecovery,
    /// Nothing could be recovered.
    FatalParse,
}

/// The pipeline's sole output. Read-only once built; see [`ResultBuilder`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ParseResult {
    dialect: Dialect,
    files: BTreeMap<String, FileEntry>,
    manifest: Option<Manifest>,
    plan: Option<Plan>,
    batch: Option<BatchInfo>,
    explanation: Option<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
    truncated: bool,
    repaired: bool,
    incomplete_paths: Vec<String>,
    recovered_paths: Vec<String>,
}

impl ParseResult {
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn files(&self) -> &BTreeMap<String, FileEntry> {
        &self.files
    }

    pub fn file(&self, path: &str) -> Option<&FileEntry> {
        self.files.get(path)
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    pub fn batch(&self) -> Option<&BatchInfo> {
        self.batch.as_ref()
    }

    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn repaired(&self) -> bool {
        self.repaired
    }

    pub fn incomplete_paths(&self) -> &[String] {
        &self.incomplete_paths
    }

    pub fn recovered_paths(&self) -> &[String] {
        &self.recovered_paths
    }

    /// The `path -> content` shape handed to a file store.
    pub fn file_map(&self) -> BTreeMap<String, String> {
        self.files
            .iter()
            .map(|(path, entry)| (path.clone(), entry.content.clone()))
            .collect()
    }

    pub fn status(&self) -> RecoveryStatus {
        if self.files.is_empty() && !self.errors.is_empty() {
            RecoveryStatus::FatalParse
        } else if self.truncated || !self.incomplete_paths.is_empty() {
            RecoveryStatus::PartialRecovery
        } else if self.repaired {
            RecoveryStatus::Repaired
        } else {
            RecoveryStatus::Clean
        }
    }
}

/// Mutable accumulator the extractors write into.
#[derive(Debug)]
pub struct ResultBuilder {
    dialect: Dialect,
    files: BTreeMap<String, FileEntry>,
    manifest: Option<Manifest>,
    plan: Option<Plan>,
    batch: Option<BatchInfo>,
    explanation: Option<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
    truncated: bool,
    repaired: bool,
    recovered_paths: Vec<String>,
}

impl ResultBuilder {
    pub fn new(dialect: Dialect) -> Self {
        ResultBuilder {
            dialect,
            files: BTreeMap::new(),
            manifest: None,
            plan: None,
            batch: None,
            explanation: None,
            warnings: Vec::new(),
            errors: Vec::new(),
            truncated: false,
            repaired: false,
            recovered_paths: Vec::new(),
        }
    }

    /// Adds a file. A later entry for the same path replaces the earlier one.
    pub fn insert_file(&mut self, path: &str, content: String, complete: bool) -> String {
        let path = normalize_path(path);
        if self.files.contains_key(&path) {
            self.warnings
                .push(format!("Duplicate file '{}' replaced by a later occurrence", path));
        }
        self.files.insert(
            path.clone(),
            FileEntry {
                path: path.clone(),
                content,
                complete,
            },
        );
        path
    }

    pub fn mark_recovered(&mut self, path: &str) {
        let path = normalize_path(path);
        if !self.recovered_paths.contains(&path) {
            self.recovered_paths.push(path);
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn mark_truncated(&mut self) {
        self.truncated = true;
    }

    pub fn mark_repaired(&mut self, note: impl Into<String>) {
        self.repaired = true;
        self.warnings.push(note.into());
    }

    pub fn set_manifest(&mut self, manifest: Manifest) {
        self.manifest = Some(manifest);
    }

    pub fn set_plan(&mut self, plan: Plan) {
        self.plan = Some(plan);
    }

    pub fn set_batch(&mut self, batch: BatchInfo) {
        if !batch.is_complete {
            self.truncated = true;
        }
        self.batch = Some(batch);
    }

    pub fn set_explanation(&mut self, explanation: String) {
        let explanation = explanation.trim();
        if !explanation.is_empty() {
            self.explanation = Some(explanation.to_string());
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.files.contains_key(&normalize_path(path))
    }

    pub fn files(&self) -> &BTreeMap<String, FileEntry> {
        &self.files
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    pub fn batch(&self) -> Option<&BatchInfo> {
        self.batch.as_ref()
    }

    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    pub fn finish(self) -> ParseResult {
        let incomplete_paths = self
            .files
            .values()
            .filter(|entry| !entry.complete)
            .map(|entry| entry.path.clone())
            .collect();

        ParseResult {
            dialect: self.dialect,
            files: self.files,
            manifest: self.manifest,
            plan: self.plan,
            batch: self.batch,
            explanation: self.explanation,
            warnings: self.warnings,
            errors: self.errors,
            truncated: self.truncated,
            repaired: self.repaired,
            incomplete_paths,
            recovered_paths: self.recovered_paths,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_duplicate_wins_and_is_warned() {
        let mut builder = ResultBuilder::new(Dialect::DelimitedV1);
        builder.insert_file("./a.ts", "first".to_string(), false);
        builder.insert_file("a.ts", "second".to_string(), true);
        let result = builder.finish();

        assert_eq!(result.files().len(), 1);
        assert_eq!(result.file("a.ts").unwrap().content, "second");
        assert!(result.incomplete_paths().is_empty());
        assert_eq!(result.warnings().len(), 1);
    }

    #[test]
    fn status_reflects_recovery_quality() {
        let fatal = {
            let mut b = ResultBuilder::new(Dialect::Unknown);
            b.error("nothing here");
            b.finish()
        };
        assert_eq!(fatal.status(), RecoveryStatus::FatalParse);

        let partial = {
            let mut b = ResultBuilder::new(Dialect::Fallback);
            b.insert_file("x.js", "const a = ".to_string(), false);
            b.finish()
        };
        assert_eq!(partial.status(), RecoveryStatus::PartialRecovery);
        assert_eq!(partial.incomplete_paths(), &["x.js".to_string()]);

        let repaired = {
            let mut b = ResultBuilder::new(Dialect::EnvelopeV1);
            b.insert_file("x.js", "ok".to_string(), true);
            b.mark_repaired("trailing comma removed");
            b.finish()
        };
        assert_eq!(repaired.status(), RecoveryStatus::Repaired);
    }

    #[test]
    fn incomplete_batch_marks_truncated() {
        let mut builder = ResultBuilder::new(Dialect::EnvelopeV2);
        builder.set_batch(BatchInfo {
            current: 1,
            total: 2,
            is_complete: false,
            ..BatchInfo::default()
        });
        assert!(builder.finish().truncated());
    }
}
