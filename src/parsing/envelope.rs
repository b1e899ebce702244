//! Extraction for the JSON envelope dialects.

use super::completeness::is_complete;
use super::repair::{read_json_string, repair_json, strip_to_json};
use super::Extractor;
use crate::models::{
    normalize_path, BatchInfo, Dialect, FileAction, ManifestEntry, Plan, PlanEntry, ResultBuilder,
};
use crate::utils::config::ParserConfig;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

#[derive(Deserialize, Debug, Default)]
struct EnvelopeMeta {
    version: Option<serde_json::Value>,
}

impl EnvelopeMeta {
    /// Major version as declared, from `2`, `2.0`, `"2.1"` or `"v2"`.
    fn major_version(&self) -> Option<u64> {
        match self.version.as_ref()? {
            serde_json::Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
            serde_json::Value::String(s) => s
                .trim()
                .trim_start_matches(['v', 'V'])
                .split('.')
                .next()
                .and_then(|major| major.parse().ok()),
            _ => None,
        }
    }
}

#[derive(Deserialize, Debug)]
struct RawFile {
    #[serde(alias = "file", alias = "filePath", alias = "file_path", alias = "name")]
    path: Option<String>,
    #[serde(alias = "code", default)]
    content: String,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum FileList {
    Entries(Vec<RawFile>),
    Map(BTreeMap<String, String>),
}

impl Default for FileList {
    fn default() -> Self {
        FileList::Entries(Vec::new())
    }
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum RawPlanEntry {
    Path(String),
    Entry {
        #[serde(alias = "file")]
        path: String,
        #[serde(alias = "purpose", alias = "summary")]
        description: Option<String>,
    },
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum RawPlan {
    List(Vec<RawPlanEntry>),
    Object {
        summary: Option<String>,
        #[serde(default, alias = "entries")]
        files: Vec<RawPlanEntry>,
    },
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RawManifestEntry {
    #[serde(alias = "file")]
    path: String,
    #[serde(default = "default_action")]
    action: FileAction,
    #[serde(default, alias = "lines", alias = "estimatedLines", alias = "declared_lines")]
    declared_lines: u32,
    #[serde(default, alias = "tokens", alias = "estimatedTokens", alias = "declared_tokens")]
    declared_tokens: u32,
}

fn default_action() -> FileAction {
    FileAction::Create
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawBatch {
    current: u32,
    total: u32,
    #[serde(alias = "is_complete", alias = "complete")]
    is_complete: Option<bool>,
    #[serde(alias = "completed", alias = "completed_files", alias = "completedPaths")]
    completed_files: Vec<String>,
    #[serde(alias = "remaining", alias = "remaining_files", alias = "remainingPaths")]
    remaining_files: Vec<String>,
    #[serde(alias = "hint", alias = "next_batch_hint")]
    next_batch_hint: Option<String>,
}

impl From<RawBatch> for BatchInfo {
    fn from(raw: RawBatch) -> Self {
        let remaining_paths: Vec<String> =
            raw.remaining_files.iter().map(|p| normalize_path(p)).collect();
        let is_complete = raw
            .is_complete
            .unwrap_or(remaining_paths.is_empty() && raw.current >= raw.total);
        BatchInfo {
            current: raw.current,
            total: raw.total,
            is_complete,
            completed_paths: raw.completed_files.iter().map(|p| normalize_path(p)).collect(),
            remaining_paths,
            hint: raw.next_batch_hint.filter(|h| !h.trim().is_empty()),
        }
    }
}

#[derive(Deserialize, Debug)]
struct EnvelopeV1 {
    #[serde(default)]
    meta: EnvelopeMeta,
    #[serde(default)]
    files: FileList,
    #[serde(alias = "message", alias = "summary")]
    explanation: Option<String>,
}

#[derive(Deserialize, Debug)]
struct EnvelopeV2 {
    #[serde(default)]
    meta: EnvelopeMeta,
    plan: Option<RawPlan>,
    manifest: Option<Vec<RawManifestEntry>>,
    batch: Option<RawBatch>,
    #[serde(default)]
    files: FileList,
    #[serde(alias = "message", alias = "summary")]
    explanation: Option<String>,
}

/// A strictly parsed envelope, one variant per dialect.
#[derive(Debug)]
enum EnvelopeDocument {
    V1(EnvelopeV1),
    V2(EnvelopeV2),
}

impl EnvelopeDocument {
    fn parse(dialect: Dialect, text: &str) -> Result<Self, serde_json::Error> {
        match dialect {
            Dialect::EnvelopeV1 => serde_json::from_str(text).map(EnvelopeDocument::V1),
            _ => serde_json::from_str(text).map(EnvelopeDocument::V2),
        }
    }
}

fn file_pairs(files: FileList, builder: &mut ResultBuilder) -> Vec<(String, String)> {
    match files {
        FileList::Map(map) => map.into_iter().collect(),
        FileList::Entries(entries) => entries
            .into_iter()
            .filter_map(|entry| match entry.path {
                Some(path) if !path.trim().is_empty() => Some((path, entry.content)),
                _ => {
                    builder.warn("Skipped a file entry without a path");
                    None
                }
            })
            .collect(),
    }
}

fn plan_from(raw: RawPlan) -> Plan {
    let (summary, entries) = match raw {
        RawPlan::List(entries) => (None, entries),
        RawPlan::Object { summary, files } => (summary, files),
    };
    Plan {
        summary,
        entries: entries
            .into_iter()
            .map(|entry| match entry {
                RawPlanEntry::Path(path) => PlanEntry {
                    path: normalize_path(&path),
                    description: None,
                },
                RawPlanEntry::Entry { path, description } => PlanEntry {
                    path: normalize_path(&path),
                    description,
                },
            })
            .collect(),
    }
}

fn path_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""(?:path|filePath|file_path|file)"\s*:\s*""#).expect("valid regex")
    })
}

fn content_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""(?:content|code)"\s*:\s*""#).expect("valid regex"))
}

fn explanation_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""explanation"\s*:\s*""#).expect("valid regex"))
}

fn batch_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""batch"\s*:\s*\{"#).expect("valid regex"))
}

/// Byte range of the balanced object starting at `open`, or the rest of the text.
fn object_span(text: &str, open: usize) -> &str {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[open..].char_indices() {
        if in_string {
            match (escaped, c) {
                (true, _) => escaped = false,
                (false, '\\') => escaped = true,
                (false, '"') => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return &text[open..open + offset + 1];
                }
            }
            _ => {}
        }
    }
    &text[open..]
}

/// A file recovered by scanning for `"path"`/`"content"` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScannedFile {
    path: String,
    content: String,
    terminated: bool,
}

/// Locates file fields without a JSON parser. Linear in the input length.
fn scan_files(body: &str) -> Vec<ScannedFile> {
    let starts: Vec<(usize, usize)> = path_key_re()
        .find_iter(body)
        .map(|m| (m.start(), m.end() - 1))
        .collect();
    let mut files = Vec::new();
    for (index, (_, quote)) in starts.iter().enumerate() {
        let Some(path) = read_json_string(body, *quote) else {
            continue;
        };
        if !path.terminated || path.value.trim().is_empty() {
            continue;
        }
        let bound = starts.get(index + 1).map(|(start, _)| *start).unwrap_or(body.len());
        let Some(content_key) = content_key_re().find_at(body, path.end) else {
            continue;
        };
        if content_key.start() >= bound {
            continue;
        }
        if let Some(content) = read_json_string(body, content_key.end() - 1) {
            files.push(ScannedFile {
                path: path.value,
                content: content.value,
                terminated: content.terminated,
            });
        }
    }
    files
}

fn scan_batch(body: &str) -> Option<BatchInfo> {
    let key = batch_key_re().find(body)?;
    let object = object_span(body, key.end() - 1);
    let parsed: Result<RawBatch, _> = serde_json::from_str(object);
    match parsed {
        Ok(raw) => Some(raw.into()),
        Err(_) => repair_json(object)
            .and_then(|repair| serde_json::from_str::<RawBatch>(&repair.text).ok())
            .map(Into::into),
    }
}

/// Extractor for [`Dialect::EnvelopeV1`] and [`Dialect::EnvelopeV2`].
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeExtractor {
    dialect: Dialect,
}

impl EnvelopeExtractor {
    pub fn v1() -> Self {
        EnvelopeExtractor {
            dialect: Dialect::EnvelopeV1,
        }
    }

    pub fn v2() -> Self {
        EnvelopeExtractor {
            dialect: Dialect::EnvelopeV2,
        }
    }

    fn apply_document(
        &self,
        document: EnvelopeDocument,
        builder: &mut ResultBuilder,
        config: &ParserConfig,
    ) {
        let (files, explanation) = match document {
            EnvelopeDocument::V1(doc) => {
                self.check_declared_version(&doc.meta, builder);
                (doc.files, doc.explanation)
            }
            EnvelopeDocument::V2(doc) => {
                self.check_declared_version(&doc.meta, builder);
                if let Some(plan) = doc.plan {
                    builder.set_plan(plan_from(plan));
                }
                if let Some(manifest) = doc.manifest {
                    builder.set_manifest(
                        manifest
                            .into_iter()
                            .map(|entry| ManifestEntry {
                                path: normalize_path(&entry.path),
                                action: entry.action,
                                declared_lines: entry.declared_lines,
                                declared_tokens: entry.declared_tokens,
                            })
                            .collect(),
                    );
                }
                if let Some(batch) = doc.batch {
                    builder.set_batch(batch.into());
                }
                (doc.files, doc.explanation)
            }
        };
        for (path, content) in file_pairs(files, builder) {
            let complete = is_complete(&normalize_path(&path), &content, config);
            builder.insert_file(&path, content, complete);
        }
        if let Some(explanation) = explanation {
            builder.set_explanation(explanation);
        }
    }

    fn check_declared_version(&self, meta: &EnvelopeMeta, builder: &mut ResultBuilder) {
        let expected = match self.dialect {
            Dialect::EnvelopeV1 => 1,
            _ => 2,
        };
        if let Some(declared) = meta.major_version().filter(|v| *v != expected) {
            builder.warn(format!(
                "Envelope declares version {} but was read as {}",
                declared, self.dialect
            ));
        }
    }

    /// Adds scanned files. With `only_missing`, files the parser already produced are kept.
    fn apply_scan(
        &self,
        body: &str,
        builder: &mut ResultBuilder,
        config: &ParserConfig,
        only_missing: bool,
    ) {
        for file in scan_files(body) {
            if only_missing && builder.has_file(&file.path) {
                continue;
            }
            let path = normalize_path(&file.path);
            let complete = file.terminated && is_complete(&path, &file.content, config);
            if !file.terminated {
                builder.mark_truncated();
                builder.warn(format!("Response ended inside the content of '{}'", path));
            }
            builder.mark_recovered(&path);
            builder.insert_file(&path, file.content, complete);
        }
    }

    /// Fills the explanation and batch from raw text when parsing did not supply them.
    fn scan_metadata(&self, body: &str, builder: &mut ResultBuilder) {
        if builder.explanation().is_none() {
            if let Some(start) = explanation_key_re().find(body) {
                if let Some(explanation) = read_json_string(body, start.end() - 1) {
                    builder.set_explanation(explanation.value);
                }
            }
        }
        if builder.batch().is_none() {
            if let Some(batch) = scan_batch(body) {
                builder.set_batch(batch);
            }
        }
    }

    fn scan_fallback(&self, body: &str, builder: &mut ResultBuilder, config: &ParserConfig) {
        self.apply_scan(body, builder, config, false);
        self.scan_metadata(body, builder);
        let unbalanced = match repair_json(body) {
            Some(repair) => repair.was_truncated(),
            None => !body.trim_end().ends_with(['}', ']']),
        };
        if unbalanced {
            builder.mark_truncated();
        }
    }
}

impl Extractor for EnvelopeExtractor {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn extract(&self, raw: &str, config: &ParserConfig) -> ResultBuilder {
        let mut builder = ResultBuilder::new(self.dialect);
        let body = strip_to_json(raw);

        match EnvelopeDocument::parse(self.dialect, body) {
            Ok(document) => self.apply_document(document, &mut builder, config),
            Err(first) => {
                log::debug!("Strict envelope parse failed: {}", first);
                let repaired = repair_json(body).and_then(|repair| {
                    EnvelopeDocument::parse(self.dialect, &repair.text)
                        .map_err(|e| log::debug!("Repaired envelope still invalid: {}", e))
                        .ok()
                        .map(|document| (repair, document))
                });
                match repaired {
                    Some((repair, document)) => {
                        log::warn!("{}", repair.describe());
                        builder.mark_repaired(repair.describe());
                        self.apply_document(document, &mut builder, config);
                        if repair.was_truncated() {
                            builder.mark_truncated();
                            // The cut-off tail may still hold a partially written file.
                            self.apply_scan(body, &mut builder, config, true);
                            self.scan_metadata(body, &mut builder);
                        }
                    }
                    None => {
                        builder.warn(format!(
                            "Envelope JSON could not be parsed ({}); fields recovered by scanning",
                            first
                        ));
                        self.scan_fallback(body, &mut builder, config);
                    }
                }
            }
        }

        if builder.files().is_empty() {
            builder.error("Envelope contains no recoverable files");
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const APP: &str = "export default function App() {\n  return <main className=\"app\">Hello there</main>;\n}\n";
    const UTIL: &str = "export function sum(values: number[]) {\n  return values.reduce((a, b) => a + b, 0);\n}\n";

    fn run(extractor: EnvelopeExtractor, raw: &str) -> crate::models::ParseResult {
        extractor.extract(raw, &ParserConfig::default()).finish()
    }

    #[test]
    fn v1_with_file_array_parses_cleanly() {
        let raw = json!({
            "meta": {"format": "codegen", "version": "1.0"},
            "files": [
                {"path": "src/App.tsx", "content": APP},
                {"path": "./src/util.ts", "content": UTIL}
            ],
            "explanation": "Two files"
        })
        .to_string();
        let result = run(EnvelopeExtractor::v1(), &raw);

        assert_eq!(result.files().len(), 2);
        assert!(result.files().values().all(|f| f.complete));
        assert_eq!(result.file("src/util.ts").unwrap().content, UTIL);
        assert_eq!(result.explanation(), Some("Two files"));
        assert!(!result.truncated());
        assert!(!result.repaired());
        assert!(result.errors().is_empty());
    }

    #[test]
    fn v1_accepts_a_path_to_content_map() {
        let raw = json!({"meta": {"version": "1"}, "files": {"src/util.ts": UTIL}}).to_string();
        let result = run(EnvelopeExtractor::v1(), &raw);
        assert_eq!(result.file("src/util.ts").unwrap().content, UTIL);
    }

    #[test]
    fn v2_maps_plan_manifest_and_batch() {
        let raw = json!({
            "meta": {"format": "codegen", "version": "2.0"},
            "plan": {"summary": "shell", "files": ["src/App.tsx", {"path": "src/util.ts", "purpose": "math"}]},
            "manifest": [
                {"path": "src/App.tsx", "action": "create", "lines": 3, "tokens": 30},
                {"path": "src/legacy.ts", "action": "delete"}
            ],
            "batch": {"current": 1, "total": 2, "isComplete": false, "completedFiles": ["src/App.tsx"], "remainingFiles": ["src/util.ts"], "nextBatchHint": "utils"},
            "files": [{"path": "src/App.tsx", "content": APP}]
        })
        .to_string();
        let result = run(EnvelopeExtractor::v2(), &raw);

        let plan = result.plan().unwrap();
        assert_eq!(plan.entries.len(), 2);
        assert_eq!(plan.entries[1].description.as_deref(), Some("math"));
        let manifest = result.manifest().unwrap();
        assert_eq!(manifest[0].declared_lines, 3);
        assert_eq!(manifest[1].action, FileAction::Delete);
        let batch = result.batch().unwrap();
        assert!(!batch.is_complete);
        assert_eq!(batch.remaining_paths, vec!["src/util.ts".to_string()]);
        assert_eq!(batch.hint.as_deref(), Some("utils"));
        assert!(result.truncated());
    }

    #[test]
    fn trailing_commas_are_repaired_and_reported() {
        let raw = format!(
            "{{\"meta\": {{\"version\": \"1\"}}, \"files\": [{{\"path\": \"src/util.ts\", \"content\": {},}},],}}",
            serde_json::to_string(UTIL).unwrap()
        );
        let result = run(EnvelopeExtractor::v1(), &raw);

        assert!(result.repaired());
        assert!(!result.truncated());
        assert!(result.file("src/util.ts").unwrap().complete);
        assert!(result.warnings().iter().any(|w| w.contains("trailing comma")));
    }

    #[test]
    fn truncated_envelope_keeps_whole_files_and_the_partial_one() {
        let whole = json!({"path": "src/util.ts", "content": UTIL}).to_string();
        let partial_content = serde_json::to_string(APP).unwrap();
        let raw = format!(
            "{{\"meta\": {{\"version\": \"1\"}}, \"files\": [{}, {{\"path\": \"src/App.tsx\", \"content\": {}",
            whole,
            &partial_content[..40]
        );
        let result = run(EnvelopeExtractor::v1(), &raw);

        assert!(result.truncated());
        assert!(result.repaired());
        assert!(result.file("src/util.ts").unwrap().complete);
        assert!(!result.file("src/App.tsx").unwrap().complete);
        assert_eq!(result.incomplete_paths(), &["src/App.tsx".to_string()]);
        assert_eq!(result.recovered_paths(), &["src/App.tsx".to_string()]);
    }

    #[test]
    fn fields_in_the_cut_tail_are_recovered_by_scanning() {
        let raw = format!(
            "{{\"meta\": {{\"version\": \"2\"}}, \"batch\": {{\"current\": 1, \"total\": 2, \"isComplete\": false}}, \"explanation\": \"partial\", \"files\": [{{\"path\": \"src/util.ts\", \"content\": {}",
            &serde_json::to_string(UTIL).unwrap()[..30]
        );
        let result = run(EnvelopeExtractor::v2(), &raw);

        assert_eq!(result.files().len(), 1);
        assert!(!result.file("src/util.ts").unwrap().complete);
        assert_eq!(result.explanation(), Some("partial"));
        assert_eq!(result.batch().unwrap().total, 2);
        assert!(result.truncated());
        assert!(result.errors().is_empty());
    }

    #[test]
    fn unbalanced_envelope_falls_back_to_scanning() {
        let raw = format!(
            "{{\"files\": [{{\"path\": \"src/util.ts\", \"content\": {}",
            &serde_json::to_string(UTIL).unwrap()[..30]
        );
        let result = run(EnvelopeExtractor::v1(), &raw);

        assert!(!result.repaired());
        assert!(result.truncated());
        assert_eq!(result.recovered_paths(), &["src/util.ts".to_string()]);
        assert!(result
            .warnings()
            .iter()
            .any(|w| w.contains("recovered by scanning")));
    }

    #[test]
    fn declared_version_is_checked_against_the_dialect() {
        let raw = json!({"meta": {"version": "v1.2"}, "batch": {"current": 1, "total": 1}, "files": {"src/util.ts": UTIL}}).to_string();
        let result = run(EnvelopeExtractor::v2(), &raw);
        assert!(result.warnings().iter().any(|w| w.contains("declares version 1")));

        let raw = json!({"meta": {"version": 2.0}, "files": {"src/util.ts": UTIL}}).to_string();
        assert!(run(EnvelopeExtractor::v2(), &raw).warnings().is_empty());
    }

    #[test]
    fn empty_files_is_an_error() {
        let result = run(EnvelopeExtractor::v1(), r#"{"meta": {"version": "1"}, "files": []}"#);
        assert!(!result.errors().is_empty());
    }

    #[test]
    fn scanner_pairs_paths_with_their_own_content() {
        let body = r#"[{"path": "a.ts"}, {"path": "b.ts", "content": "bee"}, {"path": "c.ts", "content": "se"#;
        let files = scan_files(body);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "b.ts");
        assert!(files[0].terminated);
        assert_eq!(files[1].content, "se");
        assert!(!files[1].terminated);
    }
}
