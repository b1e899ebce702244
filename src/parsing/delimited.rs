//! Extraction for the comment-sentinel dialects.
//!
//! Files are written as
//!
//! ```text
//! <!-- FILE: src/App.tsx -->
//! ...content...
//! <!-- /FILE: src/App.tsx -->
//! ```
//!
//! and the V2 dialect adds `PLAN`, `MANIFEST`, `EXPLANATION` and `BATCH`
//! blocks delimited the same way, whose bodies are `key: value` lines.

use super::completeness::is_complete;
use super::repair::{infer_section_end, SectionEnd};
use super::Extractor;
use crate::models::{
    normalize_path, BatchInfo, Dialect, FileAction, ManifestEntry, Plan, PlanEntry, ResultBuilder,
};
use crate::utils::config::ParserConfig;
use regex::Regex;
use std::sync::OnceLock;

const META_KINDS: &str = "PLAN|MANIFEST|EXPLANATION|BATCH";

pub(crate) fn file_open_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<!--\s*FILE:\s*([^\n]+?)\s*-->").expect("valid regex"))
}

pub(crate) fn metadata_open_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"(?i)<!--\s*({})\s*-->", META_KINDS)).expect("valid regex")
    })
}

/// Any section opener, file or metadata.
fn section_open_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?i)<!--\s*(?:FILE:\s*(?P<path>[^\n]+?)|(?P<meta>{}))\s*-->",
            META_KINDS
        ))
        .expect("valid regex")
    })
}

fn file_close_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<!--\s*/FILE(?::\s*(?P<path>[^\n]*?))?\s*-->").expect("valid regex")
    })
}

fn metadata_close_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"(?i)<!--\s*/({})\s*-->", META_KINDS)).expect("valid regex")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Section {
    File(String),
    Meta(String),
}

/// First closer in `slice` (offset by `base`) that belongs to `section`.
fn find_closer(slice: &str, base: usize, section: &Section) -> Option<(usize, usize)> {
    match section {
        Section::File(path) => file_close_re()
            .captures_iter(slice)
            .find(|caps| {
                caps.name("path")
                    .map(|p| p.as_str().trim())
                    .is_none_or(|p| p.is_empty() || normalize_path(p) == *path)
            })
            .and_then(|caps| caps.get(0))
            .map(|m| (base + m.start(), base + m.end())),
        Section::Meta(kind) => metadata_close_re()
            .captures_iter(slice)
            .find(|caps| caps.get(1).is_some_and(|k| k.as_str().eq_ignore_ascii_case(kind)))
            .and_then(|caps| caps.get(0))
            .map(|m| (base + m.start(), base + m.end())),
    }
}

/// Removes surrounding blank lines and an optional code fence wrapping the body.
/// An opening fence is dropped even when the body was cut before its closing fence.
fn clean_body(body: &str) -> String {
    let mut text = body.trim_start_matches(['\r', '\n']).trim_end();
    if text.starts_with("```") {
        if let Some(newline) = text.find('\n') {
            text = &text[newline + 1..];
            if let Some(inner) = text.trim_end().strip_suffix("```") {
                text = inner;
            }
            text = text.trim_end();
        }
    }
    if text.is_empty() {
        String::new()
    } else {
        format!("{}\n", text)
    }
}

fn key_value_lines(body: &str) -> impl Iterator<Item = (String, String)> + '_ {
    body.lines().filter_map(|line| {
        let line = line.trim().trim_start_matches(['-', '*']).trim();
        let (key, value) = line.split_once(':')?;
        Some((key.trim().to_string(), value.trim().to_string()))
    })
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(normalize_path)
        .filter(|p| !p.is_empty() && p != "none")
        .collect()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

fn leading_number(text: &str) -> Option<u32> {
    let digits: String = text
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn first_number(text: &str) -> Option<u32> {
    text.split(|c: char| !c.is_ascii_digit())
        .find_map(|digits| digits.parse().ok())
}

pub(crate) fn parse_batch_block(body: &str) -> BatchInfo {
    let mut batch = BatchInfo::default();
    let mut explicit_complete = None;
    for (key, value) in key_value_lines(body) {
        match key.to_ascii_lowercase().replace(['_', ' '], "").as_str() {
            "current" | "batch" => {
                // `batch: 1/3` and `batch: 1 of 3` carry both numbers.
                let normalized = value.replace(" of ", "/");
                let mut parts = normalized.split('/');
                batch.current = parts.next().and_then(leading_number).unwrap_or(0);
                if let Some(total) = parts.next().and_then(leading_number) {
                    batch.total = total;
                }
            }
            "total" => batch.total = leading_number(&value).unwrap_or(0),
            "complete" | "iscomplete" => explicit_complete = parse_flag(&value),
            "completed" | "completedfiles" | "completedpaths" => {
                batch.completed_paths = split_list(&value)
            }
            "remaining" | "remainingfiles" | "remainingpaths" => {
                batch.remaining_paths = split_list(&value)
            }
            "hint" | "nextbatchhint" => {
                if !value.is_empty() {
                    batch.hint = Some(value)
                }
            }
            _ => {}
        }
    }
    batch.is_complete = explicit_complete
        .unwrap_or(batch.remaining_paths.is_empty() && batch.current >= batch.total);
    batch
}

fn parse_manifest_block(body: &str, builder: &mut ResultBuilder) -> Vec<ManifestEntry> {
    let mut entries = Vec::new();
    for (path, value) in key_value_lines(body) {
        let mut action = None;
        let mut declared_lines = 0;
        let mut declared_tokens = 0;
        for part in value.split(',') {
            let lower = part.trim().to_ascii_lowercase();
            if let Some(parsed) = FileAction::from_label(&lower) {
                action = Some(parsed);
            } else if lower.contains("line") {
                declared_lines = first_number(&lower).unwrap_or(0);
            } else if lower.contains("token") {
                declared_tokens = first_number(&lower).unwrap_or(0);
            }
        }
        match action {
            Some(action) => entries.push(ManifestEntry {
                path: normalize_path(&path),
                action,
                declared_lines,
                declared_tokens,
            }),
            None => builder.warn(format!("Manifest line for '{}' has no action: {}", path, value)),
        }
    }
    entries
}

/// Drops `- `, `* ` and `1. ` style list markers.
fn strip_list_marker(line: &str) -> &str {
    let line = line.trim().trim_start_matches(['-', '*']).trim_start();
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    match line[digits..].strip_prefix(['.', ')']) {
        Some(rest) if digits > 0 => rest.trim_start(),
        _ => line,
    }
}

fn looks_like_path(text: &str) -> bool {
    !text.is_empty() && !text.contains(char::is_whitespace) && (text.contains('.') || text.contains('/'))
}

fn parse_plan_block(body: &str) -> Plan {
    let mut plan = Plan::default();
    for line in body.lines() {
        let line = strip_list_marker(line);
        if line.is_empty() {
            continue;
        }
        match line.split_once(':') {
            Some((key, value)) if key.trim().eq_ignore_ascii_case("summary") => {
                plan.summary = Some(value.trim().to_string());
            }
            Some((key, value)) if looks_like_path(key.trim()) => plan.entries.push(PlanEntry {
                path: normalize_path(key),
                description: Some(value.trim().to_string()).filter(|d| !d.is_empty()),
            }),
            _ if looks_like_path(line) => plan.entries.push(PlanEntry {
                path: normalize_path(line),
                description: None,
            }),
            _ => {}
        }
    }
    plan
}

/// Extractor for [`Dialect::DelimitedV1`] and [`Dialect::DelimitedV2`].
#[derive(Debug, Clone, Copy)]
pub struct DelimitedExtractor {
    dialect: Dialect,
}

impl DelimitedExtractor {
    pub fn v1() -> Self {
        DelimitedExtractor {
            dialect: Dialect::DelimitedV1,
        }
    }

    pub fn v2() -> Self {
        DelimitedExtractor {
            dialect: Dialect::DelimitedV2,
        }
    }

    /// Metadata is read in every delimited response. A V1 response only has
    /// blocks beyond the detection window, so those are read with a warning.
    fn apply_metadata(&self, kind: &str, body: &str, builder: &mut ResultBuilder) {
        if self.dialect == Dialect::DelimitedV1 {
            builder.warn(format!("Found a late {} block in a {} response", kind, self.dialect));
        }
        match kind {
            "PLAN" => builder.set_plan(parse_plan_block(body)),
            "MANIFEST" => {
                let manifest = parse_manifest_block(body, builder);
                builder.set_manifest(manifest);
            }
            "EXPLANATION" => builder.set_explanation(body.to_string()),
            "BATCH" => builder.set_batch(parse_batch_block(body)),
            _ => {}
        }
    }
}

impl Extractor for DelimitedExtractor {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn extract(&self, raw: &str, config: &ParserConfig) -> ResultBuilder {
        let mut builder = ResultBuilder::new(self.dialect);
        let opener = section_open_re();
        let mut pos = 0;

        while let Some(caps) = opener.captures_at(raw, pos) {
            let Some(whole) = caps.get(0) else { break };
            let section = match (caps.name("path"), caps.name("meta")) {
                (Some(path), _) => Section::File(normalize_path(path.as_str())),
                (None, Some(meta)) => Section::Meta(meta.as_str().to_ascii_uppercase()),
                (None, None) => break,
            };
            let body_start = whole.end();
            let next_opener = opener.find_at(raw, body_start).map(|m| m.start());
            let search_end = next_opener.unwrap_or(raw.len());
            let closer = find_closer(&raw[body_start..search_end], body_start, &section);

            let (body, recovered, at_eof) = match infer_section_end(closer, next_opener) {
                SectionEnd::Closed { body_end, resume } => {
                    pos = resume;
                    (&raw[body_start..body_end], false, false)
                }
                SectionEnd::Transition { body_end } => {
                    pos = body_end;
                    (&raw[body_start..body_end], true, false)
                }
                SectionEnd::EndOfText => {
                    pos = raw.len();
                    (&raw[body_start..], true, true)
                }
            };

            match section {
                Section::File(path) if path.is_empty() => {
                    builder.warn("Skipped a file section with an empty path");
                }
                Section::File(path) => {
                    let content = clean_body(body);
                    // Text ending inside a file section is a truncation whatever the content looks like.
                    let complete = !at_eof && is_complete(&path, &content, config);
                    if recovered {
                        log::debug!("{}: no closing sentinel, boundary inferred", path);
                        builder.mark_recovered(&path);
                    }
                    if at_eof {
                        builder.mark_truncated();
                        builder.warn(format!("Response ended inside '{}'", path));
                    }
                    builder.insert_file(&path, content, complete);
                }
                Section::Meta(kind) => {
                    if recovered {
                        builder.warn(format!("{} block has no closing sentinel", kind));
                    }
                    self.apply_metadata(&kind, body.trim(), &mut builder);
                }
            }

            if pos >= raw.len() {
                break;
            }
        }

        if builder.files().is_empty() {
            builder.error("No file sections could be recovered from the response");
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP: &str = "export default function App() {\n  return <main className=\"app\">Hello there</main>;\n}\n";
    const UTIL: &str = "export function sum(values: number[]) {\n  return values.reduce((a, b) => a + b, 0);\n}\n";

    fn extract_v2(raw: &str) -> crate::models::ParseResult {
        DelimitedExtractor::v2()
            .extract(raw, &ParserConfig::default())
            .finish()
    }

    #[test]
    fn closed_sections_are_clean() {
        let raw = format!(
            "Intro text\n<!-- FILE: src/App.tsx -->\n{}<!-- /FILE: src/App.tsx -->\n<!-- FILE: src/util.ts -->\n{}<!-- /FILE -->\nBye",
            APP, UTIL
        );
        let result = DelimitedExtractor::v1()
            .extract(&raw, &ParserConfig::default())
            .finish();

        assert_eq!(result.files().len(), 2);
        assert_eq!(result.file("src/App.tsx").unwrap().content, APP);
        assert_eq!(result.file("src/util.ts").unwrap().content, UTIL);
        assert!(result.recovered_paths().is_empty());
        assert!(!result.truncated());
        assert!(result.errors().is_empty());
    }

    #[test]
    fn closer_for_another_path_does_not_end_the_section() {
        let raw = format!(
            "<!-- FILE: a.ts -->\n{}<!-- /FILE: b.ts -->\n{}<!-- /FILE: a.ts -->",
            UTIL, UTIL
        );
        let result = extract_v2(&raw);
        assert!(result.file("a.ts").unwrap().content.contains("<!-- /FILE: b.ts -->"));
    }

    #[test]
    fn file_cut_at_end_of_text_is_incomplete() {
        let raw = format!(
            "<!-- FILE: src/util.ts -->\n{}<!-- /FILE: src/util.ts -->\n<!-- FILE: src/App.tsx -->\nexport default function App() {{\n  return <main className=\"ap",
            UTIL
        );
        let result = extract_v2(&raw);

        assert!(result.truncated());
        assert_eq!(result.incomplete_paths(), &["src/App.tsx".to_string()]);
        assert!(!result.file("src/App.tsx").unwrap().complete);
        assert!(result.file("src/util.ts").unwrap().complete);
    }

    #[test]
    fn metadata_blocks_are_parsed() {
        let raw = format!(
            "<!-- PLAN -->\nsummary: counter app\n- src/App.tsx: root component\n- src/util.ts\n<!-- /PLAN -->\n\
<!-- MANIFEST -->\nsrc/App.tsx: create, 3 lines, 40 tokens\nsrc/old.ts: delete\n<!-- /MANIFEST -->\n\
<!-- BATCH -->\ncurrent: 1\ntotal: 2\ncomplete: false\ncompleted: src/App.tsx\nremaining: src/util.ts\nhint: utilities next\n<!-- /BATCH -->\n\
<!-- FILE: src/App.tsx -->\n{}<!-- /FILE: src/App.tsx -->\n\
<!-- EXPLANATION -->\nBuilt the shell.\n<!-- /EXPLANATION -->",
            APP
        );
        let result = extract_v2(&raw);

        let plan = result.plan().unwrap();
        assert_eq!(plan.summary.as_deref(), Some("counter app"));
        assert_eq!(plan.entries.len(), 2);
        assert_eq!(plan.entries[0].description.as_deref(), Some("root component"));

        let manifest = result.manifest().unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest[0].action, FileAction::Create);
        assert_eq!(manifest[0].declared_lines, 3);
        assert_eq!(manifest[0].declared_tokens, 40);
        assert_eq!(manifest[1].action, FileAction::Delete);

        let batch = result.batch().unwrap();
        assert_eq!((batch.current, batch.total), (1, 2));
        assert!(!batch.is_complete);
        assert_eq!(batch.remaining_paths, vec!["src/util.ts".to_string()]);
        assert_eq!(batch.hint.as_deref(), Some("utilities next"));

        assert_eq!(result.explanation(), Some("Built the shell."));
        assert!(result.truncated());
    }

    #[test]
    fn v1_still_reads_late_metadata() {
        let closed: String = (0..40)
            .map(|i| format!("<!-- FILE: src/lib/m{}.ts -->\n{}<!-- /FILE: src/lib/m{}.ts -->\n", i, UTIL, i))
            .collect();
        let raw = format!(
            "{}<!-- BATCH -->\ncurrent: 1\ntotal: 2\ncomplete: false\nremaining: src/App.tsx\n<!-- /BATCH -->\n",
            closed
        );
        assert!(raw.len() > ParserConfig::default().detection_window);

        let result = crate::parsing::parse_response(&raw, &ParserConfig::default());

        assert_eq!(result.dialect(), Dialect::DelimitedV1);
        assert_eq!(result.files().len(), 40);
        let batch = result.batch().unwrap();
        assert!(!batch.is_complete);
        assert_eq!(batch.remaining_paths, vec!["src/App.tsx".to_string()]);
        assert!(result.truncated());
        assert!(result.warnings().iter().any(|w| w.contains("BATCH")));
        assert!(crate::parsing::plan_continuation(&result).is_some());
    }

    #[test]
    fn fenced_bodies_are_unwrapped() {
        let raw = format!("<!-- FILE: src/util.ts -->\n```ts\n{}```\n<!-- /FILE: src/util.ts -->", UTIL);
        let result = extract_v2(&raw);
        assert_eq!(result.file("src/util.ts").unwrap().content, UTIL);
    }

    #[test]
    fn cut_fenced_body_loses_its_opening_fence() {
        let raw = "<!-- FILE: src/a.ts -->\n```ts\nexport function add(a: number, b: number) {\n  return add(a, b";
        let result = extract_v2(raw);
        let entry = result.file("src/a.ts").unwrap();

        assert!(entry.content.starts_with("export function add"));
        assert!(!entry.complete);
        assert!(result.truncated());
    }

    #[test]
    fn whole_file_without_closer_at_end_of_text_is_truncated() {
        let raw = format!(
            "<!-- FILE: src/a.ts -->\n{}<!-- /FILE: src/a.ts -->\n<!-- FILE: src/util.ts -->\n{}",
            UTIL, UTIL
        );
        let result = extract_v2(&raw);

        assert!(result.truncated());
        assert!(result.file("src/a.ts").unwrap().complete);
        assert!(!result.file("src/util.ts").unwrap().complete);
        assert_eq!(result.incomplete_paths(), &["src/util.ts".to_string()]);
        assert_eq!(result.recovered_paths(), &["src/util.ts".to_string()]);
    }

    #[test]
    fn batch_shorthand_carries_total() {
        let batch = parse_batch_block("batch: 2 of 3\nremaining: c.ts");
        assert_eq!((batch.current, batch.total), (2, 3));
        assert!(!batch.is_complete);

        let done = parse_batch_block("current: 3\ntotal: 3");
        assert!(done.is_complete);
    }

    #[test]
    fn no_sections_is_an_error() {
        let result = DelimitedExtractor::v1()
            .extract("<!-- FILE:  -->", &ParserConfig::default())
            .finish();
        assert!(result.files().is_empty());
        assert!(!result.errors().is_empty());
    }
}
