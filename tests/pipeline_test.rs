use proptest::prelude::*;
use salvage::{
    detect_dialect, is_complete, parse_response, plan_continuation, Dialect, ParserConfig,
    RecoveryStatus,
};
use serde_json::json;

const APP: &str = "import { useState } from 'react';\n\nexport default function App() {\n  const [count, setCount] = useState(0);\n  return <button onClick={() => setCount(count + 1)}>{count}</button>;\n}\n";
const UTIL: &str = "export function sum(values: number[]) {\n  return values.reduce((a, b) => a + b, 0);\n}\n";
const STYLES: &str = "body {\n  margin: 0;\n  font-family: system-ui, sans-serif;\n  color: #222;\n}\n";

fn config() -> ParserConfig {
    ParserConfig::default()
}

fn envelope_v1() -> String {
    json!({
        "meta": {"format": "codegen", "version": "1.0"},
        "files": [
            {"path": "src/App.tsx", "content": APP},
            {"path": "src/util.ts", "content": UTIL}
        ]
    })
    .to_string()
}

fn envelope_v2(files: &[(&str, &str)]) -> String {
    let entries: Vec<_> = files
        .iter()
        .map(|(path, content)| json!({"path": path, "content": content}))
        .collect();
    let paths: Vec<_> = files.iter().map(|(path, _)| *path).collect();
    json!({
        "meta": {"format": "codegen", "version": "2.0"},
        "manifest": paths.iter().map(|p| json!({"path": p, "action": "create"})).collect::<Vec<_>>(),
        "batch": {"current": 1, "total": 1, "isComplete": true, "completedFiles": paths},
        "files": entries,
        "explanation": "All files written"
    })
    .to_string()
}

fn delimited_v1() -> String {
    format!(
        "Here you go.\n<!-- FILE: src/App.tsx -->\n{}<!-- /FILE: src/App.tsx -->\n<!-- FILE: src/util.ts -->\n{}<!-- /FILE: src/util.ts -->\n",
        APP, UTIL
    )
}

fn delimited_v2() -> String {
    format!(
        "<!-- MANIFEST -->\nsrc/App.tsx: create\nsrc/util.ts: create\n<!-- /MANIFEST -->\n\
<!-- FILE: src/App.tsx -->\n{}<!-- /FILE: src/App.tsx -->\n\
<!-- FILE: src/util.ts -->\n{}<!-- /FILE: src/util.ts -->\n\
<!-- EXPLANATION -->\nCounter and helper.\n<!-- /EXPLANATION -->\n",
        APP, UTIL
    )
}

fn fenced() -> String {
    format!(
        "Update these files:\n\n**src/App.tsx**\n```tsx\n{}```\n\n```css title=src/index.css\n{}```\n",
        APP, STYLES
    )
}

#[test]
fn well_formed_responses_are_clean_in_every_dialect() {
    let cases = [
        (envelope_v1(), Dialect::EnvelopeV1),
        (
            envelope_v2(&[("src/App.tsx", APP), ("src/util.ts", UTIL)]),
            Dialect::EnvelopeV2,
        ),
        (delimited_v1(), Dialect::DelimitedV1),
        (delimited_v2(), Dialect::DelimitedV2),
        (fenced(), Dialect::Fallback),
    ];

    for (raw, dialect) in cases {
        assert_eq!(detect_dialect(&raw, &config()), dialect);
        let result = parse_response(&raw, &config());

        assert_eq!(result.dialect(), dialect);
        assert!(!result.truncated(), "{} was flagged as truncated", dialect);
        assert!(result.errors().is_empty(), "{}: {:?}", dialect, result.errors());
        assert_eq!(result.files().len(), 2, "{}", dialect);
        assert!(result.files().values().all(|f| f.complete), "{}", dialect);
        assert!(result.incomplete_paths().is_empty());
    }
}

#[test]
fn fenced_responses_always_warn() {
    let result = parse_response(&fenced(), &config());
    assert!(!result.warnings().is_empty());
    assert_eq!(result.file("src/index.css").unwrap().content, STYLES);
}

#[test]
fn mid_file_truncation_marks_the_path_incomplete() {
    let cut = &APP[..APP.find("setCount(count").unwrap()];
    let raw = format!(
        "<!-- FILE: src/util.ts -->\n{}<!-- /FILE: src/util.ts -->\n<!-- FILE: src/App.tsx -->\n{}",
        UTIL, cut
    );
    let result = parse_response(&raw, &config());

    assert!(result.truncated());
    assert_eq!(result.incomplete_paths(), &["src/App.tsx".to_string()]);
    assert!(result.file("src/util.ts").unwrap().complete);
    assert_eq!(result.status(), RecoveryStatus::PartialRecovery);
}

#[test]
fn truncated_envelope_keeps_what_was_sent() {
    let util = serde_json::to_string(UTIL).unwrap();
    let raw = format!(
        "{{\"meta\": {{\"version\": \"1.0\"}}, \"files\": [{{\"path\": \"src/App.tsx\", \"content\": {}}}, {{\"path\": \"src/util.ts\", \"content\": {}",
        serde_json::to_string(APP).unwrap(),
        &util[..util.find("return values").unwrap()]
    );
    let result = parse_response(&raw, &config());

    assert!(result.truncated());
    assert!(result.file("src/App.tsx").unwrap().complete);
    assert!(result.incomplete_paths().contains(&"src/util.ts".to_string()));
    assert!(result.errors().is_empty());
}

#[test]
fn envelope_round_trip_keeps_every_file() {
    let files: Vec<(String, String)> = (0..5)
        .map(|i| {
            (
                format!("src/lib/module{}.ts", i),
                format!(
                    "export function value{}(input: number) {{\n  return input * {} + {};\n}}\n",
                    i,
                    i + 1,
                    i * 10
                ),
            )
        })
        .collect();
    let borrowed: Vec<(&str, &str)> = files
        .iter()
        .map(|(p, c)| (p.as_str(), c.as_str()))
        .collect();
    let result = parse_response(&envelope_v2(&borrowed), &config());

    assert_eq!(result.files().len(), files.len());
    for (path, content) in &files {
        let entry = result.file(path).unwrap();
        assert_eq!(&entry.content, content);
        assert!(entry.complete);
    }
    assert!(result.batch().unwrap().is_complete);
    assert!(!result.truncated());
    assert_eq!(result.status(), RecoveryStatus::Clean);
    assert_eq!(plan_continuation(&result), None);
}

#[test]
fn manifest_paths_that_never_arrived_are_warnings() {
    let raw = json!({
        "meta": {"version": "2.0"},
        "manifest": [
            {"path": "A.ts", "action": "create"},
            {"path": "B.ts", "action": "create"}
        ],
        "files": [{"path": "A.ts", "content": UTIL}]
    })
    .to_string();
    let result = parse_response(&raw, &config());

    assert!(result.errors().is_empty());
    assert!(result.warnings().iter().any(|w| w.contains("B.ts")));
    assert!(!result.warnings().iter().any(|w| w.contains("'A.ts'")));
}

#[test]
fn missing_closing_sentinels_end_at_the_next_file() {
    let raw = format!(
        "<!-- FILE: src/util.ts -->\n{}<!-- FILE: src/index.css -->\n{}",
        UTIL, STYLES
    );
    let result = parse_response(&raw, &config());

    assert_eq!(result.dialect(), Dialect::DelimitedV1);
    assert_eq!(result.file("src/util.ts").unwrap().content.trim(), UTIL.trim());
    assert_eq!(result.file("src/index.css").unwrap().content.trim(), STYLES.trim());
    let recovered = result.recovered_paths();
    assert!(recovered.contains(&"src/util.ts".to_string()));
    assert!(recovered.contains(&"src/index.css".to_string()));
    assert!(result.file("src/util.ts").unwrap().complete);
    assert!(result.truncated());
    assert_eq!(result.incomplete_paths(), &["src/index.css".to_string()]);
}

#[test]
fn non_ascii_prose_before_a_fence_is_not_a_path() {
    let raw = format!("Voilà\n```ts\n{}```\n", UTIL);
    let result = parse_response(&raw, &config());

    assert_eq!(result.dialect(), Dialect::Fallback);
    assert_eq!(result.file("untitled-1.ts").unwrap().content, UTIL);
}

#[test]
fn unfinished_batch_asks_for_the_rest() {
    let raw = json!({
        "meta": {"version": "2.0"},
        "batch": {
            "current": 1,
            "total": 3,
            "isComplete": false,
            "completedFiles": ["A.ts"],
            "remainingFiles": ["B.ts", "C.ts"]
        },
        "files": [{"path": "A.ts", "content": UTIL}]
    })
    .to_string();
    let result = parse_response(&raw, &config());
    let request = plan_continuation(&result).unwrap();

    assert!(result.truncated());
    assert_eq!(request.next_batch, 2);
    assert!(request.prompt.contains("B.ts"));
    assert!(request.prompt.contains("C.ts"));
    assert!(request.prompt.contains("batch 2"));
    assert_eq!(
        request.remaining_paths,
        vec!["B.ts".to_string(), "C.ts".to_string()]
    );
}

#[test]
fn parse_result_serializes_for_the_cli() {
    let result = parse_response(&delimited_v2(), &config());
    let value = serde_json::to_value(&result).unwrap();

    assert_eq!(value["dialect"], "delimited-v2");
    assert_eq!(value["files"]["src/util.ts"]["complete"], true);
}

proptest! {
    #[test]
    fn completeness_verdict_is_stable(path in "[a-z]{1,8}\\.(ts|tsx|css|json)", content in "\\PC{0,300}") {
        let first = is_complete(&path, &content, &config());
        let second = is_complete(&path, &content, &config());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn arbitrary_input_never_panics(raw in "\\PC{0,400}") {
        let result = parse_response(&raw, &config());
        if result.files().is_empty() {
            prop_assert!(!result.errors().is_empty());
        }
    }

    #[test]
    fn any_cut_of_a_delimited_response_is_safe(cut in 0usize..400) {
        let raw = delimited_v1();
        let mut end = cut.min(raw.len());
        while !raw.is_char_boundary(end) {
            end -= 1;
        }
        let result = parse_response(&raw[..end], &config());
        for path in result.incomplete_paths() {
            prop_assert!(result.files().contains_key(path));
        }
    }
}
