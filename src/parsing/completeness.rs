//! Decides whether recovered file content is whole or was cut off mid-token.
//!
//! This is the single source of truth for "is this file usable as-is". It is
//! a pure function of `(path, content, config)`.

use super::patterns;
use crate::utils::config::ParserConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Json,
    Markup,
    Script,
    FreeText,
    Other,
}

fn file_kind(path: &str) -> FileKind {
    let name = path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase();
    let ext = name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    match ext {
        "json" => FileKind::Json,
        "tsx" | "jsx" | "html" | "htm" | "vue" | "svelte" | "astro" => FileKind::Markup,
        "js" | "mjs" | "cjs" | "ts" | "mts" | "cts" | "css" | "scss" | "less" => FileKind::Script,
        "md" | "markdown" | "txt" | "yaml" | "yml" | "toml" | "env" | "gitignore" | "csv" => {
            FileKind::FreeText
        }
        _ if name.starts_with('.') => FileKind::FreeText,
        _ => FileKind::Other,
    }
}

/// What the lexer was inside of when the input ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpenSpan {
    String,
    Template,
    BlockComment,
}

/// Structural counts of a code document with strings, templates and comments skipped.
#[derive(Debug, Clone, Default)]
pub(crate) struct CodeScan {
    pub open_braces: usize,
    pub close_braces: usize,
    pub open_tags: usize,
    pub close_tags: usize,
    pub unterminated: Option<OpenSpan>,
    /// The document with every skipped span blanked out, newlines kept.
    pub code: String,
}

impl CodeScan {
    pub fn brace_difference(&self) -> usize {
        self.open_braces.abs_diff(self.close_braces)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    LineComment,
    BlockComment,
    Str(char),
    Template,
    /// Inside `${ ... }`; the count is the nesting of plain braces.
    TemplateExpr(usize),
}

/// Single forward pass over `content`. Linear in the input length.
pub(crate) fn scan_code(content: &str) -> CodeScan {
    let chars: Vec<char> = content.chars().collect();
    let mut scan = CodeScan {
        code: String::with_capacity(content.len()),
        ..CodeScan::default()
    };
    let mut stack: Vec<Mode> = vec![Mode::Code];
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let prev = if i > 0 { Some(chars[i - 1]) } else { None };
        let mode = *stack.last().unwrap_or(&Mode::Code);

        match mode {
            Mode::Code | Mode::TemplateExpr(_) => match c {
                '/' if next == Some('/') && prev.is_none_or(|p| !matches!(p, ':' | '\\')) => {
                    stack.push(Mode::LineComment);
                    scan.code.push(' ');
                }
                '/' if next == Some('*') => {
                    stack.push(Mode::BlockComment);
                    scan.code.push_str("  ");
                    i += 1;
                }
                '"' => {
                    stack.push(Mode::Str('"'));
                    scan.code.push(' ');
                }
                // An apostrophe glued to a word is prose (`Don't`), not a string.
                '\'' if prev.is_none_or(|p| !p.is_alphanumeric()) => {
                    stack.push(Mode::Str('\''));
                    scan.code.push(' ');
                }
                '`' => {
                    stack.push(Mode::Template);
                    scan.code.push(' ');
                }
                '{' => {
                    if let Mode::TemplateExpr(depth) = mode {
                        stack.pop();
                        stack.push(Mode::TemplateExpr(depth + 1));
                        scan.code.push(' ');
                    } else {
                        scan.open_braces += 1;
                        scan.code.push(c);
                    }
                }
                '}' => match mode {
                    Mode::TemplateExpr(0) => {
                        stack.pop();
                        scan.code.push(' ');
                    }
                    Mode::TemplateExpr(depth) => {
                        stack.pop();
                        stack.push(Mode::TemplateExpr(depth - 1));
                        scan.code.push(' ');
                    }
                    _ => {
                        scan.close_braces += 1;
                        scan.code.push(c);
                    }
                },
                _ => {
                    if matches!(mode, Mode::TemplateExpr(_)) && c != '\n' {
                        scan.code.push(' ');
                    } else {
                        scan.code.push(c);
                    }
                }
            },
            Mode::LineComment => {
                if c == '\n' {
                    stack.pop();
                    scan.code.push('\n');
                } else {
                    scan.code.push(' ');
                }
            }
            Mode::BlockComment => {
                if c == '*' && next == Some('/') {
                    stack.pop();
                    scan.code.push_str("  ");
                    i += 1;
                } else {
                    scan.code.push(if c == '\n' { '\n' } else { ' ' });
                }
            }
            Mode::Str(quote) => {
                if c == '\\' {
                    scan.code.push(' ');
                    if next.is_some_and(|n| n != '\n') {
                        scan.code.push(' ');
                        i += 1;
                    }
                } else if c == quote {
                    stack.pop();
                    scan.code.push(' ');
                } else if c == '\n' {
                    // Plain strings cannot span lines; treat the quote as stray.
                    stack.pop();
                    scan.code.push('\n');
                } else {
                    scan.code.push(' ');
                }
            }
            Mode::Template => {
                if c == '\\' {
                    scan.code.push(' ');
                    if next.is_some() {
                        scan.code.push(if next == Some('\n') { '\n' } else { ' ' });
                        i += 1;
                    }
                } else if c == '`' {
                    stack.pop();
                    scan.code.push(' ');
                } else if c == '$' && next == Some('{') {
                    stack.push(Mode::TemplateExpr(0));
                    scan.code.push_str("  ");
                    i += 1;
                } else {
                    scan.code.push(if c == '\n' { '\n' } else { ' ' });
                }
            }
        }
        i += 1;
    }

    scan.unterminated = stack.iter().rev().find_map(|mode| match mode {
        Mode::Str(_) => Some(OpenSpan::String),
        Mode::Template | Mode::TemplateExpr(_) => Some(OpenSpan::Template),
        Mode::BlockComment => Some(OpenSpan::BlockComment),
        Mode::Code | Mode::LineComment => None,
    });
    count_tags(&mut scan);
    scan
}

/// Counts opening and closing markup tags in the blanked code.
fn count_tags(scan: &mut CodeScan) {
    let chars: Vec<char> = scan.code.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '<' {
            i += 1;
            continue;
        }
        // `useState<string>` is a type argument, not a tag.
        if i > 0 && (chars[i - 1].is_alphanumeric() || chars[i - 1] == '_') {
            i += 1;
            continue;
        }
        match chars.get(i + 1) {
            Some('>') => {
                scan.open_tags += 1;
                i += 2;
            }
            Some('/') => {
                let rest = chars.get(i + 2).copied();
                if rest == Some('>') || rest.is_some_and(|c| c.is_ascii_alphabetic()) {
                    scan.close_tags += 1;
                }
                i += 2;
            }
            Some(c) if c.is_ascii_alphabetic() => {
                let name_start = i + 1;
                let mut j = name_start;
                while j < chars.len()
                    && (chars[j].is_alphanumeric() || matches!(chars[j], '.' | ':' | '-' | '_'))
                {
                    j += 1;
                }
                let name: String = chars[name_start..j].iter().collect();
                let mut depth = 0usize;
                let mut end = None;
                while j < chars.len() {
                    match chars[j] {
                        '{' => depth += 1,
                        '}' => depth = depth.saturating_sub(1),
                        '>' if depth == 0 => {
                            end = Some(j);
                            break;
                        }
                        '<' if depth == 0 => break,
                        _ => {}
                    }
                    j += 1;
                }
                match end {
                    Some(end) => {
                        let self_closing = chars[..end]
                            .iter()
                            .rev()
                            .find(|c| !c.is_whitespace())
                            .is_some_and(|c| *c == '/');
                        if !self_closing && !patterns::is_void_element(&name) {
                            scan.open_tags += 1;
                        }
                        i = end + 1;
                    }
                    None => {
                        // Unterminated opening tag still opens an element.
                        scan.open_tags += 1;
                        i = j;
                    }
                }
            }
            _ => i += 1,
        }
    }
}

fn last_line(content: &str) -> &str {
    content.trim_end().lines().last().unwrap_or("").trim_end()
}

/// Returns whether `content` looks like a whole file for `path`.
pub fn is_complete(path: &str, content: &str, config: &ParserConfig) -> bool {
    let trimmed = content.trim();
    let length = trimmed.chars().count();
    if length < config.min_content_length {
        return false;
    }

    let tail = last_line(trimmed);
    if let Some(pattern) = patterns::match_incomplete_suffix(tail) {
        log::debug!("{}: cut off ({})", path, pattern);
        return false;
    }

    let kind = file_kind(path);
    let scan = if kind == FileKind::Json {
        None
    } else {
        Some(scan_code(trimmed))
    };
    if let Some(open) = scan.as_ref().and_then(|s| s.unterminated) {
        if kind != FileKind::FreeText {
            log::debug!("{}: ends inside an open {:?}", path, open);
            return false;
        }
    }

    let structural = match (kind, &scan) {
        (FileKind::Json, _) => serde_json::from_str::<serde_json::Value>(trimmed).is_ok(),
        (FileKind::Markup, Some(scan)) => {
            scan.brace_difference() <= config.brace_tolerance && scan.open_tags == scan.close_tags
        }
        (FileKind::Script, Some(scan)) => {
            scan.brace_difference() <= config.brace_tolerance && patterns::has_proper_ending(tail)
        }
        (FileKind::FreeText, _) => true,
        (FileKind::Other, _) => patterns::has_proper_ending(tail),
        (_, None) => false,
    };
    if structural {
        return true;
    }

    // Long, well-balanced code rarely comes out of a truncation by accident.
    if kind != FileKind::Json && length > config.long_file_threshold {
        if let Some(scan) = &scan {
            let last = tail.chars().last();
            if patterns::has_code_structure(&scan.code)
                && scan.brace_difference() <= 1
                && matches!(last, Some('}' | ';' | ')' | '>'))
            {
                log::debug!("{}: accepted as a long balanced document", path);
                return true;
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ParserConfig {
        ParserConfig::default()
    }

    const COMPONENT: &str = r#"import React, { useState } from "react";

export default function Counter() {
  const [count, setCount] = useState<number>(0);
  return (
    <div className="counter">
      <p>Don't stop: {count}</p>
      <br>
      <Button onClick={() => setCount(count + 1)} />
    </div>
  );
}
"#;

    #[test]
    fn short_content_is_incomplete() {
        assert!(!is_complete("src/a.ts", "export {};", &cfg()));
    }

    #[test]
    fn whole_component_is_complete() {
        assert!(is_complete("src/Counter.tsx", COMPONENT, &cfg()));
    }

    #[test]
    fn component_cut_inside_tag_is_incomplete() {
        let cut = &COMPONENT[..COMPONENT.find("<p>").unwrap() + 2];
        assert!(!is_complete("src/Counter.tsx", cut, &cfg()));
    }

    #[test]
    fn component_missing_closing_tag_is_incomplete() {
        let cut = COMPONENT.replace("    </div>\n", "");
        assert!(!is_complete("src/Counter.tsx", &cut, &cfg()));
    }

    #[test]
    fn braces_inside_strings_and_templates_are_ignored() {
        let content = "const open = \"{{{\";\nconst t = `${open} }}} ${'{'}`;\n// {\nexport function f() { return open + t; }\n";
        let scan = scan_code(content);
        assert_eq!(scan.open_braces, 1);
        assert_eq!(scan.close_braces, 1);
        assert!(scan.unterminated.is_none());
        assert!(is_complete("src/f.ts", content, &cfg()));
    }

    #[test]
    fn unterminated_template_literal_is_incomplete() {
        let content = "export const query = `\n  select * from users\n  where id = ${id}\n  and name = 'x';";
        assert_eq!(scan_code(content).unterminated, Some(OpenSpan::Template));
        assert!(!is_complete("src/query.ts", content, &cfg()));
    }

    #[test]
    fn unterminated_string_on_last_line_is_incomplete() {
        let content = "export const greeting = 1;\nexport const farewell = 2;\nconst s = \"unfinished;";
        assert!(!is_complete("src/s.js", content, &cfg()));
    }

    #[test]
    fn json_must_parse() {
        let whole = r#"{ "name": "demo", "version": "1.0.0", "private": true, "scripts": {} }"#;
        let cut = r#"{ "name": "demo", "version": "1.0.0", "private": true, "scripts": {"#;
        assert!(is_complete("package.json", whole, &cfg()));
        assert!(!is_complete("package.json", cut, &cfg()));
    }

    #[test]
    fn script_requires_balance_and_proper_ending() {
        let whole = "export function add(a: number, b: number) {\n  return a + b;\n}\n";
        let open = "export function add(a: number, b: number) {\n  if (a) {\n    return a + b;\n";
        let no_ending = "export function add(a: number, b: number) {\n  return a + b;\n}\nconst value";
        assert!(is_complete("src/add.ts", whole, &cfg()));
        assert!(!is_complete("src/add.ts", open, &cfg()));
        assert!(!is_complete("src/add.ts", no_ending, &cfg()));
    }

    #[test]
    fn free_text_only_needs_length_and_clean_suffix() {
        let readme = "# Demo\n\nA small project that shows how the counter works\n\nRun it locally";
        assert!(is_complete("README.md", readme, &cfg()));
        assert!(!is_complete("README.md", "# Demo\n\nSteps to run the project locally are:\n- one,", &cfg()));
    }

    #[test]
    fn other_text_needs_proper_ending() {
        let py = "def main():\n    print('hello from the generated script')\n\nmain()";
        assert!(is_complete("main.py", py, &cfg()));
        assert!(!is_complete("main.py", "def main():\n    print('hello from the generated script')\n    x", &cfg()));
    }

    #[test]
    fn generic_type_arguments_are_not_tags() {
        let scan = scan_code("const x = useState<string>('');\nconst m = new Map<string, Item>();\n");
        assert_eq!(scan.open_tags, 0);
        assert_eq!(scan.close_tags, 0);
    }

    #[test]
    fn fragments_count_as_tags() {
        let scan = scan_code("return (<>\n  <A />\n  <b>x</b>\n</>);");
        assert_eq!(scan.open_tags, 2);
        assert_eq!(scan.close_tags, 2);
    }

    #[test]
    fn long_balanced_file_uses_escape_hatch() {
        // A markup file whose tag counts disagree but which is long and balanced.
        let mut body = String::from("export function List() {\n  return (\n    <ul>\n");
        while body.len() < 2100 {
            body.push_str("      <li className=\"row\">An item in the list</li>\n");
        }
        body.push_str("    <Trailing>\n  );\n}\n");
        assert!(is_complete("src/List.tsx", &body, &cfg()));
    }

    /// Known false negative: a long component cut off inside a nested callback,
    /// with two tags still open, keeps a brace difference of 1 and a `}` ending,
    /// so the long-document escape hatch reports it as complete.
    #[test]
    fn escape_hatch_accepts_long_truncated_component() {
        let mut body = String::from(
            "export function Table() {\n  const rows = items.map((item) => {\n    return item.id;\n  });\n  return (\n    <table>\n",
        );
        while body.len() < 2100 {
            body.push_str("      <tr><td>{rows.length}</td></tr>\n");
        }
        body.push_str("      <tfoot>{rows.map((r) => {\n        return r;\n      })}");

        let scan = scan_code(&body);
        assert_eq!(scan.brace_difference(), 1);
        assert_eq!(scan.open_tags - scan.close_tags, 2);
        assert!(is_complete("src/Table.tsx", &body, &cfg()));
    }

    #[test]
    fn verdict_is_repeatable() {
        for _ in 0..3 {
            assert!(is_complete("src/Counter.tsx", COMPONENT, &cfg()));
        }
    }
}
