//! Last-resort extraction from markdown code fences.

use super::completeness::is_complete;
use super::Extractor;
use crate::models::{normalize_path, Dialect, ResultBuilder};
use crate::utils::config::ParserConfig;
use regex::Regex;
use std::sync::OnceLock;

const SHELL_LANGUAGES: &[&str] = &["bash", "sh", "shell", "console", "zsh", "powershell", "cmd"];

fn header_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*(?://|#|/\*|<!--|--)\s*(?:file(?:name)?|path)\s*:\s*(?P<path>[^\s*]+?)\s*(?:\*/|-->)?\s*$",
        )
        .expect("valid regex")
    })
}

fn info_attribute_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\b(?:title|file(?:name)?|path)\s*=\s*["']?(?P<path>[^"'\s]+)"#)
            .expect("valid regex")
    })
}

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    start: usize,
    end: usize,
    text: &'a str,
}

fn split_lines(raw: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut start = 0;
    for piece in raw.split_inclusive('\n') {
        let end = start + piece.len();
        lines.push(Line {
            start,
            end,
            text: piece.trim_end_matches(['\n', '\r']),
        });
        start = end;
    }
    lines
}

/// Opening fence: the backtick run length and the info string.
fn fence_open(line: &str) -> Option<(usize, &str)> {
    let trimmed = line.trim_start();
    let ticks = trimmed.chars().take_while(|c| *c == '`').count();
    if ticks < 3 {
        return None;
    }
    let info = trimmed[ticks..].trim();
    if info.contains('`') {
        return None;
    }
    Some((ticks, info))
}

fn is_fence_close(line: &str, ticks: usize) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= ticks && trimmed.chars().all(|c| c == '`')
}

fn looks_like_file_path(text: &str) -> bool {
    !text.is_empty()
        && text.len() < 200
        && !text.ends_with('.')
        && (text.contains('.') || text.contains('/'))
        && text
            .chars()
            .all(|c| c.is_alphanumeric() || "._-/@[]()+~$".contains(c))
}

/// Reads a path out of a label line such as `### src/App.tsx` or `**File: \`a.ts\`**`.
fn path_from_label(line: &str) -> Option<String> {
    let mut text = line.trim().trim_start_matches('#').trim();
    text = text.trim_matches('*').trim();
    for prefix in ["file:", "filename:", "path:"] {
        if text
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        {
            text = text[prefix.len()..].trim();
        }
    }
    let text = text
        .trim_end_matches(':')
        .trim_matches(|c| c == '`' || c == '*' || c == '"' || c == '\'')
        .trim_end_matches(':')
        .trim();
    looks_like_file_path(text).then(|| normalize_path(text))
}

/// Splits the info string into a language and, when one is written there, a path.
fn parse_info(info: &str) -> (String, Option<String>) {
    if let Some(caps) = info_attribute_re().captures(info) {
        let lang = info.split_whitespace().next().unwrap_or_default();
        return (lang.to_ascii_lowercase(), Some(normalize_path(&caps["path"])));
    }
    let (lang, rest) = match info.split_once([':', ' ']) {
        Some((lang, rest)) => (lang, rest.trim()),
        None => (info, ""),
    };
    if looks_like_file_path(lang) && lang.contains('.') && rest.is_empty() {
        let ext = lang.rsplit('.').next().unwrap_or_default();
        return (ext.to_ascii_lowercase(), Some(normalize_path(lang)));
    }
    let path = rest
        .split_whitespace()
        .find(|token| looks_like_file_path(token))
        .map(normalize_path);
    (lang.to_ascii_lowercase(), path)
}

fn extension_for(lang: &str) -> &'static str {
    match lang {
        "typescript" | "ts" => "ts",
        "tsx" => "tsx",
        "javascript" | "js" => "js",
        "jsx" => "jsx",
        "json" => "json",
        "css" => "css",
        "scss" => "scss",
        "html" => "html",
        "markdown" | "md" => "md",
        "python" | "py" => "py",
        "rust" | "rs" => "rs",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "bash" | "sh" | "shell" => "sh",
        _ => "txt",
    }
}

/// The nearest non-blank line above a fence, unless it is itself a fence.
fn preceding_label<'a>(lines: &[Line<'a>]) -> Option<&'a str> {
    let line = lines.iter().rev().find(|line| !line.text.trim().is_empty())?;
    if line.text.trim_start().starts_with("```") {
        None
    } else {
        Some(line.text)
    }
}

fn finish_content(body: &str) -> String {
    let text = body.trim_end();
    if text.trim().is_empty() {
        String::new()
    } else {
        format!("{}\n", text)
    }
}

/// Extractor for [`Dialect::Fallback`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackExtractor;

impl Extractor for FallbackExtractor {
    fn dialect(&self) -> Dialect {
        Dialect::Fallback
    }

    fn extract(&self, raw: &str, config: &ParserConfig) -> ResultBuilder {
        let mut builder = ResultBuilder::new(Dialect::Fallback);
        builder.warn("No dialect markers found; files were taken from code fences with inferred paths");

        let lines = split_lines(raw);
        let mut untitled = 0;
        let mut i = 0;

        while i < lines.len() {
            let Some((ticks, info)) = fence_open(lines[i].text) else {
                i += 1;
                continue;
            };
            let close = (i + 1..lines.len()).find(|&j| is_fence_close(lines[j].text, ticks));
            let body_end = close.map(|j| lines[j].start).unwrap_or(raw.len());
            let mut body = &raw[lines[i].end.min(body_end)..body_end];

            let (lang, info_path) = parse_info(info);
            let mut path = info_path.or_else(|| preceding_label(&lines[..i]).and_then(path_from_label));
            if path.is_none() {
                let first_line = body.lines().next().unwrap_or_default();
                if let Some(caps) = header_comment_re().captures(first_line) {
                    path = Some(normalize_path(&caps["path"]));
                    body = body[first_line.len()..].trim_start_matches(['\r', '\n']);
                }
            }
            i = close.map(|j| j + 1).unwrap_or(lines.len());

            let path = match path {
                Some(path) => path,
                None if SHELL_LANGUAGES.contains(&lang.as_str()) => {
                    log::debug!("Skipping unnamed {} snippet", lang);
                    continue;
                }
                None => {
                    untitled += 1;
                    let name = format!("untitled-{}.{}", untitled, extension_for(&lang));
                    builder.warn(format!("No path found for a code block; named it '{}'", name));
                    name
                }
            };

            let content = finish_content(body);
            if content.is_empty() {
                builder.warn(format!("Skipped empty code block for '{}'", path));
                continue;
            }

            let complete = match close {
                Some(_) => is_complete(&path, &content, config),
                None => {
                    builder.mark_truncated();
                    builder.mark_recovered(&path);
                    builder.warn(format!("Response ended inside the code block for '{}'", path));
                    false
                }
            };
            builder.insert_file(&path, content, complete);
        }

        if builder.files().is_empty() {
            builder.error("No code blocks could be recovered from the response");
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UTIL: &str = "export function sum(values: number[]) {\n  return values.reduce((a, b) => a + b, 0);\n}\n";

    fn extract(raw: &str) -> crate::models::ParseResult {
        FallbackExtractor.extract(raw, &ParserConfig::default()).finish()
    }

    #[test]
    fn path_comes_from_the_preceding_line() {
        let raw = format!("Here is the helper.\n\n**`src/util.ts`**\n```ts\n{}```\n", UTIL);
        let result = extract(&raw);

        assert_eq!(result.file("src/util.ts").unwrap().content, UTIL);
        assert!(result.file("src/util.ts").unwrap().complete);
        assert!(!result.truncated());
        assert!(result.errors().is_empty());
        assert!(!result.warnings().is_empty());
    }

    #[test]
    fn path_comes_from_a_header_comment_which_is_removed() {
        let raw = format!("```ts\n// File: src/util.ts\n{}```", UTIL);
        let result = extract(&raw);
        assert_eq!(result.file("src/util.ts").unwrap().content, UTIL);
    }

    #[test]
    fn path_comes_from_the_info_string() {
        let raw = format!("```ts title=\"src/util.ts\"\n{}```\n```tsx:src/b.tsx\nexport const B = () => null;\n```", UTIL);
        let result = extract(&raw);
        assert!(result.file("src/util.ts").is_some());
        assert!(result.file("src/b.tsx").is_some());
    }

    #[test]
    fn unnamed_blocks_get_synthetic_names() {
        let raw = format!("Some code:\n```ts\n{}```\nMore:\n```\nplain words that are long enough to count as content\n```", UTIL);
        let result = extract(&raw);
        assert!(result.file("untitled-1.ts").is_some());
        assert!(result.file("untitled-2.txt").is_some());
    }

    #[test]
    fn labels_with_multibyte_text_are_read_safely() {
        assert_eq!(path_from_label("Voilà"), None);
        assert_eq!(path_from_label("Fiché"), None);
        assert_eq!(path_from_label("File: `src/café.ts`"), Some("src/café.ts".to_string()));

        let raw = format!("Voilà le code\n```ts\n{}```\n", UTIL);
        assert!(extract(&raw).file("untitled-1.ts").is_some());
    }

    #[test]
    fn unnamed_shell_snippets_are_skipped() {
        let raw = format!("Run:\n```bash\nnpm install\n```\n\nsrc/util.ts\n```ts\n{}```", UTIL);
        let result = extract(&raw);
        assert_eq!(result.files().len(), 1);
    }

    #[test]
    fn unterminated_fence_is_truncated_and_incomplete() {
        let raw = format!("src/util.ts\n```ts\n{}", UTIL);
        let result = extract(&raw);

        assert!(result.truncated());
        assert!(!result.file("src/util.ts").unwrap().complete);
        assert_eq!(result.incomplete_paths(), &["src/util.ts".to_string()]);
    }

    #[test]
    fn longer_fence_keeps_nested_fences_in_content() {
        let readme = "# Demo\n\nInstall with:\n\n```bash\nnpm install\n```\n\nThen start the dev server and open the browser.\n";
        let raw = format!("README.md\n````md\n{}````\n", readme);
        let result = extract(&raw);
        assert_eq!(result.file("README.md").unwrap().content, readme);
    }

    #[test]
    fn no_fences_is_an_error() {
        let result = extract("Sorry, I cannot help with that.");
        assert!(!result.errors().is_empty());
        assert!(result.files().is_empty());
    }

    #[test]
    fn labels_are_cleaned() {
        assert_eq!(path_from_label("### src/App.tsx").as_deref(), Some("src/App.tsx"));
        assert_eq!(path_from_label("**File: `./a/b.ts`**").as_deref(), Some("a/b.ts"));
        assert_eq!(path_from_label("Here is the code:"), None);
    }
}
