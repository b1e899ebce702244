//! Reading and editing ES module import statements.

use regex::Regex;
use std::sync::OnceLock;

/// Extensions stripped from generated relative specifiers.
pub const SCRIPT_EXTENSIONS: &[&str] = &["tsx", "ts", "jsx", "js", "mjs", "cjs"];

fn import_statement_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?m)^[ \t]*import[ \t]+(?:(?P<type>type[ \t]+)?(?P<clause>[^;'"]*?)\s*from[ \t]*)?(?P<quote>["'])(?P<module>[^"'\n]+)["'][ \t]*;?"#,
        )
        .expect("valid regex")
    })
}

fn directive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^["']use [a-z ]+["'];?$"#).expect("valid regex"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedName {
    pub imported: String,
    pub local: String,
    pub type_only: bool,
}

impl ImportedName {
    fn parse(item: &str) -> Option<Self> {
        let item = item.trim();
        if item.is_empty() {
            return None;
        }
        let (type_only, item) = match item.strip_prefix("type ") {
            Some(rest) => (true, rest.trim()),
            None => (false, item),
        };
        let (imported, local) = match item.split_once(" as ") {
            Some((imported, local)) => (imported.trim(), local.trim()),
            None => (item, item),
        };
        Some(ImportedName {
            imported: imported.to_string(),
            local: local.to_string(),
            type_only,
        })
    }

    fn render(&self) -> String {
        let prefix = if self.type_only { "type " } else { "" };
        if self.imported == self.local {
            format!("{}{}", prefix, self.local)
        } else {
            format!("{}{} as {}", prefix, self.imported, self.local)
        }
    }
}

/// One `import ... from "module"` statement and where it sits in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStatement {
    pub start: usize,
    pub end: usize,
    pub module: String,
    pub quote: char,
    pub type_only: bool,
    pub default: Option<String>,
    pub namespace: Option<String>,
    /// `None` when the statement has no braces.
    pub named: Option<Vec<ImportedName>>,
}

impl ImportStatement {
    /// Whether this statement introduces `name` into the module scope.
    pub fn binds(&self, name: &str) -> bool {
        self.default.as_deref() == Some(name)
            || self.namespace.as_deref() == Some(name)
            || self
                .named
                .iter()
                .flatten()
                .any(|imported| imported.local == name)
    }

    fn accepts(&self, import: &NewImport<'_>) -> bool {
        if self.module != import.module || self.namespace.is_some() {
            return false;
        }
        if import.is_default {
            self.default.is_none() && !self.type_only
        } else if import.is_type_only {
            self.type_only && self.default.is_none()
        } else {
            !self.type_only
        }
    }

    fn merge(&mut self, import: &NewImport<'_>) {
        if import.is_default {
            self.default = Some(import.name.to_string());
        } else {
            self.named.get_or_insert_with(Vec::new).push(ImportedName {
                imported: import.name.to_string(),
                local: import.name.to_string(),
                type_only: false,
            });
        }
    }

    fn render(&self) -> String {
        let mut parts = Vec::new();
        if let Some(default) = &self.default {
            parts.push(default.clone());
        }
        if let Some(namespace) = &self.namespace {
            parts.push(format!("* as {}", namespace));
        }
        if let Some(named) = &self.named {
            let names: Vec<String> = named.iter().map(ImportedName::render).collect();
            parts.push(format!("{{ {} }}", names.join(", ")));
        }
        let keyword = if self.type_only { "import type" } else { "import" };
        if parts.is_empty() {
            format!("{} {q}{}{q};", keyword, self.module, q = self.quote)
        } else {
            format!(
                "{} {} from {q}{}{q};",
                keyword,
                parts.join(", "),
                self.module,
                q = self.quote
            )
        }
    }
}

fn parse_clause(statement: &mut ImportStatement, clause: &str) {
    let clause = clause.trim();
    let (head, braces) = match clause.find('{') {
        Some(open) => {
            let close = clause.rfind('}').filter(|c| *c > open).unwrap_or(clause.len());
            (&clause[..open], Some(&clause[open + 1..close]))
        }
        None => (clause, None),
    };
    for part in head.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.strip_prefix('*') {
            Some(rest) => {
                statement.namespace = rest
                    .trim()
                    .strip_prefix("as")
                    .map(|name| name.trim().to_string());
            }
            None => statement.default = Some(part.to_string()),
        }
    }
    statement.named = braces.map(|body| body.split(',').filter_map(ImportedName::parse).collect());
}

/// Every import statement in `source`, in order.
pub fn parse_imports(source: &str) -> Vec<ImportStatement> {
    import_statement_re()
        .captures_iter(source)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let mut statement = ImportStatement {
                start: whole.start() + (whole.as_str().len() - whole.as_str().trim_start().len()),
                end: whole.end(),
                module: caps["module"].to_string(),
                quote: caps["quote"].chars().next().unwrap_or('"'),
                type_only: caps.name("type").is_some(),
                default: None,
                namespace: None,
                named: None,
            };
            if let Some(clause) = caps.name("clause") {
                parse_clause(&mut statement, clause.as_str());
            }
            Some(statement)
        })
        .collect()
}

pub fn is_imported(source: &str, name: &str) -> bool {
    parse_imports(source).iter().any(|statement| statement.binds(name))
}

/// An import to add to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewImport<'a> {
    pub name: &'a str,
    pub module: &'a str,
    pub is_default: bool,
    pub is_type_only: bool,
}

impl NewImport<'_> {
    fn render(&self, quote: char) -> String {
        let keyword = if self.is_type_only { "import type" } else { "import" };
        if self.is_default {
            format!("{} {} from {q}{}{q};", keyword, self.name, self.module, q = quote)
        } else {
            format!("{} {{ {} }} from {q}{}{q};", keyword, self.name, self.module, q = quote)
        }
    }
}

/// Byte offset just past the line containing `offset`.
fn end_of_line(source: &str, offset: usize) -> usize {
    source[offset..]
        .find('\n')
        .map(|n| offset + n + 1)
        .unwrap_or(source.len())
}

/// Byte offset after leading `"use client"`-style directives.
fn after_directives(source: &str) -> usize {
    let mut offset = 0;
    let mut position = 0;
    for line in source.split_inclusive('\n') {
        let trimmed = line.trim();
        if directive_re().is_match(trimmed) {
            position = offset + line.len();
        } else if !trimmed.is_empty() {
            break;
        }
        offset += line.len();
    }
    position
}

/// Returns `source` with `import` added, or `None` when the name is already imported.
///
/// Merges into a compatible statement for the same module when there is one,
/// otherwise inserts a new line after the first import (or after any directive
/// prologue when the file has no imports).
pub fn add_import(source: &str, import: &NewImport<'_>) -> Option<String> {
    let statements = parse_imports(source);
    if statements.iter().any(|s| s.binds(import.name)) {
        return None;
    }

    if let Some(existing) = statements.iter().find(|s| s.accepts(import)) {
        let mut merged = existing.clone();
        merged.merge(import);
        return Some(format!(
            "{}{}{}",
            &source[..existing.start],
            merged.render(),
            &source[existing.end..]
        ));
    }

    let quote = statements.first().map(|s| s.quote).unwrap_or('"');
    let at = match statements.first() {
        Some(first) => end_of_line(source, first.end),
        None => after_directives(source),
    };
    let separator = if at > 0 && !source[..at].ends_with('\n') { "\n" } else { "" };
    Some(format!(
        "{}{}{}\n{}",
        &source[..at],
        separator,
        import.render(quote),
        &source[at..]
    ))
}

fn directory_of(path: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    parts.pop();
    parts
}

/// Relative path from the file `from` to `to`, always starting with `./` or `../`.
pub fn relative_path(from: &str, to: &str) -> String {
    let from_dir = directory_of(from);
    let target: Vec<&str> = to.split('/').filter(|p| !p.is_empty()).collect();
    let common = from_dir
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count()
        .min(target.len().saturating_sub(1));
    let ups = from_dir.len() - common;
    let rest = target[common..].join("/");
    if ups == 0 {
        format!("./{}", rest)
    } else {
        format!("{}{}", "../".repeat(ups), rest)
    }
}

pub fn strip_script_extension(path: &str) -> &str {
    match path.rsplit_once('.') {
        Some((stem, ext)) if SCRIPT_EXTENSIONS.contains(&ext) && !stem.ends_with('/') => stem,
        _ => path,
    }
}

/// The specifier a file at `from` would use to import the module file `to`.
pub fn import_specifier(from: &str, to: &str) -> String {
    strip_script_extension(&relative_path(from, to)).to_string()
}
