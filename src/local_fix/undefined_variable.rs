use super::imports::{add_import, import_specifier, is_imported, NewImport, SCRIPT_EXTENSIONS};
use super::{extract_identifier, FixRequest, Patch, SymbolTable};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExportKind {
    Default,
    Named,
    Type,
}

fn default_declaration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^[ \t]*export\s+default\s+(?:async\s+)?(?:function\*?|class)\s+(?P<name>[A-Za-z_$][\w$]*)",
        )
        .expect("valid regex")
    })
}

fn default_identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*export\s+default\s+(?P<name>[A-Za-z_$][\w$]*)[ \t]*;?[ \t]*$")
            .expect("valid regex")
    })
}

fn named_declaration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^[ \t]*export\s+(?:declare\s+)?(?:async\s+)?(?P<keyword>const|let|var|function\*?|abstract\s+class|class|interface|type|enum)\s+(?P<name>[A-Za-z_$][\w$]*)",
        )
        .expect("valid regex")
    })
}

fn export_list_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"export\s*(?P<type>type\s*)?\{(?P<list>[^}]*)\}(?P<from>\s*from\b)?")
            .expect("valid regex")
    })
}

fn is_script(path: &str) -> bool {
    path.rsplit_once('.')
        .is_some_and(|(_, ext)| SCRIPT_EXTENSIONS.contains(&ext))
}

/// How `source` exports `name`, if it does.
fn export_of(source: &str, name: &str) -> Option<ExportKind> {
    let declared_default = default_declaration_re()
        .captures_iter(source)
        .chain(default_identifier_re().captures_iter(source))
        .any(|caps| &caps["name"] == name);
    if declared_default {
        return Some(ExportKind::Default);
    }

    for caps in named_declaration_re().captures_iter(source) {
        if &caps["name"] == name {
            let kind = match &caps["keyword"] {
                "interface" | "type" => ExportKind::Type,
                _ => ExportKind::Named,
            };
            return Some(kind);
        }
    }

    for caps in export_list_re().captures_iter(source) {
        if caps.name("from").is_some() {
            continue;
        }
        let listed = caps["list"].split(',').any(|item| {
            let exported = item.rsplit(" as ").next().unwrap_or(item);
            exported.trim().trim_start_matches("type ").trim() == name
        });
        if listed {
            return Some(if caps.name("type").is_some() {
                ExportKind::Type
            } else {
                ExportKind::Named
            });
        }
    }
    None
}

/// Imports an identifier exported by exactly one other project file.
pub fn repair(request: &FixRequest<'_>, symbols: &SymbolTable) -> Option<Patch> {
    let name = extract_identifier(request.error_message)?;
    if symbols.lookup(&name).is_some() {
        return None;
    }
    let (path, content) = request.target()?;
    if is_imported(content, &name) {
        return None;
    }

    let exporters: Vec<(&String, ExportKind)> = request
        .files
        .iter()
        .filter(|(other, _)| **other != path && is_script(other))
        .filter_map(|(other, source)| export_of(source, &name).map(|kind| (other, kind)))
        .collect();

    let [(exporter, kind)] = exporters.as_slice() else {
        log::debug!("{} is exported by {} file(s); not importing", name, exporters.len());
        return None;
    };

    let specifier = import_specifier(&path, exporter);
    let updated = add_import(
        content,
        &NewImport {
            name: &name,
            module: &specifier,
            is_default: *kind == ExportKind::Default,
            is_type_only: *kind == ExportKind::Type,
        },
    )?;

    Some(Patch {
        explanation: format!("Imported {} from '{}' in {}", name, specifier, path),
        files: BTreeMap::from([(path, updated)]),
    })
}
