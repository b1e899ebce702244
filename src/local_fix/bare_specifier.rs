use super::imports::{relative_path, SCRIPT_EXTENSIONS};
use super::{FixRequest, Patch};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

const RESOLVE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "json", "css"];

fn error_specifier_res() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r#"Failed to resolve import ["']([^"']+)["']"#,
            r#"Failed to resolve module specifier ["']([^"']+)["']"#,
            r#"Cannot find module ["']([^"']+)["']"#,
            r#"Can't resolve ["']([^"']+)["']"#,
            r#"(?i)bare specifier:?\s*["']?([^"'\s]+)["']?"#,
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("valid regex"))
        .collect()
    })
}

fn module_reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?:\bfrom\s*|\bimport\s*\(?\s*|\brequire\s*\(\s*)["'](?P<spec>[^"'\n]+)["']"#)
            .expect("valid regex")
    })
}

fn specifier_from_error(text: &str) -> Option<String> {
    error_specifier_res()
        .iter()
        .find_map(|re| re.captures(text))
        .map(|caps| caps[1].to_string())
}

/// A project file the specifier points at, and the path to write in its place.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Resolution {
    file: String,
    /// What the rewritten specifier should name: the file itself, or without
    /// the extension or `/index` the author left off.
    target: String,
}

fn resolve(specifier: &str, files: &BTreeMap<String, String>) -> Option<Resolution> {
    let bases = [specifier.to_string(), format!("src/{}", specifier)];
    for base in &bases {
        if files.contains_key(base) {
            return Some(Resolution {
                file: base.clone(),
                target: base.clone(),
            });
        }
        for ext in RESOLVE_EXTENSIONS {
            let candidate = format!("{}.{}", base, ext);
            if files.contains_key(&candidate) {
                return Some(Resolution {
                    file: candidate,
                    target: base.clone(),
                });
            }
        }
        for ext in RESOLVE_EXTENSIONS {
            let candidate = format!("{}/index.{}", base, ext);
            if files.contains_key(&candidate) {
                return Some(Resolution {
                    file: candidate,
                    target: format!("{}/index", base),
                });
            }
        }
    }
    None
}

fn replacement_for(importer: &str, resolution: &Resolution) -> String {
    let relative = relative_path(importer, &resolution.target);
    if resolution.target != resolution.file && resolution.target.ends_with("/index") {
        relative.trim_end_matches("/index").to_string()
    } else {
        relative
    }
}

fn rewrite_references(source: &str, specifier: &str, replacement: &str) -> Option<String> {
    let mut out = String::with_capacity(source.len());
    let mut last = 0;
    for caps in module_reference_re().captures_iter(source) {
        let Some(spec) = caps.name("spec") else { continue };
        if spec.as_str() != specifier {
            continue;
        }
        out.push_str(&source[last..spec.start()]);
        out.push_str(replacement);
        last = spec.end();
    }
    if last == 0 {
        return None;
    }
    out.push_str(&source[last..]);
    Some(out)
}

fn is_module_source(path: &str) -> bool {
    path.rsplit_once('.').is_some_and(|(_, ext)| {
        SCRIPT_EXTENSIONS.contains(&ext) || matches!(ext, "vue" | "svelte" | "astro")
    })
}

/// Rewrites a project path imported without `./` into a relative specifier everywhere it is used.
pub fn repair(request: &FixRequest<'_>) -> Option<Patch> {
    let specifier = specifier_from_error(&request.error_text())?;
    if specifier.starts_with('.') || specifier.starts_with('/') {
        return None;
    }
    let resolution = resolve(&specifier, request.files)?;
    log::debug!("Bare specifier '{}' resolves to {}", specifier, resolution.file);

    let patched: BTreeMap<String, String> = request
        .files
        .iter()
        .filter(|(path, _)| is_module_source(path))
        .filter_map(|(path, source)| {
            let replacement = replacement_for(path, &resolution);
            rewrite_references(source, &specifier, &replacement).map(|updated| (path.clone(), updated))
        })
        .collect();

    if patched.is_empty() {
        return None;
    }
    Some(Patch {
        explanation: format!(
            "Rewrote bare import '{}' as a relative path in {} file(s)",
            specifier,
            patched.len()
        ),
        files: patched,
    })
}
