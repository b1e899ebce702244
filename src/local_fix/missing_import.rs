use super::imports::{add_import, is_imported, NewImport};
use super::{extract_identifier, FixRequest, Patch, SymbolTable};
use std::collections::BTreeMap;

/// Imports a well-known symbol into the target file.
pub fn repair(request: &FixRequest<'_>, symbols: &SymbolTable) -> Option<Patch> {
    let name = extract_identifier(request.error_message)?;
    let symbol = symbols.lookup(&name)?;
    let (path, content) = request.target()?;

    if is_imported(content, &name) {
        log::debug!("{} is already imported in {}", name, path);
        return None;
    }

    let updated = add_import(
        content,
        &NewImport {
            name: &name,
            module: &symbol.module,
            is_default: symbol.is_default,
            is_type_only: symbol.is_type_only,
        },
    )?;

    Some(Patch {
        explanation: format!("Imported {} from '{}' in {}", name, symbol.module, path),
        files: BTreeMap::from([(path, updated)]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP: &str = "import './App.css';\n\nexport default function App() {\n  const [count, setCount] = useState(0);\n  return <button onClick={() => setCount(count + 1)}>{count}</button>;\n}\n";

    fn request<'a>(message: &'a str, files: &'a BTreeMap<String, String>) -> FixRequest<'a> {
        FixRequest {
            error_message: message,
            error_stack: None,
            target_path: "src/App.tsx",
            files,
        }
    }

    #[test]
    fn adds_exactly_one_import_line() {
        let files = BTreeMap::from([("src/App.tsx".to_string(), APP.to_string())]);
        let patch = repair(
            &request("ReferenceError: useState is not defined", &files),
            &SymbolTable::well_known(),
        )
        .unwrap();

        let updated = &patch.files["src/App.tsx"];
        assert_eq!(updated.lines().count(), APP.lines().count() + 1);
        // Quote style follows the file's existing imports.
        assert_eq!(updated.matches("import { useState } from 'react';").count(), 1);
    }

    #[test]
    fn unknown_symbol_is_not_this_strategys_job() {
        let files = BTreeMap::from([("src/App.tsx".to_string(), APP.to_string())]);
        assert!(repair(
            &request("ReferenceError: TodoItem is not defined", &files),
            &SymbolTable::well_known()
        )
        .is_none());
    }

    #[test]
    fn missing_target_is_not_fixed() {
        let files = BTreeMap::new();
        assert!(repair(
            &request("useState is not defined", &files),
            &SymbolTable::well_known()
        )
        .is_none());
    }
}
