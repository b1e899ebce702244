use crate::models::{BatchInfo, FileAction, FileEntry, Manifest, Plan};
use std::collections::{BTreeMap, BTreeSet};

/// Warnings for declared paths that were not recovered.
///
/// Paths the batch says are still to come are skipped, as are manifest deletions.
pub fn cross_validate(
    manifest: Option<&Manifest>,
    plan: Option<&Plan>,
    batch: Option<&BatchInfo>,
    files: &BTreeMap<String, FileEntry>,
) -> Vec<String> {
    let deferred: BTreeSet<&str> = batch
        .map(|b| b.remaining_paths.iter().map(String::as_str).collect())
        .unwrap_or_default();
    let mut reported: BTreeSet<&str> = BTreeSet::new();
    let mut warnings = Vec::new();

    let missing = |path: &str| !files.contains_key(path) && !deferred.contains(path);

    for entry in manifest.into_iter().flatten() {
        if entry.action == FileAction::Delete || !missing(&entry.path) {
            continue;
        }
        if reported.insert(entry.path.as_str()) {
            warnings.push(format!(
                "Manifest declares '{}' but it was not recovered",
                entry.path
            ));
        }
    }

    for entry in plan.into_iter().flat_map(|p| p.entries.iter()) {
        if !missing(&entry.path) {
            continue;
        }
        if reported.insert(entry.path.as_str()) {
            warnings.push(format!("Plan lists '{}' but it was not recovered", entry.path));
        }
    }

    for warning in &warnings {
        log::warn!("{}", warning);
    }
    warnings
}
