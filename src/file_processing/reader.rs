use crate::errors::AppError;
use crate::models::normalize_path;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncReadExt;
use walkdir::WalkDir;

/// Maximum allowed file size (10 MB).
const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

const TEXT_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "json", "css", "scss", "less", "html", "vue",
    "svelte", "astro", "md", "txt", "yaml", "yml", "toml",
];

/// Directories never worth reading for a fix.
pub const DEFAULT_IGNORED: &[&str] = &["node_modules", ".git", "dist", "build", "salvage.output"];

/// Reads a raw response from a file, or from stdin when `input` is `-`.
pub async fn read_input(input: &str) -> Result<String, AppError> {
    if input == "-" {
        let mut text = String::new();
        tokio::io::stdin().read_to_string(&mut text).await?;
        return Ok(text);
    }
    let path = Path::new(input);
    if !path.is_file() {
        return Err(AppError::MissingInput(format!("{} is not a file", input)));
    }
    Ok(fs::read_to_string(path).await?)
}

/// Gets every project text file under `root`, skipping dependency folders and ignored paths.
///
/// Ignored paths are relative to `root`.
pub fn get_project_files(root: &Path, ignore_paths: &[String]) -> Result<Vec<PathBuf>, AppError> {
    let ignored: HashSet<PathBuf> = ignore_paths
        .iter()
        .map(|p| PathBuf::from(normalize_path(p)))
        .collect();
    let mut files = Vec::new();

    let walker = WalkDir::new(root).follow_links(false).into_iter().filter_entry(|entry| {
        let name = entry.file_name().to_string_lossy();
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        !(entry.depth() > 0 && DEFAULT_IGNORED.contains(&name.as_ref()))
            && !is_ignored(relative, &ignored)
    });
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && is_text_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Checks if a path should be ignored.
fn is_ignored(path: &Path, ignored: &HashSet<PathBuf>) -> bool {
    ignored
        .iter()
        .any(|ignored_path| path.starts_with(ignored_path))
}

fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Project-relative key for a file under `root`.
pub fn relative_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    normalize_path(&relative.to_string_lossy())
}

/// Reads files into the `path -> content` map the fix engine works on.
///
/// Keys are relative to `root`. Oversized files are skipped.
pub async fn read_file_map(
    root: &Path,
    paths: &[PathBuf],
) -> Result<BTreeMap<String, String>, AppError> {
    let mut files = BTreeMap::new();
    for path in paths {
        let metadata = fs::metadata(path).await?;
        if metadata.len() > MAX_FILE_SIZE {
            log::warn!("Skipping {} ({} bytes)", path.display(), metadata.len());
            continue;
        }
        let content = fs::read_to_string(path).await?;
        files.insert(relative_key(root, path), content);
    }
    log::debug!("Read {} project file(s)", files.len());
    Ok(files)
}
