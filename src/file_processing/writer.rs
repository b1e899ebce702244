use crate::errors::AppError;
use crate::models::{FileAction, ParseResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Directory under the output directory that receives recovered files.
pub const OUTPUT_DIR_NAME: &str = "salvage.output";

/// What a write-through changed on disk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub created: Vec<String>,
    pub modified: Vec<String>,
    pub unchanged: Vec<String>,
    pub deleted: Vec<String>,
}

/// Configuration for rollback functionality.
#[derive(Serialize, Deserialize, Debug, Default)]
struct RollbackConfig {
    new_files: Vec<String>,
    rollback_files: Vec<(String, String)>,
}

/// Joins a project-relative path onto `root`, refusing anything that escapes it.
fn safe_join(root: &Path, relative: &str) -> Result<PathBuf, AppError> {
    let relative = Path::new(relative);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || relative.as_os_str().is_empty() {
        return Err(AppError::InvalidInput(format!(
            "Refusing to write outside the output directory: {}",
            relative.display()
        )));
    }
    Ok(root.join(relative))
}

async fn backup(
    rollback_dir: &Path,
    rollback_config: &mut RollbackConfig,
    path: &Path,
    original_content: &str,
) -> Result<(), AppError> {
    let backup_path = rollback_dir.join(format!("{:04}.bak", rollback_config.rollback_files.len()));
    fs::write(&backup_path, original_content).await?;
    rollback_config.rollback_files.push((
        path.display().to_string(),
        backup_path.display().to_string(),
    ));
    Ok(())
}

/// Writes `files` under `root` and removes `deletions`, recording a rollback
/// point in `<state_directory>/.rollback`. The previous rollback point is replaced.
pub async fn apply_changes(
    root: &Path,
    files: &BTreeMap<String, String>,
    deletions: &[String],
    state_directory: &Path,
) -> Result<WriteSummary, AppError> {
    // Validate every target before touching the disk.
    let targets = files
        .iter()
        .map(|(relative, content)| Ok((relative, safe_join(root, relative)?, content)))
        .collect::<Result<Vec<_>, AppError>>()?;
    let removals = deletions
        .iter()
        .map(|relative| Ok((relative, safe_join(root, relative)?)))
        .collect::<Result<Vec<_>, AppError>>()?;

    let rollback_dir = state_directory.join(".rollback");
    if rollback_dir.exists() {
        fs::remove_dir_all(&rollback_dir).await?;
    }
    fs::create_dir_all(&rollback_dir).await?;

    let mut rollback_config = RollbackConfig::default();
    let mut summary = WriteSummary::default();

    for (relative, path, content) in targets {
        if path.is_file() {
            let original_content = fs::read_to_string(&path).await?;
            if original_content == *content {
                summary.unchanged.push(relative.clone());
                continue;
            }
            backup(&rollback_dir, &mut rollback_config, &path, &original_content).await?;
            summary.modified.push(relative.clone());
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            rollback_config.new_files.push(path.display().to_string());
            summary.created.push(relative.clone());
        }
        fs::write(&path, content).await?;
        log::debug!("Wrote {}", path.display());
    }

    for (relative, path) in removals {
        if !path.is_file() {
            continue;
        }
        let original_content = fs::read_to_string(&path).await?;
        backup(&rollback_dir, &mut rollback_config, &path, &original_content).await?;
        fs::remove_file(&path).await?;
        summary.deleted.push(relative.clone());
    }

    // Write the rollback config to rollback.toml
    let rollback_config_str = toml::to_string(&rollback_config)?;
    fs::write(rollback_dir.join("rollback.toml"), rollback_config_str).await?;

    Ok(summary)
}

/// Writes a parse result to `<output_directory>/salvage.output`, deleting
/// files its manifest marks for deletion.
pub async fn write_parse_result(
    result: &ParseResult,
    output_directory: &Path,
) -> Result<WriteSummary, AppError> {
    let root = output_directory.join(OUTPUT_DIR_NAME);
    fs::create_dir_all(&root).await?;

    let deletions: Vec<String> = result
        .manifest()
        .into_iter()
        .flatten()
        .filter(|entry| entry.action == FileAction::Delete)
        .map(|entry| entry.path.clone())
        .collect();

    apply_changes(&root, &result.file_map(), &deletions, output_directory).await
}

/// Rolls back changes made by the last run.
pub async fn rollback_last_run(output_directory: &Path) -> Result<Vec<String>, AppError> {
    let rollback_dir = output_directory.join(".rollback");
    if !rollback_dir.exists() {
        return Err(AppError::RollbackError(
            "No changes to rollback".to_string(),
        ));
    }

    // Read the rollback config
    let rollback_config_str = fs::read_to_string(rollback_dir.join("rollback.toml")).await?;
    let rollback_config: RollbackConfig = toml::from_str(&rollback_config_str)?;
    let mut restored = Vec::new();

    // Delete new files created during the run
    for new_file in rollback_config.new_files {
        let path = Path::new(&new_file);
        if path.exists() {
            fs::remove_file(path).await?;
            log::info!("Deleted new file: {}", path.display());
            restored.push(new_file.clone());
        }
    }

    // Restore original files from the .rollback directory
    for (original_path, backup_path) in rollback_config.rollback_files {
        let original = Path::new(&original_path);
        let backup = Path::new(&backup_path);
        if backup.exists() {
            if let Some(parent) = original.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::copy(backup, original).await?;
            log::info!("Restored: {}", original.display());
            restored.push(original_path.clone());
        }
    }

    // Remove the .rollback directory after rollback
    fs::remove_dir_all(rollback_dir).await?;

    Ok(restored)
}
