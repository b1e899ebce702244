use crate::cli::display::CliDisplayManager;
use crate::errors::AppError;
use crate::file_processing::{reader, writer};
use crate::local_fix::{FixRequest, LocalFixEngine, SymbolTable};
use crate::models::{ParseResult, RecoveryStatus};
use crate::parsing::{parse_response, plan_continuation, ContinuationRequest};
use crate::utils::config::{read_config, validate_config, write_config, Config};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// JSON shape printed by `parse --json`.
#[derive(Serialize, Debug)]
struct ParseReport<'a> {
    status: RecoveryStatus,
    #[serde(flatten)]
    result: &'a ParseResult,
    continuation: Option<ContinuationRequest>,
}

/// Handles the parse subcommand
pub async fn handle_parse_subcommand(
    config: &Config,
    input: &str,
    json: bool,
    write: bool,
    display: &mut CliDisplayManager,
) -> Result<(), AppError> {
    let raw = reader::read_input(input).await?;
    let result = parse_response(&raw, &config.parser);
    let continuation = plan_continuation(&result);

    if json {
        let report = ParseReport {
            status: result.status(),
            result: &result,
            continuation,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        display.print_input_read(input, raw.len());
        display.print_parse_summary(&result);
        if let Some(request) = &continuation {
            display.print_continuation(request);
        }
    }

    if write {
        if result.files().is_empty() {
            return Err(AppError::InvalidInput(
                "Nothing was recovered, refusing to write".to_string(),
            ));
        }
        let output_directory = Path::new(&config.output_directory);
        display.start_spinner("Writing recovered files");
        let summary = writer::write_parse_result(&result, output_directory).await;
        display.stop_spinner();
        let summary = summary?;
        if !json {
            let destination = output_directory.join(writer::OUTPUT_DIR_NAME);
            display.print_write_summary(&summary, &destination.display().to_string());
        }
    }
    Ok(())
}

/// Handles the continue subcommand. Prints only the prompt so it can be piped.
pub async fn handle_continue_subcommand(config: &Config, input: &str) -> Result<(), AppError> {
    let raw = reader::read_input(input).await?;
    let result = parse_response(&raw, &config.parser);
    match plan_continuation(&result) {
        Some(request) => println!("{}", request.prompt),
        None => log::info!("Response is complete, nothing to continue"),
    }
    Ok(())
}

/// Options for the fix subcommand.
#[derive(Debug, Clone)]
pub struct FixOptions<'a> {
    pub error: &'a str,
    pub stack: Option<&'a str>,
    pub target: &'a str,
    pub root: &'a Path,
    pub ignore: &'a [String],
    pub apply: bool,
}

/// Handles the fix subcommand
pub async fn handle_fix_subcommand(
    config: &Config,
    options: FixOptions<'_>,
    display: &mut CliDisplayManager,
) -> Result<(), AppError> {
    if !options.root.is_dir() {
        return Err(AppError::MissingInput(format!(
            "{} is not a directory",
            options.root.display()
        )));
    }

    display.start_spinner("Reading project files");
    let paths = reader::get_project_files(options.root, options.ignore);
    let files = match paths {
        Ok(paths) => reader::read_file_map(options.root, &paths).await,
        Err(e) => Err(e),
    };
    display.stop_spinner();
    let files = files?;

    let engine = LocalFixEngine::new(Arc::new(SymbolTable::with_overrides(&config.symbols)));
    let request = FixRequest {
        error_message: options.error,
        error_stack: options.stack,
        target_path: options.target,
        files: &files,
    };
    let result = engine.attempt(&request);
    display.print_fix_result(&result, &files);

    if options.apply && result.applied {
        let summary = writer::apply_changes(
            options.root,
            &result.patched_files,
            &[],
            Path::new(&config.output_directory),
        )
        .await?;
        display.print_write_summary(&summary, &options.root.display().to_string());
    } else if result.applied {
        display.print_change_counts(&result, &files);
        display.print_info("Run again with --apply to write the patch");
    }
    Ok(())
}

/// Handles the rollback subcommand
pub async fn handle_rollback_subcommand(
    config: &Config,
    display: &CliDisplayManager,
) -> Result<(), AppError> {
    let output_directory = Path::new(&config.output_directory);
    let restored = writer::rollback_last_run(output_directory).await?;
    display.print_info(&format!("Rolled back {} file(s)", restored.len()));
    Ok(())
}

/// Settings changed by the config subcommand.
#[derive(Debug, Default, Clone)]
pub struct ConfigUpdate {
    pub log_level: Option<String>,
    pub output_directory: Option<String>,
    pub min_content_length: Option<usize>,
    pub long_file_threshold: Option<usize>,
}

/// Handles the config subcommand
pub async fn handle_config_subcommand(
    config_path: Option<&Path>,
    update: ConfigUpdate,
) -> Result<(), AppError> {
    let mut config = read_config(config_path)?;

    if let Some(log_level) = update.log_level {
        config.log_level = log_level.clone();
        println!("Log level set to {}", log_level);
    }

    if let Some(output_directory) = update.output_directory {
        config.output_directory = output_directory.clone();
        println!("Output directory set to {}", output_directory);
    }

    if let Some(min_content_length) = update.min_content_length {
        config.parser.min_content_length = min_content_length;
        println!("Minimum content length set to {}", min_content_length);
    }

    if let Some(long_file_threshold) = update.long_file_threshold {
        config.parser.long_file_threshold = long_file_threshold;
        println!("Long file threshold set to {}", long_file_threshold);
    }

    validate_config(&config)?;
    write_config(&config, config_path)?;
    Ok(())
}
