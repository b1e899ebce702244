use clap::Parser;
use salvage::cli::args::{Args, Commands};
use salvage::cli::display::CliDisplayManager;
use salvage::commands::{self, ConfigUpdate, FixOptions};
use salvage::errors::AppError;
use salvage::utils::{config::read_config, logger};
use std::time::Instant;

/// The main entry point of the application
#[tokio::main]
async fn main() -> Result<(), AppError> {
    let args = Args::parse();
    let start_time = Instant::now();

    // Config updates must not fail on the config they are about to fix.
    if let Commands::Config {
        set_log_level,
        set_output_directory,
        set_min_content_length,
        set_long_file_threshold,
    } = args.command
    {
        let update = ConfigUpdate {
            log_level: set_log_level,
            output_directory: set_output_directory,
            min_content_length: set_min_content_length,
            long_file_threshold: set_long_file_threshold,
        };
        return commands::handle_config_subcommand(args.config.as_deref(), update).await;
    }

    let config = read_config(args.config.as_deref())?;
    logger::setup_logger(&config.log_level);
    log::debug!("Loaded config: {:?}", config);

    let mut display_manager = CliDisplayManager::new();

    match &args.command {
        Commands::Parse { input, json, write } => {
            if !json {
                display_manager.print_header();
            }
            commands::handle_parse_subcommand(&config, input, *json, *write, &mut display_manager)
                .await?;
            if !json {
                display_manager.print_footer(start_time.elapsed());
            }
        }
        Commands::Continue { input } => {
            commands::handle_continue_subcommand(&config, input).await?;
        }
        Commands::Fix {
            error,
            stack,
            target,
            root,
            ignore,
            apply,
        } => {
            display_manager.print_header();
            let options = FixOptions {
                error,
                stack: stack.as_deref(),
                target,
                root,
                ignore,
                apply: *apply,
            };
            commands::handle_fix_subcommand(&config, options, &mut display_manager).await?;
            display_manager.print_footer(start_time.elapsed());
        }
        Commands::Rollback => {
            display_manager.print_header();
            commands::handle_rollback_subcommand(&config, &display_manager).await?;
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}
