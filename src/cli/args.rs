use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for the Salvage application.
#[derive(Parser, Debug, PartialEq, Clone)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to config.toml. Defaults to the file next to the executable.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for the Salvage application.
#[derive(Subcommand, Debug, PartialEq, Clone)]
pub enum Commands {
    /// Recover files from a raw response.
    Parse {
        /// Response file, or `-` for stdin.
        input: String,

        /// Print the full result as JSON instead of a summary.
        #[arg(long)]
        json: bool,

        /// Write recovered files to the output directory.
        #[arg(short, long)]
        write: bool,
    },

    /// Print the prompt for the next batch of a partial response.
    Continue {
        /// Response file, or `-` for stdin.
        input: String,
    },

    /// Try a deterministic fix for a runtime or compile error.
    Fix {
        /// The error message.
        #[arg(short, long)]
        error: String,

        /// Stack trace accompanying the error.
        #[arg(long)]
        stack: Option<String>,

        /// File the error points at, relative to the project root.
        #[arg(short, long)]
        target: String,

        /// Project root to read files from.
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Paths to files or directories to ignore.
        #[arg(short, long, num_args = 1.., value_delimiter = '&')]
        ignore: Vec<String>,

        /// Write the patch to disk.
        #[arg(short, long)]
        apply: bool,
    },

    /// Rollback changes made by the last run.
    Rollback,

    /// Manage configuration options.
    Config {
        /// Set the log level (off, debug, info, warn, error).
        #[arg(long)]
        set_log_level: Option<String>,

        /// Set the output directory.
        #[arg(long)]
        set_output_directory: Option<String>,

        /// Set the shortest content that can count as a whole file.
        #[arg(long)]
        set_min_content_length: Option<usize>,

        /// Set the length above which balanced files count as complete.
        #[arg(long)]
        set_long_file_threshold: Option<usize>,
    },
}
