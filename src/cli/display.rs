use crate::file_processing::writer::WriteSummary;
use crate::models::{LocalFixResult, ParseResult, RecoveryStatus};
use crate::parsing::ContinuationRequest;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use similar::{ChangeTag, TextDiff};
use std::collections::BTreeMap;
use std::time::Duration;

/// Unified diff of one file, without colour.
pub fn render_diff(path: &str, old: &str, new: &str) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{}", path), &format!("b/{}", path))
        .to_string()
}

/// Manages CLI display and output formatting.
pub struct CliDisplayManager {
    spinner: Option<ProgressBar>,
}

impl Default for CliDisplayManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CliDisplayManager {
    pub fn new() -> Self {
        CliDisplayManager { spinner: None }
    }

    /// Prints the application header.
    pub fn print_header(&self) {
        let title = format!("│  ⛏  Salvage v{:<7}│", env!("CARGO_PKG_VERSION"));
        println!("\n{}", "╭──────────────────────╮".bright_magenta());
        println!("{}", title.bright_magenta().bold());
        println!("{}\n", "╰──────────────────────╯".bright_magenta());
    }

    pub fn print_input_read(&self, source: &str, bytes: usize) {
        self.print_section("📥", "Reading Response", &format!("{} ({} bytes)", source, bytes));
    }

    /// Prints the outcome of a parse: dialect, status, files and diagnostics.
    pub fn print_parse_summary(&self, result: &ParseResult) {
        let status = match result.status() {
            RecoveryStatus::Clean => "clean".bright_green(),
            RecoveryStatus::Repaired => "repaired".bright_yellow(),
            RecoveryStatus::PartialRecovery => "partial recovery".yellow(),
            RecoveryStatus::FatalParse => "fatal".bright_red(),
        };
        self.print_section(
            "🔎",
            "Parse Result",
            &format!("{} dialect, {} file(s)", result.dialect(), result.files().len()),
        );
        println!("   {} status: {}", "→".bright_white(), status.bold());

        for entry in result.files().values() {
            let mark = if entry.complete {
                "✓".bright_green()
            } else {
                "✗".bright_red()
            };
            let recovered = if result.recovered_paths().contains(&entry.path) {
                " (boundary inferred)".dimmed().to_string()
            } else {
                String::new()
            };
            println!(
                "     {} {} {}{}",
                mark,
                entry.path.bright_white(),
                format!("{} lines", entry.content.lines().count()).dimmed(),
                recovered
            );
        }

        if let Some(explanation) = result.explanation() {
            self.print_info(explanation);
        }
        for warning in result.warnings() {
            self.print_warning(warning);
        }
        for error in result.errors() {
            self.print_error(error);
        }
    }

    pub fn print_continuation(&self, request: &ContinuationRequest) {
        self.print_section(
            "🔁",
            "Continuation Needed",
            &format!("batch {} of {}", request.next_batch, request.total),
        );
        for line in request.prompt.lines() {
            println!("   {}", line);
        }
    }

    /// Prints the result of a local fix attempt with a diff of every patched file.
    pub fn print_fix_result(&self, result: &LocalFixResult, originals: &BTreeMap<String, String>) {
        if !result.applied {
            self.print_section("🩹", "Local Fix", "");
            self.print_warning(&result.explanation);
            return;
        }
        self.print_section("🩹", "Local Fix", &format!("{:?}", result.kind));
        self.print_info(&result.explanation);
        for (path, patched) in &result.patched_files {
            let original = originals.get(path).map(String::as_str).unwrap_or_default();
            for line in render_diff(path, original, patched).lines() {
                let styled = match line.chars().next() {
                    Some('+') if !line.starts_with("+++") => line.green(),
                    Some('-') if !line.starts_with("---") => line.red(),
                    Some('@') => line.cyan(),
                    _ => line.normal(),
                };
                println!("   {}", styled);
            }
        }
    }

    /// Prints a per-line change count for a patch without the full diff.
    pub fn print_change_counts(&self, result: &LocalFixResult, originals: &BTreeMap<String, String>) {
        for (path, patched) in &result.patched_files {
            let original = originals.get(path).map(String::as_str).unwrap_or_default();
            let diff = TextDiff::from_lines(original, patched);
            let (added, removed) = diff.iter_all_changes().fold((0, 0), |(a, r), change| {
                match change.tag() {
                    ChangeTag::Insert => (a + 1, r),
                    ChangeTag::Delete => (a, r + 1),
                    ChangeTag::Equal => (a, r),
                }
            });
            self.print_info(&format!("{}: +{} -{}", path, added, removed));
        }
    }

    pub fn print_write_summary(&self, summary: &WriteSummary, destination: &str) {
        self.print_section("💾", "Saving Results", destination);
        for path in &summary.created {
            println!("     {} {}", "+".bright_green(), path);
        }
        for path in &summary.modified {
            println!("     {} {}", "~".bright_yellow(), path);
        }
        for path in &summary.deleted {
            println!("     {} {}", "-".bright_red(), path);
        }
    }

    /// Prints the application footer.
    pub fn print_footer(&self, duration: Duration) {
        println!();
        println!(
            "{}",
            format!("⚡ Completed in {:.2?}", duration)
                .bright_white()
                .dimmed(),
        );
        println!();
    }

    /// Starts a spinner for ongoing operations.
    pub fn start_spinner(&mut self, message: &str) {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template(&format!(
            "   {} {{spinner}} {}",
            "→".bright_white(),
            message.italic().bright_white()
        ))
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        self.spinner = Some(spinner);
    }

    pub fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    /// Helper function to print a section header.
    fn print_section(&self, icon: &str, title: &str, description: &str) {
        println!("{} {}", icon.bright_yellow(), title.bright_cyan().bold());
        if !description.is_empty() {
            self.print_info(description);
        }
    }

    /// Helper function to print an informational message.
    pub fn print_info(&self, message: &str) {
        println!(
            "   {} {}",
            "→".bright_white(),
            message.italic().bright_white()
        );
    }

    pub fn print_warning(&self, message: &str) {
        println!("   {} {}", "!".bright_yellow().bold(), message.yellow());
    }

    pub fn print_error(&self, message: &str) {
        println!("   {} {}", "✗".bright_red().bold(), message.red());
    }
}
