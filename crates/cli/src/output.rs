//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use ocean_lib::predictor::LOW_CONFIDENCE_THRESHOLD;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => print_json(&items),
    }
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => print_error(&format!("Failed to serialize output: {}", e)),
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Two-decimal number with a unit, or `N/A`
pub fn format_measure(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{:.2} {}", v, unit),
        None => "N/A".to_string(),
    }
}

/// Format a confidence score as a percentage
pub fn format_confidence(confidence: f64) -> String {
    format!("{:.0}%", confidence * 100.0)
}

/// Color confidence; anything under the low-confidence threshold is red
pub fn color_confidence(confidence: f64) -> String {
    let formatted = format_confidence(confidence);
    if confidence >= 0.85 {
        formatted.green().to_string()
    } else if confidence >= LOW_CONFIDENCE_THRESHOLD {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

/// Color a data source label
pub fn color_source(source: &str) -> String {
    match source {
        "cache" | "upstream" => source.green().to_string(),
        "partly_synthetic" => source.yellow().to_string(),
        "synthetic" => source.red().to_string(),
        _ => source.to_string(),
    }
}

/// Color a yes/no flag
pub fn color_flag(flag: bool) -> String {
    if flag {
        "yes".green().to_string()
    } else {
        "no".red().to_string()
    }
}
