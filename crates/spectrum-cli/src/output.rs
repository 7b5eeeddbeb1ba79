//! Output formatting for spectrumctl (table, json, csv)

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use spectrum_core::{Peak, SweepUpdate};
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Print a success message (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg.green());
        }
    }

    /// Print an info message (unless in quiet mode)
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }

    pub fn warn(&self, msg: &str) {
        eprintln!("{}", msg.yellow());
    }

    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg.red());
    }

    /// Print rows in the configured format
    pub fn print<T: Tabled + Serialize>(&self, data: &[T]) {
        match self.format {
            OutputFormat::Table => {
                if data.is_empty() {
                    if !self.quiet {
                        println!("No data");
                    }
                } else {
                    println!("{}", Table::new(data));
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(data).unwrap_or_else(|_| "[]".to_string())
                );
            }
            OutputFormat::Csv => {
                for line in csv_lines(data) {
                    println!("{}", line);
                }
            }
        }
    }

    /// Print key-value pairs (for the status command)
    pub fn print_kv(&self, pairs: &[(&str, String)]) {
        match self.format {
            OutputFormat::Table => {
                for (key, value) in pairs {
                    println!("{}: {}", key.bold(), value);
                }
            }
            OutputFormat::Json => {
                let map: serde_json::Map<String, serde_json::Value> = pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.clone())))
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&map).unwrap_or_else(|_| "{}".to_string())
                );
            }
            OutputFormat::Csv => {
                let keys: Vec<&str> = pairs.iter().map(|(k, _)| *k).collect();
                println!("{}", keys.join(","));
                let values: Vec<String> = pairs.iter().map(|(_, v)| escape_csv(v)).collect();
                println!("{}", values.join(","));
            }
        }
    }
}

/// Header plus one line per row; field order follows the first row
fn csv_lines<T: Serialize>(data: &[T]) -> Vec<String> {
    let Some(first) = data.first() else {
        return Vec::new();
    };
    let serde_json::Value::Object(map) = serde_json::to_value(first).unwrap_or_default() else {
        return Vec::new();
    };
    let headers: Vec<String> = map.keys().cloned().collect();

    let mut lines = vec![headers.join(",")];
    for item in data {
        if let Ok(serde_json::Value::Object(row)) = serde_json::to_value(item) {
            let values: Vec<String> = headers
                .iter()
                .map(|h| match row.get(h) {
                    Some(serde_json::Value::String(s)) => escape_csv(s),
                    Some(other) => escape_csv(&other.to_string()),
                    None => String::new(),
                })
                .collect();
            lines.push(values.join(","));
        }
    }
    lines
}

/// Escape a value for CSV output
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Milliseconds since the epoch as local wall-clock time
pub fn format_timestamp(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|t| {
            t.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S%.3f")
                .to_string()
        })
        .unwrap_or_else(|| ms.to_string())
}

/// `freq_n:strength` pairs, space separated
pub fn format_peaks(peaks: &[Peak]) -> String {
    peaks
        .iter()
        .map(|p| format!("{}:{}", p.freq_n, p.strength))
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// Display types for various commands
// =============================================================================

/// One legal value of a device parameter
#[derive(Debug, Tabled, Serialize)]
pub struct CapabilityRow {
    #[tabled(rename = "Parameter")]
    pub parameter: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Label")]
    pub label: String,
}

/// One published sweep, for the watch command
#[derive(Debug, Tabled, Serialize)]
pub struct SweepRow {
    #[tabled(rename = "Time")]
    pub time: String,
    #[tabled(rename = "Sweep")]
    pub sweep_n: u64,
    #[tabled(rename = "Peaks")]
    pub peaks: String,
}

impl From<&SweepUpdate> for SweepRow {
    fn from(update: &SweepUpdate) -> Self {
        Self {
            time: format_timestamp(update.timestamp),
            sweep_n: update.sweep_n,
            peaks: format_peaks(&update.peaks),
        }
    }
}
