//! Output formatting and writing utilities
//!
//! Responses are printed as JSON, pretty JSON, YAML, or an indented
//! human-readable tree.

use crate::cli::OutputFormat;
use crate::error::Result;
use crate::logging::redaction;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_json::Value;
use std::io::{self, IsTerminal, Write};
use std::time::Duration;
use stripe_core::ParsedResponse;
use tracing::trace;

/// Trait for formatting serializable values
pub trait OutputFormatter {
    fn format<T: Serialize>(&self, value: &T) -> Result<String>;
}

impl OutputFormatter for OutputFormat {
    fn format<T: Serialize>(&self, value: &T) -> Result<String> {
        match self {
            OutputFormat::Json => Ok(serde_json::to_string(value)?),
            OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(value)?),
            OutputFormat::Yaml => Ok(serde_yaml::to_string(value)?),
            OutputFormat::Human => Ok(format_value_human(&serde_json::to_value(value)?)),
        }
    }
}

/// Output writer that handles different output formats and colors
pub struct OutputWriter {
    format: OutputFormat,
    use_color: bool,
    show_progress: bool,
    quiet: bool,
    writer: Box<dyn Write>,
}

impl OutputWriter {
    /// Create a new output writer
    pub fn new(format: OutputFormat, use_color: bool, quiet: bool, progress: bool) -> Self {
        Self {
            format,
            use_color,
            show_progress: progress && !quiet && io::stderr().is_terminal(),
            quiet,
            writer: Box::new(io::stdout()),
        }
    }

    /// Create an output writer with a custom writer
    pub fn with_writer(format: OutputFormat, use_color: bool, quiet: bool, writer: Box<dyn Write>) -> Self {
        Self {
            format,
            use_color,
            show_progress: false,
            quiet,
            writer,
        }
    }

    /// Write a line of output
    pub fn writeln(&mut self, content: &str) -> Result<()> {
        writeln!(self.writer, "{}", content)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Write an info message
    pub fn info(&mut self, message: &str) -> Result<()> {
        if self.quiet || self.format != OutputFormat::Human {
            return Ok(());
        }

        if self.use_color {
            self.writeln(&format!("{} {}", "ℹ".blue(), message))
        } else {
            self.writeln(&format!("INFO: {}", message))
        }
    }

    /// Write a success message
    pub fn success(&mut self, message: &str) -> Result<()> {
        if self.quiet || self.format != OutputFormat::Human {
            return Ok(());
        }

        if self.use_color {
            self.writeln(&message.green().to_string())
        } else {
            self.writeln(message)
        }
    }

    /// Write a warning message
    pub fn warning(&mut self, message: &str) -> Result<()> {
        if self.format != OutputFormat::Human {
            return Ok(());
        }

        if self.use_color {
            self.writeln(&message.yellow().to_string())
        } else {
            self.writeln(&format!("WARNING: {}", message))
        }
    }

    /// Write data in the configured format.
    ///
    /// Stdout gets the value as-is, since fields such as `client_secret` are
    /// the data being asked for. Only the trace log copy is redacted.
    pub fn data<T: Serialize>(&mut self, value: &T) -> Result<()> {
        if tracing::enabled!(tracing::Level::TRACE) {
            trace!(data = %redacted_for_log(value)?, "Writing output");
        }

        let formatted = self.format.format(value)?;
        self.writeln(formatted.trim_end())
    }

    /// Write an API response.
    ///
    /// Machine formats carry the body only; the human format adds a status
    /// line.
    pub fn response(&mut self, response: &ParsedResponse) -> Result<()> {
        let body = Value::from(&response.data);

        if self.format == OutputFormat::Human && !self.quiet {
            let status = format!("HTTP {}", response.status);
            if self.use_color {
                self.writeln(&status.green().bold().to_string())?;
            } else {
                self.writeln(&status)?;
            }
        }

        self.data(&body)
    }

    /// Create a spinner for indeterminate progress
    pub fn spinner(&self, message: &str) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(default_spinner_style());
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    }
}

/// Copy of `value` with credentials masked, for log lines
fn redacted_for_log<T: Serialize>(value: &T) -> Result<Value> {
    let mut logged = serde_json::to_value(value)?;
    redaction::redact_json_value(&mut logged);
    Ok(logged)
}

pub fn default_spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Render a JSON value as an indented `key: value` tree
pub fn format_value_human(value: &Value) -> String {
    let mut output = String::new();
    match value {
        Value::Object(map) if !map.is_empty() => write_object(&mut output, map, 0),
        Value::Array(items) if !items.is_empty() => write_array(&mut output, items, 0),
        other => output.push_str(&format_scalar(other)),
    }
    output
}

fn write_object(output: &mut String, map: &serde_json::Map<String, Value>, indent: usize) {
    let pad = "  ".repeat(indent);
    for (key, value) in map {
        match value {
            Value::Object(inner) if !inner.is_empty() => {
                output.push_str(&format!("{}{}:\n", pad, key));
                write_object(output, inner, indent + 1);
            }
            Value::Array(items) if !items.is_empty() => {
                output.push_str(&format!("{}{}:\n", pad, key));
                write_array(output, items, indent + 1);
            }
            scalar => output.push_str(&format!("{}{}: {}\n", pad, key, format_scalar(scalar))),
        }
    }
}

fn write_array(output: &mut String, items: &[Value], indent: usize) {
    let pad = "  ".repeat(indent);
    for item in items {
        match item {
            Value::Object(inner) if !inner.is_empty() => {
                output.push_str(&format!("{}-\n", pad));
                write_object(output, inner, indent + 1);
            }
            Value::Array(nested) if !nested.is_empty() => {
                output.push_str(&format!("{}-\n", pad));
                write_array(output, nested, indent + 1);
            }
            scalar => output.push_str(&format!("{}- {}\n", pad, format_scalar(scalar))),
        }
    }
}

fn format_scalar(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        Value::Object(_) => "{}".to_string(),
        Value::Array(_) => "[]".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    include!("output/tests.rs");
}
