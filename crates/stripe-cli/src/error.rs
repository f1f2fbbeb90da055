//! Error types and handling for the CLI

use std::io;
use std::path::PathBuf;

use stripe_core::ErrorKind;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for CLI operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Error returned by the transport core
    #[error("{0}")]
    Api(#[from] stripe_core::Error),

    /// File not found
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed command-line argument
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Generic error with context
    #[error("{message}")]
    Other { message: String },
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an invalid arguments error
    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::InvalidArgs(message.into())
    }

    /// Create a generic error with message
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io(_) => 1,
            Self::Api(err) => match err.kind() {
                ErrorKind::Authentication => 20,
                ErrorKind::InvalidRequest => 21,
                ErrorKind::Card => 22,
                ErrorKind::Api => 23,
                ErrorKind::ApiConnection => 24,
                ErrorKind::Cancelled => 130,
                ErrorKind::Configuration => 5,
            },
            Self::FileNotFound { .. } => 3,
            Self::Config(_) => 5,
            Self::InvalidArgs(_) => 6,
            Self::Json(_) => 12,
            Self::Yaml(_) => 13,
            Self::TomlParse(_) | Self::TomlSerialize(_) => 14,
            Self::Other { .. } => 99,
        }
    }

    /// Check if this error should display usage help
    pub fn should_show_help(&self) -> bool {
        matches!(self, Self::InvalidArgs(_))
    }
}

/// Format an error for display to the user
pub fn format_error(error: &Error, use_color: bool) -> String {
    let label = match error {
        Error::Api(err) => match err.kind() {
            ErrorKind::Authentication => "Authentication error:",
            ErrorKind::InvalidRequest => "Invalid request:",
            ErrorKind::Card => "Card error:",
            ErrorKind::ApiConnection => "Connection error:",
            ErrorKind::Cancelled => "Cancelled:",
            _ => "API error:",
        },
        _ => "Error:",
    };

    let mut message = if use_color {
        use colored::Colorize;
        format!("{} {}", label.red().bold(), error)
    } else {
        format!("{} {}", label, error)
    };

    if let Error::Api(err) = error {
        if let Some(param) = err.param() {
            message.push_str(&format!("\n  param: {}", param));
        }
        if let Some(code) = err.code() {
            message.push_str(&format!("\n  code: {}", code));
        }
    }

    message
}
