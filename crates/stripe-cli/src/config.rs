//! Configuration management for the CLI
//!
//! This module handles loading and merging configuration from:
//! - Default values
//! - Configuration files (TOML/YAML/JSON)
//! - Environment variables
//! - Command-line arguments

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use stripe_core::http::{ApiKey, TlsConfig};
use stripe_core::{ClientConfig, ClientConfigBuilder, EnvSettings, TimeoutConfig};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default secret key
    pub api_key: Option<String>,

    /// Base URL overrides
    pub api_base: Option<String>,
    pub connect_base: Option<String>,
    pub uploads_base: Option<String>,

    /// Value of the Stripe-Version header
    pub api_version: Option<String>,

    /// Maximum network retries per request
    pub max_network_retries: Option<u32>,

    /// Connect and total request timeouts, in seconds
    pub timeouts: TimeoutConfig,

    /// Certificate verification settings
    pub tls: TlsConfig,

    /// Output settings
    pub output: OutputConfig,
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Use colored output by default
    pub color: bool,

    /// Show a spinner while waiting for a response
    pub progress: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            color: true,
            progress: true,
        }
    }
}

/// Values given on the command line; they take precedence over everything else
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub max_retries: Option<u32>,
    pub api_version: Option<String>,
    pub no_verify_ssl: bool,
    pub ca_bundle: Option<PathBuf>,
}

/// On-disk formats, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Toml,
    Yaml,
    Json,
}

impl FileFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            _ => FileFormat::Json,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;

        let config = match FileFormat::for_path(path) {
            FileFormat::Toml => toml::from_str(&content)?,
            FileFormat::Yaml => serde_yaml::from_str(&content)?,
            FileFormat::Json => serde_json::from_str(&content)?,
        };

        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        for path in Self::default_config_paths() {
            if path.exists() {
                match Self::from_file(&path) {
                    Ok(config) => {
                        tracing::debug!(path = %path.display(), "Loaded configuration file");
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to load config file");
                    }
                }
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file or default locations, then
    /// apply `STRIPE_*` environment variables on top
    pub fn load_with_file(file: Option<&Path>) -> Result<Self> {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::load()?,
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Get default configuration file paths to check
    fn default_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from(".stripe.toml"),
            PathBuf::from("stripe.toml"),
            PathBuf::from("stripe.yaml"),
            PathBuf::from("stripe.json"),
        ];

        if let Some(path) = Self::user_config_path() {
            paths.push(path.with_extension("yaml"));
            paths.push(path.with_extension("json"));
            paths.insert(4, path);
        }

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".stripe.toml"));
        }

        paths
    }

    /// `~/.config/stripe/config.toml` or the platform equivalent
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("stripe").join("config.toml"))
    }

    /// Override file values with variables resolved through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let env = EnvSettings::from_lookup(lookup)?;

        self.api_key = env.api_key.or(self.api_key.take());
        self.api_base = env.api_base.or(self.api_base.take());
        self.connect_base = env.connect_base.or(self.connect_base.take());
        self.uploads_base = env.uploads_base.or(self.uploads_base.take());
        self.api_version = env.api_version.or(self.api_version.take());
        self.max_network_retries = env.max_network_retries.or(self.max_network_retries);
        if let Some(verify) = env.verify_ssl_certs {
            self.tls.verify_ssl_certs = verify;
        }
        if let Some(path) = env.ca_bundle_path {
            self.tls.ca_bundle_path = Some(path);
        }

        Ok(())
    }

    /// Apply command-line overrides
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(retries) = overrides.max_retries {
            self.max_network_retries = Some(retries);
        }
        if let Some(version) = &overrides.api_version {
            self.api_version = Some(version.clone());
        }
        if overrides.no_verify_ssl {
            self.tls.verify_ssl_certs = false;
        }
        if let Some(path) = &overrides.ca_bundle {
            self.tls.ca_bundle_path = Some(path.clone());
        }
    }

    /// Copy with the API key masked, safe to print
    pub fn redacted(&self) -> Self {
        Self {
            api_key: self.api_key.as_deref().map(|key| ApiKey::from(key).masked()),
            ..self.clone()
        }
    }

    /// Translate into a client configuration for the transport core
    pub fn client_builder(&self) -> ClientConfigBuilder {
        let mut builder = ClientConfig::builder()
            .timeouts(self.timeouts)
            .tls(self.tls.clone());

        if let Some(key) = &self.api_key {
            builder = builder.api_key(key.as_str());
        }
        if let Some(base) = &self.api_base {
            builder = builder.api_base(base.as_str());
        }
        if let Some(base) = &self.connect_base {
            builder = builder.connect_base(base.as_str());
        }
        if let Some(base) = &self.uploads_base {
            builder = builder.uploads_base(base.as_str());
        }
        if let Some(version) = &self.api_version {
            builder = builder.api_version(version.as_str());
        }
        if let Some(retries) = self.max_network_retries {
            builder = builder.max_network_retries(retries);
        }

        builder
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = match FileFormat::for_path(path) {
            FileFormat::Toml => toml::to_string_pretty(self)?,
            FileFormat::Yaml => serde_yaml::to_string(self)?,
            FileFormat::Json => serde_json::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_load_toml_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stripe.toml");
        std::fs::write(
            &path,
            r#"
api_key = "sk_test_file"
api_base = "http://localhost:12111"
max_network_retries = 2

[timeouts]
connect_timeout = 5

[tls]
verify_ssl_certs = false
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk_test_file"));
        assert_eq!(config.api_base.as_deref(), Some("http://localhost:12111"));
        assert_eq!(config.max_network_retries, Some(2));
        assert_eq!(config.timeouts.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.timeouts.request_timeout, Duration::from_secs(80));
        assert!(!config.tls.verify_ssl_certs);
        assert!(config.output.progress);
    }

    #[test]
    fn test_load_yaml_and_json_files() {
        let dir = TempDir::new().unwrap();
        let yaml = dir.path().join("stripe.yaml");
        std::fs::write(&yaml, "api_version: '2024-06-20'\n").unwrap();
        let json = dir.path().join("stripe.json");
        std::fs::write(&json, r#"{"max_network_retries": 4}"#).unwrap();

        assert_eq!(Config::from_file(&yaml).unwrap().api_version.as_deref(), Some("2024-06-20"));
        assert_eq!(Config::from_file(&json).unwrap().max_network_retries, Some(4));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file(Path::new("/nonexistent/stripe.toml")).unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    #[test]
    fn test_precedence_file_env_flags() {
        let mut config = Config {
            api_key: Some("sk_test_file".to_string()),
            max_network_retries: Some(1),
            api_version: Some("2020-08-27".to_string()),
            ..Default::default()
        };

        config
            .apply_env(lookup(&[("STRIPE_API_KEY", "sk_test_env"), ("STRIPE_MAX_NETWORK_RETRIES", "2")]))
            .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk_test_env"));
        assert_eq!(config.max_network_retries, Some(2));

        config.apply_overrides(&Overrides {
            max_retries: Some(5),
            no_verify_ssl: true,
            ..Default::default()
        });
        assert_eq!(config.max_network_retries, Some(5));
        assert_eq!(config.api_version.as_deref(), Some("2020-08-27"));
        assert!(!config.tls.verify_ssl_certs);
    }

    #[test]
    fn test_env_matches_core_parsing() {
        let vars = [
            ("STRIPE_API_BASE", "http://localhost:12111"),
            ("STRIPE_MAX_NETWORK_RETRIES", "3"),
            ("STRIPE_VERIFY_SSL_CERTS", "no"),
            ("STRIPE_CA_BUNDLE_PATH", "/etc/ssl/ca.pem"),
        ];
        let mut config = Config::default();
        config.apply_env(lookup(&vars)).unwrap();

        let from_cli = config.client_builder().build().unwrap();
        let from_core = ClientConfigBuilder::from_lookup(lookup(&vars)).unwrap().build().unwrap();
        assert_eq!(from_cli.api_base, from_core.api_base);
        assert_eq!(from_cli.retry_policy, from_core.retry_policy);
        assert_eq!(from_cli.tls, from_core.tls);
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = Config::default();
        let err = config.apply_env(lookup(&[("STRIPE_VERIFY_SSL_CERTS", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("STRIPE_VERIFY_SSL_CERTS"));
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_redacted_hides_key() {
        let config = Config {
            api_key: Some("sk_test_4eC39HqLyjWDarjtT1zdp7dc".to_string()),
            ..Default::default()
        };
        let shown = toml::to_string(&config.redacted()).unwrap();
        assert!(!shown.contains("4eC39HqLyjWDarjtT1zdp7dc"));
        assert!(shown.contains("sk_test_"));
    }

    #[test]
    fn test_client_builder() {
        let config = Config {
            api_key: Some("sk_test_file".to_string()),
            api_base: Some("http://localhost:12111".to_string()),
            max_network_retries: Some(3),
            ..Default::default()
        };
        let client_config = config.client_builder().build().unwrap();
        assert_eq!(client_config.api_base, "http://localhost:12111");
        assert_eq!(client_config.retry_policy.max_retries, 3);
        assert_eq!(client_config.api_key.as_ref().map(|k| k.expose()), Some("sk_test_file"));
    }

    #[test]
    fn test_save_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            api_version: Some("2024-06-20".to_string()),
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(Config::from_file(&path).unwrap(), config);
    }
}
