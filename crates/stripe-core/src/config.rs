//! Client configuration
//!
//! A [`ClientConfig`] is assembled with [`ClientConfigBuilder`] (or loaded
//! from the environment) and frozen inside a client once built.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::http::auth::ApiKey;
use crate::http::builder::ApiBase;
use crate::http::params::{ObjectIds, ResourceIds};
use crate::http::retry::{RetryCallback, RetryPolicy};
use crate::http::timeout::TimeoutConfig;
use crate::http::tls::{AcceptAll, CertificateBlacklist, TlsConfig};

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";
pub const DEFAULT_CONNECT_BASE: &str = "https://connect.stripe.com";
pub const DEFAULT_UPLOADS_BASE: &str = "https://uploads.stripe.com";

/// Settings shared by every request a client issues
#[derive(Clone)]
pub struct ClientConfig {
    /// Default key, used when a request carries none
    pub api_key: Option<ApiKey>,
    pub api_base: String,
    pub connect_base: String,
    pub uploads_base: String,
    /// Sent as `Stripe-Version` when set
    pub api_version: Option<String>,
    pub retry_policy: RetryPolicy,
    pub timeouts: TimeoutConfig,
    pub tls: TlsConfig,
    pub on_successful_retry: Option<RetryCallback>,
    pub object_ids: Arc<dyn ObjectIds>,
    pub certificate_blacklist: Arc<dyn CertificateBlacklist>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            connect_base: DEFAULT_CONNECT_BASE.to_string(),
            uploads_base: DEFAULT_UPLOADS_BASE.to_string(),
            api_version: None,
            retry_policy: RetryPolicy::default(),
            timeouts: TimeoutConfig::default(),
            tls: TlsConfig::default(),
            on_successful_retry: None,
            object_ids: Arc::new(ResourceIds),
            certificate_blacklist: Arc::new(AcceptAll),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &self.api_key)
            .field("api_base", &self.api_base)
            .field("connect_base", &self.connect_base)
            .field("uploads_base", &self.uploads_base)
            .field("api_version", &self.api_version)
            .field("retry_policy", &self.retry_policy)
            .field("timeouts", &self.timeouts)
            .field("tls", &self.tls)
            .field("on_successful_retry", &self.on_successful_retry.is_some())
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Load configuration from `STRIPE_*` environment variables
    pub fn from_env() -> Result<Self> {
        ClientConfigBuilder::from_env()?.build()
    }

    /// Base URL for `base`
    pub fn base_url<'a>(&'a self, base: &'a ApiBase) -> &'a str {
        match base {
            ApiBase::Api => &self.api_base,
            ApiBase::Connect => &self.connect_base,
            ApiBase::Uploads => &self.uploads_base,
            ApiBase::Custom(url) => url,
        }
    }

    /// Check base URLs and timeouts
    pub fn validate(&self) -> Result<()> {
        for base in [&self.api_base, &self.connect_base, &self.uploads_base] {
            let url = url::Url::parse(base)?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::configuration(format!(
                    "Unsupported URL scheme '{}' in base URL {}",
                    url.scheme(),
                    base
                )));
            }
        }

        self.timeouts.validate().map_err(Error::configuration)?;

        Ok(())
    }
}

/// `STRIPE_*` environment settings, parsed but not yet applied.
///
/// Blank values count as unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvSettings {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub connect_base: Option<String>,
    pub uploads_base: Option<String>,
    pub api_version: Option<String>,
    pub max_network_retries: Option<u32>,
    pub verify_ssl_certs: Option<bool>,
    pub ca_bundle_path: Option<PathBuf>,
}

impl EnvSettings {
    /// Read the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read variables resolved through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let max_network_retries = var("STRIPE_MAX_NETWORK_RETRIES")
            .map(|retries| {
                retries.parse::<u32>().map_err(|e| Error::Configuration {
                    message: format!("STRIPE_MAX_NETWORK_RETRIES must be a non-negative integer, got '{}'", retries),
                    source: Some(e.into()),
                })
            })
            .transpose()?;

        let verify_ssl_certs = var("STRIPE_VERIFY_SSL_CERTS")
            .map(|verify| {
                parse_bool(&verify).ok_or_else(|| {
                    Error::configuration(format!("STRIPE_VERIFY_SSL_CERTS must be true or false, got '{}'", verify))
                })
            })
            .transpose()?;

        Ok(Self {
            api_key: var("STRIPE_API_KEY"),
            api_base: var("STRIPE_API_BASE"),
            connect_base: var("STRIPE_CONNECT_BASE"),
            uploads_base: var("STRIPE_UPLOADS_BASE"),
            api_version: var("STRIPE_API_VERSION"),
            max_network_retries,
            verify_ssl_certs,
            ca_bundle_path: var("STRIPE_CA_BUNDLE_PATH").map(PathBuf::from),
        })
    }

    /// Set every present value on `builder`
    pub fn apply(self, mut builder: ClientConfigBuilder) -> ClientConfigBuilder {
        if let Some(key) = self.api_key {
            builder = builder.api_key(key);
        }
        if let Some(base) = self.api_base {
            builder = builder.api_base(base);
        }
        if let Some(base) = self.connect_base {
            builder = builder.connect_base(base);
        }
        if let Some(base) = self.uploads_base {
            builder = builder.uploads_base(base);
        }
        if let Some(version) = self.api_version {
            builder = builder.api_version(version);
        }
        if let Some(retries) = self.max_network_retries {
            builder = builder.max_network_retries(retries);
        }
        if let Some(verify) = self.verify_ssl_certs {
            builder = builder.verify_ssl_certs(verify);
        }
        if let Some(path) = self.ca_bundle_path {
            builder = builder.ca_bundle_path(path);
        }
        builder
    }
}

/// Builder for [`ClientConfig`]
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from `STRIPE_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Start from variables resolved through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(EnvSettings::from_lookup(lookup)?.apply(Self::new()))
    }

    pub fn api_key(mut self, key: impl Into<ApiKey>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = base.into();
        self
    }

    pub fn connect_base(mut self, base: impl Into<String>) -> Self {
        self.config.connect_base = base.into();
        self
    }

    pub fn uploads_base(mut self, base: impl Into<String>) -> Self {
        self.config.uploads_base = base.into();
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.config.api_version = Some(version.into());
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry_policy = policy;
        self
    }

    /// Shorthand for changing only `retry_policy.max_retries`
    pub fn max_network_retries(mut self, retries: u32) -> Self {
        self.config.retry_policy.max_retries = retries;
        self
    }

    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.config.timeouts = timeouts;
        self
    }

    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.config.tls = tls;
        self
    }

    pub fn verify_ssl_certs(mut self, verify: bool) -> Self {
        self.config.tls.verify_ssl_certs = verify;
        self
    }

    pub fn ca_bundle_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tls.ca_bundle_path = Some(path.into());
        self
    }

    pub fn strict_tls(mut self, strict: bool) -> Self {
        self.config.tls.strict = strict;
        self
    }

    /// Callback run once when a request succeeds after retrying
    pub fn on_successful_retry(mut self, callback: RetryCallback) -> Self {
        self.config.on_successful_retry = Some(callback);
        self
    }

    pub fn object_ids(mut self, object_ids: Arc<dyn ObjectIds>) -> Self {
        self.config.object_ids = object_ids;
        self
    }

    pub fn certificate_blacklist(mut self, blacklist: Arc<dyn CertificateBlacklist>) -> Self {
        self.config.certificate_blacklist = blacklist;
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::collections::HashMap;
    use std::time::Duration;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::builder().build().unwrap();
        assert!(config.api_key.is_none());
        assert_eq!(config.api_base, "https://api.stripe.com");
        assert_eq!(config.connect_base, "https://connect.stripe.com");
        assert_eq!(config.uploads_base, "https://uploads.stripe.com");
        assert_eq!(config.retry_policy.max_retries, 0);
        assert_eq!(config.timeouts.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.timeouts.request_timeout, Duration::from_secs(80));
        assert!(config.tls.verify_ssl_certs);
        assert!(!config.tls.strict);
    }

    #[test]
    fn test_from_lookup() {
        let builder = ClientConfigBuilder::from_lookup(lookup(&[
            ("STRIPE_API_KEY", "sk_test_env"),
            ("STRIPE_API_BASE", "http://localhost:12111"),
            ("STRIPE_API_VERSION", "2024-06-20"),
            ("STRIPE_MAX_NETWORK_RETRIES", "3"),
            ("STRIPE_VERIFY_SSL_CERTS", "false"),
            ("STRIPE_CA_BUNDLE_PATH", "/etc/ssl/certs/ca-certificates.crt"),
        ]))
        .unwrap();
        let config = builder.build().unwrap();

        assert_eq!(config.api_key, Some(ApiKey::new("sk_test_env")));
        assert_eq!(config.api_base, "http://localhost:12111");
        assert_eq!(config.api_version.as_deref(), Some("2024-06-20"));
        assert_eq!(config.retry_policy.max_retries, 3);
        assert!(!config.tls.verify_ssl_certs);
        assert_eq!(
            config.tls.ca_bundle_path,
            Some(PathBuf::from("/etc/ssl/certs/ca-certificates.crt"))
        );
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        let err = ClientConfigBuilder::from_lookup(lookup(&[("STRIPE_MAX_NETWORK_RETRIES", "-1")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = ClientConfigBuilder::from_lookup(lookup(&[("STRIPE_VERIFY_SSL_CERTS", "maybe")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_env_settings_blank_values_unset() {
        let settings = EnvSettings::from_lookup(lookup(&[
            ("STRIPE_API_KEY", "  "),
            ("STRIPE_API_VERSION", " 2024-06-20 "),
            ("STRIPE_VERIFY_SSL_CERTS", "off"),
        ]))
        .unwrap();
        assert_eq!(settings.api_key, None);
        assert_eq!(settings.api_version.as_deref(), Some("2024-06-20"));
        assert_eq!(settings.verify_ssl_certs, Some(false));
        assert_eq!(settings.max_network_retries, None);
    }

    #[test]
    fn test_invalid_base_url() {
        let err = ClientConfig::builder().api_base("not a url").build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = ClientConfig::builder().connect_base("ftp://connect.stripe.com").build().unwrap_err();
        assert!(err.to_string().contains("Unsupported URL scheme"));
    }

    #[test]
    fn test_invalid_timeouts() {
        let err = ClientConfig::builder()
            .timeouts(TimeoutConfig::new(Duration::from_secs(10), Duration::from_secs(1)))
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = ClientConfig::builder().api_key("sk_test_secret_value").build().unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk_test_secret_value"));
    }

    #[test]
    fn test_base_url_selection() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url(&ApiBase::Uploads), DEFAULT_UPLOADS_BASE);
        let custom = ApiBase::Custom("http://localhost".into());
        assert_eq!(config.base_url(&custom), "http://localhost");
    }
}
