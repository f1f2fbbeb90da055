//! TLS configuration and the one-time preflight check
//!
//! The preflight decides, once per client, whether requests are sent with
//! peer verification against a trust bundle or without verification. When
//! verification is in force a certificate blacklist check also runs once and
//! its verdict is latched.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{error, warn};

use crate::error::{Error, ErrorDetails, Result};
use crate::http::error::revoked_certificate_error;

/// TLS settings for a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Whether to verify the server certificate
    pub verify_ssl_certs: bool,
    /// PEM trust bundle; the built-in roots are used when unset
    pub ca_bundle_path: Option<PathBuf>,
    /// Fail instead of downgrading when the bundle cannot be read
    pub strict: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            verify_ssl_certs: true,
            ca_bundle_path: None,
            strict: false,
        }
    }
}

impl TlsConfig {
    pub fn with_verify_ssl_certs(mut self, verify: bool) -> Self {
        self.verify_ssl_certs = verify;
        self
    }

    pub fn with_ca_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_bundle_path = Some(path.into());
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Resolved verification mode for outgoing requests
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TlsMode {
    /// Peer certificates are not checked
    Disabled,
    /// Peer certificates are checked against the bundle, or the built-in
    /// roots when no bundle is configured
    Verified { bundle_path: Option<PathBuf> },
}

impl TlsMode {
    pub fn is_verified(&self) -> bool {
        matches!(self, TlsMode::Verified { .. })
    }
}

/// Pass/fail check of the server certificate for a host
pub trait CertificateBlacklist: Send + Sync {
    /// Returns `true` when the certificate presented by `host` is acceptable
    fn check(&self, host: &str, bundle_path: Option<&Path>) -> bool;
}

/// Blacklist that accepts every certificate
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl CertificateBlacklist for AcceptAll {
    fn check(&self, _host: &str, _bundle_path: Option<&Path>) -> bool {
        true
    }
}

/// Per-client TLS latches
pub struct TlsPreflight {
    config: TlsConfig,
    blacklist: Arc<dyn CertificateBlacklist>,
    mode: OnceLock<std::result::Result<TlsMode, String>>,
    certificate_verified: OnceCell<bool>,
}

impl fmt::Debug for TlsPreflight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsPreflight")
            .field("config", &self.config)
            .field("mode", &self.mode.get())
            .field("certificate_verified", &self.certificate_verified.get())
            .finish()
    }
}

impl TlsPreflight {
    pub fn new(config: TlsConfig, blacklist: Arc<dyn CertificateBlacklist>) -> Self {
        Self {
            config,
            blacklist,
            mode: OnceLock::new(),
            certificate_verified: OnceCell::new(),
        }
    }

    /// Resolve the verification mode, evaluating it on first use only.
    ///
    /// | verify_ssl_certs | bundle readable | mode                    |
    /// |------------------|-----------------|-------------------------|
    /// | false            | -               | Disabled (warn once)    |
    /// | true             | no              | Disabled (warn once)    |
    /// | true             | yes / unset     | Verified                |
    ///
    /// With `strict` set, an unreadable bundle is a connection error instead.
    pub fn resolve(&self) -> Result<TlsMode> {
        self.mode
            .get_or_init(|| self.evaluate())
            .clone()
            .map_err(|message| Error::ApiConnection(ErrorDetails::new(message)))
    }

    fn evaluate(&self) -> std::result::Result<TlsMode, String> {
        if !self.config.verify_ssl_certs {
            warn!(
                "SSL certificate verification is disabled. Your information could be \
                intercepted by third parties; re-enable verification before going to production."
            );
            return Ok(TlsMode::Disabled);
        }

        let Some(path) = &self.config.ca_bundle_path else {
            return Ok(TlsMode::Verified { bundle_path: None });
        };

        match std::fs::File::open(path) {
            Ok(_) => Ok(TlsMode::Verified {
                bundle_path: Some(path.clone()),
            }),
            Err(e) if self.config.strict => Err(format!(
                "Could not read the CA bundle at {}: {}. Refusing to send requests without \
                certificate verification because strict TLS is enabled.",
                path.display(),
                e
            )),
            Err(e) => {
                warn!(
                    bundle = %path.display(),
                    error = %e,
                    "Unable to read the CA bundle; SSL certificate verification is disabled for this client"
                );
                Ok(TlsMode::Disabled)
            }
        }
    }

    /// Run the blacklist check once for verified connections and return
    /// the latched verdict as a result.
    pub async fn check_certificate(&self, api_base: &str, mode: &TlsMode) -> Result<()> {
        let TlsMode::Verified { bundle_path } = mode else {
            return Ok(());
        };

        let verified = *self
            .certificate_verified
            .get_or_try_init(|| async {
                let blacklist = Arc::clone(&self.blacklist);
                let host = host_of(api_base);
                let bundle_path = bundle_path.clone();
                tokio::task::spawn_blocking(move || blacklist.check(&host, bundle_path.as_deref()))
                    .await
                    .map_err(|e| {
                        // Not latched; the next request runs the check again.
                        error!(error = %e, "Certificate blacklist check did not complete");
                        Error::ApiConnection(ErrorDetails::new(format!(
                            "Could not complete the certificate check for {}. Please try again.",
                            api_base
                        )))
                    })
            })
            .await?;

        if verified {
            Ok(())
        } else {
            Err(revoked_certificate_error(api_base))
        }
    }

    /// Latched blacklist verdict, if the check has run
    pub fn certificate_verified(&self) -> Option<bool> {
        self.certificate_verified.get().copied()
    }
}

fn host_of(api_base: &str) -> String {
    url::Url::parse(api_base)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| api_base.to_string())
}
