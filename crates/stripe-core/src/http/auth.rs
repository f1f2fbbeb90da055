//! API key handling
//!
//! Keys are sent as bearer tokens. A key never appears in `Debug` or
//! `Display` output, so it cannot leak through logs or error messages.

use std::fmt;

use crate::error::{Error, ErrorDetails, Result};

const MODE_PREFIXES: [&str; 6] = ["sk_test_", "sk_live_", "pk_test_", "pk_live_", "rk_test_", "rk_live_"];

/// Secret API key used as a bearer token
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Resolve the key for a call: per-call override first, then the
    /// client default, then validate it.
    pub fn resolve(override_key: Option<&ApiKey>, default_key: Option<&ApiKey>) -> Result<ApiKey> {
        let key = override_key.or(default_key).ok_or_else(|| {
            Error::Authentication(ErrorDetails::new(
                "No API key provided. Set your API key with ClientConfig::builder().api_key(..) \
                or the STRIPE_API_KEY environment variable. You can generate API keys from the \
                Stripe web interface. See https://stripe.com/api for details, or email \
                support@stripe.com if you have any questions.",
            ))
        })?;
        key.validate()?;
        Ok(key.clone())
    }

    /// Reject keys containing whitespace
    pub fn validate(&self) -> Result<()> {
        if self.0.chars().any(char::is_whitespace) {
            return Err(Error::Authentication(ErrorDetails::new(
                "Your API key is invalid, as it contains whitespace. (HINT: You can double-check \
                your API key from the Stripe web interface. See https://stripe.com/api for \
                details, or email support@stripe.com if you have any questions.)",
            )));
        }
        Ok(())
    }

    /// Value for the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }

    /// Raw key text
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Short masked form safe for display, e.g. `sk_test_...4242`
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 12 {
            return "***".to_string();
        }
        let prefix_len = if MODE_PREFIXES.iter().any(|p| self.0.starts_with(p)) { 8 } else { 3 };
        let prefix: String = chars[..prefix_len].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, tail)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl From<&str> for ApiKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ApiKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}
