//! Stripe Core - transport layer for the Stripe API
//!
//! This crate turns a logical API operation (method, path, parameters,
//! headers) into an authenticated HTTP request, retries transient network
//! failures, and maps responses into parsed values or typed errors.
//!
//! # Main Components
//!
//! - **Parameter Encoder**: bracket-notation flattening and percent-encoding
//! - **Transport**: single HTTP attempts over `reqwest`
//! - **Retry**: bounded retries with backoff and idempotency keys
//! - **TLS Preflight**: one-time trust bundle and certificate blacklist checks
//! - **Response Parser**: JSON bodies with symbolized keys
//! - **Error Mapper**: HTTP status and error payload to [`Error`] variants
//!
//! # Example
//!
//! ```no_run
//! use serde_json::json;
//! use stripe_core::{ApiRequest, ClientConfig, Result, StripeClient};
//!
//! async fn example() -> Result<()> {
//!     let config = ClientConfig::builder()
//!         .api_key("sk_test_123")
//!         .max_network_retries(2)
//!         .build()?;
//!     let client = StripeClient::new(config)?;
//!
//!     let request = ApiRequest::get("/v1/charges").with_params(json!({"limit": 3}));
//!     let (response, _key) = client.request(request).await?;
//!     println!("{}", response.data["data"][0]["id"].as_str().unwrap_or("none"));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod response;
pub mod symbol;

#[cfg(feature = "blocking")]
pub mod blocking;

// Re-export main types for convenience
pub use config::{ClientConfig, ClientConfigBuilder, EnvSettings};
pub use error::{Error, ErrorDetails, ErrorKind, Result};
pub use http::{
    ApiBase, ApiKey, ApiRequest, FileUpload, Method, RetryPolicy, StripeClient, TimeoutConfig, TlsConfig,
};
pub use response::{parse_response, ApiValue, ParsedResponse};
pub use symbol::Symbol;

// Cancellation tokens accepted by `StripeClient::request_with_cancel`
pub use tokio_util::sync::CancellationToken;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
