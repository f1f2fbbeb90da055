//! HTTP layer for the Stripe API
//!
//! This module provides:
//! - Parameter encoding in bracket notation
//! - Request assembly with authentication and client metadata headers
//! - Single-attempt transport over reqwest
//! - Retry logic with exponential backoff
//! - TLS preflight and certificate blacklist latching
//! - Error mapping for HTTP responses and network failures

pub mod params;
pub mod auth;
pub mod user_agent;
pub mod builder;
pub mod transport;
pub mod timeout;
pub mod tls;
pub mod retry;
pub mod error;
pub mod client;

pub use params::{decode_param, decode_params, encode_params, flatten_params, url_encode, ObjectIds, ResourceIds};
pub use auth::ApiKey;
pub use builder::{ApiBase, ApiRequest, FileUpload, RequestBuilder};
pub use transport::{
    Body, Headers, Method, MultipartField, MultipartValue, RawResponse, ReqwestTransport, RequestOptions,
    Transport, TransportFailure,
};
pub use timeout::TimeoutConfig;
pub use tls::{AcceptAll, CertificateBlacklist, TlsConfig, TlsMode, TlsPreflight};
pub use retry::{RetryCallback, RetryDecision, RetryHandler, RetryPolicy};
pub use error::{general_api_error, handle_api_error};
pub use client::StripeClient;
