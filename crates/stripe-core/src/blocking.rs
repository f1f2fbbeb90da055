//! Synchronous client
//!
//! Wraps [`StripeClient`] with an internal current-thread runtime. Must not
//! be used from inside an async context.

use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::http::auth::ApiKey;
use crate::http::builder::ApiRequest;
use crate::http::client::StripeClient;
use crate::http::transport::Transport;
use crate::response::ParsedResponse;

/// Blocking Stripe API client
#[derive(Debug)]
pub struct Client {
    inner: StripeClient,
    runtime: Runtime,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::from_async(StripeClient::new(config)?)
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        Self::from_async(StripeClient::with_transport(config, transport)?)
    }

    fn from_async(inner: StripeClient) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Configuration {
                message: format!("Failed to create runtime: {}", e),
                source: Some(e.into()),
            })?;
        Ok(Self { inner, runtime })
    }

    /// Execute a request, blocking until it completes
    pub fn request(&self, request: ApiRequest) -> Result<(ParsedResponse, ApiKey)> {
        self.runtime.block_on(self.inner.request(request))
    }

    /// The async client this wraps
    pub fn as_async(&self) -> &StripeClient {
        &self.inner
    }
}
