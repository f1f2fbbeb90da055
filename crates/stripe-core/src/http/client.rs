//! Stripe API client orchestrating all HTTP components
//!
//! Provides a high-level interface for making authenticated, retryable
//! requests and interpreting their responses.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::http::auth::ApiKey;
use crate::http::builder::{ApiRequest, RequestBuilder};
use crate::http::error::handle_api_error;
use crate::http::retry::execute_with_retry;
use crate::http::tls::TlsPreflight;
use crate::http::transport::{ReqwestTransport, Transport};
use crate::http::user_agent::prepare_client_metadata;
use crate::response::{parse_response, ParsedResponse};

struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    preflight: TlsPreflight,
}

/// Client for the Stripe API.
///
/// Cheap to clone; clones share the configuration, the connection pools
/// and the TLS latches.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("config", &self.inner.config)
            .field("preflight", &self.inner.preflight)
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Create a client using the `reqwest` transport
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_transport(config, Arc::new(ReqwestTransport::new()))
    }

    /// Create a client configured from `STRIPE_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Create a client that sends every attempt through `transport`
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let preflight = TlsPreflight::new(config.tls.clone(), Arc::clone(&config.certificate_blacklist));
        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                transport,
                preflight,
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// TLS latches for this client
    pub fn tls_preflight(&self) -> &TlsPreflight {
        &self.inner.preflight
    }

    /// Execute a request, returning the parsed response and the key used
    pub async fn request(&self, request: ApiRequest) -> Result<(ParsedResponse, ApiKey)> {
        self.request_with_cancel(request, &CancellationToken::new()).await
    }

    /// Execute a request that aborts with [`Error::Cancelled`] once `cancel`
    /// fires
    #[instrument(
        name = "stripe_request",
        skip(self, request, cancel),
        fields(method = %request.method, path = %request.path)
    )]
    pub async fn request_with_cancel(
        &self,
        request: ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<(ParsedResponse, ApiKey)> {
        let config = &self.inner.config;
        let api_key = ApiKey::resolve(request.api_key.as_ref(), config.api_key.as_ref())?;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let tls = self.inner.preflight.resolve()?;
        let api_base = config.base_url(&request.base);
        self.inner.preflight.check_certificate(api_base, &tls).await?;

        prepare_client_metadata().await;
        let options = RequestBuilder::new(config).build(&request, &api_key, tls)?;

        let response = execute_with_retry(
            self.inner.transport.as_ref(),
            &options,
            &config.retry_policy,
            config.on_successful_retry.as_ref(),
            cancel,
        )
        .await?;

        debug!(status = response.status, bytes = response.body.len(), "Received response");

        if !response.is_success() {
            return Err(handle_api_error(response.status, &response.body));
        }

        let parsed = parse_response(response.status, &response.body)?;
        Ok((parsed, api_key))
    }
}
