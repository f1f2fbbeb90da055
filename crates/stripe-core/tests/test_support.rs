//! Shared test support utilities for integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use stripe_core::http::{Headers, RawResponse, RequestOptions, RetryPolicy, Transport, TransportFailure};
use stripe_core::{ClientConfig, ClientConfigBuilder, StripeClient};

pub const TEST_KEY: &str = "sk_test_4eC39HqLyjWDarjtT1zdp7dc";

/// One scripted outcome for a transport attempt
#[derive(Debug, Clone)]
pub enum Step {
    Respond(u16, String),
    Fail(TransportFailure),
    /// Never completes; used to exercise cancellation
    Hang,
}

/// Transport double that replays a fixed script and records every attempt
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<RequestOptions>>,
}

impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Options seen on every attempt, in order
    pub fn requests(&self) -> Vec<RequestOptions> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, options: &RequestOptions) -> Result<RawResponse, TransportFailure> {
        self.requests.lock().unwrap().push(options.clone());
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Respond(status, body)) => Ok(RawResponse {
                status,
                headers: Headers::new(),
                body,
            }),
            Some(Step::Fail(failure)) => Err(failure),
            Some(Step::Hang) => std::future::pending().await,
            None => Err(TransportFailure::Other("script exhausted".to_string())),
        }
    }
}

/// Builder with a test key and retries that do not sleep
pub fn config_builder(max_retries: u32) -> ClientConfigBuilder {
    ClientConfig::builder().api_key(TEST_KEY).retry_policy(
        RetryPolicy::new(max_retries)
            .with_initial_delay(Duration::ZERO)
            .with_max_delay(Duration::ZERO),
    )
}

pub fn client(max_retries: u32, transport: Arc<ScriptedTransport>) -> StripeClient {
    StripeClient::with_transport(config_builder(max_retries).build().unwrap(), transport).unwrap()
}

pub fn timeout() -> Step {
    Step::Fail(TransportFailure::Timeout("operation timed out".to_string()))
}

pub fn ok(body: &str) -> Step {
    Step::Respond(200, body.to_string())
}
