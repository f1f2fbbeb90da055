//! Client identification headers

use std::fmt::Debug;
use std::process::Command;
use std::sync::OnceLock;

use serde::Serialize;

use crate::http::transport::Headers;
use crate::VERSION;

pub const USER_AGENT_HEADER: &str = "User-Agent";
pub const CLIENT_USER_AGENT_HEADER: &str = "X-Stripe-Client-User-Agent";
pub const CLIENT_RAW_USER_AGENT_HEADER: &str = "X-Stripe-Client-Raw-User-Agent";
pub const ERROR_HEADER: &str = "Error";

/// `User-Agent` header value
pub fn user_agent() -> String {
    format!("Stripe/v1 RustBindings/{}", VERSION)
}

/// Metadata describing the client, sent as JSON
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientUserAgent {
    pub bindings_version: &'static str,
    pub lang: &'static str,
    pub lang_version: &'static str,
    pub platform: String,
    pub publisher: &'static str,
    pub uname: String,
}

impl ClientUserAgent {
    pub fn current() -> Self {
        Self {
            bindings_version: VERSION,
            lang: "rust",
            lang_version: option_env!("CARGO_PKG_RUST_VERSION")
                .filter(|v| !v.is_empty())
                .unwrap_or("unknown"),
            platform: format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS),
            publisher: "stripe",
            uname: uname().to_string(),
        }
    }
}

static UNAME: OnceLock<String> = OnceLock::new();

fn uname() -> &'static str {
    UNAME.get_or_init(|| {
        if !cfg!(any(target_os = "linux", target_os = "macos")) {
            return "uname lookup failed".to_string();
        }
        Command::new("uname")
            .arg("-a")
            .output()
            .ok()
            .filter(|output| output.status.success())
            .and_then(|output| String::from_utf8(output.stdout).ok())
            .map(|text| text.trim().to_string())
            .unwrap_or_else(|| "uname lookup failed".to_string())
    })
}

/// Run the `uname -a` lookup on the blocking pool so that building headers
/// later never spawns a process on an async worker. Returns at once after
/// the first lookup.
pub async fn prepare_client_metadata() {
    if UNAME.get().is_some() {
        return;
    }
    if let Err(e) = tokio::task::spawn_blocking(|| {
        uname();
    })
    .await
    {
        tracing::debug!(error = %e, "uname lookup did not complete");
    }
}

/// Add the metadata header.
///
/// When the metadata cannot be serialized, its debug form is sent in the
/// raw header together with an `Error` header; the request still proceeds.
pub fn apply_client_metadata<T: Serialize + Debug>(headers: &mut Headers, metadata: &T) {
    match serde_json::to_string(metadata) {
        Ok(json) => headers.insert(CLIENT_USER_AGENT_HEADER, json),
        Err(e) => {
            tracing::debug!(error = %e, "Falling back to raw client metadata header");
            headers.insert(CLIENT_RAW_USER_AGENT_HEADER, format!("{:?}", metadata));
            headers.insert(ERROR_HEADER, format!("{} (serde_json::Error)", e));
        }
    }
}
