//! Single-attempt HTTP execution
//!
//! A [`Transport`] issues exactly one request described by [`RequestOptions`]
//! and reports either the raw response (any status) or a
//! [`TransportFailure`]. Retrying is the caller's business.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::http::timeout::TimeoutConfig;
use crate::http::tls::TlsMode;

/// HTTP methods understood by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }

    /// Methods whose parameters travel in the query string
    pub fn encodes_in_query(&self) -> bool {
        matches!(self, Method::Get | Method::Head | Method::Delete)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            _ => Err(format!("Unsupported HTTP method: {}", s)),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
        }
    }
}

/// Ordered header list; names are unique ignoring ASCII case
#[derive(Clone, Default, PartialEq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing any existing value for the same name in place
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter().position(|(existing, _)| existing.eq_ignore_ascii_case(&name)) {
            Some(idx) => self.0[idx] = (name, value),
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.0.iter().position(|(existing, _)| existing.eq_ignore_ascii_case(name))?;
        Some(self.0.remove(idx).1)
    }

    /// Apply every header from `other`, overriding existing values
    pub fn extend(&mut self, other: &Headers) {
        for (name, value) in other.iter() {
            self.insert(name, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.iter().map(|(name, value)| {
                if name.eq_ignore_ascii_case("authorization") {
                    (name.as_str(), "[REDACTED]")
                } else {
                    (name.as_str(), value.as_str())
                }
            }))
            .finish()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// One part of a multipart body
#[derive(Debug, Clone, PartialEq)]
pub struct MultipartField {
    pub name: String,
    pub value: MultipartValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MultipartValue {
    Text(String),
    File {
        filename: String,
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
}

/// Request payload
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Pre-encoded `application/x-www-form-urlencoded` string
    Form(String),
    Multipart(Vec<MultipartField>),
}

/// Fully prepared description of one HTTP request.
///
/// Built once per logical call and reused unchanged for every attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    pub method: Method,
    pub url: Url,
    pub headers: Headers,
    pub body: Option<Body>,
    pub timeouts: TimeoutConfig,
    pub tls: TlsMode,
}

/// HTTP response as received, before any interpretation
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network-level failure of a single attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    /// Connect or total request timeout elapsed
    Timeout(String),
    ConnectionRefused(String),
    /// Connection dropped before the response completed
    ConnectionBroken(String),
    /// Certificate verification or TLS setup failed
    Tls(String),
    /// DNS or socket resolution failure
    Socket(String),
    /// The request could not be built, e.g. an invalid header value
    InvalidRequest(String),
    Other(String),
}

impl TransportFailure {
    /// Underlying error text
    pub fn detail(&self) -> &str {
        match self {
            TransportFailure::Timeout(detail)
            | TransportFailure::ConnectionRefused(detail)
            | TransportFailure::ConnectionBroken(detail)
            | TransportFailure::Tls(detail)
            | TransportFailure::Socket(detail)
            | TransportFailure::InvalidRequest(detail)
            | TransportFailure::Other(detail) => detail,
        }
    }

    /// Short name used in logs
    pub fn category(&self) -> &'static str {
        match self {
            TransportFailure::Timeout(_) => "timeout",
            TransportFailure::ConnectionRefused(_) => "connection_refused",
            TransportFailure::ConnectionBroken(_) => "connection_broken",
            TransportFailure::Tls(_) => "tls",
            TransportFailure::Socket(_) => "socket",
            TransportFailure::InvalidRequest(_) => "invalid_request",
            TransportFailure::Other(_) => "other",
        }
    }

    /// Certificate failures and unbuildable requests are never retried
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportFailure::Tls(_) | TransportFailure::InvalidRequest(_))
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category(), self.detail())
    }
}

impl std::error::Error for TransportFailure {}

/// Executes a single HTTP attempt
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, options: &RequestOptions) -> Result<RawResponse, TransportFailure>;
}

/// Production transport backed by `reqwest`.
///
/// One `reqwest::Client` is built and kept per distinct TLS mode and connect
/// timeout, so connection pools are reused across calls.
#[derive(Default)]
pub struct ReqwestTransport {
    clients: Mutex<HashMap<(TlsMode, Duration), reqwest::Client>>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn client_for(&self, tls: &TlsMode, connect_timeout: Duration) -> Result<reqwest::Client, TransportFailure> {
        let key = (tls.clone(), connect_timeout);
        let mut clients = self.clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let client = build_client(tls, connect_timeout)?;
        clients.insert(key, client.clone());
        Ok(client)
    }
}

fn build_client(tls: &TlsMode, connect_timeout: Duration) -> Result<reqwest::Client, TransportFailure> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .connect_timeout(connect_timeout);

    match tls {
        TlsMode::Disabled => {
            builder = builder.danger_accept_invalid_certs(true);
        }
        TlsMode::Verified { bundle_path: None } => {}
        TlsMode::Verified { bundle_path: Some(path) } => {
            let pem = std::fs::read(path).map_err(|e| {
                TransportFailure::Tls(format!("Failed to read CA bundle {}: {}", path.display(), e))
            })?;
            let certificates = reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| {
                TransportFailure::Tls(format!("Failed to parse CA bundle {}: {}", path.display(), e))
            })?;
            builder = builder.tls_built_in_root_certs(false);
            for certificate in certificates {
                builder = builder.add_root_certificate(certificate);
            }
        }
    }

    builder
        .build()
        .map_err(|e| TransportFailure::Tls(format!("Failed to create HTTP client: {}", e)))
}

fn build_form(fields: &[MultipartField]) -> Result<reqwest::multipart::Form, TransportFailure> {
    let mut form = reqwest::multipart::Form::new();
    for field in fields {
        form = match &field.value {
            MultipartValue::Text(text) => form.text(field.name.clone(), text.clone()),
            MultipartValue::File {
                filename,
                content_type,
                bytes,
            } => {
                let mut part = reqwest::multipart::Part::bytes(bytes.clone()).file_name(filename.clone());
                if let Some(content_type) = content_type {
                    part = part
                        .mime_str(content_type)
                        .map_err(|e| TransportFailure::InvalidRequest(format!("Invalid content type: {}", e)))?;
                }
                form.part(field.name.clone(), part)
            }
        };
    }
    Ok(form)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, options: &RequestOptions) -> Result<RawResponse, TransportFailure> {
        let client = self.client_for(&options.tls, options.timeouts.connect_timeout)?;

        let mut request = client
            .request(options.method.into(), options.url.clone())
            .timeout(options.timeouts.request_timeout);

        let multipart = matches!(options.body, Some(Body::Multipart(_)));
        for (name, value) in options.headers.iter() {
            // reqwest sets the multipart boundary itself
            if multipart && name.eq_ignore_ascii_case("content-type") {
                continue;
            }
            request = request.header(name, value);
        }

        request = match &options.body {
            Some(Body::Form(encoded)) => request.body(encoded.clone()),
            Some(Body::Multipart(fields)) => request.multipart(build_form(fields)?),
            None => request,
        };

        let response = request.send().await.map_err(|e| classify_error(&e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect();
        let body = response.text().await.map_err(|e| match classify_error(&e) {
            timeout @ TransportFailure::Timeout(_) => timeout,
            other => TransportFailure::ConnectionBroken(other.detail().to_string()),
        })?;

        Ok(RawResponse { status, headers, body })
    }
}

/// Full error text including every source in the chain
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

fn io_error_kind(err: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
    let mut source = Some(err);
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        source = cause.source();
    }
    None
}

/// Map a reqwest error onto the failure categories
pub(crate) fn classify_error(err: &reqwest::Error) -> TransportFailure {
    let detail = error_chain(err);

    if err.is_builder() {
        return TransportFailure::InvalidRequest(detail);
    }

    if err.is_timeout() {
        return TransportFailure::Timeout(detail);
    }

    match io_error_kind(err) {
        Some(io::ErrorKind::ConnectionRefused) => return TransportFailure::ConnectionRefused(detail),
        Some(io::ErrorKind::TimedOut) => return TransportFailure::Timeout(detail),
        Some(
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof,
        ) if !is_tls_failure(&detail) => return TransportFailure::ConnectionBroken(detail),
        _ => {}
    }

    if is_tls_failure(&detail) {
        return TransportFailure::Tls(detail);
    }

    let lower = detail.to_lowercase();
    if lower.contains("dns error") || lower.contains("failed to lookup address") {
        return TransportFailure::Socket(detail);
    }

    if err.is_connect() {
        return TransportFailure::Socket(detail);
    }

    if lower.contains("connection closed before message completed") || err.is_body() {
        return TransportFailure::ConnectionBroken(detail);
    }

    TransportFailure::Other(detail)
}

fn is_tls_failure(detail: &str) -> bool {
    let lower = detail.to_lowercase();
    lower.contains("certificate") || lower.contains("invalid peer") || lower.contains("tls handshake")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("DELETE".parse::<Method>().unwrap(), Method::Delete);
        assert!("PATCH".parse::<Method>().is_err());
        assert!(Method::Head.encodes_in_query());
        assert!(!Method::Post.encodes_in_query());
        assert_eq!(reqwest::Method::from(Method::Put), reqwest::Method::PUT);
    }

    #[test]
    fn test_headers_case_insensitive_unique() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "application/x-www-form-urlencoded");
        headers.insert("Stripe-Version", "2024-06-20");
        headers.insert("content-type", "multipart/form-data");

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("CONTENT-TYPE"), Some("multipart/form-data"));
        let names: Vec<&str> = headers.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["content-type", "Stripe-Version"]);

        assert_eq!(headers.remove("stripe-version"), Some("2024-06-20".to_string()));
        assert!(!headers.contains("Stripe-Version"));
    }

    #[test]
    fn test_headers_debug_redacts_authorization() {
        let headers: Headers = [("Authorization", "Bearer sk_test_secret"), ("Accept", "*/*")]
            .into_iter()
            .collect();
        let debug = format!("{:?}", headers);
        assert!(!debug.contains("sk_test_secret"));
        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("*/*"));
    }

    #[test]
    fn test_failure_retryability() {
        assert!(TransportFailure::Timeout("t".into()).is_retryable());
        assert!(TransportFailure::ConnectionRefused("r".into()).is_retryable());
        assert!(TransportFailure::ConnectionBroken("b".into()).is_retryable());
        assert!(TransportFailure::Socket("s".into()).is_retryable());
        assert!(TransportFailure::Other("o".into()).is_retryable());
        assert!(!TransportFailure::Tls("x".into()).is_retryable());
        assert!(!TransportFailure::InvalidRequest("h".into()).is_retryable());
        assert_eq!(TransportFailure::Timeout("elapsed".into()).to_string(), "timeout: elapsed");
    }

    #[test]
    fn test_raw_response_success_range() {
        let response = |status| RawResponse {
            status,
            headers: Headers::new(),
            body: String::new(),
        };
        assert!(response(200).is_success());
        assert!(response(204).is_success());
        assert!(!response(302).is_success());
        assert!(!response(404).is_success());
    }

    #[test]
    fn test_unreadable_bundle_is_tls_failure() {
        let tls = TlsMode::Verified {
            bundle_path: Some("/nonexistent/ca-bundle.crt".into()),
        };
        let failure = build_client(&tls, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(failure, TransportFailure::Tls(_)));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let options = RequestOptions {
            method: Method::Get,
            url: Url::parse(&format!("http://127.0.0.1:{}/v1/charges", port)).unwrap(),
            headers: Headers::new(),
            body: None,
            timeouts: TimeoutConfig::default(),
            tls: TlsMode::Disabled,
        };

        let failure = ReqwestTransport::new().execute(&options).await.unwrap_err();
        assert!(matches!(failure, TransportFailure::ConnectionRefused(_)), "{failure:?}");
        assert!(failure.is_retryable());
    }
}
