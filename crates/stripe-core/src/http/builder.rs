//! Request assembly
//!
//! Turns a logical [`ApiRequest`] into the [`RequestOptions`] sent on every
//! attempt: full URL, default and caller headers, and the body or query
//! string chosen by HTTP method.

use percent_encoding::percent_decode_str;
use serde_json::Value;
use url::Url;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::http::auth::ApiKey;
use crate::http::params::{encode_params, flatten_params};
use crate::http::tls::TlsMode;
use crate::http::transport::{Body, Headers, Method, MultipartField, MultipartValue, RequestOptions};
use crate::http::user_agent::{apply_client_metadata, user_agent, ClientUserAgent, USER_AGENT_HEADER};

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const MULTIPART_CONTENT_TYPE: &str = "multipart/form-data";
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";
pub const STRIPE_VERSION_HEADER: &str = "Stripe-Version";

/// Which configured base URL a request targets
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ApiBase {
    #[default]
    Api,
    Connect,
    Uploads,
    /// Explicit base URL for this request only
    Custom(String),
}

impl std::str::FromStr for ApiBase {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "api" => Ok(ApiBase::Api),
            "connect" => Ok(ApiBase::Connect),
            "uploads" => Ok(ApiBase::Uploads),
            url if url.starts_with("http://") || url.starts_with("https://") => Ok(ApiBase::Custom(url.to_string())),
            other => Err(format!("Unknown API base '{}': expected api, connect, uploads or a URL", other)),
        }
    }
}

/// File attached to a multipart request
#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    pub field: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// One logical API call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the base URL, e.g. `/v1/charges`
    pub path: String,
    /// Nested parameters, usually a JSON object
    pub params: Value,
    /// Caller headers; these override the defaults
    pub headers: Headers,
    /// Per-call key overriding the client default
    pub api_key: Option<ApiKey>,
    pub base: ApiBase,
    pub files: Vec<FileUpload>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Value::Null,
            headers: Headers::new(),
            api_key: None,
            base: ApiBase::Api,
            files: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<ApiKey>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base(mut self, base: ApiBase) -> Self {
        self.base = base;
        self
    }

    pub fn with_file(mut self, file: FileUpload) -> Self {
        self.files.push(file);
        self
    }

    fn is_multipart(&self) -> bool {
        !self.files.is_empty()
            || self
                .headers
                .get("Content-Type")
                .map(|ct| ct.trim().starts_with(MULTIPART_CONTENT_TYPE))
                .unwrap_or(false)
    }
}

/// Builds [`RequestOptions`] from a client configuration
#[derive(Debug, Clone, Copy)]
pub struct RequestBuilder<'a> {
    config: &'a ClientConfig,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(config: &'a ClientConfig) -> Self {
        Self { config }
    }

    /// Assemble the options for `request`. An idempotency key, when one is
    /// generated, is created here exactly once.
    pub fn build(&self, request: &ApiRequest, api_key: &ApiKey, tls: TlsMode) -> Result<RequestOptions> {
        let mut url = self.build_url(request)?;
        let params = self.config.object_ids.objects_to_ids(&request.params);
        let multipart = request.is_multipart();

        let mut headers = self.default_headers(api_key, multipart);
        headers.extend(&request.headers);

        let body = if request.method.encodes_in_query() {
            append_query(&mut url, &encode_params(&params));
            None
        } else if multipart {
            Some(Body::Multipart(multipart_fields(&params, &request.files)))
        } else {
            Some(Body::Form(encode_params(&params)))
        };

        Ok(RequestOptions {
            method: request.method,
            url,
            headers,
            body,
            timeouts: self.config.timeouts,
            tls,
        })
    }

    /// Base URL for the request joined with its path
    pub fn build_url(&self, request: &ApiRequest) -> Result<Url> {
        let base = self.config.base_url(&request.base);
        api_url(base, &request.path)
    }

    fn default_headers(&self, api_key: &ApiKey, multipart: bool) -> Headers {
        let mut headers = Headers::new();
        headers.insert(USER_AGENT_HEADER, user_agent());
        headers.insert("Authorization", api_key.bearer());
        headers.insert(
            "Content-Type",
            if multipart { MULTIPART_CONTENT_TYPE } else { FORM_CONTENT_TYPE },
        );

        // Retrying is only safe when the server can deduplicate
        if self.config.retry_policy.max_retries > 0 {
            headers.insert(IDEMPOTENCY_KEY_HEADER, uuid::Uuid::new_v4().to_string());
        }

        if let Some(version) = &self.config.api_version {
            headers.insert(STRIPE_VERSION_HEADER, version.clone());
        }

        apply_client_metadata(&mut headers, &ClientUserAgent::current());
        headers
    }
}

/// Join a base URL and a request path
pub fn api_url(base: &str, path: &str) -> Result<Url> {
    let base = base.trim_end_matches('/');
    let joined = if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    };
    Ok(Url::parse(&joined)?)
}

/// Append encoded parameters to the query, joining with `&` when the URL
/// already carries one
fn append_query(url: &mut Url, encoded: &str) {
    if encoded.is_empty() {
        return;
    }
    let query = match url.query() {
        Some(existing) if !existing.is_empty() => format!("{}&{}", existing, encoded),
        _ => encoded.to_string(),
    };
    url.set_query(Some(&query));
}

fn multipart_fields(params: &Value, files: &[FileUpload]) -> Vec<MultipartField> {
    let mut fields: Vec<MultipartField> = flatten_params(params)
        .into_iter()
        .map(|(key, value)| MultipartField {
            name: percent_decode_str(&key).decode_utf8_lossy().into_owned(),
            value: MultipartValue::Text(value),
        })
        .collect();

    fields.extend(files.iter().map(|file| MultipartField {
        name: file.field.clone(),
        value: MultipartValue::File {
            filename: file.filename.clone(),
            content_type: file.content_type.clone(),
            bytes: file.bytes.clone(),
        },
    }));

    fields
}
