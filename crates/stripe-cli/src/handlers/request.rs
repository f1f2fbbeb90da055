//! Request command handler

use crate::cli::RequestArgs;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::logging::timing::Timer;
use crate::output::OutputWriter;
use serde_json::Value;
use std::fs;
use std::path::Path;
use stripe_core::http::{decode_param, decode_params, encode_params, Method};
use stripe_core::{ApiBase, ApiRequest, CancellationToken, FileUpload, StripeClient};
use tracing::{debug, info, instrument};

/// Handle the request command
#[instrument(skip_all, fields(method = %args.method, path = %args.path))]
pub async fn handle_request(args: RequestArgs, config: &Config, output: &mut OutputWriter) -> Result<()> {
    let _timer = Timer::with_details("request_command", &format!("{} {}", args.method, args.path));

    let request = build_request(&args)?;
    let client = StripeClient::new(config.client_builder().build()?)?;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    let spinner = output.spinner(&format!("{} {}", request.method.as_str(), request.path));
    info!("Sending request");
    let result = client.request_with_cancel(request, &cancel).await;
    signal_task.abort();
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let (response, _) = result?;
    debug!(status = response.status, "Received response");

    if let Some(path) = &args.save_to {
        fs::write(path, serde_json::to_string_pretty(&Value::from(&response.data))?)?;
        output.success(&format!("✓ Response saved to {}", path.display()))?;
    }

    output.response(&response)
}

/// Translate command-line arguments into an API request
fn build_request(args: &RequestArgs) -> Result<ApiRequest> {
    let method: Method = args.method.parse().map_err(Error::invalid_args)?;
    let base: ApiBase = args.base.parse().map_err(Error::invalid_args)?;

    let mut request = ApiRequest::new(method, args.path.as_str())
        .with_base(base)
        .with_params(build_params(&args.data)?);

    for header in &args.headers {
        let (name, value) = parse_header(header)?;
        request = request.with_header(name, value);
    }

    for file in &args.files {
        request = request.with_file(load_file(file)?);
    }

    if let Some(key) = &args.api_key {
        request = request.with_api_key(key.as_str());
    }

    Ok(request)
}

/// Merge `key=value` arguments into one parameter tree.
///
/// Each argument is re-encoded and the whole set decoded together, so
/// `-d 'items[][price]=p1' -d 'items[][quantity]=2'` yields a single item.
fn build_params(data: &[String]) -> Result<Value> {
    let mut encoded = Vec::with_capacity(data.len());
    for argument in data {
        if !argument.contains('=') {
            return Err(Error::invalid_args(format!("Expected KEY=VALUE for -d, got '{}'", argument)));
        }
        encoded.push(encode_params(&decode_param(argument)));
    }
    Ok(decode_params(&encoded.join("&")))
}

fn parse_header(header: &str) -> Result<(String, String)> {
    match header.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim().to_string(), value.trim().to_string())),
        _ => Err(Error::invalid_args(format!("Expected 'Name: value' for -H, got '{}'", header))),
    }
}

fn load_file(argument: &str) -> Result<FileUpload> {
    let (field, path) = argument
        .split_once('=')
        .filter(|(field, path)| !field.is_empty() && !path.is_empty())
        .ok_or_else(|| Error::invalid_args(format!("Expected FIELD=PATH for --file, got '{}'", argument)))?;

    let path = Path::new(path);
    if !path.exists() {
        return Err(Error::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    Ok(FileUpload {
        field: field.to_string(),
        content_type: content_type_for(path).map(str::to_string),
        filename,
        bytes: fs::read(path)?,
    })
}

fn content_type_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "pdf" => Some("application/pdf"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "csv" => Some("text/csv"),
        "txt" => Some("text/plain"),
        "json" => Some("application/json"),
        _ => None,
    }
}
