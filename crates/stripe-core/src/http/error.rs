//! Error mapping for HTTP responses and transport failures
//!
//! Non-2xx responses are turned into one of the typed API errors based on
//! the status code and the `error` object in the body. Transport failures
//! that survive the retry loop become connection errors whose message names
//! the failure category.

use serde_json::Value;

use crate::error::{Error, ErrorDetails};
use crate::http::transport::TransportFailure;
use crate::response::ApiValue;

const CONNECTION_HINT: &str = "Please check your internet connection and try again. \
    If this problem persists, you should check Stripe's service status at \
    https://twitter.com/stripestatus, or let us know at support@stripe.com.";

/// Generic API error for a body that could not be interpreted
pub fn general_api_error(status: u16, body: &str) -> Error {
    Error::Api(
        ErrorDetails::new(format!(
            "Invalid response object from API: {:?} (HTTP response code was {})",
            body, status
        ))
        .with_response(status, body),
    )
}

/// Map a non-2xx response onto the error taxonomy.
///
/// | status   | error          |
/// |----------|----------------|
/// | 400, 404 | InvalidRequest |
/// | 401      | Authentication |
/// | 402      | Card           |
/// | other    | Api            |
pub fn handle_api_error(status: u16, body: &str) -> Error {
    let error_obj = match serde_json::from_str::<Value>(body) {
        Ok(value) => ApiValue::from(value),
        Err(_) => return general_api_error(status, body),
    };

    let error = match error_obj.get("error") {
        Some(error) if error.is_object() => error,
        _ => return general_api_error(status, body),
    };

    let message = error["message"].as_str().unwrap_or_default().to_string();
    let param = error["param"].as_str().map(str::to_string);
    let code = error["code"].as_str().map(str::to_string);

    let details = ErrorDetails::new(message).with_response(status, body);

    match status {
        400 | 404 => Error::InvalidRequest(details.with_param(param).with_json_body(error_obj)),
        401 => Error::Authentication(details.with_json_body(error_obj)),
        402 => Error::Card(
            details
                .with_param(param)
                .with_code(code)
                .with_json_body(error_obj),
        ),
        _ => Error::Api(details.with_json_body(error_obj)),
    }
}

/// Connection error raised once retries are exhausted or not allowed
pub fn connection_error(failure: &TransportFailure, api_base: &str, retry_count: u32) -> Error {
    let mut message = match failure {
        TransportFailure::Timeout(_) => {
            format!("Could not connect to Stripe ({}). {}", api_base, CONNECTION_HINT)
        }
        TransportFailure::ConnectionBroken(_) => format!(
            "The connection to the server ({}) broke before the request completed. {}",
            api_base, CONNECTION_HINT
        ),
        TransportFailure::Tls(_) => "Could not verify Stripe's SSL certificate. \
            Please make sure that your network is not intercepting certificates. \
            (Try going to https://api.stripe.com/v1 in your browser.) \
            If this problem persists, let us know at support@stripe.com."
            .to_string(),
        TransportFailure::Socket(_) => "Unexpected error communicating when trying to connect to Stripe. \
            You may be seeing this message because your DNS is not working. \
            To check, try running 'host stripe.com' from the command line."
            .to_string(),
        TransportFailure::InvalidRequest(_) => "The request to Stripe could not be built. \
            Check any custom headers or file content types passed with it."
            .to_string(),
        TransportFailure::ConnectionRefused(_) | TransportFailure::Other(_) => {
            "Unexpected error communicating with Stripe. \
            If this problem persists, let us know at support@stripe.com."
                .to_string()
        }
    };

    if retry_count > 0 {
        message.push_str(&format!(" Request was retried {} times.", retry_count));
    }

    message.push_str(&format!("\n\n(Network error: {})", failure.detail()));

    Error::ApiConnection(ErrorDetails::new(message))
}

/// Connection error for a server presenting a blacklisted certificate
pub fn revoked_certificate_error(api_base: &str) -> Error {
    Error::ApiConnection(ErrorDetails::new(format!(
        "Invalid server certificate. You tried to connect to a server ({}) that has a \
        revoked SSL certificate, which means we cannot securely send data to that server. \
        Please email support@stripe.com if you need help connecting to the correct API server.",
        api_base
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const API_BASE: &str = "https://api.stripe.com";

    #[test]
    fn test_invalid_request_mapping() {
        let body = r#"{"error":{"message":"No such charge","param":"id","type":"invalid_request_error"}}"#;
        for status in [400, 404] {
            let err = handle_api_error(status, body);
            assert_eq!(err.kind(), ErrorKind::InvalidRequest);
            assert_eq!(err.message(), Some("No such charge"));
            assert_eq!(err.param(), Some("id"));
            assert_eq!(err.http_status(), Some(status));
            assert_eq!(err.http_body(), Some(body));
            assert_eq!(
                err.json_body().unwrap()["error"]["type"].as_str(),
                Some("invalid_request_error")
            );
        }
    }

    #[test]
    fn test_authentication_mapping() {
        let err = handle_api_error(401, r#"{"error":{"message":"Invalid API Key provided","param":"x"}}"#);
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(err.message(), Some("Invalid API Key provided"));
        assert_eq!(err.param(), None);
    }

    #[test]
    fn test_card_mapping() {
        let err = handle_api_error(
            402,
            r#"{"error":{"message":"Your card was declined.","param":"number","code":"card_declined"}}"#,
        );
        assert_eq!(err.kind(), ErrorKind::Card);
        assert_eq!(err.param(), Some("number"));
        assert_eq!(err.code(), Some("card_declined"));
        assert_eq!(err.to_string(), "(Status 402) Your card was declined.");
    }

    #[test]
    fn test_other_statuses_map_to_api_error() {
        for status in [403, 409, 429, 500, 502, 503] {
            let err = handle_api_error(status, r#"{"error":{"message":"Something broke"}}"#);
            assert_eq!(err.kind(), ErrorKind::Api, "status {status}");
            assert_eq!(err.message(), Some("Something broke"));
        }
    }

    #[test]
    fn test_malformed_error_body() {
        let err = handle_api_error(500, "Internal Server Error");
        assert_eq!(err.kind(), ErrorKind::Api);
        assert_eq!(err.http_body(), Some("Internal Server Error"));
        assert!(err.message().unwrap().starts_with("Invalid response object from API"));
    }

    #[test]
    fn test_missing_error_key() {
        let err = handle_api_error(404, r#"{"message":"nope"}"#);
        assert_eq!(err.kind(), ErrorKind::Api);
        assert_eq!(err.http_status(), Some(404));

        let err = handle_api_error(400, r#"{"error":"just a string"}"#);
        assert_eq!(err.kind(), ErrorKind::Api);
    }

    #[test]
    fn test_connection_messages_by_category() {
        let timeout = connection_error(&TransportFailure::Timeout("elapsed".into()), API_BASE, 0);
        assert!(timeout.to_string().starts_with("Could not connect to Stripe (https://api.stripe.com)."));
        assert!(timeout.to_string().contains("check your internet connection"));

        let broken = connection_error(&TransportFailure::ConnectionBroken("reset".into()), API_BASE, 0);
        assert!(broken.to_string().contains("broke before the request completed"));

        let tls = connection_error(&TransportFailure::Tls("UnknownIssuer".into()), API_BASE, 0);
        assert!(tls.to_string().contains("Could not verify Stripe's SSL certificate"));

        let dns = connection_error(&TransportFailure::Socket("dns error".into()), API_BASE, 0);
        assert!(dns.to_string().contains("DNS is not working"));

        let invalid = connection_error(&TransportFailure::InvalidRequest("bad header".into()), API_BASE, 0);
        assert!(invalid.to_string().starts_with("The request to Stripe could not be built."));

        let refused = connection_error(&TransportFailure::ConnectionRefused("refused".into()), API_BASE, 0);
        assert!(refused.to_string().starts_with("Unexpected error communicating with Stripe."));
    }

    #[test]
    fn test_connection_message_includes_retry_count_and_detail() {
        let err = connection_error(&TransportFailure::Timeout("operation timed out".into()), API_BASE, 3);
        assert_eq!(err.kind(), ErrorKind::ApiConnection);
        let message = err.to_string();
        assert!(message.contains("Request was retried 3 times."));
        assert!(message.ends_with("(Network error: operation timed out)"));

        let err = connection_error(&TransportFailure::Timeout("x".into()), API_BASE, 0);
        assert!(!err.to_string().contains("retried"));
    }
}
