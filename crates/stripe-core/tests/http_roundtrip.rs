//! End-to-end tests through the reqwest transport against local servers

use std::time::Duration;

use mockito::Matcher;
use serde_json::json;
use stripe_core::http::{ApiBase, FileUpload};
use stripe_core::{ApiRequest, ClientConfig, ErrorKind, RetryPolicy, StripeClient, TimeoutConfig};

mod test_support;
use test_support::TEST_KEY;

fn client_for(base: &str) -> StripeClient {
    let config = ClientConfig::builder()
        .api_key(TEST_KEY)
        .api_base(base)
        .uploads_base(base)
        .api_version("2024-06-20")
        .build()
        .unwrap();
    StripeClient::new(config).unwrap()
}

#[tokio::test]
async fn test_get_sends_query_and_headers() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/charges")
        .match_query(Matcher::UrlEncoded("limit".into(), "3".into()))
        .match_header("authorization", format!("Bearer {}", TEST_KEY).as_str())
        .match_header("user-agent", Matcher::Regex("^Stripe/v1 RustBindings/".into()))
        .match_header("stripe-version", "2024-06-20")
        .match_header("x-stripe-client-user-agent", Matcher::Regex(r#""lang":"rust""#.into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"object":"list","data":[{"id":"ch_1"},{"id":"ch_2"}],"has_more":false}"#)
        .create_async()
        .await;

    let client = client_for(&server.url());
    let (response, _) = client
        .request(ApiRequest::get("/v1/charges").with_params(json!({"limit": 3})))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.data["data"][1]["id"].as_str(), Some("ch_2"));
    assert_eq!(response.data["has_more"].as_bool(), Some(false));
}

#[tokio::test]
async fn test_post_sends_form_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/charges")
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_body(Matcher::Exact(
            "amount=100&currency=usd&description=two%20words&metadata[order_id]=6735".into(),
        ))
        .with_status(200)
        .with_body(r#"{"id":"ch_1","amount":100}"#)
        .create_async()
        .await;

    let client = client_for(&server.url());
    let request = ApiRequest::post("/v1/charges").with_params(json!({
        "amount": 100,
        "currency": "usd",
        "description": "two words",
        "metadata": {"order_id": "6735"}
    }));
    let (response, _) = client.request(request).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.data["amount"].as_i64(), Some(100));
}

#[tokio::test]
async fn test_authentication_error_over_http() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/v1/account")
        .with_status(401)
        .with_body(r#"{"error":{"message":"Invalid API Key provided: sk_test_****7dc","type":"invalid_request_error"}}"#)
        .create_async()
        .await;

    let client = client_for(&server.url());
    let err = client.request(ApiRequest::get("/v1/account")).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert_eq!(err.http_status(), Some(401));
    assert!(err.to_string().starts_with("(Status 401) Invalid API Key provided"));
}

#[tokio::test]
async fn test_server_error_with_html_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/v1/balance")
        .with_status(502)
        .with_body("<html>Bad Gateway</html>")
        .create_async()
        .await;

    let client = client_for(&server.url());
    let err = client.request(ApiRequest::get("/v1/balance")).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Api);
    assert_eq!(err.http_status(), Some(502));
    assert_eq!(err.http_body(), Some("<html>Bad Gateway</html>"));
}

#[tokio::test]
async fn test_multipart_upload() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/files")
        .match_header("content-type", Matcher::Regex("^multipart/form-data; boundary=".into()))
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#"name="purpose""#.into()),
            Matcher::Regex("dispute_evidence".into()),
            Matcher::Regex(r#"filename="receipt.txt""#.into()),
            Matcher::Regex("thank you".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"id":"file_1","object":"file"}"#)
        .create_async()
        .await;

    let client = client_for(&server.url());
    let request = ApiRequest::post("/v1/files")
        .with_base(ApiBase::Uploads)
        .with_params(json!({"purpose": "dispute_evidence"}))
        .with_file(FileUpload {
            field: "file".to_string(),
            filename: "receipt.txt".to_string(),
            content_type: Some("text/plain".to_string()),
            bytes: b"thank you".to_vec(),
        });
    let (response, _) = client.request(request).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.data["id"].as_str(), Some("file_1"));
}

#[tokio::test]
async fn test_unresponsive_server_times_out_and_retries() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let config = ClientConfig::builder()
        .api_key(TEST_KEY)
        .api_base(format!("http://{}", addr))
        .timeouts(TimeoutConfig::new(Duration::from_millis(200), Duration::from_millis(200)))
        .retry_policy(RetryPolicy::new(1).with_initial_delay(Duration::ZERO).with_max_delay(Duration::ZERO))
        .build()
        .unwrap();
    let client = StripeClient::new(config).unwrap();

    let err = client.request(ApiRequest::get("/v1/charges")).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ApiConnection);
    let message = err.to_string();
    assert!(message.starts_with(&format!("Could not connect to Stripe (http://{}).", addr)));
    assert!(message.contains("Request was retried 1 times."));
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ClientConfig::builder()
        .api_key(TEST_KEY)
        .api_base(format!("http://{}", addr))
        .build()
        .unwrap();
    let client = StripeClient::new(config).unwrap();

    let err = client.request(ApiRequest::get("/v1/charges")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ApiConnection);
    assert!(err.to_string().starts_with("Unexpected error communicating with Stripe."));
    assert!(err.to_string().contains("(Network error:"));
}

#[tokio::test]
async fn test_invalid_header_is_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server.mock("GET", "/v1/charges").expect(0).create_async().await;

    let config = ClientConfig::builder()
        .api_key(TEST_KEY)
        .api_base(server.url())
        .retry_policy(RetryPolicy::new(2).with_initial_delay(Duration::ZERO).with_max_delay(Duration::ZERO))
        .build()
        .unwrap();
    let client = StripeClient::new(config).unwrap();

    let request = ApiRequest::get("/v1/charges").with_header("Stripe-Account", "acct_1\nInjected: yes");
    let err = client.request(request).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ApiConnection);
    assert!(err.to_string().starts_with("The request to Stripe could not be built."));
    assert!(!err.to_string().contains("retried"));
    mock.assert_async().await;
}
