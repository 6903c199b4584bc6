//! Wiremock integration tests for ReqwestClient.
//!
//! These tests verify headers, body handling and error mapping against a
//! mocked server, and run the full context over real HTTP.
#![cfg(feature = "reqwest-client")]

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hermod::http::{ReqwestClient, TransportFailure};
use hermod::session::MemorySessionStore;
use hermod::{
    ApiOperation, ErrorKind, Hermod, HermodError, HttpClient, HttpRequest, Request, RetryConfig,
};

#[tokio::test]
async fn sends_bearer_token_and_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/translate"))
        .and(header("Authorization", "Bearer access"))
        .and(body_json(json!({"text": "안녕"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"translatedText": "Hi"})))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemorySessionStore::with_tokens("access", "refresh"));
    let client = ReqwestClient::new(server.uri()).unwrap().session_store(store);
    let response = client
        .send(HttpRequest::post("/translate", json!({"text": "안녕"})))
        .await
        .expect("request should succeed");

    assert_eq!(response.status, 200);
    assert_eq!(response.data["translatedText"], "Hi");
}

#[tokio::test]
async fn forwards_idempotency_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payments"))
        .and(header("Idempotency-Key", "pay-42"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 42})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ReqwestClient::new(server.uri()).unwrap();
    let response = client
        .send(HttpRequest::post("/payments", json!({"amount": 1})).idempotency_key("pay-42"))
        .await
        .unwrap();
    assert_eq!(response.status, 201);
}

#[tokio::test]
async fn error_status_carries_message_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"message": "jwt expired", "code": "TOKEN_EXPIRED"})),
        )
        .mount(&server)
        .await;

    let client = ReqwestClient::new(server.uri()).unwrap();
    let failure = client.send(HttpRequest::get("/me")).await.unwrap_err();
    assert_eq!(failure.status, Some(401));
    assert_eq!(failure.message, "jwt expired");

    let err = HermodError::from(failure);
    assert_eq!(err.kind(), ErrorKind::TokenExpired);
}

#[tokio::test]
async fn non_json_error_body_uses_reason_phrase() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lessons"))
        .respond_with(ResponseTemplate::new(503).set_body_string("<html>down</html>"))
        .mount(&server)
        .await;

    let client = ReqwestClient::new(server.uri()).unwrap();
    let failure = client.send(HttpRequest::get("/lessons")).await.unwrap_err();
    assert_eq!(failure.status, Some(503));
    assert_eq!(failure.message, "Service Unavailable");
    assert_eq!(HermodError::from(failure).kind(), ErrorKind::ServerFault);
}

#[tokio::test]
async fn slow_server_is_a_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let client = ReqwestClient::with_timeout(server.uri(), Duration::from_millis(50)).unwrap();
    let failure = client.send(HttpRequest::get("/slow")).await.unwrap_err();
    assert_eq!(failure.status, None);
    assert_eq!(failure.transport, Some(TransportFailure::Timeout));
    assert_eq!(HermodError::from(failure).kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn context_over_http_retries_transient_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lessons"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/lessons"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .mount(&server)
        .await;

    let ctx = Hermod::builder()
        .base_url(server.uri())
        .retry(RetryConfig::new().base_delay(Duration::from_millis(5)))
        .build()
        .unwrap();

    let lessons = ctx
        .dispatch(Request::new(
            ApiOperation::FetchLessons,
            HttpRequest::get("/lessons"),
        ))
        .await
        .unwrap();
    assert_eq!(lessons, json!([{"id": 1}]));

    let stats = ctx.stats();
    assert_eq!(stats.total_calls, 2);
    assert_eq!(stats.error_calls, 1);
}
