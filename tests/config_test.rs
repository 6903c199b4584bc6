//! Tests for file-based configuration and context assembly.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use hermod::{
    Config, Hermod, HermodError, HttpClient, HttpFailure, HttpRequest, HttpResponse,
};

struct EchoClient;

#[async_trait]
impl HttpClient for EchoClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpFailure> {
        Ok(HttpResponse {
            status: 200,
            data: json!({ "path": request.path }),
        })
    }
}

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    file.write_all(content.as_bytes()).expect("write config");
    file
}

#[test]
fn load_reads_every_section() {
    let file = write_config(
        r#"
        [client]
        base_url = "https://api.example.com"
        timeout_ms = 5000

        [dispatch]
        slow_threshold_ms = 1500
        error_log_capacity = 10

        [retry]
        max_retries = 2
        base_delay_ms = 500

        [session]
        login_path = "/auth"

        [stats]
        window_secs = 600

        [translation]
        default_source = "en"
        supported_languages = ["en", "ko"]
        cache_max_entries = 100
        "#,
    );

    let config = Config::load(file.path()).expect("config should load");
    assert_eq!(config.client.base_url.as_deref(), Some("https://api.example.com"));
    assert_eq!(config.client.timeout_ms, 5_000);

    let dispatch = config.dispatch_config();
    assert_eq!(dispatch.slow_threshold, Duration::from_millis(1_500));
    assert_eq!(dispatch.error_log_capacity, 10);
    assert_eq!(dispatch.flight_ttl, Duration::from_secs(30));

    let retry = config.retry_config();
    assert_eq!(retry.max_retries, 2);
    assert_eq!(retry.delay_for_attempt(1), Duration::from_secs(1));

    assert_eq!(config.session_config().login_path, "/auth");
    assert_eq!(config.stats_window(), Duration::from_secs(600));

    let translation = config.translation_config();
    assert_eq!(translation.default_source, "en");
    assert!(!translation.is_supported("ja"));
    assert_eq!(translation.cache.max_entries, 100);
}

#[test]
fn missing_file_is_a_configuration_error() {
    let err = Config::load("/nonexistent/hermod.toml").unwrap_err();
    assert!(matches!(err, HermodError::Configuration(msg) if msg.contains("read")));
}

#[test]
fn malformed_file_is_a_configuration_error() {
    let file = write_config("[retry\nmax_retries = 1");
    let err = Config::load(file.path()).unwrap_err();
    assert!(matches!(err, HermodError::Configuration(msg) if msg.contains("parse")));
}

#[test]
fn build_without_client_or_base_url_fails() {
    let result = Hermod::builder().build();
    assert!(matches!(result, Err(HermodError::Configuration(_))));
}

#[tokio::test]
async fn builder_uses_config_sections() {
    let config = Config::from_toml_str(
        r#"
        [translation]
        supported_languages = ["en"]
        "#,
    )
    .unwrap();
    let ctx = Hermod::builder()
        .client(Arc::new(EchoClient))
        .config(config)
        .build()
        .unwrap();

    assert_eq!(ctx.translation().supported_languages(), ["en".to_string()]);
    let err = ctx.translation().translate("안녕", "ja", None).await.unwrap_err();
    assert_eq!(err, HermodError::UnsupportedLanguage("ja".into()));
}

#[tokio::test]
async fn explicit_setters_override_config() {
    let ctx = Hermod::builder()
        .client(Arc::new(EchoClient))
        .config(Config::default())
        .stats_window(Duration::from_secs(60))
        .build()
        .unwrap();

    let value = ctx
        .dispatch(hermod::Request::new(
            hermod::ApiOperation::FetchProgress,
            HttpRequest::get("/progress"),
        ))
        .await
        .unwrap();
    assert_eq!(value, json!({"path": "/progress"}));
    assert_eq!(ctx.stats().success_calls, 1);
    tokio_test::assert_ok!(ctx.translation().translate("", "en", None).await);
}
