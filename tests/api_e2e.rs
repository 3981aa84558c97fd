use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use zeroize::Zeroizing;

use pixel_chat::config::Config;
use pixel_chat::routes::build_router;
use pixel_chat::services::completion::{
    CompletionClient, CompletionRequest, DEFAULT_SYSTEM_PROMPT, UpstreamFailure,
};
use pixel_chat::state::AppState;

// Shared test context
struct TestContext {
    client: Arc<MockCompletionClient>,
    app: axum::Router,
}

#[derive(Default)]
struct MockCompletionClient {
    replies: Mutex<VecDeque<Result<Option<String>, UpstreamFailure>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

#[async_trait::async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Option<String>, UpstreamFailure> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(UpstreamFailure::transport("no scripted reply")))
    }
}

fn test_config(api_key: Option<&str>) -> Config {
    Config {
        openai_api_key: api_key.map(|k| Zeroizing::new(k.to_string())),
        openai_base_url: "http://127.0.0.1:9/v1".to_string(),
        default_model: "gpt-4o-mini".to_string(),
        fallback_model: "gpt-3.5-turbo".to_string(),
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        allowed_origins: vec!["http://localhost:3000".parse().unwrap()],
        static_dir: "files/public".into(),
        app_env: "test".to_string(),
        data_dir: None,
    }
}

impl TestContext {
    fn new(replies: Vec<Result<Option<String>, UpstreamFailure>>) -> Self {
        let client = Arc::new(MockCompletionClient {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        });
        let config = test_config(Some("sk-test-key-123"));
        let state = AppState::with_client(&config, Some(client.clone() as Arc<dyn CompletionClient>));

        Self {
            client,
            app: build_router(state),
        }
    }

    fn without_key() -> axum::Router {
        let config = test_config(None);
        build_router(AppState::with_client(&config, None))
    }

    fn calls(&self) -> usize {
        self.client.requests.lock().unwrap().len()
    }
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn model_not_found() -> UpstreamFailure {
    UpstreamFailure {
        status: Some(404),
        code: Some("model_not_found".to_string()),
        message: "The model `gpt-5` does not exist".to_string(),
    }
}

#[tokio::test]
async fn chat_returns_assistant_reply() {
    let context = TestContext::new(vec![Ok(Some("Hello!".to_string()))]);

    let (status, body) = send(
        &context.app,
        post("/api/chat", json!({ "messages": [{ "role": "user", "content": "Hi" }] })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "role": "assistant", "content": "Hello!" }));

    let requests = context.client.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "gpt-3.5-turbo");
    assert_eq!(requests[0].messages[0].content, DEFAULT_SYSTEM_PROMPT);
}

#[tokio::test]
async fn chat_rejects_empty_messages() {
    let context = TestContext::new(vec![]);

    let (status, body) = send(&context.app, post("/api/chat", json!({ "messages": [] }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Messages are required" }));
    assert_eq!(context.calls(), 0);
}

#[tokio::test]
async fn chat_rejects_malformed_json() {
    let context = TestContext::new(vec![]);
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from("{\"messages\": ["))
        .unwrap();

    let (status, body) = send(&context.app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
}

#[tokio::test]
async fn chat_without_key_reports_configuration_error() {
    let app = TestContext::without_key();

    let (status, body) = send(
        &app,
        post("/api/chat", json!({ "messages": [{ "role": "user", "content": "Hi" }] })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "OpenAI API key is not configured" }));
}

#[tokio::test]
async fn chat_without_key_reports_configuration_before_validating() {
    let app = TestContext::without_key();

    let (status, body) = send(&app, post("/api/chat", json!({ "messages": [] }))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "OpenAI API key is not configured" }));
}

#[tokio::test]
async fn chat_upstream_failure_carries_details() {
    let context = TestContext::new(vec![Err(UpstreamFailure {
        status: Some(500),
        code: None,
        message: "The server had an error".to_string(),
    })]);

    let (status, body) = send(
        &context.app,
        post("/api/chat", json!({ "messages": [{ "role": "user", "content": "Hi" }], "model": "gpt-4o-mini" })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "An error occurred while processing your request");
    assert_eq!(body["details"], "The server had an error");
}

#[tokio::test]
async fn generate_reports_success() {
    let context = TestContext::new(vec![Ok(Some("Hello!".to_string()))]);

    let (status, body) = send(
        &context.app,
        post("/api/generate", json!({ "messages": [{ "role": "user", "content": "Hi" }] })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "content": "Hello!" }));
    assert_eq!(context.client.requests.lock().unwrap()[0].model, "gpt-4o-mini");
}

#[tokio::test]
async fn generate_flags_fallback_without_retrying() {
    let context = TestContext::new(vec![Err(model_not_found()), Ok(Some("unused".to_string()))]);

    let (status, body) = send(
        &context.app,
        post(
            "/api/generate",
            json!({ "messages": [{ "role": "user", "content": "Hi" }], "model": "gpt-5" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["fallback"], true);
    assert_eq!(
        body["error"],
        "Model \"gpt-5\" not found. Falling back to gpt-3.5-turbo."
    );
    assert_eq!(context.calls(), 1);
}

#[tokio::test]
async fn generate_without_key_makes_no_call() {
    let app = TestContext::without_key();

    let (status, body) = send(
        &app,
        post("/api/generate", json!({ "messages": [{ "role": "user", "content": "Hi" }] })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("not configured"));
    assert!(body.get("fallback").is_none());
}

#[tokio::test]
async fn debug_reports_key_presence_without_the_key() {
    let context = TestContext::new(vec![]);

    let (status, body) = send(&context.app, get("/api/debug")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hasOpenAIKey"], true);
    assert_eq!(body["openAIKeyLength"], 15);
    assert_eq!(body["environment"], "test");
    assert!(body["time"].as_str().is_some());
    assert!(!body.to_string().contains("sk-test-key-123"));
}

#[tokio::test]
async fn key_status_and_models() {
    let context = TestContext::new(vec![]);

    let (_, status) = send(&context.app, get("/api/key-status")).await;
    assert_eq!(status, json!({ "configured": true, "keyLength": 15, "keyPrefix": "sk-te" }));

    let (_, models) = send(&context.app, get("/api/models")).await;
    let ids: Vec<_> = models.as_array().unwrap().iter().map(|m| m["id"].clone()).collect();
    assert_eq!(ids, vec![json!("gpt-4o-mini"), json!("gpt-3.5-turbo")]);

    let (_, status) = send(&TestContext::without_key(), get("/api/key-status")).await;
    assert_eq!(status, json!({ "configured": false, "keyLength": 0, "keyPrefix": "" }));
}

#[tokio::test]
async fn static_files_share_the_cors_layer() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hello.txt"), "pixel").unwrap();
    let mut config = test_config(None);
    config.static_dir = dir.path().to_path_buf();
    let app = build_router(AppState::with_client(&config, None));

    let request = Request::builder()
        .uri("/hello.txt")
        .header("origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:3000"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"pixel");
}
