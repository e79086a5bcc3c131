//! Router-level integration tests exercising the testable properties from
//! the HTTP execution layer design: sandbox containment, bearer auth,
//! file-store CRUD status codes, and blocking workflow execution.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use comanda_core::Config;
use comanda_server::state::AppState;
use http_body_util::BodyExt;
use tower::ServiceExt;

fn state_with(data_dir: &std::path::Path, enabled: bool, token: &str) -> AppState {
    let mut config = Config::default();
    config.server.data_dir = data_dir.to_string_lossy().to_string();
    config.server.enabled = enabled;
    config.server.bearer_token = token.to_string();
    AppState::new(config, data_dir.join(".env"))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_requires_no_auth_even_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with(dir.path(), true, "secret");
    let app = comanda_server::app_router(state);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn protected_route_rejects_missing_bearer_token() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with(dir.path(), true, "secret");
    let app = comanda_server::app_router(state);

    let response = app
        .oneshot(Request::builder().uri("/list").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_route_accepts_correct_bearer_token() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with(dir.path(), true, "secret");
    let app = comanda_server::app_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/list")
                .header(header::AUTHORIZATION, "Bearer secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_disabled_allows_requests_without_a_token() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with(dir.path(), false, "");
    let app = comanda_server::app_router(state);

    let response = app
        .oneshot(Request::builder().uri("/list").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn file_create_then_recreate_returns_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with(dir.path(), false, "");
    let app = comanda_server::app_router(state);

    let body = serde_json::json!({ "path": "note.txt", "content": "hi" }).to_string();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/files")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.clone()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/files")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn file_update_on_missing_path_returns_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with(dir.path(), false, "");
    let app = comanda_server::app_router(state);

    let body = serde_json::json!({ "path": "missing.txt", "content": "hi" }).to_string();
    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/files")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_rejects_path_escaping_sandbox() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with(dir.path(), false, "");
    let app = comanda_server::app_router(state);

    let response = app
        .oneshot(Request::builder().uri("/list?path=../../etc").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn blocking_process_runs_a_model_free_workflow_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with(dir.path(), false, "");
    std::fs::write(
        dir.path().join("echo.yaml"),
        "step:\n  input: STDIN\n  model: NA\n  action: \"noop\"\n  output: STDOUT\n",
    )
    .unwrap();
    let app = comanda_server::app_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/process?filename=echo.yaml&input=hello")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["output"], "hello");
}

#[tokio::test]
async fn process_requiring_stdin_without_input_returns_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with(dir.path(), false, "");
    std::fs::write(
        dir.path().join("needs_input.yaml"),
        "step:\n  input: STDIN\n  model: NA\n  action: \"noop\"\n  output: STDOUT\n",
    )
    .unwrap();
    let app = comanda_server::app_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/process?filename=needs_input.yaml")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn process_get_method_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with(dir.path(), false, "");
    let app = comanda_server::app_router(state);

    let response = app
        .oneshot(Request::builder().method("GET").uri("/process").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
