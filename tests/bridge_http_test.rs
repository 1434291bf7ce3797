//! 变更桥 HTTP 接口：认证、单步变更、批量失败下标、范围状态

#![cfg(feature = "server")]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use hive::board::{LiveDocumentStore, MemorySnapshotStore};
use hive::bridge::{http::router, DocumentHost};
use hive::core::RetryPolicy;
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "test-secret";

fn app() -> Router {
    let host = Arc::new(DocumentHost::new(
        Arc::new(LiveDocumentStore::new()),
        Arc::new(MemorySnapshotStore::new()),
        RetryPolicy::new(2, Duration::from_millis(1)),
    ));
    router(host, SECRET)
}

async fn post(app: &Router, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
    let mut req = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json");
    if let Some(token) = token {
        req = req.header("authorization", format!("Bearer {token}"));
    }
    let resp = app
        .clone()
        .oneshot(req.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_rejects_missing_or_wrong_token() {
    let app = app();
    let body = json!({"boardId": "b", "context": null});
    let (status, value) = post(&app, "/ai/board-state", None, body.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(value["success"], false);
    let (status, _) = post(&app, "/ai/board-state", Some("nope"), body).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_is_open() {
    let resp = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_mutate_then_board_state() {
    let app = app();
    let (status, value) = post(
        &app,
        "/ai/mutate",
        Some(SECRET),
        json!({
            "boardId": "b1",
            "userId": "u1",
            "action": {"tool": "createStickyNote", "args": {"text": "", "x": 10, "y": 10, "color": "#ffeb3b"}}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["success"], true);
    let id = value["affectedObjectIds"][0].as_str().unwrap().to_string();

    let (_, state) = post(&app, "/ai/board-state", Some(SECRET), json!({"boardId": "b1"})).await;
    assert_eq!(state["totalObjects"], 1);
    assert_eq!(state["objects"][0]["id"], id);
    assert_eq!(state["objects"][0]["properties"]["text"], "New note");
}

#[tokio::test]
async fn test_batch_reports_failed_index() {
    let app = app();
    let (status, value) = post(
        &app,
        "/ai/mutate-batch",
        Some(SECRET),
        json!({
            "boardId": "b2",
            "userId": "u1",
            "actions": [
                {"tool": "createStickyNote", "args": {"text": "one", "x": 0, "y": 0, "color": "#ffeb3b"}},
                {"tool": "moveObject", "args": {"objectId": "ghost", "x": 5, "y": 5}},
                {"tool": "createStickyNote", "args": {"text": "three", "x": 0, "y": 0, "color": "#ffeb3b"}}
            ]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["success"], false);
    assert_eq!(value["failedIndex"], 1);
    assert_eq!(value["results"].as_array().unwrap().len(), 1);
    assert_eq!(value["results"][0]["affectedObjectIds"].as_array().unwrap().len(), 1);

    // 第一步已落盘
    let (_, found) = post(
        &app,
        "/ai/find-objects",
        Some(SECRET),
        json!({"boardId": "b2", "query": {"textContains": "one"}}),
    )
    .await;
    assert_eq!(found["objectIds"].as_array().unwrap().len(), 1);
}
