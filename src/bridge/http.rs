//! 变更桥 HTTP 接口（axum）
//!
//! - POST /ai/mutate        {boardId, userId, action}
//! - POST /ai/mutate-batch  {boardId, userId, actions[]}
//! - POST /ai/board-state   {boardId, context?}
//! - POST /ai/find-objects  {boardId, query}
//! - GET  /health           无需认证
//!
//! /ai/* 需要 `Authorization: Bearer <secret>`，否则 401。变更失败（对象不存在、参数不合法）
//! 以 200 + success=false 返回；持久化/内部错误返回 500。

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::bridge::client::BridgeClient;
use crate::bridge::host::DocumentHost;
use crate::bridge::types::{
    BoardStateRequest, FindObjectsRequest, MutateBatchRequest, MutateBatchResponse, MutateRequest,
    MutateResponse,
};
use crate::core::HiveError;
use crate::scope::{FindObjectsResponse, ScopedBoardState};

#[derive(Clone)]
pub struct BridgeState {
    host: Arc<DocumentHost>,
    secret: Arc<str>,
}

/// 构建变更桥路由
pub fn router(host: Arc<DocumentHost>, secret: &str) -> Router {
    if secret.is_empty() {
        tracing::warn!("bridge secret is empty, all /ai requests will be rejected");
    }
    let state = BridgeState {
        host,
        secret: Arc::from(secret),
    };

    let ai = Router::new()
        .route("/ai/mutate", post(mutate))
        .route("/ai/mutate-batch", post(mutate_batch))
        .route("/ai/board-state", post(board_state))
        .route("/ai/find-objects", post(find_objects))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .merge(ai)
        .with_state(state)
}

fn tokens_match(given: &str, expected: &str) -> bool {
    if expected.is_empty() || given.len() != expected.len() {
        return false;
    }
    given
        .bytes()
        .zip(expected.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

async fn require_bearer(State(state): State<BridgeState>, req: Request, next: Next) -> Response {
    let authorized = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| tokens_match(token.trim(), &state.secret));
    if !authorized {
        tracing::warn!(path = %req.uri().path(), "unauthorized bridge request");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"success": false, "error": "Unauthorized"})),
        )
            .into_response();
    }
    next.run(req).await
}

fn internal_error(e: HiveError) -> (StatusCode, Json<serde_json::Value>) {
    tracing::error!(error = %e, "bridge request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"success": false, "error": e.to_string()})),
    )
}

async fn mutate(
    State(state): State<BridgeState>,
    Json(req): Json<MutateRequest>,
) -> Result<Json<MutateResponse>, (StatusCode, Json<serde_json::Value>)> {
    tracing::info!(board_id = %req.board_id, tool = %req.action.tool, "bridge mutate");
    state
        .host
        .mutate(&req.board_id, &req.user_id, &req.action)
        .await
        .map(Json)
        .map_err(internal_error)
}

async fn mutate_batch(
    State(state): State<BridgeState>,
    Json(req): Json<MutateBatchRequest>,
) -> Result<Json<MutateBatchResponse>, (StatusCode, Json<serde_json::Value>)> {
    tracing::info!(board_id = %req.board_id, actions = req.actions.len(), "bridge mutate batch");
    state
        .host
        .mutate_batch(&req.board_id, &req.user_id, &req.actions)
        .await
        .map(Json)
        .map_err(internal_error)
}

async fn board_state(
    State(state): State<BridgeState>,
    Json(req): Json<BoardStateRequest>,
) -> Result<Json<ScopedBoardState>, (StatusCode, Json<serde_json::Value>)> {
    state
        .host
        .board_state(&req.board_id, req.context.as_ref())
        .await
        .map(Json)
        .map_err(internal_error)
}

async fn find_objects(
    State(state): State<BridgeState>,
    Json(req): Json<FindObjectsRequest>,
) -> Result<Json<FindObjectsResponse>, (StatusCode, Json<serde_json::Value>)> {
    state
        .host
        .find_objects(&req.board_id, &req.query)
        .await
        .map(Json)
        .map_err(internal_error)
}
