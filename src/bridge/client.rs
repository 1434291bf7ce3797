//! 变更桥客户端
//!
//! 执行器只依赖 BridgeClient trait：进程内实现是 DocumentHost，跨进程实现是 HttpBridgeClient
//! （reqwest + bearer 认证 + 请求超时）。

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::bridge::types::{
    BoardStateRequest, FindObjectsRequest, MutateBatchRequest, MutateBatchResponse, MutateRequest,
    MutateResponse,
};
use crate::core::HiveError;
use crate::scope::{BoardStateContext, FindObjectsQuery, FindObjectsResponse, ScopedBoardState};
use crate::tools::catalog::MutationAction;

/// 文档宿主接口：变更、批量变更、读取范围状态、查找对象
///
/// 变更失败（对象不存在等）以 success=false 的响应返回；只有传输/持久化层面的失败才是 Err。
#[async_trait]
pub trait BridgeClient: Send + Sync {
    async fn mutate(
        &self,
        board_id: &str,
        user_id: &str,
        action: &MutationAction,
    ) -> Result<MutateResponse, HiveError>;

    async fn mutate_batch(
        &self,
        board_id: &str,
        user_id: &str,
        actions: &[MutationAction],
    ) -> Result<MutateBatchResponse, HiveError>;

    async fn board_state(
        &self,
        board_id: &str,
        context: Option<&BoardStateContext>,
    ) -> Result<ScopedBoardState, HiveError>;

    async fn find_objects(
        &self,
        board_id: &str,
        query: &FindObjectsQuery,
    ) -> Result<FindObjectsResponse, HiveError>;
}

/// 通过 HTTP 调用远端变更桥
pub struct HttpBridgeClient {
    client: reqwest::Client,
    base_url: String,
    secret: String,
}

impl HttpBridgeClient {
    pub fn new(base_url: &str, secret: &str, timeout: Duration) -> Result<Self, HiveError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret: secret.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, HiveError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.secret)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            tracing::warn!(%url, status = status.as_u16(), "bridge request failed");
        }
        decode_response(status, &text)
    }
}

/// 解析桥接响应
///
/// 5xx 表示宿主侧持久化失败（致命），映射为 Persistence；其余非 2xx 先尝试按结构化
/// 响应体解析（变更失败同样带响应体），解析不了才是传输错误。
fn decode_response<R: DeserializeOwned>(status: reqwest::StatusCode, text: &str) -> Result<R, HiveError> {
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(HiveError::Transport("bridge rejected credentials".into()));
    }
    if status.is_server_error() {
        let message = serde_json::from_str::<serde_json::Value>(text)
            .ok()
            .and_then(|body| body.get("error")?.as_str().map(str::to_string))
            .unwrap_or_else(|| format!("bridge returned status {}", status.as_u16()));
        return Err(HiveError::Persistence(message));
    }
    match serde_json::from_str::<R>(text) {
        Ok(parsed) => Ok(parsed),
        Err(_) if !status.is_success() => Err(HiveError::Transport(format!(
            "bridge request failed with status {}",
            status.as_u16()
        ))),
        Err(e) => Err(HiveError::Parse(e.to_string())),
    }
}

#[async_trait]
impl BridgeClient for HttpBridgeClient {
    async fn mutate(
        &self,
        board_id: &str,
        user_id: &str,
        action: &MutationAction,
    ) -> Result<MutateResponse, HiveError> {
        let req = MutateRequest {
            board_id: board_id.to_string(),
            user_id: user_id.to_string(),
            action: action.clone(),
        };
        self.post("/ai/mutate", &req).await
    }

    async fn mutate_batch(
        &self,
        board_id: &str,
        user_id: &str,
        actions: &[MutationAction],
    ) -> Result<MutateBatchResponse, HiveError> {
        let req = MutateBatchRequest {
            board_id: board_id.to_string(),
            user_id: user_id.to_string(),
            actions: actions.to_vec(),
        };
        self.post("/ai/mutate-batch", &req).await
    }

    async fn board_state(
        &self,
        board_id: &str,
        context: Option<&BoardStateContext>,
    ) -> Result<ScopedBoardState, HiveError> {
        let req = BoardStateRequest {
            board_id: board_id.to_string(),
            context: context.cloned(),
        };
        self.post("/ai/board-state", &req).await
    }

    async fn find_objects(
        &self,
        board_id: &str,
        query: &FindObjectsQuery,
    ) -> Result<FindObjectsResponse, HiveError> {
        let req = FindObjectsRequest {
            board_id: board_id.to_string(),
            query: query.clone(),
        };
        self.post("/ai/find-objects", &req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = HttpBridgeClient::new("http://127.0.0.1:8787/", "s", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:8787");
    }

    #[test]
    fn test_server_error_is_persistence() {
        let body = r#"{"success":false,"error":"Persistence error: disk full"}"#;
        let err = decode_response::<MutateResponse>(reqwest::StatusCode::INTERNAL_SERVER_ERROR, body).unwrap_err();
        assert_eq!(err, HiveError::Persistence("Persistence error: disk full".into()));
        assert!(!err.is_recoverable());

        let err = decode_response::<MutateResponse>(reqwest::StatusCode::BAD_GATEWAY, "oops").unwrap_err();
        assert!(matches!(err, HiveError::Persistence(_)));
    }

    #[test]
    fn test_decode_statuses() {
        let ok: MutateResponse = decode_response(
            reqwest::StatusCode::OK,
            r#"{"success":false,"error":"Object x not found"}"#,
        )
        .unwrap();
        assert!(!ok.success);

        let err = decode_response::<MutateResponse>(reqwest::StatusCode::UNAUTHORIZED, "{}").unwrap_err();
        assert_eq!(err.kind(), crate::core::ErrorKind::Transport);
        let err = decode_response::<MutateResponse>(reqwest::StatusCode::UNPROCESSABLE_ENTITY, "bad json").unwrap_err();
        assert_eq!(err.kind(), crate::core::ErrorKind::Transport);
        let err = decode_response::<MutateResponse>(reqwest::StatusCode::OK, "not json").unwrap_err();
        assert!(matches!(err, HiveError::Parse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_bridge_is_transport_error() {
        // 端口 9 (discard) 在测试环境中通常没有监听
        let client = HttpBridgeClient::new("http://127.0.0.1:9", "s", Duration::from_millis(500)).unwrap();
        let err = client.board_state("b1", None).await.unwrap_err();
        assert_eq!(err.kind(), crate::core::ErrorKind::Transport);
    }
}
