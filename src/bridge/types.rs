//! 变更桥请求/响应（线上格式 camelCase）

use serde::{Deserialize, Serialize};

use crate::bridge::mutation::BatchOutcome;
use crate::scope::{BoardStateContext, FindObjectsQuery};
use crate::tools::catalog::MutationAction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutateRequest {
    pub board_id: String,
    pub user_id: String,
    pub action: MutationAction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutateResponse {
    pub success: bool,
    #[serde(default)]
    pub affected_object_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MutateResponse {
    pub fn ok(affected_object_ids: Vec<String>) -> Self {
        Self {
            success: true,
            affected_object_ids,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            affected_object_ids: Vec::new(),
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutateBatchRequest {
    pub board_id: String,
    pub user_id: String,
    pub actions: Vec<MutationAction>,
}

/// 批量结果中单个成功动作的记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub affected_object_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutateBatchResponse {
    pub success: bool,
    #[serde(default)]
    pub results: Vec<ActionResult>,
    #[serde(default)]
    pub affected_object_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<BatchOutcome> for MutateBatchResponse {
    fn from(outcome: BatchOutcome) -> Self {
        Self {
            success: outcome.success(),
            results: outcome
                .results
                .into_iter()
                .map(|affected_object_ids| ActionResult { affected_object_ids })
                .collect(),
            affected_object_ids: outcome.affected_object_ids,
            failed_index: outcome.failed_index,
            error: outcome.error.map(|e| e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardStateRequest {
    pub board_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<BoardStateContext>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindObjectsRequest {
    pub board_id: String,
    #[serde(default)]
    pub query: FindObjectsQuery,
}
