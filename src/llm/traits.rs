//! 模型调用方抽象
//!
//! 编排器不关心具体的模型 API，只要求实现方把一条指令变成工具调用：
//! 第一轮只有指令和工具目录；如果第一轮读取了白板（getBoardState），
//! 第二轮会带上这些只读输出，让模型基于范围状态补全变更。

use async_trait::async_trait;
use serde_json::Value;

use crate::core::HiveError;
use crate::tools::{ToolCallInput, ToolOutput};

/// 一轮模型请求
#[derive(Debug, Clone)]
pub struct ModelTurn<'a> {
    pub board_id: &'a str,
    pub command: &'a str,
    /// 工具定义（JSON Schema）
    pub tools: &'a Value,
    /// 上一轮只读工具的输出；为空表示第一轮
    pub tool_outputs: &'a [ToolOutput],
}

impl ModelTurn<'_> {
    pub fn is_follow_up(&self) -> bool {
        !self.tool_outputs.is_empty()
    }
}

/// 产出工具调用的模型
#[async_trait]
pub trait ToolCallModel: Send + Sync {
    async fn tool_calls(&self, turn: &ModelTurn<'_>) -> Result<Vec<ToolCallInput>, HiveError>;

    /// 后端名称（日志用）
    fn name(&self) -> &str {
        "model"
    }
}
