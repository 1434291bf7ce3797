//! 脚本化模型（用于测试，无需 API）
//!
//! 按顺序返回预先准备好的每一轮工具调用，脚本用完后返回空列表；同时记录每轮收到的请求。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::HiveError;
use crate::llm::{ModelTurn, ToolCallModel};
use crate::tools::ToolCallInput;

/// 记录下来的一轮请求
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedTurn {
    pub command: String,
    pub follow_up: bool,
    pub tool_output_count: usize,
}

#[derive(Debug, Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<Vec<ToolCallInput>>>,
    turns: Mutex<Vec<RecordedTurn>>,
}

impl ScriptedModel {
    pub fn new(rounds: Vec<Vec<ToolCallInput>>) -> Self {
        Self {
            script: Mutex::new(rounds.into()),
            turns: Mutex::new(Vec::new()),
        }
    }

    pub fn turns(&self) -> Vec<RecordedTurn> {
        self.turns.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ToolCallModel for ScriptedModel {
    async fn tool_calls(&self, turn: &ModelTurn<'_>) -> Result<Vec<ToolCallInput>, HiveError> {
        if let Ok(mut turns) = self.turns.lock() {
            turns.push(RecordedTurn {
                command: turn.command.to_string(),
                follow_up: turn.is_follow_up(),
                tool_output_count: turn.tool_outputs.len(),
            });
        }
        let mut script = self
            .script
            .lock()
            .map_err(|_| HiveError::Model("script lock poisoned".to_string()))?;
        Ok(script.pop_front().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
