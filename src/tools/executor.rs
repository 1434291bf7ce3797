//! 工具执行器
//!
//! execute_tool_calls 严格按顺序处理每个调用（无并发，保证「先创建再连接」这类顺序）：
//! 解析 JSON 参数 → 解析 `$ref:<callId>` 步骤引用 → 校验 → 分发到变更桥。
//! getBoardState 走只读接口，摘要记入 actions，完整结果放入 toolOutputs；其它工具走 mutate。
//! 任一步失败立即终止整批，已应用的修改不回滚（在 actions / objectsAffected 中可见）。
//! 每次调用输出一条结构化审计日志（JSON）。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::bridge::BridgeClient;
use crate::core::HiveError;
use crate::scope::BoardStateContext;
use crate::tools::catalog::BoardTool;

/// 步骤引用前缀：`$ref:<toolCallId>` 解析为该调用创建的第一个对象 id
pub const STEP_REF_PREFIX: &str = "$ref:";

fn function_type() -> String {
    "function".to_string()
}

/// 执行器消费的调用单元（来自规划器或模型）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallInput {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: ToolCallFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    /// JSON 字符串
    pub arguments: String,
}

impl ToolCallInput {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: &Value) -> Self {
        Self {
            id: id.into(),
            call_type: function_type(),
            function: ToolCallFunction {
                name: name.into(),
                arguments: arguments.to_string(),
            },
        }
    }
}

/// 每个已执行步骤的审计记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub tool: String,
    pub args: Value,
    pub result: Value,
}

/// 只读工具的完整输出，供模型第二轮使用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub tool: String,
    pub output: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub actions: Vec<ActionRecord>,
    pub objects_affected: Vec<String>,
    pub tool_outputs: Vec<ToolOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    fn empty() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// 合并后续执行（修正步骤）的结果
    pub fn absorb(&mut self, other: ExecutionResult) {
        self.success &= other.success;
        self.actions.extend(other.actions);
        for id in other.objects_affected {
            if !self.objects_affected.contains(&id) {
                self.objects_affected.push(id);
            }
        }
        self.tool_outputs.extend(other.tool_outputs);
        if self.error.is_none() {
            self.error = other.error;
        }
    }
}

enum StepOutcome {
    Mutated(Vec<String>),
    Read { summary: String, output: Value },
}

/// 单步失败：审计 outcome 标签 + 返回给调用方的信息
struct StepFailure {
    outcome: &'static str,
    message: String,
}

impl StepFailure {
    fn new(outcome: &'static str, message: impl Into<String>) -> Self {
        Self {
            outcome,
            message: message.into(),
        }
    }
}

impl From<HiveError> for StepFailure {
    fn from(e: HiveError) -> Self {
        let outcome = match &e {
            HiveError::UnknownTool(_) => "unknown_tool",
            HiveError::Parse(_) => "parse_error",
            _ => "invalid",
        };
        StepFailure::new(outcome, e.to_string())
    }
}

/// 工具执行器：持有变更桥客户端
pub struct ToolExecutor {
    bridge: Arc<dyn BridgeClient>,
}

impl ToolExecutor {
    pub fn new(bridge: Arc<dyn BridgeClient>) -> Self {
        Self { bridge }
    }

    pub async fn execute_tool_calls(
        &self,
        calls: &[ToolCallInput],
        board_id: &str,
        user_id: &str,
    ) -> ExecutionResult {
        self.execute_with_context(calls, board_id, user_id, None).await
    }

    /// 同 execute_tool_calls；getBoardState 使用给定上下文构建范围状态
    pub async fn execute_with_context(
        &self,
        calls: &[ToolCallInput],
        board_id: &str,
        user_id: &str,
        context: Option<&BoardStateContext>,
    ) -> ExecutionResult {
        let mut result = ExecutionResult::empty();
        let mut created: HashMap<String, String> = HashMap::new();

        for call in calls {
            let start = Instant::now();
            let tool = call.function.name.as_str();
            let step = self
                .execute_one(call, board_id, user_id, context, &created)
                .await;

            let outcome = match &step {
                Ok(_) => "ok",
                Err(failure) => failure.outcome,
            };
            let audit = json!({
                "event": "tool_audit",
                "board_id": board_id,
                "tool": tool,
                "call_id": call.id,
                "ok": step.is_ok(),
                "outcome": outcome,
                "duration_ms": start.elapsed().as_millis() as u64,
                "args_preview": args_preview(&call.function.arguments),
            });
            tracing::info!(audit = %audit.to_string(), "tool");

            match step {
                Ok((args, StepOutcome::Mutated(affected))) => {
                    if let Some(first) = affected.first() {
                        created.insert(call.id.clone(), first.clone());
                    }
                    for id in &affected {
                        if !result.objects_affected.contains(id) {
                            result.objects_affected.push(id.clone());
                        }
                    }
                    result.actions.push(ActionRecord {
                        tool: tool.to_string(),
                        args,
                        result: json!({ "affectedObjectIds": affected }),
                    });
                }
                Ok((args, StepOutcome::Read { summary, output })) => {
                    result.actions.push(ActionRecord {
                        tool: tool.to_string(),
                        args,
                        result: Value::String(summary),
                    });
                    result.tool_outputs.push(ToolOutput {
                        tool_call_id: call.id.clone(),
                        tool: tool.to_string(),
                        output,
                    });
                }
                Err(failure) => {
                    result.success = false;
                    result.error = Some(failure.message);
                    break;
                }
            }
        }
        result
    }

    async fn execute_one(
        &self,
        call: &ToolCallInput,
        board_id: &str,
        user_id: &str,
        context: Option<&BoardStateContext>,
        created: &HashMap<String, String>,
    ) -> Result<(Value, StepOutcome), StepFailure> {
        let name = call.function.name.as_str();
        let raw = if call.function.arguments.trim().is_empty() {
            "{}"
        } else {
            call.function.arguments.as_str()
        };
        let mut args: Value = serde_json::from_str(raw).map_err(|e| {
            StepFailure::new("parse_error", format!("Invalid JSON arguments for {name}: {e}"))
        })?;
        resolve_step_refs(&mut args, created).map_err(|r| {
            StepFailure::new("invalid", format!("{name}: unresolved step reference {r}"))
        })?;

        let tool = BoardTool::parse(name, &args)?;
        let args = tool.args_json();

        if tool.is_read_only() {
            let state = self
                .bridge
                .board_state(board_id, context)
                .await
                .map_err(|e| transport_failure(name, &e))?;
            let summary = state.summary();
            let output = serde_json::to_value(&state).unwrap_or(Value::Null);
            return Ok((args, StepOutcome::Read { summary, output }));
        }

        let action = tool.to_action();
        let resp = self
            .bridge
            .mutate(board_id, user_id, &action)
            .await
            .map_err(|e| transport_failure(name, &e))?;
        if !resp.success {
            let message = resp
                .error
                .unwrap_or_else(|| format!("{name} failed"));
            return Err(StepFailure::new("rejected", message));
        }
        Ok((args, StepOutcome::Mutated(resp.affected_object_ids)))
    }
}

fn transport_failure(tool: &str, e: &HiveError) -> StepFailure {
    tracing::warn!(tool, error = %e, "bridge call failed");
    StepFailure::new("transport_error", format!("{tool} failed: board service unavailable"))
}

/// 把参数中的 `$ref:<callId>` 字符串替换为对应调用创建的对象 id；返回第一个无法解析的引用
fn resolve_step_refs(value: &mut Value, created: &HashMap<String, String>) -> Result<(), String> {
    match value {
        Value::String(s) => {
            if let Some(call_id) = s.strip_prefix(STEP_REF_PREFIX) {
                let id = created.get(call_id).ok_or_else(|| s.clone())?;
                *s = id.clone();
            }
            Ok(())
        }
        Value::Array(items) => items.iter_mut().try_for_each(|v| resolve_step_refs(v, created)),
        Value::Object(map) => map.values_mut().try_for_each(|v| resolve_step_refs(v, created)),
        _ => Ok(()),
    }
}

fn args_preview(args: &str) -> String {
    if args.len() > 200 {
        format!("{}...", args.chars().take(200).collect::<String>())
    } else {
        args.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::board::{LiveDocumentStore, MemorySnapshotStore};
    use crate::bridge::{DocumentHost, MutateBatchResponse, MutateResponse};
    use crate::core::RetryPolicy;
    use crate::scope::{FindObjectsQuery, FindObjectsResponse, ScopedBoardState};
    use crate::tools::catalog::MutationAction;

    /// 记录 mutate 调用次数的桥
    struct CountingBridge {
        inner: DocumentHost,
        mutations: AtomicUsize,
    }

    impl CountingBridge {
        fn new() -> Self {
            Self {
                inner: DocumentHost::new(
                    Arc::new(LiveDocumentStore::new()),
                    Arc::new(MemorySnapshotStore::new()),
                    RetryPolicy::default(),
                ),
                mutations: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl BridgeClient for CountingBridge {
        async fn mutate(&self, board_id: &str, user_id: &str, action: &MutationAction) -> Result<MutateResponse, HiveError> {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            self.inner.mutate(board_id, user_id, action).await
        }

        async fn mutate_batch(
            &self,
            board_id: &str,
            user_id: &str,
            actions: &[MutationAction],
        ) -> Result<MutateBatchResponse, HiveError> {
            self.inner.mutate_batch(board_id, user_id, actions).await
        }

        async fn board_state(&self, board_id: &str, context: Option<&BoardStateContext>) -> Result<ScopedBoardState, HiveError> {
            self.inner.board_state(board_id, context).await
        }

        async fn find_objects(&self, board_id: &str, query: &FindObjectsQuery) -> Result<FindObjectsResponse, HiveError> {
            self.inner.find_objects(board_id, query).await
        }
    }

    /// 传输层总是失败的桥
    struct DownBridge;

    #[async_trait]
    impl BridgeClient for DownBridge {
        async fn mutate(&self, _: &str, _: &str, _: &MutationAction) -> Result<MutateResponse, HiveError> {
            Err(HiveError::Transport("connection refused".into()))
        }

        async fn mutate_batch(&self, _: &str, _: &str, _: &[MutationAction]) -> Result<MutateBatchResponse, HiveError> {
            Err(HiveError::Transport("connection refused".into()))
        }

        async fn board_state(&self, _: &str, _: Option<&BoardStateContext>) -> Result<ScopedBoardState, HiveError> {
            Err(HiveError::Transport("connection refused".into()))
        }

        async fn find_objects(&self, _: &str, _: &FindObjectsQuery) -> Result<FindObjectsResponse, HiveError> {
            Err(HiveError::Transport("connection refused".into()))
        }
    }

    fn sticky_call(id: &str) -> ToolCallInput {
        ToolCallInput::new(id, "createStickyNote", &json!({"text": "t", "x": 0, "y": 0, "color": "#ffeb3b"}))
    }

    #[tokio::test]
    async fn test_failure_stops_later_calls() {
        let bridge = Arc::new(CountingBridge::new());
        let executor = ToolExecutor::new(bridge.clone());
        let calls = vec![
            sticky_call("c1"),
            sticky_call("c2"),
            ToolCallInput::new("c3", "moveObject", &json!({"objectId": "missing", "x": 1, "y": 1})),
            sticky_call("c4"),
            sticky_call("c5"),
        ];
        let result = executor.execute_tool_calls(&calls, "b1", "u1").await;
        assert!(!result.success);
        assert_eq!(result.actions.len(), 2);
        assert_eq!(result.objects_affected.len(), 2);
        assert_eq!(result.error.as_deref(), Some("Object missing not found"));
        // c3 到达了桥，c4/c5 没有
        assert_eq!(bridge.mutations.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_validation_failure_makes_no_bridge_call() {
        let bridge = Arc::new(CountingBridge::new());
        let executor = ToolExecutor::new(bridge.clone());
        let calls = vec![ToolCallInput::new("c1", "createFrame", &json!({"title": "F", "x": 0}))];
        let result = executor.execute_tool_calls(&calls, "b1", "u1").await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("createFrame: y is required"));
        assert_eq!(bridge.mutations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_parse_error_names_tool() {
        let executor = ToolExecutor::new(Arc::new(CountingBridge::new()));
        let mut call = sticky_call("c1");
        call.function.arguments = "{not json".into();
        let result = executor.execute_tool_calls(&[call], "b1", "u1").await;
        assert!(result.error.unwrap().starts_with("Invalid JSON arguments for createStickyNote"));
        assert!(result.actions.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool_aborts() {
        let executor = ToolExecutor::new(Arc::new(CountingBridge::new()));
        let calls = vec![ToolCallInput::new("c1", "deleteBoard", &json!({})), sticky_call("c2")];
        let result = executor.execute_tool_calls(&calls, "b1", "u1").await;
        assert_eq!(result.error.as_deref(), Some("Unknown tool: deleteBoard"));
        assert!(result.actions.is_empty());
    }

    #[tokio::test]
    async fn test_step_refs_resolve_to_created_ids() {
        let executor = ToolExecutor::new(Arc::new(CountingBridge::new()));
        let calls = vec![
            sticky_call("a"),
            sticky_call("b"),
            ToolCallInput::new("c", "createConnector", &json!({"fromId": "$ref:a", "toId": "$ref:b"})),
        ];
        let result = executor.execute_tool_calls(&calls, "b1", "u1").await;
        assert!(result.success, "{:?}", result.error);
        let connector_args = &result.actions[2].args;
        assert_eq!(connector_args["fromId"], json!(result.objects_affected[0]));
        assert_eq!(connector_args["toId"], json!(result.objects_affected[1]));

        let dangling = vec![ToolCallInput::new("x", "createConnector", &json!({"fromId": "$ref:zz", "toId": "b"}))];
        let result = executor.execute_tool_calls(&dangling, "b1", "u1").await;
        assert_eq!(
            result.error.as_deref(),
            Some("createConnector: unresolved step reference $ref:zz")
        );
    }

    #[tokio::test]
    async fn test_board_state_goes_to_tool_outputs() {
        let executor = ToolExecutor::new(Arc::new(CountingBridge::new()));
        let calls = vec![sticky_call("c1"), ToolCallInput::new("c2", "getBoardState", &json!({}))];
        let result = executor.execute_tool_calls(&calls, "b1", "u1").await;
        assert!(result.success);
        assert_eq!(result.actions[1].result, json!("Board has 1 objects (1 returned)"));
        assert_eq!(result.tool_outputs.len(), 1);
        assert_eq!(result.tool_outputs[0].tool_call_id, "c2");
        assert_eq!(result.tool_outputs[0].output["totalObjects"], json!(1));
    }

    #[tokio::test]
    async fn test_transport_error_is_generic() {
        let executor = ToolExecutor::new(Arc::new(DownBridge));
        let result = executor.execute_tool_calls(&[sticky_call("c1")], "b1", "u1").await;
        assert_eq!(
            result.error.as_deref(),
            Some("createStickyNote failed: board service unavailable")
        );
    }

    #[test]
    fn test_tool_call_wire_format() {
        let call: ToolCallInput = serde_json::from_value(json!({
            "id": "call_1",
            "type": "function",
            "function": {"name": "moveObject", "arguments": "{\"objectId\":\"a\",\"x\":1,\"y\":2}"}
        }))
        .unwrap();
        assert_eq!(call.function.name, "moveObject");
        assert_eq!(call.call_type, "function");
    }
}
