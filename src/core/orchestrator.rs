//! 指令编排器：一条自然语言指令从规划到执行、校验与纠正的完整流程
//!
//! 1. 规划器先尝试确定性匹配；需要白板内容时先取范围状态，再带状态重新规划
//! 2. 没有规则命中时交给模型：第一轮产出工具调用；若读取了白板，第二轮带上只读输出
//! 3. 两条路径都交给同一个执行器顺序执行
//! 4. 计划带校验规格时重新读取状态校验；不满足则执行一次纠正步骤，再校验一次作为最终报告
//!
//! 任何失败都折叠进 CommandOutcome 返回，不会向外抛出。

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::bridge::BridgeClient;
use crate::llm::{ModelTurn, ToolCallModel};
use crate::observability::{TraceEmitter, TraceEvent};
use crate::planner::{
    steps_to_tool_calls, verification_context, verify_plan_execution, ComplexCommandPlan, PlanVerificationSpec,
    Planner, VerificationReport,
};
use crate::scope::BoardStateContext;
use crate::tools::{tool_definitions, ExecutionResult, ToolExecutor};

/// 工具调用的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandSource {
    Planner,
    Model,
    None,
}

impl CommandSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandSource::Planner => "planner",
            CommandSource::Model => "model",
            CommandSource::None => "none",
        }
    }
}

/// 一条指令的最终结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutcome {
    pub success: bool,
    pub source: CommandSource,
    pub execution: ExecutionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandOutcome {
    fn failed(source: CommandSource, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            source,
            execution: ExecutionResult {
                success: false,
                error: Some(error.clone()),
                ..ExecutionResult::default()
            },
            verification: None,
            error: Some(error),
        }
    }

    fn from_execution(source: CommandSource, execution: ExecutionResult, verification: Option<VerificationReport>) -> Self {
        Self {
            success: execution.success,
            error: execution.error.clone(),
            source,
            execution,
            verification,
        }
    }
}

const STATE_UNAVAILABLE: &str = "Could not read board state: board service unavailable";

pub struct CommandOrchestrator {
    planner: Planner,
    executor: ToolExecutor,
    bridge: Arc<dyn BridgeClient>,
    model: Option<Arc<dyn ToolCallModel>>,
    tracer: TraceEmitter,
}

impl CommandOrchestrator {
    pub fn new(bridge: Arc<dyn BridgeClient>, planner: Planner) -> Self {
        Self {
            planner,
            executor: ToolExecutor::new(bridge.clone()),
            bridge,
            model: None,
            tracer: TraceEmitter::disabled(),
        }
    }

    pub fn with_model(mut self, model: Arc<dyn ToolCallModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_tracer(mut self, tracer: TraceEmitter) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    pub async fn run_command(&self, board_id: &str, user_id: &str, command: &str) -> CommandOutcome {
        let outcome = match self.planner.plan(command, None) {
            Some(plan) => match self.materialize(board_id, command, plan).await {
                Ok(Some(plan)) => self.run_plan(board_id, user_id, &plan).await,
                Ok(None) => self.run_model(board_id, user_id, command).await,
                Err(outcome) => outcome,
            },
            None => self.run_model(board_id, user_id, command).await,
        };

        tracing::info!(
            board_id,
            source = outcome.source.as_str(),
            success = outcome.success,
            actions = outcome.execution.actions.len(),
            affected = outcome.execution.objects_affected.len(),
            verified = outcome.verification.as_ref().map(|v| v.passed),
            "command finished"
        );
        self.tracer
            .emit(TraceEvent::new(
                "command",
                board_id,
                json!({
                    "source": outcome.source,
                    "success": outcome.success,
                    "actions": outcome.execution.actions.len(),
                    "objectsAffected": outcome.execution.objects_affected.len(),
                    "verificationPassed": outcome.verification.as_ref().map(|v| v.passed),
                    "error": outcome.error,
                }),
            ))
            .await;
        outcome
    }

    /// NEEDS_STATE 的计划：取范围状态后重新规划。Ok(None) 表示交给模型
    async fn materialize(
        &self,
        board_id: &str,
        command: &str,
        plan: ComplexCommandPlan,
    ) -> Result<Option<ComplexCommandPlan>, CommandOutcome> {
        if !plan.requires_board_state {
            return Ok(Some(plan));
        }
        let context = plan
            .state_context
            .clone()
            .unwrap_or_else(|| BoardStateContext::for_command(command));
        let state = self.bridge.board_state(board_id, Some(&context)).await.map_err(|e| {
            tracing::warn!(board_id, error = %e, "board state fetch for planning failed");
            CommandOutcome::failed(CommandSource::Planner, STATE_UNAVAILABLE)
        })?;
        tracing::debug!(board_id, returned = state.returned_count, "re-planning with scoped state");
        Ok(self.planner.plan(command, Some(&state)))
    }

    async fn run_plan(&self, board_id: &str, user_id: &str, plan: &ComplexCommandPlan) -> CommandOutcome {
        let calls = plan.to_tool_calls();
        let context = plan.state_context.as_ref();
        let mut execution = self.executor.execute_with_context(&calls, board_id, user_id, context).await;

        let verification = match (&plan.verification, execution.success) {
            (Some(spec), true) => Some(self.verify_and_correct(board_id, user_id, spec, &mut execution).await),
            _ => None,
        };
        CommandOutcome::from_execution(CommandSource::Planner, execution, verification)
    }

    async fn verify_and_correct(
        &self,
        board_id: &str,
        user_id: &str,
        spec: &PlanVerificationSpec,
        execution: &mut ExecutionResult,
    ) -> VerificationReport {
        let report = self.verify(board_id, spec, &execution.objects_affected).await;
        if report.passed || report.corrective_steps.is_empty() {
            return report;
        }

        tracing::info!(
            board_id,
            kind = spec.kind(),
            corrections = report.corrective_steps.len(),
            "applying corrective steps"
        );
        let calls = steps_to_tool_calls(&report.corrective_steps);
        let correction = self.executor.execute_tool_calls(&calls, board_id, user_id).await;
        execution.absorb(correction);
        self.verify(board_id, spec, &execution.objects_affected).await
    }

    async fn verify(&self, board_id: &str, spec: &PlanVerificationSpec, affected: &[String]) -> VerificationReport {
        let context = verification_context(spec, affected);
        match self.bridge.board_state(board_id, Some(&context)).await {
            Ok(state) => verify_plan_execution(spec, &state),
            Err(e) => {
                tracing::warn!(board_id, error = %e, "board state fetch for verification failed");
                VerificationReport {
                    passed: false,
                    issues: vec![STATE_UNAVAILABLE.to_string()],
                    corrective_steps: Vec::new(),
                }
            }
        }
    }

    async fn run_model(&self, board_id: &str, user_id: &str, command: &str) -> CommandOutcome {
        let Some(model) = &self.model else {
            return CommandOutcome::failed(
                CommandSource::None,
                "No deterministic plan matched and no model is configured",
            );
        };
        let tools = Value::Array(tool_definitions());

        let first = ModelTurn {
            board_id,
            command,
            tools: &tools,
            tool_outputs: &[],
        };
        let calls = match model.tool_calls(&first).await {
            Ok(calls) => calls,
            Err(e) => {
                tracing::warn!(board_id, model = model.name(), error = %e, "model first pass failed");
                return CommandOutcome::failed(CommandSource::Model, e.to_string());
            }
        };
        let mut execution = self.executor.execute_tool_calls(&calls, board_id, user_id).await;

        if execution.success && !execution.tool_outputs.is_empty() {
            let follow_up = ModelTurn {
                board_id,
                command,
                tools: &tools,
                tool_outputs: &execution.tool_outputs,
            };
            let next = model.tool_calls(&follow_up).await;
            match next {
                Ok(calls) if !calls.is_empty() => {
                    let second = self.executor.execute_tool_calls(&calls, board_id, user_id).await;
                    execution.absorb(second);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(board_id, model = model.name(), error = %e, "model follow-up pass failed");
                    execution.success = false;
                    execution.error = Some(e.to_string());
                }
            }
        }
        CommandOutcome::from_execution(CommandSource::Model, execution, None)
    }
}
