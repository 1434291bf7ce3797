//! 确定性规划器：不调用模型，把常见的结构化指令直接转成多步工具计划
//!
//! 每条指令的状态机：UNMATCHED →（规则匹配）→ NEEDS_STATE | READY。
//! 规则是按优先级排列的「谓词 + 构建器」对，第一个谓词命中的规则即为最终结果
//! （构建器返回 None 时交给模型路径）：
//! 1. Kanban 看板
//! 2. 按颜色整体移动便签
//! 3. 批量生成直线
//! 4. 批量生成便签
//! 5. 命名模板（SWOT、用户旅程、回顾、精益画布、路线图、艾森豪威尔矩阵、思维导图）
//! 6. 优缺点对比
//! 7. 现有对象排成网格
//! 8. 水平等距分布
//!
//! 依赖白板内容的规则在没有范围状态时返回 requiresBoardState=true 的计划（不含步骤），
//! 调用方取回状态后再次调用 plan。

pub mod arrange;
pub mod bulk;
pub mod color_move;
pub mod kanban;
pub mod lexicon;
pub mod templates;
pub mod verify;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scope::{BoardStateContext, ScopedBoardState};
use crate::tools::{ToolCallInput, ToolName, STEP_REF_PREFIX};

pub use verify::{
    verification_context, verify_plan_execution, ColorMoveGroupSpec, ExpectedFrame, ExpectedPosition, ExpectedRect,
    KanbanLayoutSpec, PlanVerificationSpec, VerificationReport,
};

/// 计划中的一步
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedToolStep {
    pub tool: String,
    pub args: Value,
}

impl PlannedToolStep {
    pub fn new(tool: ToolName, args: Value) -> Self {
        Self {
            tool: tool.as_str().to_string(),
            args,
        }
    }
}

/// 计划第 index 步（从 0 开始）转成工具调用后的 id
pub fn plan_call_id(index: usize) -> String {
    format!("plan-{}", index + 1)
}

/// 引用第 index 步创建的对象
pub fn step_ref(index: usize) -> String {
    format!("{STEP_REF_PREFIX}{}", plan_call_id(index))
}

/// 规划结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexCommandPlan {
    pub requires_board_state: bool,
    pub steps: Vec<PlannedToolStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<PlanVerificationSpec>,
    /// 取范围状态时建议使用的上下文
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_context: Option<BoardStateContext>,
}

impl ComplexCommandPlan {
    /// 需要先读取白板再规划
    pub fn needs_state(context: BoardStateContext) -> Self {
        Self {
            requires_board_state: true,
            steps: Vec::new(),
            verification: None,
            state_context: Some(context),
        }
    }

    pub fn ready(steps: Vec<PlannedToolStep>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    pub fn with_verification(mut self, spec: PlanVerificationSpec) -> Self {
        self.verification = Some(spec);
        self
    }

    /// 转成执行器消费的工具调用（id 为 plan-1, plan-2 ...）
    pub fn to_tool_calls(&self) -> Vec<ToolCallInput> {
        steps_to_tool_calls(&self.steps)
    }
}

pub fn steps_to_tool_calls(steps: &[PlannedToolStep]) -> Vec<ToolCallInput> {
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| ToolCallInput::new(plan_call_id(i), step.tool.clone(), &step.args))
        .collect()
}

/// 规划参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannerConfig {
    /// 批量生成的最小数量，低于此值交给模型
    pub bulk_min: u64,
    /// 批量生成的上限
    pub bulk_max: u64,
    pub verification_tolerance_px: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            bulk_min: 10,
            bulk_max: 5000,
            verification_tolerance_px: 2.0,
        }
    }
}

/// 单次规划请求
pub struct PlanRequest<'a> {
    pub command: &'a str,
    pub lower: String,
    pub words: Vec<String>,
    pub state: Option<&'a ScopedBoardState>,
    pub config: &'a PlannerConfig,
}

impl<'a> PlanRequest<'a> {
    pub fn new(command: &'a str, state: Option<&'a ScopedBoardState>, config: &'a PlannerConfig) -> Self {
        Self {
            command,
            lower: command.to_lowercase(),
            words: lexicon::words(command),
            state,
            config,
        }
    }

    pub fn has_word(&self, word: &str) -> bool {
        lexicon::has_word(&self.words, word)
    }

    pub fn has_any_word(&self, words: &[&str]) -> bool {
        lexicon::has_any_word(&self.words, words)
    }

    pub fn contains(&self, phrase: &str) -> bool {
        self.lower.contains(phrase)
    }

    pub fn mentions_stickies(&self) -> bool {
        self.has_any_word(&["sticky", "stickies", "note", "notes", "postit", "postits"])
    }

    /// 只按指令构造的状态上下文
    pub fn context(&self) -> BoardStateContext {
        BoardStateContext::for_command(self.command)
    }
}

/// 一条规划规则：谓词 + 构建器
pub struct PlanRule {
    pub name: &'static str,
    pub matches: fn(&PlanRequest<'_>) -> bool,
    pub build: fn(&PlanRequest<'_>) -> Option<ComplexCommandPlan>,
}

/// 默认规则表（按优先级）
pub fn default_rules() -> Vec<PlanRule> {
    vec![
        PlanRule {
            name: "kanban",
            matches: kanban::matches,
            build: kanban::build,
        },
        PlanRule {
            name: "color_move",
            matches: color_move::matches,
            build: color_move::build,
        },
        PlanRule {
            name: "bulk_lines",
            matches: bulk::matches_lines,
            build: bulk::build_lines,
        },
        PlanRule {
            name: "bulk_stickies",
            matches: bulk::matches_stickies,
            build: bulk::build_stickies,
        },
        PlanRule {
            name: "template",
            matches: templates::matches,
            build: templates::build,
        },
        PlanRule {
            name: "pros_cons",
            matches: templates::matches_pros_cons,
            build: templates::build_pros_cons,
        },
        PlanRule {
            name: "grid",
            matches: arrange::matches_grid,
            build: arrange::build_grid,
        },
        PlanRule {
            name: "even_spacing",
            matches: arrange::matches_even_spacing,
            build: arrange::build_even_spacing,
        },
    ]
}

/// 确定性规划器
pub struct Planner {
    rules: Vec<PlanRule>,
    config: PlannerConfig,
}

impl Default for Planner {
    fn default() -> Self {
        Self::new(PlannerConfig::default())
    }
}

impl Planner {
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            rules: default_rules(),
            config,
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// 规划指令；None 表示没有规则处理（交给模型路径）
    pub fn plan(&self, command: &str, state: Option<&ScopedBoardState>) -> Option<ComplexCommandPlan> {
        let req = PlanRequest::new(command, state, &self.config);
        let rule = self.rules.iter().find(|rule| (rule.matches)(&req))?;
        let plan = (rule.build)(&req);
        tracing::debug!(
            rule = rule.name,
            with_state = state.is_some(),
            planned = plan.is_some(),
            steps = plan.as_ref().map_or(0, |p| p.steps.len()),
            "planner rule matched"
        );
        plan
    }

    /// 命中的规则名（调试用）
    pub fn matched_rule(&self, command: &str) -> Option<&'static str> {
        let req = PlanRequest::new(command, None, &self.config);
        self.rules.iter().find(|rule| (rule.matches)(&req)).map(|r| r.name)
    }
}

/// 测试用的范围状态构造
#[cfg(test)]
pub(crate) fn state_of(objects: Vec<crate::board::BoardObject>) -> ScopedBoardState {
    ScopedBoardState {
        total_objects: objects.len(),
        returned_count: objects.len(),
        objects,
    }
}

#[cfg(test)]
pub(crate) fn sticky(id: &str, x: f64, y: f64, color: &str) -> crate::board::BoardObject {
    crate::board::BoardObject::new(id, crate::board::ObjectType::StickyNote, x, y, 200.0, 200.0)
        .with_property("text", id)
        .with_property("color", color)
}
