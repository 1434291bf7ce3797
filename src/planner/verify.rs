//! 计划校验与纠正
//!
//! 执行带校验规格的计划之后，重新读取范围状态并与预期对比，给出纠正步骤。
//! 对已满足规格的状态再次校验，结果一定是 passed=true 且没有纠正步骤。

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::board::{BoardObject, ColorQuery, ObjectType};
use crate::layout::Rect;
use crate::planner::PlannedToolStep;
use crate::scope::{BoardStateContext, ScopedBoardState};
use crate::tools::ToolName;

/// 预期的列框架
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedFrame {
    pub title: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ExpectedFrame {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// 预期的对象矩形
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedRect {
    pub object_id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// 预期的对象位置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedPosition {
    pub object_id: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KanbanLayoutSpec {
    pub tolerance_px: f64,
    pub columns: Vec<ExpectedFrame>,
    pub sticky_placements: Vec<ExpectedRect>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorMoveGroupSpec {
    pub tolerance_px: f64,
    /// 颜色名或十六进制
    pub color: String,
    pub placements: Vec<ExpectedPosition>,
}

/// 校验规格（按 kind 区分）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PlanVerificationSpec {
    KanbanLayout(KanbanLayoutSpec),
    ColorMoveGroup(ColorMoveGroupSpec),
}

impl PlanVerificationSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            PlanVerificationSpec::KanbanLayout(_) => "kanban-layout",
            PlanVerificationSpec::ColorMoveGroup(_) => "color-move-group",
        }
    }

    /// 规格涉及的对象 id
    pub fn object_ids(&self) -> Vec<String> {
        match self {
            PlanVerificationSpec::KanbanLayout(spec) => {
                spec.sticky_placements.iter().map(|p| p.object_id.clone()).collect()
            }
            PlanVerificationSpec::ColorMoveGroup(spec) => spec.placements.iter().map(|p| p.object_id.clone()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub passed: bool,
    pub issues: Vec<String>,
    pub corrective_steps: Vec<PlannedToolStep>,
}

impl VerificationReport {
    fn from_findings(issues: Vec<String>, corrective_steps: Vec<PlannedToolStep>) -> Self {
        Self {
            passed: issues.is_empty(),
            issues,
            corrective_steps,
        }
    }
}

/// 校验前读取状态用的上下文：规格涉及的对象 + 本次执行影响的对象都作为选中项，
/// 保证它们排在范围状态的前面
pub fn verification_context(spec: &PlanVerificationSpec, affected_ids: &[String]) -> BoardStateContext {
    let mut selected = spec.object_ids();
    for id in affected_ids {
        if !selected.contains(id) {
            selected.push(id.clone());
        }
    }
    let command = match spec {
        PlanVerificationSpec::KanbanLayout(k) => {
            let titles: Vec<&str> = k.columns.iter().map(|c| c.title.as_str()).collect();
            format!("kanban {}", titles.join(" "))
        }
        PlanVerificationSpec::ColorMoveGroup(c) => format!("{} sticky notes", c.color),
    };
    BoardStateContext {
        command: Some(command),
        selected_object_ids: selected,
        ..BoardStateContext::default()
    }
}

pub fn verify_plan_execution(spec: &PlanVerificationSpec, state: &ScopedBoardState) -> VerificationReport {
    let report = match spec {
        PlanVerificationSpec::KanbanLayout(k) => verify_kanban(k, state),
        PlanVerificationSpec::ColorMoveGroup(c) => verify_color_group(c, state),
    };
    tracing::debug!(
        kind = spec.kind(),
        passed = report.passed,
        issues = report.issues.len(),
        corrections = report.corrective_steps.len(),
        "plan verified"
    );
    report
}

fn off_by(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() > tolerance
}

fn find_frame<'s>(state: &'s ScopedBoardState, title: &str) -> Option<&'s BoardObject> {
    state
        .objects
        .iter()
        .find(|o| o.object_type == ObjectType::Frame && o.property_str("title") == Some(title))
}

fn verify_kanban(spec: &KanbanLayoutSpec, state: &ScopedBoardState) -> VerificationReport {
    let tol = spec.tolerance_px;
    let mut issues = Vec::new();
    let mut steps = Vec::new();

    for column in &spec.columns {
        if find_frame(state, &column.title).is_none() {
            issues.push(format!("Column frame \"{}\" is missing", column.title));
            steps.push(PlannedToolStep::new(
                ToolName::CreateFrame,
                json!({
                    "title": column.title,
                    "x": column.x,
                    "y": column.y,
                    "width": column.width,
                    "height": column.height,
                }),
            ));
        }
    }

    let column_rects: Vec<Rect> = spec.columns.iter().map(ExpectedFrame::rect).collect();
    for placement in &spec.sticky_placements {
        let Some(obj) = state.get(&placement.object_id) else {
            issues.push(format!("Object {} not found after execution", placement.object_id));
            continue;
        };
        if off_by(obj.width, placement.width, tol) || off_by(obj.height, placement.height, tol) {
            issues.push(format!(
                "Object {} is {}x{}, expected {}x{}",
                obj.id, obj.width, obj.height, placement.width, placement.height
            ));
            steps.push(PlannedToolStep::new(
                ToolName::ResizeObject,
                json!({"objectId": obj.id, "width": placement.width, "height": placement.height}),
            ));
        }
        let planned = Rect::new(obj.x, obj.y, placement.width, placement.height);
        if !column_rects.iter().any(|c| c.contains(&planned, tol)) {
            issues.push(format!("Object {} is outside every column", obj.id));
            steps.push(PlannedToolStep::new(
                ToolName::MoveObject,
                json!({"objectId": obj.id, "x": placement.x, "y": placement.y}),
            ));
        }
    }

    VerificationReport::from_findings(issues, steps)
}

fn verify_color_group(spec: &ColorMoveGroupSpec, state: &ScopedBoardState) -> VerificationReport {
    let tol = spec.tolerance_px;
    let query = ColorQuery::parse(&spec.color);
    let mut issues = Vec::new();
    let mut steps = Vec::new();

    for placement in &spec.placements {
        let Some(obj) = state.get(&placement.object_id) else {
            issues.push(format!("Object {} not found after execution", placement.object_id));
            continue;
        };
        if let Some(query) = &query {
            if !obj.resolved_color().is_some_and(|c| query.matches(c)) {
                issues.push(format!("Object {} is no longer {}", obj.id, spec.color));
                steps.push(PlannedToolStep::new(
                    ToolName::ChangeColor,
                    json!({"objectId": obj.id, "color": query.to_hex()}),
                ));
            }
        }
        if off_by(obj.x, placement.x, tol) || off_by(obj.y, placement.y, tol) {
            issues.push(format!(
                "Object {} is at ({}, {}), expected ({}, {})",
                obj.id, obj.x, obj.y, placement.x, placement.y
            ));
            steps.push(PlannedToolStep::new(
                ToolName::MoveObject,
                json!({"objectId": obj.id, "x": placement.x, "y": placement.y}),
            ));
        }
    }

    VerificationReport::from_findings(issues, steps)
}
