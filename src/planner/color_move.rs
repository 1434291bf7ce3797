//! 按颜色整体移动便签
//!
//! 选出颜色（color → fillColor → strokeColor）匹配的便签，作为一组移到当前内容范围之外：
//! 向右 x = max(1200, 最右边界 + 120)，向左 x = min(120, 最左边界 − 120)；
//! 按原先的 y、x 顺序从组内最小 y 开始竖向堆叠，间距 20。

use serde_json::json;

use crate::board::{sort_reading_order, BoardObject, ColorQuery};
use crate::planner::lexicon::MOVE_VERBS;
use crate::planner::verify::{ColorMoveGroupSpec, ExpectedPosition, PlanVerificationSpec};
use crate::planner::{ComplexCommandPlan, PlanRequest, PlannedToolStep};
use crate::tools::ToolName;

const RIGHT_MIN_X: f64 = 1200.0;
const LEFT_MAX_X: f64 = 120.0;
const EDGE_OFFSET: f64 = 120.0;
const STACK_GAP: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

fn direction(req: &PlanRequest<'_>) -> Option<Direction> {
    if req.has_word("right") {
        Some(Direction::Right)
    } else if req.has_word("left") {
        Some(Direction::Left)
    } else {
        None
    }
}

pub fn matches(req: &PlanRequest<'_>) -> bool {
    req.has_any_word(MOVE_VERBS)
        && req.mentions_stickies()
        && direction(req).is_some()
        && ColorQuery::find_in(req.command).is_some()
}

pub fn build(req: &PlanRequest<'_>) -> Option<ComplexCommandPlan> {
    let query = ColorQuery::find_in(req.command)?;
    let dir = direction(req)?;
    let Some(state) = req.state else {
        return Some(ComplexCommandPlan::needs_state(req.context().with_type("sticky_note")));
    };

    let mut group: Vec<&BoardObject> = state
        .stickies()
        .filter(|s| s.resolved_color().is_some_and(|c| query.matches(c)))
        .collect();
    if group.is_empty() {
        return Some(ComplexCommandPlan::ready(Vec::new()));
    }
    sort_reading_order(&mut group);

    let target_x = match dir {
        Direction::Right => {
            let max_x = state.objects.iter().map(|o| o.x + o.width).fold(f64::NEG_INFINITY, f64::max);
            RIGHT_MIN_X.max(max_x + EDGE_OFFSET)
        }
        Direction::Left => {
            let min_x = state.objects.iter().map(|o| o.x).fold(f64::INFINITY, f64::min);
            LEFT_MAX_X.min(min_x - EDGE_OFFSET)
        }
    };

    let mut y = group.iter().map(|s| s.y).fold(f64::INFINITY, f64::min);
    let placements: Vec<ExpectedPosition> = group
        .iter()
        .map(|s| {
            let placement = ExpectedPosition {
                object_id: s.id.clone(),
                x: target_x,
                y,
            };
            y += s.height + STACK_GAP;
            placement
        })
        .collect();

    let steps = placements
        .iter()
        .map(|p| PlannedToolStep::new(ToolName::MoveObject, json!({"objectId": p.object_id, "x": p.x, "y": p.y})))
        .collect();
    let spec = PlanVerificationSpec::ColorMoveGroup(ColorMoveGroupSpec {
        tolerance_px: req.config.verification_tolerance_px,
        color: query.label().to_string(),
        placements,
    });
    Some(ComplexCommandPlan::ready(steps).with_verification(spec))
}
