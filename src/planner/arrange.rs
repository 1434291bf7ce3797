//! 整理现有对象：排成网格、水平等距分布
//!
//! 目标对象：指令提到便签时只取便签，否则取除框架、连接线、直线以外的全部对象。

use std::sync::OnceLock;

use regex::Regex;
use serde_json::json;

use crate::board::{sort_reading_order, BoardObject, ObjectType};
use crate::layout::{compute_even_horizontal_spacing, compute_grid_layout, GridOptions, LayoutItem};
use crate::planner::lexicon::{ARRANGE_VERBS, MOVE_VERBS};
use crate::planner::{ComplexCommandPlan, PlanRequest, PlannedToolStep};
use crate::scope::{BoardStateContext, ScopedBoardState};
use crate::tools::ToolName;

const GRID_GAP: f64 = 20.0;
const FALLBACK_GAP: f64 = 40.0;

static COLUMNS_RE: OnceLock<Regex> = OnceLock::new();

fn requested_columns(command: &str) -> Option<usize> {
    let re = COLUMNS_RE.get_or_init(|| Regex::new(r"(?i)(\d+)\s*columns?\b").unwrap());
    re.captures(command)
        .and_then(|c| c.get(1)?.as_str().parse::<usize>().ok())
        .filter(|n| *n > 0)
}

fn state_context(req: &PlanRequest<'_>) -> BoardStateContext {
    let ctx = req.context();
    if req.mentions_stickies() {
        ctx.with_type(ObjectType::StickyNote.as_str())
    } else {
        ctx
    }
}

fn targets<'s>(req: &PlanRequest<'_>, state: &'s ScopedBoardState) -> Vec<&'s BoardObject> {
    let stickies_only = req.mentions_stickies();
    let mut objects: Vec<&BoardObject> = state
        .objects
        .iter()
        .filter(|o| {
            if stickies_only {
                o.is_sticky()
            } else {
                !matches!(o.object_type, ObjectType::Frame | ObjectType::Connector | ObjectType::Line)
            }
        })
        .collect();
    sort_reading_order(&mut objects);
    objects
}

fn move_step(id: &str, x: f64, y: f64) -> PlannedToolStep {
    PlannedToolStep::new(ToolName::MoveObject, json!({"objectId": id, "x": x, "y": y}))
}

pub fn matches_grid(req: &PlanRequest<'_>) -> bool {
    req.has_word("grid") && (req.has_any_word(ARRANGE_VERBS) || req.has_any_word(MOVE_VERBS))
}

pub fn build_grid(req: &PlanRequest<'_>) -> Option<ComplexCommandPlan> {
    let Some(state) = req.state else {
        return Some(ComplexCommandPlan::needs_state(state_context(req)));
    };
    let objects = targets(req, state);
    if objects.is_empty() {
        return Some(ComplexCommandPlan::ready(Vec::new()));
    }

    let columns = requested_columns(req.command)
        .unwrap_or_else(|| (objects.len() as f64).sqrt().ceil() as usize)
        .max(1);
    let start_x = objects.iter().map(|o| o.x).fold(f64::INFINITY, f64::min);
    let start_y = objects.iter().map(|o| o.y).fold(f64::INFINITY, f64::min);
    let items: Vec<LayoutItem> = objects.iter().map(|o| o.layout_item()).collect();
    let placements = compute_grid_layout(
        &items,
        &GridOptions {
            columns,
            start_x,
            start_y,
            h_gap: GRID_GAP,
            v_gap: GRID_GAP,
        },
    );

    let steps = placements.iter().map(|p| move_step(&p.id, p.x, p.y)).collect();
    Some(ComplexCommandPlan::ready(steps))
}

pub fn matches_even_spacing(req: &PlanRequest<'_>) -> bool {
    let spacing = req.has_any_word(&["space", "spacing", "spaced"])
        && req.has_any_word(&["even", "evenly", "equal", "equally"]);
    spacing || req.has_any_word(&["distribute", "distributed"])
}

pub fn build_even_spacing(req: &PlanRequest<'_>) -> Option<ComplexCommandPlan> {
    let Some(state) = req.state else {
        return Some(ComplexCommandPlan::needs_state(state_context(req)));
    };
    let objects = targets(req, state);
    let items: Vec<LayoutItem> = objects.iter().map(|o| o.layout_item()).collect();
    let steps = compute_even_horizontal_spacing(&items, FALLBACK_GAP)
        .into_iter()
        .filter(|spaced| {
            objects
                .iter()
                .find(|o| o.id == spaced.id)
                .is_some_and(|o| (o.x - spaced.x).abs() > f64::EPSILON)
        })
        .map(|spaced| move_step(&spaced.id, spaced.x, spaced.y))
        .collect();
    Some(ComplexCommandPlan::ready(steps))
}
