//! 批量生成：直线与便签
//!
//! 数量截断到 [bulk_min, bulk_max]（默认 10..=5000），低于下限不生成计划，交给模型处理。
//! 指令中出现形状/连接线名词而没有便签目标时，不按便签解释（"create 50 circles" 不会变成便签）。

use serde_json::json;

use crate::board::ColorQuery;
use crate::planner::lexicon::{parse_count, parse_count_for, quoted_phrase, CREATE_VERBS, SHAPE_NOUNS, STICKY_TARGETS};
use crate::planner::templates::mentions_template;
use crate::planner::{ComplexCommandPlan, PlanRequest, PlannedToolStep};
use crate::tools::ToolName;

const ORIGIN: (f64, f64) = (100.0, 100.0);

const LINE_LENGTH: f64 = 120.0;
const LINES_PER_ROW: u64 = 10;
const LINE_PITCH: (f64, f64) = (160.0, 40.0);
const DEFAULT_LINE_COLOR: &str = "#000000";

const STICKY_CELL: f64 = 200.0;
const STICKY_GAP: f64 = 20.0;
const DEFAULT_STICKY_COLOR: &str = "#ffeb3b";

const LINE_NOUNS: &[&str] = &["line", "lines"];

/// 解析修饰目标名词的数量并截断；低于下限时为 None
fn bounded_count(req: &PlanRequest<'_>, nouns: &[&str]) -> Option<u64> {
    let count = parse_count_for(req.command, nouns)?;
    if count < req.config.bulk_min {
        tracing::debug!(count, min = req.config.bulk_min, "bulk count below minimum");
        return None;
    }
    Some(count.min(req.config.bulk_max))
}

fn has_line_noun(req: &PlanRequest<'_>) -> bool {
    req.has_any_word(LINE_NOUNS)
}

pub fn matches_lines(req: &PlanRequest<'_>) -> bool {
    req.has_any_word(CREATE_VERBS)
        && has_line_noun(req)
        && !req.has_any_word(STICKY_TARGETS)
        && parse_count(req.command).is_some()
}

pub fn build_lines(req: &PlanRequest<'_>) -> Option<ComplexCommandPlan> {
    let count = bounded_count(req, LINE_NOUNS)?;
    let color = ColorQuery::find_in(req.command)
        .map(|c| c.to_hex())
        .unwrap_or_else(|| DEFAULT_LINE_COLOR.to_string());
    let steps = (0..count)
        .map(|i| {
            let x = ORIGIN.0 + (i % LINES_PER_ROW) as f64 * LINE_PITCH.0;
            let y = ORIGIN.1 + (i / LINES_PER_ROW) as f64 * LINE_PITCH.1;
            PlannedToolStep::new(
                ToolName::CreateShape,
                json!({"type": "line", "x": x, "y": y, "width": LINE_LENGTH, "height": 0.0, "color": color}),
            )
        })
        .collect();
    Some(ComplexCommandPlan::ready(steps))
}

pub fn matches_stickies(req: &PlanRequest<'_>) -> bool {
    if !req.has_any_word(CREATE_VERBS) || parse_count(req.command).is_none() || mentions_template(req) {
        return false;
    }
    let sticky_target = req.has_any_word(STICKY_TARGETS);
    let shape_noun = req.has_any_word(SHAPE_NOUNS);
    sticky_target || !shape_noun
}

pub fn build_stickies(req: &PlanRequest<'_>) -> Option<ComplexCommandPlan> {
    let count = bounded_count(req, STICKY_TARGETS)?;
    let columns = (count as f64).sqrt().ceil().max(1.0) as u64;
    let text = quoted_phrase(req.command);
    let color = ColorQuery::find_in(req.command)
        .map(|c| c.to_hex())
        .unwrap_or_else(|| DEFAULT_STICKY_COLOR.to_string());
    let pitch = STICKY_CELL + STICKY_GAP;

    let steps = (0..count)
        .map(|i| {
            let text = text.clone().unwrap_or_else(|| format!("Note {}", i + 1));
            PlannedToolStep::new(
                ToolName::CreateStickyNote,
                json!({
                    "text": text,
                    "x": ORIGIN.0 + (i % columns) as f64 * pitch,
                    "y": ORIGIN.1 + (i / columns) as f64 * pitch,
                    "color": color,
                }),
            )
        })
        .collect();
    Some(ComplexCommandPlan::ready(steps))
}

#[cfg(test)]
mod tests {
    use crate::planner::{Planner, PlannerConfig};

    #[test]
    fn test_bulk_count_is_capped() {
        let planner = Planner::default();
        let plan = planner.plan("Create 100000 sticky notes", None).unwrap();
        assert_eq!(plan.steps.len(), 5000);
        let plan = planner.plan("Create 5000 sticky notes", None).unwrap();
        assert_eq!(plan.steps.len(), 5000);
        let plan = planner.plan("draw 999999999999999999999999 lines", None).unwrap();
        assert_eq!(plan.steps.len(), 5000);
    }

    #[test]
    fn test_small_counts_fall_through() {
        let planner = Planner::default();
        assert!(planner.plan("Create 9 sticky notes", None).is_none());
        assert!(planner.plan("add three notes", None).is_none());
        assert!(planner.plan("draw 5 lines", None).is_none());
    }

    #[test]
    fn test_sticky_grid_text_and_color() {
        let plan = Planner::default()
            .plan("Add twelve blue sticky notes saying \"Idea\"", None)
            .unwrap();
        assert_eq!(plan.steps.len(), 12);
        // ceil(sqrt(12)) = 4 列
        let last = &plan.steps[11].args;
        assert_eq!(last["x"], 100.0 + 3.0 * 220.0);
        assert_eq!(last["y"], 100.0 + 2.0 * 220.0);
        assert_eq!(last["text"], "Idea");
        assert_eq!(last["color"], "#90caf9");

        let plan = Planner::default().plan("create 10 notes", None).unwrap();
        assert_eq!(plan.steps[9].args["text"], "Note 10");
        assert_eq!(plan.steps[0].args["color"], "#ffeb3b");
    }

    #[test]
    fn test_color_digits_are_not_the_count() {
        let plan = Planner::default()
            .plan("Create fifty sticky notes colored #123456", None)
            .unwrap();
        assert_eq!(plan.steps.len(), 50);
        assert_eq!(plan.steps[0].args["color"], "#123456");
    }

    #[test]
    fn test_quoted_digits_are_not_the_count() {
        let plan = Planner::default()
            .plan("Create twenty sticky notes saying \"Q3 goals\"", None)
            .unwrap();
        assert_eq!(plan.steps.len(), 20);
        assert!(plan.steps.iter().all(|s| s.args["text"] == "Q3 goals"));
    }

    #[test]
    fn test_count_follows_sticky_noun() {
        let plan = Planner::default()
            .plan("create 50 circles and 20 sticky ones", None)
            .unwrap();
        assert_eq!(plan.steps.len(), 20);
        assert!(plan.steps.iter().all(|s| s.tool == "createStickyNote"));
    }

    #[test]
    fn test_non_ascii_text_in_bulk_command() {
        let plan = Planner::default()
            .plan("Create 15 sticky notes saying \"Überprüfung İstanbul\"", None)
            .unwrap();
        assert_eq!(plan.steps.len(), 15);
        assert_eq!(plan.steps[14].args["text"], "Überprüfung İstanbul");
    }

    #[test]
    fn test_line_rows() {
        let plan = Planner::default().plan("Draw 25 red lines", None).unwrap();
        assert_eq!(plan.steps.len(), 25);
        let args = &plan.steps[24].args;
        assert_eq!(args["type"], "line");
        assert_eq!(args["x"], 100.0 + 4.0 * 160.0);
        assert_eq!(args["y"], 100.0 + 2.0 * 40.0);
        assert_eq!(args["color"], "#ef9a9a");
    }

    #[test]
    fn test_custom_bounds() {
        let planner = Planner::new(PlannerConfig {
            bulk_min: 2,
            bulk_max: 20,
            ..PlannerConfig::default()
        });
        assert_eq!(planner.plan("create 3 notes", None).unwrap().steps.len(), 3);
        assert_eq!(planner.plan("create 300 notes", None).unwrap().steps.len(), 20);
    }
}
