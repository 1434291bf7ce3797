//! Kanban 看板：把现有便签按阅读顺序轮流分配到若干列框架中
//!
//! 几何：列宽 = 便签宽 + 2·padding，列高 = 表头 + 行数·(便签高 + 行距) + padding，
//! 第 k 张便签放在第 k % 列数 列、第 k / 列数 行：
//! (列x + padding, 列y + 表头 + 行·(高 + 行距))。
//! 指令提到 resize / same size / uniform 时先把每张便签统一为 160×120。

use std::sync::OnceLock;

use regex::Regex;
use serde_json::json;

use crate::board::{sort_reading_order, BoardObject};
use crate::planner::verify::{ExpectedFrame, ExpectedRect, KanbanLayoutSpec, PlanVerificationSpec};
use crate::planner::{ComplexCommandPlan, PlanRequest, PlannedToolStep};
use crate::tools::ToolName;

pub const DEFAULT_COLUMNS: [&str; 3] = ["To Do", "In Progress", "Done"];

const RESIZE_TARGET: (f64, f64) = (160.0, 120.0);
const PADDING: f64 = 20.0;
const HEADER: f64 = 60.0;
const ROW_GAP: f64 = 20.0;
const COLUMN_GAP: f64 = 40.0;
const FALLBACK_ORIGIN: (f64, f64) = (100.0, 100.0);

static WITH_COLUMNS_RE: OnceLock<Regex> = OnceLock::new();
static COLUMNS_LIST_RE: OnceLock<Regex> = OnceLock::new();
static LIST_STOP_RE: OnceLock<Regex> = OnceLock::new();

fn with_columns_re() -> &'static Regex {
    WITH_COLUMNS_RE.get_or_init(|| Regex::new(r"(?i)\bwith\s+([^.;\n]+?)\s+columns?\b").unwrap())
}

/// 列名列表在这些词处结束
fn list_stop_re() -> &'static Regex {
    LIST_STOP_RE.get_or_init(|| Regex::new(r"(?i) (?:then |and resize|resize|and make|so |for |with )").unwrap())
}

fn columns_list_re() -> &'static Regex {
    COLUMNS_LIST_RE.get_or_init(|| {
        Regex::new(r"(?i)\bcolumns?\b\s*(?:called|named|titled|labeled|labelled|:)?\s*([^.;\n]+)").unwrap()
    })
}

pub fn matches(req: &PlanRequest<'_>) -> bool {
    if req.has_word("kanban") {
        return true;
    }
    req.has_any_word(&["column", "columns"])
        && !req.has_word("grid")
        && (req.contains("to do") || req.has_word("todo") || req.contains("in progress") || req.has_word("backlog"))
}

fn split_titles(list: &str) -> Option<Vec<String>> {
    let cut = list_stop_re().find(list).map_or(list.len(), |m| m.start());
    let titles: Vec<String> = list[..cut]
        .split(',')
        .flat_map(|part| part.split(" and "))
        .map(|t| {
            t.trim()
                .trim_start_matches("and ")
                .trim_matches(|c: char| c == '"' || c == '\'' || c == '“' || c == '”')
                .trim()
                .to_string()
        })
        .filter(|t| !t.is_empty())
        .collect();
    (titles.len() >= 2).then_some(titles)
}

/// 解析列名：`with A, B and C columns` 或 `columns A, B, C`；解析不到时为 None
pub fn parse_columns(command: &str) -> Option<Vec<String>> {
    with_columns_re()
        .captures(command)
        .and_then(|c| split_titles(c.get(1)?.as_str()))
        .or_else(|| {
            columns_list_re()
                .captures(command)
                .and_then(|c| split_titles(c.get(1)?.as_str()))
        })
}

pub fn build(req: &PlanRequest<'_>) -> Option<ComplexCommandPlan> {
    let Some(state) = req.state else {
        return Some(ComplexCommandPlan::needs_state(req.context().with_type("sticky_note")));
    };

    let mut stickies: Vec<&BoardObject> = state.stickies().collect();
    if stickies.is_empty() {
        return Some(ComplexCommandPlan::ready(Vec::new()));
    }
    sort_reading_order(&mut stickies);

    let titles = parse_columns(req.command)
        .unwrap_or_else(|| DEFAULT_COLUMNS.iter().map(|t| t.to_string()).collect());
    let resize = req.has_word("resize") || req.contains("same size") || req.has_word("uniform");
    let (cell_w, cell_h) = if resize {
        RESIZE_TARGET
    } else {
        (
            stickies.iter().map(|s| s.width).fold(0.0_f64, f64::max),
            stickies.iter().map(|s| s.height).fold(0.0_f64, f64::max),
        )
    };

    let columns = titles.len();
    let rows = stickies.len().div_ceil(columns);
    let origin = stickies
        .iter()
        .map(|s| (s.x, s.y))
        .reduce(|(ax, ay), (x, y)| (ax.min(x), ay.min(y)))
        .unwrap_or(FALLBACK_ORIGIN);

    let column_w = cell_w + 2.0 * PADDING;
    let column_h = HEADER + rows as f64 * (cell_h + ROW_GAP) + PADDING;
    let frames: Vec<ExpectedFrame> = titles
        .into_iter()
        .enumerate()
        .map(|(i, title)| ExpectedFrame {
            title,
            x: origin.0 + i as f64 * (column_w + COLUMN_GAP),
            y: origin.1,
            width: column_w,
            height: column_h,
        })
        .collect();

    let placements: Vec<ExpectedRect> = stickies
        .iter()
        .enumerate()
        .map(|(k, sticky)| {
            let frame = &frames[k % columns];
            let row = (k / columns) as f64;
            let (width, height) = if resize { RESIZE_TARGET } else { (sticky.width, sticky.height) };
            ExpectedRect {
                object_id: sticky.id.clone(),
                x: frame.x + PADDING,
                y: frame.y + HEADER + row * (cell_h + ROW_GAP),
                width,
                height,
            }
        })
        .collect();

    let mut steps: Vec<PlannedToolStep> = frames
        .iter()
        .map(|f| {
            PlannedToolStep::new(
                ToolName::CreateFrame,
                json!({"title": f.title, "x": f.x, "y": f.y, "width": f.width, "height": f.height}),
            )
        })
        .collect();
    if resize {
        steps.extend(placements.iter().map(|p| {
            PlannedToolStep::new(
                ToolName::ResizeObject,
                json!({"objectId": p.object_id, "width": p.width, "height": p.height}),
            )
        }));
    }
    steps.extend(placements.iter().map(|p| {
        PlannedToolStep::new(ToolName::MoveObject, json!({"objectId": p.object_id, "x": p.x, "y": p.y}))
    }));

    let spec = PlanVerificationSpec::KanbanLayout(KanbanLayoutSpec {
        tolerance_px: req.config.verification_tolerance_px,
        columns: frames,
        sticky_placements: placements,
    });
    Some(ComplexCommandPlan::ready(steps).with_verification(spec))
}
