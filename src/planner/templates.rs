//! 命名模板与优缺点对比
//!
//! 模板先用相对坐标定义种子（框架、提示便签、连接线），量出整体占地后，
//! 用 find_non_overlapping_origin 在现有内容之外找一个原点整体平移，保证不会压在已有对象上。
//! 思维导图的连接线用 `$ref:plan-N` 引用同一批次里刚创建的便签。

use std::f64::consts::PI;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::json;

use crate::board::color::named_hex;
use crate::layout::{find_non_overlapping_origin, OriginSearch, Rect};
use crate::planner::lexicon::quoted_phrase;
use crate::planner::{step_ref, ComplexCommandPlan, PlanRequest, PlannedToolStep};
use crate::tools::ToolName;

const STICKY_SIZE: f64 = 200.0;

/// 模板种子（坐标相对模板左上角）
#[derive(Debug, Clone, PartialEq)]
pub enum Seed {
    Frame {
        title: String,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    Sticky {
        text: String,
        x: f64,
        y: f64,
        color: &'static str,
    },
    /// 连接两个种子（按下标）
    Connector { from: usize, to: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Swot,
    UserJourney,
    Retrospective,
    LeanCanvas,
    Roadmap,
    Eisenhower,
    MindMap,
}

impl TemplateKind {
    pub fn detect(req: &PlanRequest<'_>) -> Option<Self> {
        if req.has_word("swot") {
            Some(TemplateKind::Swot)
        } else if req.contains("user journey") || req.contains("customer journey") || req.contains("journey map") {
            Some(TemplateKind::UserJourney)
        } else if req.has_any_word(&["retrospective", "retro"]) {
            Some(TemplateKind::Retrospective)
        } else if req.contains("lean canvas") {
            Some(TemplateKind::LeanCanvas)
        } else if req.has_word("roadmap") {
            Some(TemplateKind::Roadmap)
        } else if req.has_word("eisenhower")
            || req.contains("priority matrix")
            || (req.has_word("urgent") && req.has_word("important"))
        {
            Some(TemplateKind::Eisenhower)
        } else if req.contains("mind map") || req.has_word("mindmap") {
            Some(TemplateKind::MindMap)
        } else {
            None
        }
    }

    pub fn seeds(&self, command: &str) -> Vec<Seed> {
        match self {
            TemplateKind::Swot => quadrants(&[
                ("Strengths", "Add a strength", "green"),
                ("Weaknesses", "Add a weakness", "pink"),
                ("Opportunities", "Add an opportunity", "blue"),
                ("Threats", "Add a threat", "orange"),
            ]),
            TemplateKind::Eisenhower => quadrants(&[
                ("Do First: Urgent & Important", "Do it now", "red"),
                ("Schedule: Important, Not Urgent", "Plan a time", "blue"),
                ("Delegate: Urgent, Not Important", "Who can help?", "orange"),
                ("Eliminate: Neither", "Drop it", "gray"),
            ]),
            TemplateKind::UserJourney => columns(
                &[
                    ("Awareness", "How do users discover us?"),
                    ("Consideration", "What do they compare?"),
                    ("Purchase", "What makes them buy?"),
                    ("Retention", "Why do they stay?"),
                    ("Advocacy", "Why do they recommend us?"),
                ],
                (240.0, 460.0),
                "yellow",
            ),
            TemplateKind::Retrospective => {
                let mut seeds = Vec::new();
                for (i, (title, color)) in [("What went well", "green"), ("What didn't go well", "pink"), ("Action items", "blue")]
                    .into_iter()
                    .enumerate()
                {
                    push_frame_with_prompt(&mut seeds, title, i as f64 * 300.0, 0.0, (280.0, 500.0), "Add a note", color);
                }
                seeds
            }
            TemplateKind::Roadmap => columns(
                &[("Q1", "Milestone"), ("Q2", "Milestone"), ("Q3", "Milestone"), ("Q4", "Milestone")],
                (300.0, 400.0),
                "yellow",
            ),
            TemplateKind::LeanCanvas => lean_canvas(),
            TemplateKind::MindMap => mind_map(&mind_map_topic(command)),
        }
    }
}

pub fn mentions_template(req: &PlanRequest<'_>) -> bool {
    TemplateKind::detect(req).is_some()
}

fn frame(title: &str, x: f64, y: f64, width: f64, height: f64) -> Seed {
    Seed::Frame {
        title: title.to_string(),
        x,
        y,
        width,
        height,
    }
}

fn color_hex(name: &str) -> &'static str {
    named_hex(name).unwrap_or("#ffeb3b")
}

/// 框架 + 左上角一张提示便签
fn push_frame_with_prompt(seeds: &mut Vec<Seed>, title: &str, x: f64, y: f64, size: (f64, f64), prompt: &str, color: &str) {
    seeds.push(frame(title, x, y, size.0, size.1));
    seeds.push(Seed::Sticky {
        text: prompt.to_string(),
        x: x + 20.0,
        y: y + 60.0,
        color: color_hex(color),
    });
}

/// 2×2 象限（480×300，间距 20）
fn quadrants(cells: &[(&str, &str, &str); 4]) -> Vec<Seed> {
    let mut seeds = Vec::new();
    for (i, (title, prompt, color)) in cells.iter().enumerate() {
        let x = (i % 2) as f64 * 500.0;
        let y = (i / 2) as f64 * 320.0;
        push_frame_with_prompt(&mut seeds, title, x, y, (480.0, 300.0), prompt, color);
    }
    seeds
}

/// 横向一排等宽列（间距 20）
fn columns(cells: &[(&str, &str)], size: (f64, f64), color: &str) -> Vec<Seed> {
    let mut seeds = Vec::new();
    for (i, (title, prompt)) in cells.iter().enumerate() {
        push_frame_with_prompt(&mut seeds, title, i as f64 * (size.0 + 20.0), 0.0, size, prompt, color);
    }
    seeds
}

fn lean_canvas() -> Vec<Seed> {
    const COL: f64 = 260.0;
    vec![
        frame("Problem", 0.0, 0.0, 240.0, 520.0),
        frame("Solution", COL, 0.0, 240.0, 250.0),
        frame("Key Metrics", COL, 270.0, 240.0, 250.0),
        frame("Unique Value Proposition", 2.0 * COL, 0.0, 240.0, 520.0),
        frame("Unfair Advantage", 3.0 * COL, 0.0, 240.0, 250.0),
        frame("Channels", 3.0 * COL, 270.0, 240.0, 250.0),
        frame("Customer Segments", 4.0 * COL, 0.0, 240.0, 520.0),
        frame("Cost Structure", 0.0, 540.0, 630.0, 200.0),
        frame("Revenue Streams", 650.0, 540.0, 630.0, 200.0),
    ]
}

static TOPIC_RE: OnceLock<Regex> = OnceLock::new();

fn clean_topic(s: &str) -> Option<String> {
    let topic = s.trim().trim_end_matches(['.', '!', '?']).trim();
    (!topic.is_empty()).then(|| topic.to_string())
}

fn mind_map_topic(command: &str) -> String {
    let re = TOPIC_RE.get_or_init(|| Regex::new(r"(?i)mind\s?map\s+(?:about|for|on|of)\s+(.+)$").unwrap());
    quoted_phrase(command)
        .or_else(|| re.captures(command).and_then(|c| clean_topic(c.get(1)?.as_str())))
        .unwrap_or_else(|| "Central idea".to_string())
}

/// 中心便签 + 6 个分支便签 + 6 条连接线
fn mind_map(topic: &str) -> Vec<Seed> {
    const CENTER: f64 = 440.0;
    const RADIUS: f64 = 440.0;
    let mut seeds = vec![Seed::Sticky {
        text: topic.to_string(),
        x: CENTER,
        y: CENTER,
        color: color_hex("yellow"),
    }];
    for k in 0..6 {
        let angle = k as f64 * PI / 3.0;
        seeds.push(Seed::Sticky {
            text: format!("Idea {}", k + 1),
            x: (CENTER + RADIUS * angle.cos()).round(),
            y: (CENTER + RADIUS * angle.sin()).round(),
            color: color_hex("blue"),
        });
    }
    for k in 0..6 {
        seeds.push(Seed::Connector { from: 0, to: k + 1 });
    }
    seeds
}

/// 种子的相对占地（宽, 高）
pub fn footprint(seeds: &[Seed]) -> (f64, f64) {
    seeds.iter().fold((0.0_f64, 0.0_f64), |(w, h), seed| match seed {
        Seed::Frame { x, y, width, height, .. } => (w.max(x + width), h.max(y + height)),
        Seed::Sticky { x, y, .. } => (w.max(x + STICKY_SIZE), h.max(y + STICKY_SIZE)),
        Seed::Connector { .. } => (w, h),
    })
}

/// 在现有内容之外放置种子；没有范围状态时先请求状态
fn place_seeds(req: &PlanRequest<'_>, seeds: Vec<Seed>) -> ComplexCommandPlan {
    let Some(state) = req.state else {
        return ComplexCommandPlan::needs_state(req.context());
    };
    let occupied: Vec<Rect> = state.objects.iter().map(|o| o.bounds()).collect();
    let (ox, oy) = find_non_overlapping_origin(&occupied, footprint(&seeds), &OriginSearch::default());

    let steps = seeds
        .iter()
        .map(|seed| match seed {
            Seed::Frame {
                title,
                x,
                y,
                width,
                height,
            } => PlannedToolStep::new(
                ToolName::CreateFrame,
                json!({"title": title, "x": ox + x, "y": oy + y, "width": width, "height": height}),
            ),
            Seed::Sticky { text, x, y, color } => PlannedToolStep::new(
                ToolName::CreateStickyNote,
                json!({"text": text, "x": ox + x, "y": oy + y, "color": color}),
            ),
            Seed::Connector { from, to } => PlannedToolStep::new(
                ToolName::CreateConnector,
                json!({"fromId": step_ref(*from), "toId": step_ref(*to)}),
            ),
        })
        .collect();
    ComplexCommandPlan::ready(steps)
}

pub fn matches(req: &PlanRequest<'_>) -> bool {
    mentions_template(req)
}

pub fn build(req: &PlanRequest<'_>) -> Option<ComplexCommandPlan> {
    let kind = TemplateKind::detect(req)?;
    Some(place_seeds(req, kind.seeds(req.command)))
}

static PROS_CONS_TOPIC_RE: OnceLock<Regex> = OnceLock::new();

pub fn matches_pros_cons(req: &PlanRequest<'_>) -> bool {
    req.contains("pros and cons")
        || req.contains("pros & cons")
        || req.contains("pros/cons")
        || req.contains("pro and con")
        || (req.has_word("pros") && req.has_word("cons"))
}

fn pros_cons_topic(command: &str) -> Option<String> {
    let re = PROS_CONS_TOPIC_RE.get_or_init(|| {
        Regex::new(r"(?i)pros?\s*(?:and|&|/)\s*cons?\s+(?:list\s+)?(?:of|for|about|on)\s+(.+)$").unwrap()
    });
    re.captures(command).and_then(|c| clean_topic(c.get(1)?.as_str()))
}

/// Pros / Cons 两列框架，各 3 张占位便签（绿 / 粉）
pub fn pros_cons_seeds(topic: Option<&str>) -> Vec<Seed> {
    let title = |label: &str| match topic {
        Some(t) => format!("{label}: {t}"),
        None => label.to_string(),
    };
    let mut seeds = Vec::new();
    for (col, (label, item, color)) in [("Pros", "Pro", "green"), ("Cons", "Con", "pink")].into_iter().enumerate() {
        let x = col as f64 * 280.0;
        seeds.push(frame(&title(label), x, 0.0, 240.0, 720.0));
        for i in 0..3 {
            seeds.push(Seed::Sticky {
                text: format!("{item} {}", i + 1),
                x: x + 20.0,
                y: 60.0 + i as f64 * 220.0,
                color: color_hex(color),
            });
        }
    }
    seeds
}

pub fn build_pros_cons(req: &PlanRequest<'_>) -> Option<ComplexCommandPlan> {
    let topic = pros_cons_topic(req.command);
    Some(place_seeds(req, pros_cons_seeds(topic.as_deref())))
}
