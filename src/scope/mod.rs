//! 范围状态构建器
//!
//! 整块白板可能远超下游（模型上下文 / 规划器）能接收的规模，这里把全部对象压缩为
//! 最多 50 个最相关的候选：
//! 1. 硬过滤（type / color / textContains），过滤后为空就返回空，绝不悄悄回退到全量
//! 2. 打分：选中 +2000，视口内 +700（视口外按距离扣分），软过滤字段命中 +250~300，
//!    指令词重叠（文本 +40，类型/颜色 +20）
//! 3. 分数降序，同分按原始顺序（find-objects 变体按 id 再按原始顺序）
//! 4. 截断到请求数量（上限 50）

use serde::{Deserialize, Serialize};

use crate::board::color::color_name_for;
use crate::board::BoardObject;
use crate::layout::Rect;

/// 范围状态最多返回的对象数
pub const MAX_SCOPED_OBJECTS: usize = 50;

const SELECTED_BONUS: f64 = 2000.0;
const VIEWPORT_BONUS: f64 = 700.0;
const MAX_VIEWPORT_PENALTY: f64 = 600.0;
const TYPE_FIELD_BONUS: f64 = 300.0;
const COLOR_FIELD_BONUS: f64 = 250.0;
const TEXT_FIELD_BONUS: f64 = 300.0;
const TEXT_TOKEN_BONUS: f64 = 40.0;
const ATTR_TOKEN_BONUS: f64 = 20.0;

/// 构建范围状态时的上下文（全部可选）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardStateContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_contains: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selected_object_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Rect>,
    /// 请求的返回数量（不超过 50）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
}

impl BoardStateContext {
    pub fn for_command(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, object_type: impl Into<String>) -> Self {
        self.object_type = Some(object_type.into());
        self
    }

    fn has_hard_filters(&self) -> bool {
        self.object_type.is_some() || self.color.is_some() || self.text_contains.is_some()
    }
}

/// 压缩后的白板状态
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedBoardState {
    pub total_objects: usize,
    pub returned_count: usize,
    pub objects: Vec<BoardObject>,
}

impl ScopedBoardState {
    pub fn get(&self, id: &str) -> Option<&BoardObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn stickies(&self) -> impl Iterator<Item = &BoardObject> {
        self.objects.iter().filter(|o| o.is_sticky())
    }

    /// 给工具输出用的一句话摘要
    pub fn summary(&self) -> String {
        format!(
            "Board has {} objects ({} returned)",
            self.total_objects, self.returned_count
        )
    }
}

/// find-objects 查询：上下文 + 返回数量
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindObjectsQuery {
    #[serde(flatten)]
    pub context: BoardStateContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindObjectsResponse {
    #[serde(flatten)]
    pub state: ScopedBoardState,
    pub object_ids: Vec<String>,
}

#[derive(Clone, Copy, PartialEq)]
enum TieBreak {
    Index,
    IdThenIndex,
}

/// 按上下文构建范围状态（同分按原始顺序）
pub fn build_scoped_board_state(
    objects: &[BoardObject],
    context: Option<&BoardStateContext>,
) -> ScopedBoardState {
    let default_ctx = BoardStateContext::default();
    let ctx = context.unwrap_or(&default_ctx);
    rank(objects, ctx, ctx.max_results, TieBreak::Index)
}

/// find-objects 变体：同分按 id 再按原始顺序，结果完全确定
pub fn find_objects(objects: &[BoardObject], query: &FindObjectsQuery) -> FindObjectsResponse {
    let limit = query.limit.or(query.context.max_results);
    let state = rank(objects, &query.context, limit, TieBreak::IdThenIndex);
    let object_ids = state.objects.iter().map(|o| o.id.clone()).collect();
    FindObjectsResponse { state, object_ids }
}

fn rank(
    objects: &[BoardObject],
    ctx: &BoardStateContext,
    limit: Option<usize>,
    tie_break: TieBreak,
) -> ScopedBoardState {
    let limit = limit.unwrap_or(MAX_SCOPED_OBJECTS).min(MAX_SCOPED_OBJECTS);
    let candidates: Vec<(usize, &BoardObject)> = objects
        .iter()
        .enumerate()
        .filter(|(_, o)| passes_hard_filters(o, ctx))
        .collect();

    if ctx.has_hard_filters() && candidates.is_empty() {
        return ScopedBoardState {
            total_objects: objects.len(),
            returned_count: 0,
            objects: Vec::new(),
        };
    }

    let tokens = command_tokens(ctx.command.as_deref().unwrap_or(""));
    let mut scored: Vec<(f64, usize, &BoardObject)> = candidates
        .into_iter()
        .map(|(i, o)| (score(o, ctx, &tokens), i, o))
        .collect();

    scored.sort_by(|a, b| {
        let by_score = b.0.total_cmp(&a.0);
        match tie_break {
            TieBreak::Index => by_score.then(a.1.cmp(&b.1)),
            TieBreak::IdThenIndex => by_score.then_with(|| a.2.id.cmp(&b.2.id)).then(a.1.cmp(&b.1)),
        }
    });
    scored.truncate(limit);

    let objects_out: Vec<BoardObject> = scored.into_iter().map(|(_, _, o)| o.clone()).collect();
    ScopedBoardState {
        total_objects: objects.len(),
        returned_count: objects_out.len(),
        objects: objects_out,
    }
}

fn type_matches(obj: &BoardObject, wanted: &str) -> bool {
    obj.object_type.as_str().eq_ignore_ascii_case(wanted.trim())
}

fn color_matches(obj: &BoardObject, wanted: &str) -> bool {
    obj.resolved_color()
        .is_some_and(|c| c.trim().eq_ignore_ascii_case(wanted.trim()))
}

fn text_matches(obj: &BoardObject, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    obj.text().is_some_and(|t| t.to_lowercase().contains(&needle))
}

fn passes_hard_filters(obj: &BoardObject, ctx: &BoardStateContext) -> bool {
    ctx.object_type.as_deref().map_or(true, |t| type_matches(obj, t))
        && ctx.color.as_deref().map_or(true, |c| color_matches(obj, c))
        && ctx.text_contains.as_deref().map_or(true, |t| text_matches(obj, t))
}

fn score(obj: &BoardObject, ctx: &BoardStateContext, tokens: &[String]) -> f64 {
    let mut score = 0.0;

    if ctx.selected_object_ids.iter().any(|id| *id == obj.id) {
        score += SELECTED_BONUS;
    }

    if let Some(viewport) = &ctx.viewport {
        let bounds = obj.bounds();
        if bounds.intersects(viewport) {
            score += VIEWPORT_BONUS;
        } else {
            let (cx, cy) = bounds.center();
            score -= (viewport.distance_to_point(cx, cy) / 10.0).min(MAX_VIEWPORT_PENALTY);
        }
    }

    if ctx.object_type.as_deref().is_some_and(|t| type_matches(obj, t)) {
        score += TYPE_FIELD_BONUS;
    }
    if ctx.color.as_deref().is_some_and(|c| color_matches(obj, c)) {
        score += COLOR_FIELD_BONUS;
    }
    if ctx.text_contains.as_deref().is_some_and(|t| text_matches(obj, t)) {
        score += TEXT_FIELD_BONUS;
    }

    if !tokens.is_empty() {
        let text = obj.text().unwrap_or("").to_lowercase();
        let type_words: Vec<&str> = obj.object_type.as_str().split('_').collect();
        let color = obj.resolved_color().map(|c| c.to_lowercase());
        let color_name = color.as_deref().and_then(color_name_for);
        for token in tokens {
            if !text.is_empty() && text.contains(token.as_str()) {
                score += TEXT_TOKEN_BONUS;
            }
            let type_hit = type_words.iter().any(|w| word_matches(token, w));
            let color_hit = color.as_deref() == Some(token.as_str()) || color_name == Some(token.as_str());
            if type_hit || color_hit {
                score += ATTR_TOKEN_BONUS;
            }
        }
    }

    score
}

/// token 与单词相同，或去掉复数 s 后相同
fn word_matches(token: &str, word: &str) -> bool {
    token == word || token.strip_suffix('s') == Some(word)
}

/// 指令分词：按非字母数字切分，小写，长度 ≥ 3，去重保序
pub fn command_tokens(command: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for raw in command.split(|c: char| !c.is_alphanumeric()) {
        let token = raw.to_lowercase();
        if token.chars().count() >= 3 && !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::ObjectType;

    fn sticky(id: &str, x: f64, y: f64, text: &str, color: &str) -> BoardObject {
        BoardObject::new(id, ObjectType::StickyNote, x, y, 200.0, 200.0)
            .with_property("text", text)
            .with_property("color", color)
    }

    fn many(n: usize) -> Vec<BoardObject> {
        (0..n)
            .map(|i| sticky(&format!("n{i:03}"), i as f64 * 10.0, 0.0, "note", "#ffeb3b"))
            .collect()
    }

    #[test]
    fn test_scoped_state_is_bounded() {
        for n in [0, 1, 49, 50, 51, 300] {
            let state = build_scoped_board_state(&many(n), None);
            assert!(state.objects.len() <= MAX_SCOPED_OBJECTS);
            assert_eq!(state.returned_count, state.objects.len());
            assert_eq!(state.total_objects, n);
        }
        let ctx = BoardStateContext {
            max_results: Some(500),
            ..Default::default()
        };
        assert_eq!(build_scoped_board_state(&many(80), Some(&ctx)).returned_count, 50);
    }

    #[test]
    fn test_hard_filter_never_falls_back() {
        let objects = many(5);
        let ctx = BoardStateContext::default().with_type("frame");
        let state = build_scoped_board_state(&objects, Some(&ctx));
        assert_eq!(state.returned_count, 0);
        assert_eq!(state.total_objects, 5);
    }

    #[test]
    fn test_hard_filters_by_color_and_text() {
        let objects = vec![
            sticky("a", 0.0, 0.0, "Buy milk", "#F8BBD0"),
            sticky("b", 0.0, 0.0, "Buy eggs", "#90caf9"),
            sticky("c", 0.0, 0.0, "Call mom", "#f8bbd0"),
        ];
        let ctx = BoardStateContext {
            color: Some("#f8bbd0".into()),
            text_contains: Some("buy".into()),
            ..Default::default()
        };
        let state = build_scoped_board_state(&objects, Some(&ctx));
        let ids: Vec<_> = state.objects.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn test_selected_and_token_scoring() {
        let objects = vec![
            sticky("a", 0.0, 0.0, "groceries", "#ffeb3b"),
            sticky("b", 0.0, 0.0, "budget review", "#ffeb3b"),
            sticky("c", 0.0, 0.0, "misc", "#ffeb3b"),
        ];
        let ctx = BoardStateContext {
            command: Some("update the budget note".into()),
            selected_object_ids: vec!["c".into()],
            ..Default::default()
        };
        let state = build_scoped_board_state(&objects, Some(&ctx));
        let ids: Vec<_> = state.objects.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_viewport_prefers_visible_objects() {
        let objects = vec![
            sticky("far", 5000.0, 5000.0, "x", "#ffeb3b"),
            sticky("near", 600.0, 0.0, "x", "#ffeb3b"),
            sticky("inside", 100.0, 100.0, "x", "#ffeb3b"),
        ];
        let ctx = BoardStateContext {
            viewport: Some(Rect::new(0.0, 0.0, 500.0, 500.0)),
            ..Default::default()
        };
        let state = build_scoped_board_state(&objects, Some(&ctx));
        let ids: Vec<_> = state.objects.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["inside", "near", "far"]);
    }

    #[test]
    fn test_find_objects_ties_by_id() {
        let objects = vec![
            sticky("z", 0.0, 0.0, "x", "#ffeb3b"),
            sticky("a", 0.0, 0.0, "x", "#ffeb3b"),
            sticky("m", 0.0, 0.0, "x", "#ffeb3b"),
        ];
        let resp = find_objects(
            &objects,
            &FindObjectsQuery {
                limit: Some(2),
                ..Default::default()
            },
        );
        assert_eq!(resp.object_ids, vec!["a".to_string(), "m".to_string()]);
        assert_eq!(resp.state.returned_count, 2);

        let scoped = build_scoped_board_state(&objects, None);
        assert_eq!(scoped.objects[0].id, "z");
    }

    #[test]
    fn test_command_tokens() {
        assert_eq!(
            command_tokens("Move ALL pink-ish notes, to it"),
            vec!["move", "all", "pink", "ish", "notes"]
        );
    }
}
