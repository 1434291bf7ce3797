//! 布局引擎：纯几何算法，无 I/O
//!
//! - compute_grid_layout：按行优先排成网格
//! - compute_even_horizontal_spacing：水平等距分布
//! - find_non_overlapping_origin：在占用区域之外寻找可放置的原点

use serde::{Deserialize, Serialize};

/// 轴对齐矩形
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// 四周各扩展 padding
    pub fn padded(&self, padding: f64) -> Rect {
        Rect::new(
            self.x - padding,
            self.y - padding,
            self.width + padding * 2.0,
            self.height + padding * 2.0,
        )
    }

    /// 严格相交：仅边相接不算重叠
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// other 是否落在 self 内（允许 tolerance 的误差）
    pub fn contains(&self, other: &Rect, tolerance: f64) -> bool {
        other.x >= self.x - tolerance
            && other.y >= self.y - tolerance
            && other.right() <= self.right() + tolerance
            && other.bottom() <= self.bottom() + tolerance
    }

    /// 点到矩形的欧氏距离（点在矩形内为 0）
    pub fn distance_to_point(&self, px: f64, py: f64) -> f64 {
        let dx = (self.x - px).max(0.0).max(px - self.right());
        let dy = (self.y - py).max(0.0).max(py - self.bottom());
        (dx * dx + dy * dy).sqrt()
    }
}

/// 参与布局的元素：id + 当前几何
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutItem {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl LayoutItem {
    pub fn new(id: impl Into<String>, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            width,
            height,
        }
    }
}

/// 布局结果：元素 id 与目标位置
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct GridOptions {
    pub columns: usize,
    pub start_x: f64,
    pub start_y: f64,
    pub h_gap: f64,
    pub v_gap: f64,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            columns: 3,
            start_x: 100.0,
            start_y: 100.0,
            h_gap: 20.0,
            v_gap: 20.0,
        }
    }
}

/// 行优先网格：单元格尺寸 = 最大宽/高 + 间距，第 i 个元素位于 (i % columns, i / columns)
pub fn compute_grid_layout(items: &[LayoutItem], options: &GridOptions) -> Vec<Placement> {
    if items.is_empty() {
        return Vec::new();
    }
    let columns = options.columns.max(1);
    let max_w = items.iter().map(|i| i.width).fold(0.0_f64, f64::max);
    let max_h = items.iter().map(|i| i.height).fold(0.0_f64, f64::max);
    let cell_w = max_w + options.h_gap;
    let cell_h = max_h + options.v_gap;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| Placement {
            id: item.id.clone(),
            x: options.start_x + (i % columns) as f64 * cell_w,
            y: options.start_y + (i / columns) as f64 * cell_h,
        })
        .collect()
}

/// 水平等距：按 x 排序后，在最左与最右边界之间均分间隙；
/// 元素总宽超过跨度（间隙为负）时改用 fallback_gap 依次排开
pub fn compute_even_horizontal_spacing(items: &[LayoutItem], fallback_gap: f64) -> Vec<LayoutItem> {
    if items.len() < 2 {
        return items.to_vec();
    }
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x));

    let left = sorted[0].x;
    let right = sorted
        .iter()
        .map(|i| i.x + i.width)
        .fold(f64::NEG_INFINITY, f64::max);
    let total_width: f64 = sorted.iter().map(|i| i.width).sum();
    let mut gap = (right - left - total_width) / (sorted.len() - 1) as f64;
    if gap < 0.0 {
        gap = fallback_gap;
    }

    let mut cursor = left;
    for item in sorted.iter_mut() {
        item.x = cursor;
        cursor += item.width + gap;
    }
    sorted
}

#[derive(Debug, Clone, Copy)]
pub struct OriginSearch {
    pub start_x: f64,
    pub start_y: f64,
    pub step: f64,
    pub max_columns: usize,
    pub max_rows: usize,
    pub padding: f64,
}

impl Default for OriginSearch {
    fn default() -> Self {
        Self {
            start_x: 100.0,
            start_y: 100.0,
            step: 200.0,
            max_columns: 20,
            max_rows: 20,
            padding: 40.0,
        }
    }
}

/// 在 step 网格上行优先探测候选原点，返回第一个（加 padding 后）不与任何占用矩形相交的位置；
/// 探测范围内找不到时回退到 (start_x, start_y)
pub fn find_non_overlapping_origin(
    occupied: &[Rect],
    size: (f64, f64),
    search: &OriginSearch,
) -> (f64, f64) {
    let (width, height) = size;
    for row in 0..search.max_rows.max(1) {
        for col in 0..search.max_columns.max(1) {
            let x = search.start_x + col as f64 * search.step;
            let y = search.start_y + row as f64 * search.step;
            let candidate = Rect::new(x, y, width, height).padded(search.padding);
            if !occupied.iter().any(|r| candidate.intersects(r)) {
                return (x, y);
            }
        }
    }
    tracing::debug!(
        occupied = occupied.len(),
        "no free origin within probe bounds, using start position"
    );
    (search.start_x, search.start_y)
}
