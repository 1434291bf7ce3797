//! 白板对象模型
//!
//! BoardObject 的 properties 随类型变化：便签 text/color，形状 fillColor/strokeColor，
//! 连接线 fromId/toId（按 id 引用，渲染或校验时再查找），直线 x2/y2（绝对端点），框架 title。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::layout::{LayoutItem, Rect};

/// 对象类型（序列化为 snake_case，如 sticky_note）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    StickyNote,
    Rectangle,
    Circle,
    Line,
    FreehandStroke,
    Connector,
    Frame,
    Text,
}

impl ObjectType {
    pub const ALL: [ObjectType; 8] = [
        ObjectType::StickyNote,
        ObjectType::Rectangle,
        ObjectType::Circle,
        ObjectType::Line,
        ObjectType::FreehandStroke,
        ObjectType::Connector,
        ObjectType::Frame,
        ObjectType::Text,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::StickyNote => "sticky_note",
            ObjectType::Rectangle => "rectangle",
            ObjectType::Circle => "circle",
            ObjectType::Line => "line",
            ObjectType::FreehandStroke => "freehand_stroke",
            ObjectType::Connector => "connector",
            ObjectType::Frame => "frame",
            ObjectType::Text => "text",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// updateText 修改的属性键：框架改 title，其它改 text
    pub fn text_key(&self) -> &'static str {
        match self {
            ObjectType::Frame => "title",
            _ => "text",
        }
    }

    /// changeColor 修改的属性键：便签改 color，其它改 fillColor
    pub fn color_key(&self) -> &'static str {
        match self {
            ObjectType::StickyNote => "color",
            _ => "fillColor",
        }
    }
}

/// 白板上的一个对象；创建时分配新 id，之后原地修改（不做版本化）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardObject {
    pub id: String,
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub z_index: i64,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub created_by: String,
    /// 毫秒时间戳
    #[serde(default)]
    pub updated_at: i64,
}

impl BoardObject {
    pub fn new(id: impl Into<String>, object_type: ObjectType, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            object_type,
            x,
            y,
            width,
            height,
            rotation: 0.0,
            z_index: 0,
            properties: Map::new(),
            created_by: String::new(),
            updated_at: 0,
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }

    /// 可读文本：text 优先，其次 title（框架）
    pub fn text(&self) -> Option<&str> {
        self.property_str("text").or_else(|| self.property_str("title"))
    }

    /// 解析后的颜色：依次检查 color → fillColor → strokeColor
    pub fn resolved_color(&self) -> Option<&str> {
        ["color", "fillColor", "strokeColor"]
            .into_iter()
            .find_map(|k| self.property_str(k).filter(|c| !c.is_empty()))
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn layout_item(&self) -> LayoutItem {
        LayoutItem::new(self.id.clone(), self.x, self.y, self.width, self.height)
    }

    pub fn is_sticky(&self) -> bool {
        self.object_type == ObjectType::StickyNote
    }
}

/// 按阅读顺序排序（先 y 后 x；稳定排序保证相同坐标时保持原顺序）
pub fn sort_reading_order(objects: &mut [&BoardObject]) {
    objects.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_is_camel_case() {
        let obj = BoardObject::new("n1", ObjectType::StickyNote, 1.0, 2.0, 200.0, 200.0)
            .with_property("text", "hi");
        let json = serde_json::to_value(&obj).unwrap();
        assert_eq!(json["type"], "sticky_note");
        assert_eq!(json["zIndex"], 0);
        assert_eq!(json["properties"]["text"], "hi");
        let back: BoardObject = serde_json::from_value(json).unwrap();
        assert_eq!(back, obj);
    }

    #[test]
    fn test_resolved_color_order() {
        let shape = BoardObject::new("s", ObjectType::Rectangle, 0.0, 0.0, 1.0, 1.0)
            .with_property("strokeColor", "#000000")
            .with_property("fillColor", "#ff0000");
        assert_eq!(shape.resolved_color(), Some("#ff0000"));
        let line = BoardObject::new("l", ObjectType::Line, 0.0, 0.0, 1.0, 1.0)
            .with_property("strokeColor", "#000000");
        assert_eq!(line.resolved_color(), Some("#000000"));
    }

    #[test]
    fn test_property_keys_by_type() {
        assert_eq!(ObjectType::Frame.text_key(), "title");
        assert_eq!(ObjectType::StickyNote.text_key(), "text");
        assert_eq!(ObjectType::StickyNote.color_key(), "color");
        assert_eq!(ObjectType::Circle.color_key(), "fillColor");
        assert_eq!(ObjectType::parse("freehand_stroke"), Some(ObjectType::FreehandStroke));
        assert_eq!(ObjectType::parse("hexagon"), None);
    }
}
