//! 工具目录与参数校验
//!
//! 所有白板操作是一个封闭枚举 BoardTool，参数结构体同时用于 schema 生成（schemars）、
//! 序列化给变更桥以及校验后的强类型载体。新增工具时，校验与变更应用两处的 match
//! 都会在编译期提醒补全。
//!
//! 校验严格发生在任何变更调用之前：参数不合法时不会有任何网络往返。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::HiveError;

/// createStickyNote 的 text 为空时使用的占位文本
pub const DEFAULT_STICKY_TEXT: &str = "New note";

/// 工具名（线上名称为 camelCase）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    CreateStickyNote,
    CreateShape,
    CreateFrame,
    CreateConnector,
    MoveObject,
    ResizeObject,
    UpdateText,
    ChangeColor,
    GetBoardState,
}

impl ToolName {
    pub const ALL: [ToolName; 9] = [
        ToolName::CreateStickyNote,
        ToolName::CreateShape,
        ToolName::CreateFrame,
        ToolName::CreateConnector,
        ToolName::MoveObject,
        ToolName::ResizeObject,
        ToolName::UpdateText,
        ToolName::ChangeColor,
        ToolName::GetBoardState,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::CreateStickyNote => "createStickyNote",
            ToolName::CreateShape => "createShape",
            ToolName::CreateFrame => "createFrame",
            ToolName::CreateConnector => "createConnector",
            ToolName::MoveObject => "moveObject",
            ToolName::ResizeObject => "resizeObject",
            ToolName::UpdateText => "updateText",
            ToolName::ChangeColor => "changeColor",
            ToolName::GetBoardState => "getBoardState",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// 供模型理解的工具描述
    pub fn description(&self) -> &'static str {
        match self {
            ToolName::CreateStickyNote => "Create a sticky note at (x, y) with text and a background color.",
            ToolName::CreateShape => "Create a rectangle, circle or line. For lines, width/height are the offset of the end point.",
            ToolName::CreateFrame => "Create a titled frame that groups content; frames render behind other objects.",
            ToolName::CreateConnector => "Connect two existing objects by id.",
            ToolName::MoveObject => "Move an existing object so its top-left corner is at (x, y).",
            ToolName::ResizeObject => "Resize an existing object.",
            ToolName::UpdateText => "Replace the text of a sticky note or text object, or the title of a frame. Empty text clears it.",
            ToolName::ChangeColor => "Change the color of an object (sticky background or shape fill).",
            ToolName::GetBoardState => "Read the current board objects most relevant to the request.",
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Rectangle,
    Circle,
    Line,
}

impl ShapeKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "rectangle" => Some(ShapeKind::Rectangle),
            "circle" => Some(ShapeKind::Circle),
            "line" => Some(ShapeKind::Line),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateStickyNoteArgs {
    /// Note text; empty text becomes "New note"
    pub text: String,
    pub x: f64,
    pub y: f64,
    /// Hex color such as #ffeb3b
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateShapeArgs {
    #[serde(rename = "type")]
    pub shape: ShapeKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFrameArgs {
    pub title: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateConnectorArgs {
    pub from_id: String,
    pub to_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MoveObjectArgs {
    pub object_id: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResizeObjectArgs {
    pub object_id: String,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTextArgs {
    pub object_id: String,
    /// May be empty to clear the text
    pub new_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangeColorArgs {
    pub object_id: String,
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GetBoardStateArgs {}

/// 已校验的工具调用
#[derive(Debug, Clone, PartialEq)]
pub enum BoardTool {
    CreateStickyNote(CreateStickyNoteArgs),
    CreateShape(CreateShapeArgs),
    CreateFrame(CreateFrameArgs),
    CreateConnector(CreateConnectorArgs),
    MoveObject(MoveObjectArgs),
    ResizeObject(ResizeObjectArgs),
    UpdateText(UpdateTextArgs),
    ChangeColor(ChangeColorArgs),
    GetBoardState,
}

/// 发给变更桥的动作：{"tool": "...", "args": {...}}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationAction {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

impl MutationAction {
    pub fn new(tool: impl Into<String>, args: Value) -> Self {
        Self {
            tool: tool.into(),
            args,
        }
    }

    pub fn parse(&self) -> Result<BoardTool, HiveError> {
        BoardTool::parse(&self.tool, &self.args)
    }
}

/// 校验结果：{valid, error?}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 归一化参数：createStickyNote 缺失或空的 text 改为占位文本
pub fn normalize_args(tool: &str, args: &mut Value) {
    if tool != ToolName::CreateStickyNote.as_str() {
        return;
    }
    if let Value::Object(map) = args {
        let empty = match map.get("text") {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            _ => false,
        };
        if empty {
            map.insert("text".into(), Value::String(DEFAULT_STICKY_TEXT.into()));
        }
    }
}

/// 对外的校验入口（先归一化，再校验）
pub fn validate_tool_args(tool: &str, args: &Value) -> ValidationResult {
    match BoardTool::parse(tool, args) {
        Ok(_) => ValidationResult {
            valid: true,
            error: None,
        },
        Err(e) => ValidationResult {
            valid: false,
            error: Some(e.to_string()),
        },
    }
}

impl BoardTool {
    /// 归一化 + 校验，得到强类型工具；未知工具返回 UnknownTool，参数问题返回 Validation
    pub fn parse(tool: &str, args: &Value) -> Result<Self, HiveError> {
        let name = ToolName::parse(tool).ok_or_else(|| HiveError::UnknownTool(tool.to_string()))?;
        let mut args = args.clone();
        normalize_args(tool, &mut args);
        let empty = Map::new();
        let map = match &args {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => return Err(invalid(name, "arguments must be a JSON object")),
        };
        let f = Fields { name, map };

        let parsed = match name {
            ToolName::CreateStickyNote => BoardTool::CreateStickyNote(CreateStickyNoteArgs {
                text: f.string("text")?,
                x: f.number("x")?,
                y: f.number("y")?,
                color: f.non_empty("color")?,
            }),
            ToolName::CreateShape => {
                let kind = f.non_empty("type")?;
                let shape = ShapeKind::parse(&kind).ok_or_else(|| {
                    invalid(name, &format!("type must be rectangle, circle or line (got {kind})"))
                })?;
                BoardTool::CreateShape(CreateShapeArgs {
                    shape,
                    x: f.number("x")?,
                    y: f.number("y")?,
                    width: f.number("width")?,
                    height: f.number("height")?,
                    color: f.non_empty("color")?,
                })
            }
            ToolName::CreateFrame => BoardTool::CreateFrame(CreateFrameArgs {
                title: f.non_empty("title")?,
                x: f.number("x")?,
                y: f.number("y")?,
                width: f.number("width")?,
                height: f.number("height")?,
            }),
            ToolName::CreateConnector => {
                let from_id = f.non_empty("fromId")?;
                let to_id = f.non_empty("toId")?;
                if from_id == to_id {
                    return Err(invalid(name, "fromId and toId must be different objects"));
                }
                BoardTool::CreateConnector(CreateConnectorArgs { from_id, to_id })
            }
            ToolName::MoveObject => BoardTool::MoveObject(MoveObjectArgs {
                object_id: f.non_empty("objectId")?,
                x: f.number("x")?,
                y: f.number("y")?,
            }),
            ToolName::ResizeObject => BoardTool::ResizeObject(ResizeObjectArgs {
                object_id: f.non_empty("objectId")?,
                width: f.number("width")?,
                height: f.number("height")?,
            }),
            ToolName::UpdateText => BoardTool::UpdateText(UpdateTextArgs {
                object_id: f.non_empty("objectId")?,
                new_text: f.string("newText")?,
            }),
            ToolName::ChangeColor => BoardTool::ChangeColor(ChangeColorArgs {
                object_id: f.non_empty("objectId")?,
                color: f.non_empty("color")?,
            }),
            ToolName::GetBoardState => BoardTool::GetBoardState,
        };
        Ok(parsed)
    }

    pub fn name(&self) -> ToolName {
        match self {
            BoardTool::CreateStickyNote(_) => ToolName::CreateStickyNote,
            BoardTool::CreateShape(_) => ToolName::CreateShape,
            BoardTool::CreateFrame(_) => ToolName::CreateFrame,
            BoardTool::CreateConnector(_) => ToolName::CreateConnector,
            BoardTool::MoveObject(_) => ToolName::MoveObject,
            BoardTool::ResizeObject(_) => ToolName::ResizeObject,
            BoardTool::UpdateText(_) => ToolName::UpdateText,
            BoardTool::ChangeColor(_) => ToolName::ChangeColor,
            BoardTool::GetBoardState => ToolName::GetBoardState,
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, BoardTool::GetBoardState)
    }

    /// 归一化后的参数 JSON
    pub fn args_json(&self) -> Value {
        let value = match self {
            BoardTool::CreateStickyNote(a) => serde_json::to_value(a),
            BoardTool::CreateShape(a) => serde_json::to_value(a),
            BoardTool::CreateFrame(a) => serde_json::to_value(a),
            BoardTool::CreateConnector(a) => serde_json::to_value(a),
            BoardTool::MoveObject(a) => serde_json::to_value(a),
            BoardTool::ResizeObject(a) => serde_json::to_value(a),
            BoardTool::UpdateText(a) => serde_json::to_value(a),
            BoardTool::ChangeColor(a) => serde_json::to_value(a),
            BoardTool::GetBoardState => Ok(Value::Object(Map::new())),
        };
        value.unwrap_or_else(|_| Value::Object(Map::new()))
    }

    pub fn to_action(&self) -> MutationAction {
        MutationAction::new(self.name().as_str(), self.args_json())
    }
}

fn invalid(name: ToolName, msg: &str) -> HiveError {
    HiveError::Validation(format!("{name}: {msg}"))
}

/// 参数字段读取器（错误信息带工具名）
struct Fields<'a> {
    name: ToolName,
    map: &'a Map<String, Value>,
}

impl Fields<'_> {
    fn number(&self, key: &str) -> Result<f64, HiveError> {
        match self.map.get(key) {
            None | Some(Value::Null) => Err(invalid(self.name, &format!("{key} is required"))),
            Some(v) => v
                .as_f64()
                .filter(|n| n.is_finite())
                .ok_or_else(|| invalid(self.name, &format!("{key} must be a number"))),
        }
    }

    /// 必填字符串，允许为空
    fn string(&self, key: &str) -> Result<String, HiveError> {
        match self.map.get(key) {
            None | Some(Value::Null) => Err(invalid(self.name, &format!("{key} is required"))),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(invalid(self.name, &format!("{key} must be a string"))),
        }
    }

    fn non_empty(&self, key: &str) -> Result<String, HiveError> {
        let s = self.string(key)?;
        if s.trim().is_empty() {
            return Err(invalid(self.name, &format!("{key} must be a non-empty string")));
        }
        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_sticky_text_is_normalized() {
        let tool = BoardTool::parse(
            "createStickyNote",
            &json!({"text": "", "x": 10, "y": 10, "color": "#ffeb3b"}),
        )
        .unwrap();
        match tool {
            BoardTool::CreateStickyNote(args) => assert_eq!(args.text, "New note"),
            other => panic!("unexpected {other:?}"),
        }
        let missing = validate_tool_args("createStickyNote", &json!({"x": 1, "y": 2, "color": "#fff"}));
        assert!(missing.valid);
    }

    #[test]
    fn test_missing_and_non_numeric_fields() {
        let r = validate_tool_args("moveObject", &json!({"objectId": "a", "x": 1}));
        assert!(!r.valid);
        assert_eq!(r.error.as_deref(), Some("moveObject: y is required"));

        let r = validate_tool_args("resizeObject", &json!({"objectId": "a", "width": "wide", "height": 3}));
        assert_eq!(r.error.as_deref(), Some("resizeObject: width must be a number"));

        let r = validate_tool_args("changeColor", &json!({"objectId": "  ", "color": "red"}));
        assert!(!r.valid);
    }

    #[test]
    fn test_connector_rejects_self_loop() {
        let err = BoardTool::parse("createConnector", &json!({"fromId": "a", "toId": "a"})).unwrap_err();
        assert!(matches!(err, HiveError::Validation(_)));
        assert!(BoardTool::parse("createConnector", &json!({"fromId": "a", "toId": "b"})).is_ok());
    }

    #[test]
    fn test_update_text_accepts_empty_string() {
        let tool = BoardTool::parse("updateText", &json!({"objectId": "a", "newText": ""})).unwrap();
        assert_eq!(
            tool,
            BoardTool::UpdateText(UpdateTextArgs {
                object_id: "a".into(),
                new_text: String::new()
            })
        );
    }

    #[test]
    fn test_unknown_tool_and_shape_kind() {
        assert_eq!(
            BoardTool::parse("deleteEverything", &json!({})),
            Err(HiveError::UnknownTool("deleteEverything".into()))
        );
        let r = validate_tool_args(
            "createShape",
            &json!({"type": "hexagon", "x": 0, "y": 0, "width": 1, "height": 1, "color": "#000"}),
        );
        assert!(!r.valid);
        assert!(BoardTool::parse("getBoardState", &Value::Null).is_ok());
    }

    #[test]
    fn test_action_carries_normalized_args() {
        let tool = BoardTool::parse(
            "createShape",
            &json!({"type": "line", "x": 0, "y": 0, "width": 120, "height": 0, "color": "#000000"}),
        )
        .unwrap();
        let action = tool.to_action();
        assert_eq!(action.tool, "createShape");
        assert_eq!(action.args["type"], "line");
        assert_eq!(action.parse().unwrap(), tool);
    }
}
