//! 工具 JSON Schema 生成（schemars 自动生成）
//!
//! 供外部模型调用方使用：每个工具一条 function 定义，参数 schema 直接来自
//! 目录中的参数结构体，与校验器同源。

use schemars::{schema_for, JsonSchema};
use serde_json::{json, Value};

use crate::tools::catalog::{
    ChangeColorArgs, CreateConnectorArgs, CreateFrameArgs, CreateShapeArgs, CreateStickyNoteArgs,
    GetBoardStateArgs, MoveObjectArgs, ResizeObjectArgs, ToolName, UpdateTextArgs,
};

fn parameters<T: JsonSchema>() -> Value {
    let mut schema = serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| json!({}));
    if let Value::Object(map) = &mut schema {
        map.remove("$schema");
        map.remove("title");
    }
    schema
}

fn parameters_for(tool: ToolName) -> Value {
    match tool {
        ToolName::CreateStickyNote => parameters::<CreateStickyNoteArgs>(),
        ToolName::CreateShape => parameters::<CreateShapeArgs>(),
        ToolName::CreateFrame => parameters::<CreateFrameArgs>(),
        ToolName::CreateConnector => parameters::<CreateConnectorArgs>(),
        ToolName::MoveObject => parameters::<MoveObjectArgs>(),
        ToolName::ResizeObject => parameters::<ResizeObjectArgs>(),
        ToolName::UpdateText => parameters::<UpdateTextArgs>(),
        ToolName::ChangeColor => parameters::<ChangeColorArgs>(),
        ToolName::GetBoardState => parameters::<GetBoardStateArgs>(),
    }
}

/// 全部工具的 function 定义（OpenAI 风格 tools 数组）
pub fn tool_definitions() -> Vec<Value> {
    ToolName::ALL
        .into_iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.as_str(),
                    "description": tool.description(),
                    "parameters": parameters_for(tool),
                }
            })
        })
        .collect()
}

/// 工具定义的 JSON 字符串，可拼入 system prompt
pub fn tool_definitions_json() -> String {
    serde_json::to_string_pretty(&tool_definitions()).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_tool_has_definition() {
        let defs = tool_definitions();
        assert_eq!(defs.len(), ToolName::ALL.len());
        let sticky = &defs[0]["function"];
        assert_eq!(sticky["name"], "createStickyNote");
        let required = sticky["parameters"]["required"].as_array().unwrap();
        assert!(required.iter().any(|r| r == "color"));
        assert!(sticky["parameters"].get("$schema").is_none());
    }

    #[test]
    fn test_camel_case_parameter_names() {
        let defs = tool_definitions();
        let connector = defs
            .iter()
            .find(|d| d["function"]["name"] == "createConnector")
            .unwrap();
        let props = &connector["function"]["parameters"]["properties"];
        assert!(props.get("fromId").is_some());
        assert!(props.get("toId").is_some());
    }
}
