//! 白板工具：目录与校验、JSON Schema、顺序执行器

pub mod catalog;
pub mod executor;
pub mod schema;

pub use catalog::{
    normalize_args, validate_tool_args, BoardTool, MutationAction, ShapeKind, ToolName, ValidationResult,
    DEFAULT_STICKY_TEXT,
};
pub use executor::{
    ActionRecord, ExecutionResult, ToolCallFunction, ToolCallInput, ToolExecutor, ToolOutput, STEP_REF_PREFIX,
};
pub use schema::{tool_definitions, tool_definitions_json};
