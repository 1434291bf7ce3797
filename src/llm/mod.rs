//! 模型层：工具调用模型抽象与脚本化实现

pub mod mock;
pub mod traits;

pub use mock::{RecordedTurn, ScriptedModel};
pub use traits::{ModelTurn, ToolCallModel};
