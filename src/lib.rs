//! Hive - 多人白板 AI 指令编排引擎
//!
//! 模块划分：
//! - **layout**: 纯几何布局算法（网格、等距、无重叠原点搜索）
//! - **board**: 白板对象模型、共享文档、在线文档存储与快照持久化
//! - **scope**: 范围状态构建（把整块白板压缩为最多 50 个相关对象）
//! - **tools**: 工具目录、参数校验、JSON Schema 与顺序执行器
//! - **bridge**: 变更桥（在线 / 快照双路径）、客户端 trait 与 HTTP 接口
//! - **planner**: 确定性规划器与计划校验
//! - **llm**: 工具调用模型抽象
//! - **core**: 错误、重试、指令编排、优雅关闭
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **observability**: 日志初始化与追踪上报

pub mod board;
pub mod bridge;
pub mod config;
pub mod core;
pub mod layout;
pub mod llm;
pub mod observability;
pub mod planner;
pub mod scope;
pub mod tools;

pub use crate::core::{CommandOrchestrator, CommandOutcome, HiveError};
pub use crate::planner::Planner;
