//! 引擎错误类型与错误分类
//!
//! 与执行器、变更桥配合：每个错误归入 ErrorKind（校验 / 未找到 / 未知工具 / 传输 / 持久化 ...），
//! 调用方据此决定是上报给用户、终止当前批次还是作为致命错误向上传播。

use thiserror::Error;

/// 编排引擎运行过程中可能出现的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HiveError {
    /// 参数缺失或类型不符，本地拒绝，不会触发任何变更
    #[error("{0}")]
    Validation(String),

    /// 引用的对象不存在（可恢复，只终止当前批次）
    #[error("Object {0} not found")]
    NotFound(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// 桥接不可达、HTTP 失败等
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON parse error: {0}")]
    Parse(String),

    /// 快照读写失败（重试耗尽后视为致命）
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Config error: {0}")]
    Config(String),

    /// 外部模型未配置或调用失败
    #[error("Model error: {0}")]
    Model(String),
}

/// 错误分类：决定错误在批次中的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    UnknownTool,
    Transport,
    Persistence,
    Internal,
}

impl HiveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HiveError::Validation(_) => ErrorKind::Validation,
            HiveError::NotFound(_) => ErrorKind::NotFound,
            HiveError::UnknownTool(_) => ErrorKind::UnknownTool,
            HiveError::Transport(_) | HiveError::Parse(_) => ErrorKind::Transport,
            HiveError::Persistence(_) => ErrorKind::Persistence,
            HiveError::Config(_) | HiveError::Model(_) => ErrorKind::Internal,
        }
    }

    /// 是否为可恢复错误：只终止当前批次，不影响进程
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Persistence | ErrorKind::Internal)
    }
}

impl From<rusqlite::Error> for HiveError {
    fn from(e: rusqlite::Error) -> Self {
        HiveError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for HiveError {
    fn from(e: serde_json::Error) -> Self {
        HiveError::Parse(e.to_string())
    }
}

impl From<reqwest::Error> for HiveError {
    fn from(e: reqwest::Error) -> Self {
        HiveError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HiveError>;
