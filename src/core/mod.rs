//! 核心编排层：错误分类、重试策略、指令编排、优雅关闭

pub mod error;
pub mod orchestrator;
pub mod retry;
pub mod shutdown;

pub use error::{ErrorKind, HiveError};
pub use orchestrator::{CommandOrchestrator, CommandOutcome, CommandSource};
pub use retry::RetryPolicy;
pub use shutdown::{run_cleanup, LiveDocumentFlush, ShutdownCleanup, ShutdownManager, ShutdownReason};
