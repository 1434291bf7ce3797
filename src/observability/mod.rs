//! 可观测性：日志初始化与外部追踪上报
//!
//! 追踪上报走 TraceSink，由 TraceEmitter 包一层固定超时：sink 变慢或不可用时放弃这次上报，
//! 只打一条 warn，指令执行路径不会被卡住。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::core::HiveError;

/// 初始化日志：RUST_LOG 优先，默认 info
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}

/// 一条追踪事件
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEvent {
    pub name: String,
    pub board_id: String,
    pub attributes: Value,
    /// RFC 3339
    pub timestamp: String,
}

impl TraceEvent {
    pub fn new(name: impl Into<String>, board_id: impl Into<String>, attributes: Value) -> Self {
        Self {
            name: name.into(),
            board_id: board_id.into(),
            attributes,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[async_trait]
pub trait TraceSink: Send + Sync {
    async fn emit(&self, event: &TraceEvent) -> Result<(), HiveError>;
}

/// 丢弃所有事件
#[derive(Debug, Default)]
pub struct NoopSink;

#[async_trait]
impl TraceSink for NoopSink {
    async fn emit(&self, _event: &TraceEvent) -> Result<(), HiveError> {
        Ok(())
    }
}

/// 把事件写成一行结构化日志
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl TraceSink for LogSink {
    async fn emit(&self, event: &TraceEvent) -> Result<(), HiveError> {
        let line = serde_json::to_string(event)?;
        tracing::info!(trace = %line, "trace");
        Ok(())
    }
}

/// 带超时的追踪上报
#[derive(Clone)]
pub struct TraceEmitter {
    sink: Arc<dyn TraceSink>,
    timeout: Duration,
}

impl TraceEmitter {
    pub fn new(sink: Arc<dyn TraceSink>, timeout: Duration) -> Self {
        Self { sink, timeout }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopSink), Duration::from_millis(1))
    }

    /// 上报事件；超时或失败返回 false
    pub async fn emit(&self, event: TraceEvent) -> bool {
        match tokio::time::timeout(self.timeout, self.sink.emit(&event)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!(event = %event.name, error = %e, "trace sink failed");
                false
            }
            Err(_) => {
                tracing::warn!(
                    event = %event.name,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "trace sink timed out"
                );
                false
            }
        }
    }
}

impl Default for TraceEmitter {
    fn default() -> Self {
        Self::disabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct SlowSink;

    #[async_trait]
    impl TraceSink for SlowSink {
        async fn emit(&self, _event: &TraceEvent) -> Result<(), HiveError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    struct BrokenSink;

    #[async_trait]
    impl TraceSink for BrokenSink {
        async fn emit(&self, _event: &TraceEvent) -> Result<(), HiveError> {
            Err(HiveError::Transport("collector down".into()))
        }
    }

    #[tokio::test]
    async fn test_slow_sink_is_abandoned() {
        let emitter = TraceEmitter::new(Arc::new(SlowSink), Duration::from_millis(20));
        let start = std::time::Instant::now();
        assert!(!emitter.emit(TraceEvent::new("command", "b1", json!({}))).await);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_sink_results() {
        let ok = TraceEmitter::new(Arc::new(LogSink), Duration::from_millis(200));
        assert!(ok.emit(TraceEvent::new("command", "b1", json!({"steps": 2}))).await);
        let broken = TraceEmitter::new(Arc::new(BrokenSink), Duration::from_millis(200));
        assert!(!broken.emit(TraceEvent::new("command", "b1", json!({}))).await);
    }
}
