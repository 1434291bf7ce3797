//! 优雅关闭
//!
//! Ctrl+C / SIGTERM 触发 CancellationToken：后台清扫任务和 HTTP 服务据此退出，
//! 随后依次执行清理任务（把所有在线文档写回快照），每个任务有独立超时。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::bridge::DocumentHost;
use crate::core::HiveError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C
    UserInitiated,
    /// SIGTERM
    Signal,
}

/// 关闭信号
#[derive(Clone, Default)]
pub struct ShutdownManager {
    token: CancellationToken,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn shutdown(&self, reason: ShutdownReason) {
        tracing::info!(?reason, "shutdown requested");
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn wait_for_shutdown(&self) {
        self.token.cancelled().await;
    }

    /// 安装系统信号处理器（Ctrl+C，unix 下还有 SIGTERM）
    pub fn install_signal_handlers(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
                manager.shutdown(ShutdownReason::UserInitiated);
            }
        });

        #[cfg(unix)]
        {
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                    sigterm.recv().await;
                    tracing::info!("Received SIGTERM, initiating graceful shutdown...");
                    manager.shutdown(ShutdownReason::Signal);
                }
            });
        }
    }
}

/// 关闭时执行的清理任务
#[async_trait]
pub trait ShutdownCleanup: Send + Sync {
    async fn cleanup(&self) -> Result<(), HiveError>;

    fn name(&self) -> &'static str;
}

/// 把所有在线文档写回快照存储
pub struct LiveDocumentFlush {
    host: Arc<DocumentHost>,
}

impl LiveDocumentFlush {
    pub fn new(host: Arc<DocumentHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl ShutdownCleanup for LiveDocumentFlush {
    async fn cleanup(&self) -> Result<(), HiveError> {
        let flushed = self.host.flush_all().await?;
        tracing::info!(flushed, "live documents flushed");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "LiveDocuments"
    }
}

/// 依次执行清理任务；单个任务失败或超时不影响后续任务，返回成功的数量
pub async fn run_cleanup(tasks: &[Arc<dyn ShutdownCleanup>], timeout: Duration) -> usize {
    tracing::info!("Running {} cleanup tasks...", tasks.len());
    let mut succeeded = 0;
    for task in tasks {
        let name = task.name();
        match tokio::time::timeout(timeout, task.cleanup()).await {
            Ok(Ok(())) => {
                succeeded += 1;
                tracing::info!("Cleanup task '{}' completed successfully", name);
            }
            Ok(Err(e)) => tracing::warn!("Cleanup task '{}' failed: {}", name, e),
            Err(_) => tracing::warn!("Cleanup task '{}' timed out after {:?}", name, timeout),
        }
    }
    succeeded
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::board::{LiveDocumentStore, MemorySnapshotStore, SnapshotStore};
    use crate::bridge::BridgeClient;
    use crate::core::RetryPolicy;
    use crate::tools::MutationAction;

    #[test]
    fn test_shutdown_manager_token() {
        let manager = ShutdownManager::new();
        let token = manager.token();
        assert!(!manager.is_shutdown());
        manager.shutdown(ShutdownReason::UserInitiated);
        assert!(token.is_cancelled());
    }

    struct Stuck;

    #[async_trait]
    impl ShutdownCleanup for Stuck {
        async fn cleanup(&self) -> Result<(), HiveError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }

        fn name(&self) -> &'static str {
            "Stuck"
        }
    }

    #[tokio::test]
    async fn test_cleanup_flushes_live_documents() {
        let snapshots = Arc::new(MemorySnapshotStore::new());
        let host = Arc::new(DocumentHost::new(
            Arc::new(LiveDocumentStore::new()),
            snapshots.clone(),
            RetryPolicy::new(1, Duration::from_millis(1)),
        ));
        host.attach_client("b1").await.unwrap();
        let action = MutationAction::new("createStickyNote", json!({"text": "keep", "x": 0, "y": 0, "color": "#ffeb3b"}));
        host.mutate("b1", "u1", &action).await.unwrap();
        assert!(snapshots.load("b1").await.unwrap().is_none());

        let tasks: Vec<Arc<dyn ShutdownCleanup>> = vec![Arc::new(Stuck), Arc::new(LiveDocumentFlush::new(host))];
        let ok = run_cleanup(&tasks, Duration::from_millis(50)).await;
        assert_eq!(ok, 1);
        let saved = snapshots.load("b1").await.unwrap().unwrap();
        assert_eq!(saved.objects.len(), 1);
    }
}
