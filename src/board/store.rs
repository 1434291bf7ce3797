//! 在线文档存储
//!
//! 按 board_id 保存正在与客户端同步的文档，生命周期：
//! - get_or_create：客户端接入时加载（或新建）文档，连接数 +1
//! - detach：客户端断开，连接数 -1
//! - idle_boards / evict_if_idle：无连接且空闲超时的文档被移出，由调用方负责落盘
//!
//! 存储以显式对象注入到变更桥，而不是全局状态。

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::board::BoardDocument;
use crate::core::HiveError;

/// 在线文档句柄：同步服务与变更桥共享，一次写锁 = 一次原子文档操作
pub type SharedDocument = Arc<RwLock<BoardDocument>>;

struct LiveEntry {
    document: SharedDocument,
    connections: usize,
    last_active: Instant,
}

impl LiveEntry {
    fn is_idle(&self, timeout: Duration) -> bool {
        self.connections == 0 && self.last_active.elapsed() >= timeout
    }
}

#[derive(Default)]
pub struct LiveDocumentStore {
    entries: RwLock<HashMap<String, LiveEntry>>,
}

impl LiveDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 白板有在线文档时返回它（并刷新活跃时间），否则 None
    pub async fn get_active(&self, board_id: &str) -> Option<SharedDocument> {
        let mut entries = self.entries.write().await;
        entries.get_mut(board_id).map(|entry| {
            entry.last_active = Instant::now();
            Arc::clone(&entry.document)
        })
    }

    /// 客户端接入：已有在线文档则复用，否则调用 load 加载；连接数 +1
    pub async fn get_or_create<F, Fut>(&self, board_id: &str, load: F) -> Result<SharedDocument, HiveError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<BoardDocument, HiveError>>,
    {
        // 持写锁加载，避免同一白板被并发加载两次
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(board_id) {
            entry.connections += 1;
            entry.last_active = Instant::now();
            return Ok(Arc::clone(&entry.document));
        }

        let document = Arc::new(RwLock::new(load().await?));
        entries.insert(
            board_id.to_string(),
            LiveEntry {
                document: Arc::clone(&document),
                connections: 1,
                last_active: Instant::now(),
            },
        );
        tracing::info!(board_id, "live document attached");
        Ok(document)
    }

    /// 客户端断开
    pub async fn detach(&self, board_id: &str) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(board_id) {
            entry.connections = entry.connections.saturating_sub(1);
            entry.last_active = Instant::now();
        }
    }

    /// 无连接且空闲超过 timeout 的白板
    pub async fn idle_boards(&self, timeout: Duration) -> Vec<String> {
        let entries = self.entries.read().await;
        let mut ids: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.is_idle(timeout))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// 若白板仍然空闲则移出并返回文档，由调用方负责落盘
    pub async fn evict_if_idle(&self, board_id: &str, timeout: Duration) -> Option<SharedDocument> {
        let mut entries = self.entries.write().await;
        if !entries.get(board_id)?.is_idle(timeout) {
            return None;
        }
        tracing::info!(board_id, "live document evicted");
        entries.remove(board_id).map(|e| e.document)
    }

    /// 取出全部在线文档（关闭时落盘用）
    pub async fn drain(&self) -> Vec<(String, SharedDocument)> {
        let mut entries = self.entries.write().await;
        entries.drain().map(|(id, e)| (id, e.document)).collect()
    }

    pub async fn active_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_or_create_loads_once() {
        let store = LiveDocumentStore::new();
        let a = store
            .get_or_create("b1", || async { Ok(BoardDocument::new("b1")) })
            .await
            .unwrap();
        let b = store
            .get_or_create("b1", || async { Err(HiveError::Persistence("should not load".into())) })
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(store.get_active("b1").await.is_some());
        assert!(store.get_active("other").await.is_none());
    }

    #[tokio::test]
    async fn test_evict_only_detached_idle_documents() {
        let store = LiveDocumentStore::new();
        store
            .get_or_create("busy", || async { Ok(BoardDocument::new("busy")) })
            .await
            .unwrap();
        store
            .get_or_create("idle", || async { Ok(BoardDocument::new("idle")) })
            .await
            .unwrap();
        store.detach("idle").await;

        assert_eq!(store.idle_boards(Duration::ZERO).await, vec!["idle".to_string()]);
        assert!(store.evict_if_idle("busy", Duration::ZERO).await.is_none());
        assert!(store.evict_if_idle("idle", Duration::ZERO).await.is_some());
        assert_eq!(store.active_count().await, 1);
        assert!(store.get_active("idle").await.is_none());
    }

    #[tokio::test]
    async fn test_load_failure_leaves_no_entry() {
        let store = LiveDocumentStore::new();
        let result = store
            .get_or_create("b1", || async { Err(HiveError::Persistence("boom".into())) })
            .await;
        assert!(result.is_err());
        assert_eq!(store.active_count().await, 0);
    }
}
