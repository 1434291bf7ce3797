//! 文档宿主：变更桥的两条路径
//!
//! - 在线路径：白板有在线文档时，直接在其写锁内执行一次事务，修改立即对所有在线客户端可见，
//!   落盘由同步服务的防抖保存负责
//! - 快照路径：没有在线文档时，加载最新快照到一次性文档（SnapshotSession），应用修改后
//!   **同步保存再返回**；同一白板的快照路径请求按白板串行
//!
//! 同时负责在线文档的接入/断开、空闲回收（回收前落盘）与关闭时的全量落盘。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::board::{BoardDocument, LiveDocumentStore, SharedDocument, SnapshotStore};
use crate::bridge::client::BridgeClient;
use crate::bridge::mutation::{apply_batch, BatchOutcome};
use crate::bridge::types::{MutateBatchResponse, MutateResponse};
use crate::core::{HiveError, RetryPolicy};
use crate::scope::{
    build_scoped_board_state, find_objects, BoardStateContext, FindObjectsQuery, FindObjectsResponse,
    ScopedBoardState,
};
use crate::tools::catalog::MutationAction;

/// 一次快照路径请求独占的文档：open → apply → commit，未提交的修改在 drop 时告警
pub struct SnapshotSession<'a> {
    store: &'a dyn SnapshotStore,
    document: BoardDocument,
    dirty: bool,
}

impl<'a> SnapshotSession<'a> {
    /// 加载最新快照；从未保存过的白板从空文档开始
    pub async fn open(store: &'a dyn SnapshotStore, board_id: &str) -> Result<Self, HiveError> {
        let document = match store.load(board_id).await? {
            Some(snapshot) => BoardDocument::from_snapshot(snapshot),
            None => BoardDocument::new(board_id),
        };
        Ok(Self {
            store,
            document,
            dirty: false,
        })
    }

    pub fn document(&self) -> &BoardDocument {
        &self.document
    }

    pub fn apply(&mut self, actions: &[MutationAction], user_id: &str) -> BatchOutcome {
        let outcome = apply_batch(&mut self.document, actions, user_id);
        self.dirty |= outcome.changed();
        outcome
    }

    /// 有修改时按重试策略保存；重试耗尽返回 Persistence 错误
    pub async fn commit(mut self, retry: &RetryPolicy) -> Result<(), HiveError> {
        if !self.dirty {
            return Ok(());
        }
        let snapshot = self.document.to_snapshot();
        let store = self.store;
        let snapshot_ref = &snapshot;
        retry
            .run("snapshot_save", move || store.save(snapshot_ref))
            .await?;
        self.dirty = false;
        Ok(())
    }
}

impl Drop for SnapshotSession<'_> {
    fn drop(&mut self) {
        if self.dirty {
            tracing::error!(
                board_id = %self.document.board_id(),
                "snapshot session dropped with unsaved changes"
            );
        }
    }
}

/// 文档宿主（进程内变更桥）
pub struct DocumentHost {
    live: Arc<LiveDocumentStore>,
    snapshots: Arc<dyn SnapshotStore>,
    retry: RetryPolicy,
    board_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl DocumentHost {
    pub fn new(live: Arc<LiveDocumentStore>, snapshots: Arc<dyn SnapshotStore>, retry: RetryPolicy) -> Self {
        Self {
            live,
            snapshots,
            retry,
            board_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn live_store(&self) -> &Arc<LiveDocumentStore> {
        &self.live
    }

    fn board_lock(&self, board_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .board_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(locks.entry(board_id.to_string()).or_default())
    }

    /// 归还白板锁：没有其他持有者或等待者时从表中移除
    fn release_board_lock(&self, board_id: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        drop(lock);
        let mut locks = self
            .board_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if locks.get(board_id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(board_id);
        }
    }

    /// 客户端接入：返回在线文档（首次接入时从快照加载）
    pub async fn attach_client(&self, board_id: &str) -> Result<SharedDocument, HiveError> {
        let lock = self.board_lock(board_id);
        let result = {
            let _guard = lock.lock().await;
            let snapshots = Arc::clone(&self.snapshots);
            let id = board_id.to_string();
            self.live
                .get_or_create(board_id, move || async move {
                    Ok(match snapshots.load(&id).await? {
                        Some(snapshot) => BoardDocument::from_snapshot(snapshot),
                        None => BoardDocument::new(id),
                    })
                })
                .await
        };
        self.release_board_lock(board_id, lock);
        result
    }

    pub async fn detach_client(&self, board_id: &str) {
        self.live.detach(board_id).await;
    }

    /// 应用一组动作：在线路径或快照路径
    pub async fn apply(
        &self,
        board_id: &str,
        user_id: &str,
        actions: &[MutationAction],
    ) -> Result<BatchOutcome, HiveError> {
        if let Some(doc) = self.live.get_active(board_id).await {
            let mut doc = doc.write().await;
            return Ok(apply_batch(&mut doc, actions, user_id));
        }

        let lock = self.board_lock(board_id);
        let result = {
            let _guard = lock.lock().await;
            self.apply_locked(board_id, user_id, actions).await
        };
        self.release_board_lock(board_id, lock);
        result
    }

    /// 持有白板锁时执行：等锁期间可能有客户端接入，因此再查一次在线文档
    async fn apply_locked(
        &self,
        board_id: &str,
        user_id: &str,
        actions: &[MutationAction],
    ) -> Result<BatchOutcome, HiveError> {
        if let Some(doc) = self.live.get_active(board_id).await {
            let mut doc = doc.write().await;
            return Ok(apply_batch(&mut doc, actions, user_id));
        }

        let mut session = SnapshotSession::open(self.snapshots.as_ref(), board_id).await?;
        let outcome = session.apply(actions, user_id);
        session.commit(&self.retry).await?;
        tracing::debug!(board_id, actions = actions.len(), "snapshot path applied");
        Ok(outcome)
    }

    async fn current_objects<R>(
        &self,
        board_id: &str,
        f: impl FnOnce(&[crate::board::BoardObject]) -> R,
    ) -> Result<R, HiveError> {
        if let Some(doc) = self.live.get_active(board_id).await {
            let doc = doc.read().await;
            return Ok(f(doc.objects()));
        }
        let snapshot = self.snapshots.load(board_id).await?;
        Ok(f(snapshot.as_ref().map(|s| s.objects.as_slice()).unwrap_or(&[])))
    }

    async fn persist(&self, board_id: &str, doc: &SharedDocument) -> Result<(), HiveError> {
        let snapshot = doc.read().await.to_snapshot();
        let store = self.snapshots.as_ref();
        let snapshot_ref = &snapshot;
        self.retry
            .run("snapshot_save", move || store.save(snapshot_ref))
            .await?;
        tracing::debug!(board_id, objects = snapshot.objects.len(), "live document saved");
        Ok(())
    }

    /// 回收空闲在线文档，回收前落盘；返回回收数量
    pub async fn sweep_idle(&self, idle_timeout: Duration) -> usize {
        let mut evicted = 0;
        for board_id in self.live.idle_boards(idle_timeout).await {
            let lock = self.board_lock(&board_id);
            {
                let _guard = lock.lock().await;
                if let Some(doc) = self.live.evict_if_idle(&board_id, idle_timeout).await {
                    if let Err(e) = self.persist(&board_id, &doc).await {
                        tracing::error!(board_id = %board_id, error = %e, "failed to save evicted document");
                    }
                    evicted += 1;
                }
            }
            self.release_board_lock(&board_id, lock);
        }
        evicted
    }

    /// 关闭时落盘全部在线文档
    pub async fn flush_all(&self) -> Result<usize, HiveError> {
        let docs = self.live.drain().await;
        let count = docs.len();
        let mut last_error = None;
        for (board_id, doc) in docs {
            if let Err(e) = self.persist(&board_id, &doc).await {
                tracing::error!(board_id = %board_id, error = %e, "failed to flush document");
                last_error = Some(e);
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(count),
        }
    }
}

#[async_trait]
impl BridgeClient for DocumentHost {
    async fn mutate(
        &self,
        board_id: &str,
        user_id: &str,
        action: &MutationAction,
    ) -> Result<MutateResponse, HiveError> {
        let outcome = self.apply(board_id, user_id, std::slice::from_ref(action)).await?;
        Ok(match outcome.error {
            Some(e) => MutateResponse::failed(e.to_string()),
            None => MutateResponse::ok(outcome.affected_object_ids),
        })
    }

    async fn mutate_batch(
        &self,
        board_id: &str,
        user_id: &str,
        actions: &[MutationAction],
    ) -> Result<MutateBatchResponse, HiveError> {
        Ok(self.apply(board_id, user_id, actions).await?.into())
    }

    async fn board_state(
        &self,
        board_id: &str,
        context: Option<&BoardStateContext>,
    ) -> Result<ScopedBoardState, HiveError> {
        self.current_objects(board_id, |objects| build_scoped_board_state(objects, context))
            .await
    }

    async fn find_objects(
        &self,
        board_id: &str,
        query: &FindObjectsQuery,
    ) -> Result<FindObjectsResponse, HiveError> {
        self.current_objects(board_id, |objects| find_objects(objects, query))
            .await
    }
}
