//! 快照持久化
//!
//! SnapshotStore 抽象「按白板读写最新快照」，两种实现：
//! - SqliteSnapshotStore：rusqlite，单表 board_snapshots，经 spawn_blocking 在后台线程执行
//! - MemorySnapshotStore：内存实现，用于测试与无持久化部署

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::RwLock;

use crate::board::DocumentSnapshot;
use crate::core::HiveError;

/// 快照存储接口
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// 读取白板最新快照；从未保存过时返回 None
    async fn load(&self, board_id: &str) -> Result<Option<DocumentSnapshot>, HiveError>;

    /// 覆盖保存白板快照
    async fn save(&self, snapshot: &DocumentSnapshot) -> Result<(), HiveError>;
}

/// SQLite 快照存储
pub struct SqliteSnapshotStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSnapshotStore {
    /// 打开（或创建）数据库文件；父目录不存在时自动创建
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HiveError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| HiveError::Persistence(e.to_string()))?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, HiveError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, HiveError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS board_snapshots (
                board_id TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, HiveError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, HiveError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| HiveError::Persistence("snapshot connection poisoned".into()))?;
            f(&guard)
        })
        .await
        .map_err(|e| HiveError::Persistence(e.to_string()))?
    }
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn load(&self, board_id: &str) -> Result<Option<DocumentSnapshot>, HiveError> {
        let board_id = board_id.to_string();
        self.with_conn(move |conn| {
            let state: Option<String> = conn
                .query_row(
                    "SELECT state FROM board_snapshots WHERE board_id = ?1",
                    params![board_id],
                    |row| row.get(0),
                )
                .optional()?;
            state
                .map(|s| serde_json::from_str(&s))
                .transpose()
                .map_err(|e| HiveError::Persistence(format!("corrupt snapshot: {e}")))
        })
        .await
    }

    async fn save(&self, snapshot: &DocumentSnapshot) -> Result<(), HiveError> {
        let state = serde_json::to_string(snapshot)
            .map_err(|e| HiveError::Persistence(e.to_string()))?;
        let board_id = snapshot.board_id.clone();
        let updated_at = snapshot.saved_at.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO board_snapshots (board_id, state, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(board_id) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
                params![board_id, state, updated_at],
            )?;
            Ok(())
        })
        .await
    }
}

/// 内存快照存储
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: RwLock<HashMap<String, DocumentSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self, board_id: &str) -> Result<Option<DocumentSnapshot>, HiveError> {
        Ok(self.snapshots.read().await.get(board_id).cloned())
    }

    async fn save(&self, snapshot: &DocumentSnapshot) -> Result<(), HiveError> {
        self.snapshots
            .write()
            .await
            .insert(snapshot.board_id.clone(), snapshot.clone());
        Ok(())
    }
}
