//! 共享文档抽象
//!
//! BoardDocument 保存一个白板的全部对象（保持插入顺序），所有修改都经 transact 完成：
//! 一次事务 = 一个原子修改 + 一条变更通知（DocumentChange），供同步服务转发给在线客户端。
//! 事务只是通知边界，不做回滚：事务内已完成的修改在后续失败时依然保留。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::board::BoardObject;

/// 一次事务产生的变更通知
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    pub board_id: String,
    pub version: u64,
    pub object_ids: Vec<String>,
}

/// 文档的持久化形式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    pub board_id: String,
    pub objects: Vec<BoardObject>,
    /// RFC3339
    pub saved_at: String,
}

pub struct BoardDocument {
    board_id: String,
    objects: Vec<BoardObject>,
    index: HashMap<String, usize>,
    version: u64,
    changes: broadcast::Sender<DocumentChange>,
}

impl std::fmt::Debug for BoardDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardDocument")
            .field("board_id", &self.board_id)
            .field("objects", &self.objects.len())
            .field("version", &self.version)
            .finish()
    }
}

impl BoardDocument {
    pub fn new(board_id: impl Into<String>) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            board_id: board_id.into(),
            objects: Vec::new(),
            index: HashMap::new(),
            version: 0,
            changes,
        }
    }

    pub fn from_snapshot(snapshot: DocumentSnapshot) -> Self {
        let mut doc = Self::new(snapshot.board_id);
        for obj in snapshot.objects {
            doc.insert_raw(obj);
        }
        doc
    }

    pub fn to_snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            board_id: self.board_id.clone(),
            objects: self.objects.clone(),
            saved_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    pub fn objects(&self) -> &[BoardObject] {
        &self.objects
    }

    pub fn get(&self, id: &str) -> Option<&BoardObject> {
        self.index.get(id).map(|&i| &self.objects[i])
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// 订阅变更通知（同步服务用来广播给客户端）
    pub fn subscribe(&self) -> broadcast::Receiver<DocumentChange> {
        self.changes.subscribe()
    }

    /// 下一个可用的 zIndex：当前最大值 + 1
    pub fn next_z_index(&self) -> i64 {
        self.objects.iter().map(|o| o.z_index).max().map_or(1, |z| z + 1)
    }

    /// 在一个原子事务中修改文档；有对象被触及时版本号 +1 并发出一条变更通知
    pub fn transact<R>(&mut self, f: impl FnOnce(&mut Transaction<'_>) -> R) -> R {
        let mut txn = Transaction {
            doc: self,
            touched: Vec::new(),
        };
        let result = f(&mut txn);
        let touched = txn.touched;
        if !touched.is_empty() {
            self.version += 1;
            // 没有订阅者时 send 返回 Err，可忽略
            let _ = self.changes.send(DocumentChange {
                board_id: self.board_id.clone(),
                version: self.version,
                object_ids: touched,
            });
        }
        result
    }

    fn insert_raw(&mut self, obj: BoardObject) {
        if let Some(&i) = self.index.get(&obj.id) {
            self.objects[i] = obj;
        } else {
            self.index.insert(obj.id.clone(), self.objects.len());
            self.objects.push(obj);
        }
    }
}

/// 事务句柄：记录被触及的对象 id
pub struct Transaction<'a> {
    doc: &'a mut BoardDocument,
    touched: Vec<String>,
}

impl Transaction<'_> {
    pub fn get(&self, id: &str) -> Option<&BoardObject> {
        self.doc.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.doc.index.contains_key(id)
    }

    /// 取可变引用并标记为已修改
    pub fn get_mut(&mut self, id: &str) -> Option<&mut BoardObject> {
        let i = *self.doc.index.get(id)?;
        self.mark(id);
        Some(&mut self.doc.objects[i])
    }

    pub fn insert(&mut self, obj: BoardObject) {
        self.mark(&obj.id);
        self.doc.insert_raw(obj);
    }

    fn mark(&mut self, id: &str) {
        if !self.touched.iter().any(|t| t == id) {
            self.touched.push(id.to_string());
        }
    }
}
