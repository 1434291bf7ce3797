//! 白板文档层：对象模型、共享文档、在线文档存储与快照持久化

pub mod color;
pub mod document;
pub mod object;
pub mod snapshot;
pub mod store;

pub use color::ColorQuery;
pub use document::{BoardDocument, DocumentChange, DocumentSnapshot, Transaction};
pub use object::{sort_reading_order, BoardObject, ObjectType};
pub use snapshot::{MemorySnapshotStore, SnapshotStore, SqliteSnapshotStore};
pub use store::{LiveDocumentStore, SharedDocument};
