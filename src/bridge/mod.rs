//! 变更桥：单步变更语义、在线/快照双路径宿主、HTTP 接口与客户端

pub mod client;
pub mod host;
#[cfg(feature = "server")]
pub mod http;
pub mod mutation;
pub mod types;

pub use client::{BridgeClient, HttpBridgeClient};
pub use host::{DocumentHost, SnapshotSession};
pub use mutation::{apply_batch, apply_mutation, BatchOutcome, MutationApplied};
pub use types::{
    ActionResult, BoardStateRequest, FindObjectsRequest, MutateBatchRequest, MutateBatchResponse,
    MutateRequest, MutateResponse,
};
