//! 指令端到端：规划 → 取状态 → 执行 → 校验，全部走进程内文档宿主与内存快照

use std::sync::Arc;
use std::time::Duration;

use hive::board::{LiveDocumentStore, MemorySnapshotStore, SnapshotStore, SqliteSnapshotStore};
use hive::bridge::{BridgeClient, DocumentHost};
use hive::core::{CommandOrchestrator, CommandSource, RetryPolicy};
use hive::planner::Planner;
use hive::tools::{MutationAction, ToolCallInput, ToolExecutor};
use serde_json::json;

fn host_with(snapshots: Arc<dyn SnapshotStore>) -> Arc<DocumentHost> {
    Arc::new(DocumentHost::new(
        Arc::new(LiveDocumentStore::new()),
        snapshots,
        RetryPolicy::new(3, Duration::from_millis(1)),
    ))
}

async fn add_sticky(host: &DocumentHost, board: &str, x: f64, y: f64, color: &str) -> String {
    let action = MutationAction::new("createStickyNote", json!({"text": "n", "x": x, "y": y, "color": color}));
    host.mutate(board, "seed", &action).await.unwrap().affected_object_ids[0].clone()
}

#[tokio::test]
async fn test_color_move_end_to_end() {
    let host = host_with(Arc::new(MemorySnapshotStore::new()));
    let p1 = add_sticky(&host, "board", 100.0, 100.0, "#f8bbd0").await;
    let p2 = add_sticky(&host, "board", 300.0, 400.0, "#f8bbd0").await;
    let blue = add_sticky(&host, "board", 600.0, 100.0, "#90caf9").await;

    let orchestrator = CommandOrchestrator::new(host.clone(), Planner::default());
    let outcome = orchestrator
        .run_command("board", "alice", "Move all pink sticky notes to the right side")
        .await;
    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(outcome.source, CommandSource::Planner);
    assert_eq!(outcome.execution.actions.len(), 2);
    assert!(outcome.verification.unwrap().passed);

    let state = host.board_state("board", None).await.unwrap();
    assert!(state.get(&p1).unwrap().x >= 1200.0);
    assert!(state.get(&p2).unwrap().x >= 1200.0);
    assert_eq!(state.get(&blue).unwrap().x, 600.0);
}

#[tokio::test]
async fn test_bulk_plan_persists_through_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshots.db");
    let host = host_with(Arc::new(SqliteSnapshotStore::open(&path).unwrap()));

    let orchestrator = CommandOrchestrator::new(host.clone(), Planner::default());
    let outcome = orchestrator.run_command("b", "bob", "Create 12 sticky notes").await;
    assert!(outcome.success);
    assert_eq!(outcome.execution.objects_affected.len(), 12);

    // 新连接读取同一个库
    let reopened = SqliteSnapshotStore::open(&path).unwrap();
    let snapshot = reopened.load("b").await.unwrap().unwrap();
    assert_eq!(snapshot.objects.len(), 12);
}

#[tokio::test]
async fn test_mind_map_connectors_resolve_step_refs() {
    let host = host_with(Arc::new(MemorySnapshotStore::new()));
    let orchestrator = CommandOrchestrator::new(host.clone(), Planner::default());
    let outcome = orchestrator
        .run_command("b", "carol", "Create a mind map about onboarding")
        .await;
    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(outcome.execution.actions.len(), 13);

    let state = host.board_state("b", None).await.unwrap();
    let connectors: Vec<_> = state
        .objects
        .iter()
        .filter(|o| o.object_type.as_str() == "connector")
        .collect();
    assert_eq!(connectors.len(), 6);
    let center = state.objects.iter().find(|o| o.text() == Some("onboarding")).unwrap();
    assert!(connectors.iter().all(|c| c.property_str("fromId") == Some(center.id.as_str())));
}

#[tokio::test]
async fn test_executor_stops_at_failing_call() {
    let host = host_with(Arc::new(MemorySnapshotStore::new()));
    let executor = ToolExecutor::new(host.clone());
    let calls = vec![
        ToolCallInput::new("1", "createStickyNote", &json!({"text": "a", "x": 0, "y": 0, "color": "#ffeb3b"})),
        ToolCallInput::new("2", "moveObject", &json!({"objectId": "missing", "x": 1, "y": 1})),
        ToolCallInput::new("3", "createStickyNote", &json!({"text": "c", "x": 0, "y": 0, "color": "#ffeb3b"})),
    ];
    let result = executor.execute_tool_calls(&calls, "b", "dave").await;
    assert!(!result.success);
    assert_eq!(result.actions.len(), 1);
    assert_eq!(result.error.as_deref(), Some("Object missing not found"));

    // 第一步没有回滚，第三步没有执行
    let state = host.board_state("b", None).await.unwrap();
    assert_eq!(state.total_objects, 1);
}

#[tokio::test]
async fn test_template_lands_beside_existing_content() {
    let host = host_with(Arc::new(MemorySnapshotStore::new()));
    add_sticky(&host, "b", 100.0, 100.0, "#ffeb3b").await;
    let orchestrator = CommandOrchestrator::new(host.clone(), Planner::default());
    let outcome = orchestrator.run_command("b", "erin", "Create a retrospective board").await;
    assert!(outcome.success);

    let state = host.board_state("b", None).await.unwrap();
    let existing = state.objects.iter().find(|o| o.text() == Some("n")).unwrap().bounds();
    for obj in state.objects.iter().filter(|o| o.text() != Some("n")) {
        assert!(!obj.bounds().intersects(&existing), "{} overlaps existing note", obj.id);
    }
}
