//! Hive 入口
//!
//! - `hive`：启动变更桥 HTTP 服务（后台回收空闲在线文档，Ctrl+C 时落盘后退出）
//! - `hive run <board_id> <command...>`：对一块白板执行一条指令，输出 JSON 结果

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use hive::board::{LiveDocumentStore, MemorySnapshotStore, SnapshotStore, SqliteSnapshotStore};
use hive::bridge::{http::router, BridgeClient, DocumentHost, HttpBridgeClient};
use hive::config::{load_config, AppConfig};
use hive::core::{run_cleanup, CommandOrchestrator, LiveDocumentFlush, ShutdownCleanup, ShutdownManager};
use hive::observability::{self, LogSink, TraceEmitter};
use hive::planner::Planner;

const CLEANUP_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).context("Failed to load config")?;
    let host = Arc::new(build_host(&cfg)?);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("run") => run_once(&cfg, host, &args[1..]).await,
        _ => serve(&cfg, host).await,
    }
}

fn build_host(cfg: &AppConfig) -> anyhow::Result<DocumentHost> {
    let snapshots: Arc<dyn SnapshotStore> = match &cfg.storage.sqlite_path {
        Some(path) => Arc::new(
            SqliteSnapshotStore::open(path)
                .with_context(|| format!("Failed to open snapshot store {}", path.display()))?,
        ),
        None => {
            tracing::warn!("No sqlite_path configured, snapshots are kept in memory only");
            Arc::new(MemorySnapshotStore::new())
        }
    };
    Ok(DocumentHost::new(
        Arc::new(LiveDocumentStore::new()),
        snapshots,
        cfg.storage.retry_policy(),
    ))
}

async fn run_once(cfg: &AppConfig, host: Arc<DocumentHost>, args: &[String]) -> anyhow::Result<()> {
    let (board_id, words) = args
        .split_first()
        .context("usage: hive run <board_id> <command...>")?;
    let command = words.join(" ");
    anyhow::ensure!(!command.trim().is_empty(), "usage: hive run <board_id> <command...>");

    let bridge: Arc<dyn BridgeClient> = match &cfg.bridge.base_url {
        Some(url) => Arc::new(HttpBridgeClient::new(
            url,
            &cfg.server.bridge_secret,
            Duration::from_secs(cfg.bridge.request_timeout_secs),
        )?),
        None => host as Arc<dyn BridgeClient>,
    };
    let tracer = TraceEmitter::new(Arc::new(LogSink), Duration::from_millis(cfg.tracing.sink_timeout_ms));
    let orchestrator =
        CommandOrchestrator::new(bridge, Planner::new(cfg.planner.planner_config())).with_tracer(tracer);

    let outcome = orchestrator.run_command(board_id, "cli", &command).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if !outcome.success {
        anyhow::bail!(outcome.error.unwrap_or_else(|| "command failed".to_string()));
    }
    Ok(())
}

async fn serve(cfg: &AppConfig, host: Arc<DocumentHost>) -> anyhow::Result<()> {
    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();

    let sweeper = {
        let host = Arc::clone(&host);
        let token = shutdown.token();
        let idle = Duration::from_secs(cfg.documents.idle_timeout_secs);
        let every = Duration::from_secs(cfg.documents.sweep_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = host.sweep_idle(idle).await;
                        if evicted > 0 {
                            tracing::info!(evicted, "idle documents swept");
                        }
                    }
                }
            }
        })
    };

    let app = router(Arc::clone(&host), &cfg.server.bridge_secret);
    let listener = tokio::net::TcpListener::bind(&cfg.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.server.bind))?;
    tracing::info!(bind = %cfg.server.bind, "hive bridge listening");

    let token = shutdown.token();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await
        .context("Bridge server failed")?;

    let _ = sweeper.await;
    let tasks: Vec<Arc<dyn ShutdownCleanup>> = vec![Arc::new(LiveDocumentFlush::new(host))];
    run_cleanup(&tasks, CLEANUP_TIMEOUT).await;
    Ok(())
}
