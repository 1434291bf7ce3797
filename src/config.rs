//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__SERVER__BIND=0.0.0.0:9000`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::core::RetryPolicy;
use crate::planner::PlannerConfig;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub bridge: BridgeSection,
    pub storage: StorageSection,
    pub documents: DocumentsSection,
    pub planner: PlannerSection,
    pub tracing: TracingSection,
}

/// [server] 段：监听地址与桥接密钥
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    /// Bearer 密钥；为空时拒绝所有 /ai/* 请求
    pub bridge_secret: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8787".to_string(),
            bridge_secret: String::new(),
        }
    }
}

/// [bridge] 段：远端桥接（HttpBridgeClient）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeSection {
    /// 未设置时使用进程内 DocumentHost
    pub base_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_secs: 15,
        }
    }
}

/// [storage] 段：快照库与保存重试
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// 未设置时使用内存快照（进程退出即丢失）
    pub sqlite_path: Option<PathBuf>,
    pub save_retry_attempts: u32,
    pub save_retry_backoff_ms: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            sqlite_path: Some(PathBuf::from("data/hive.db")),
            save_retry_attempts: 3,
            save_retry_backoff_ms: 200,
        }
    }
}

impl StorageSection {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.save_retry_attempts, Duration::from_millis(self.save_retry_backoff_ms))
    }
}

/// [documents] 段：在线文档空闲回收
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DocumentsSection {
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for DocumentsSection {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 300,
            sweep_interval_secs: 30,
        }
    }
}

/// [planner] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlannerSection {
    pub bulk_min: u64,
    pub bulk_max: u64,
    pub verification_tolerance_px: f64,
}

impl Default for PlannerSection {
    fn default() -> Self {
        let d = PlannerConfig::default();
        Self {
            bulk_min: d.bulk_min,
            bulk_max: d.bulk_max,
            verification_tolerance_px: d.verification_tolerance_px,
        }
    }
}

impl PlannerSection {
    pub fn planner_config(&self) -> PlannerConfig {
        PlannerConfig {
            bulk_min: self.bulk_min,
            bulk_max: self.bulk_max.max(self.bulk_min),
            verification_tolerance_px: self.verification_tolerance_px.max(0.0),
        }
    }
}

/// [tracing] 段：外部追踪上报超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TracingSection {
    pub sink_timeout_ms: u64,
}

impl Default for TracingSection {
    fn default() -> Self {
        Self { sink_timeout_ms: 500 }
    }
}

/// 加载配置：config/default.toml（可选）→ 指定文件（可选）→ HIVE__* 环境变量
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        builder = builder.add_source(config::File::from(path.clone()).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.planner.planner_config(), PlannerConfig::default());
        assert_eq!(cfg.storage.retry_policy().max_attempts, 3);
        assert!(cfg.server.bridge_secret.is_empty());
    }

    #[test]
    fn test_file_overrides_partial_sections() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[planner]\nbulk_max = 200\n\n[storage]\nsave_retry_attempts = 5\n\n[server]\nbridge_secret = \"s3cret\""
        )
        .unwrap();
        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.planner.bulk_max, 200);
        assert_eq!(cfg.planner.bulk_min, 10);
        assert_eq!(cfg.storage.save_retry_attempts, 5);
        assert_eq!(cfg.storage.save_retry_backoff_ms, 200);
        assert_eq!(cfg.server.bridge_secret, "s3cret");
    }
}
