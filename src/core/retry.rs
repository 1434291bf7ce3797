//! 重试策略：固定次数 + 线性退避
//!
//! 用于快照保存等「丢失即数据丢失」的写操作，与变更逻辑本身解耦。
//! 只重试持久化错误；其余错误重试也不会变好，直接返回。

use std::future::Future;
use std::time::Duration;

use crate::core::{ErrorKind, HiveError};

/// 重试策略：最多尝试 max_attempts 次，第 n 次失败后等待 base_delay * n
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// 第 attempt 次（从 1 开始）失败后的等待时间
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// 执行 op，持久化错误按策略重试；耗尽后返回最后一次错误
    pub async fn run<T, F, Fut>(&self, op_name: &str, mut op: F) -> Result<T, HiveError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, HiveError>>,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.kind() != ErrorKind::Persistence => {
                    tracing::debug!(op = op_name, error = %e, "non-retryable error");
                    return Err(e);
                }
                Err(e) if attempt >= max => {
                    tracing::error!(op = op_name, attempts = attempt, error = %e, "retries exhausted");
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        op = op_name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
