//! 会话计数器
//!
//! 原子计数器，会话线程与监控线程都可以无锁更新，任意线程读取快照。

use std::sync::atomic::{AtomicU64, Ordering};

/// 会话实时指标
#[derive(Debug, Default)]
pub struct SessionMetrics {
    /// 发起的请求 / 应答交换总数
    pub exchanges_total: AtomicU64,

    /// 失败的交换数（含超时）
    pub exchange_failures: AtomicU64,

    /// 应答超时次数
    pub timeouts: AtomicU64,

    /// 监控线程发布的位置快照数
    pub snapshots_published: AtomicU64,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_exchange(&self) {
        self.exchanges_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self, timeout: bool) {
        self.exchange_failures.fetch_add(1, Ordering::Relaxed);
        if timeout {
            self.timeouts.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_snapshot(&self) {
        self.snapshots_published.fetch_add(1, Ordering::Relaxed);
    }

    /// 读取所有计数器的当前值
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            exchanges_total: self.exchanges_total.load(Ordering::Relaxed),
            exchange_failures: self.exchange_failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            snapshots_published: self.snapshots_published.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub exchanges_total: u64,
    pub exchange_failures: u64,
    pub timeouts: u64,
    pub snapshots_published: u64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "exchanges={} failures={} timeouts={} snapshots={}",
            self.exchanges_total, self.exchange_failures, self.timeouts, self.snapshots_published
        )
    }
}
