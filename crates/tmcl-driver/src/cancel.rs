//! 监控线程的取消信号
//!
//! [`CancellationToken`] 由连接管理器独占持有；监控线程只拿到
//! [`CancellationObserver`]（弱引用）。令牌被取消或被丢弃，观察者都视为已取消。

use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Signal {
    cancelled: Mutex<bool>,
    condvar: Condvar,
}

/// 取消令牌（所有者端）
#[derive(Debug, Default)]
pub struct CancellationToken {
    signal: Arc<Signal>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// 发出取消信号，唤醒所有正在等待的观察者
    pub fn cancel(&self) {
        let mut cancelled = self.signal.cancelled.lock();
        *cancelled = true;
        self.signal.condvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.signal.cancelled.lock()
    }

    /// 创建观察者
    pub fn observer(&self) -> CancellationObserver {
        CancellationObserver {
            signal: Arc::downgrade(&self.signal),
        }
    }
}

impl Drop for CancellationToken {
    fn drop(&mut self) {
        // 正在 wait 的观察者持有临时强引用，需要显式唤醒
        self.cancel();
    }
}

/// 取消令牌（观察者端）
#[derive(Debug, Clone)]
pub struct CancellationObserver {
    signal: Weak<Signal>,
}

impl CancellationObserver {
    pub fn is_cancelled(&self) -> bool {
        match self.signal.upgrade() {
            Some(signal) => *signal.cancelled.lock(),
            None => true,
        }
    }

    /// 最多等待 `timeout`，期间被取消则立即返回
    ///
    /// 返回是否已取消。
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Some(signal) = self.signal.upgrade() else {
            return true;
        };
        let deadline = Instant::now() + timeout;
        let mut cancelled = signal.cancelled.lock();
        while !*cancelled {
            if signal.condvar.wait_until(&mut cancelled, deadline).timed_out() {
                break;
            }
        }
        *cancelled
    }
}
