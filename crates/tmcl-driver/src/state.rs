//! 连接状态定义
//!
//! 状态机：
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──探测成功──▶ Connected
//!      ▲                        │                        │
//!      └────────探测失败─────────┘          disconnect / 监控失败
//!      │                                                 ▼
//!      └──────────────── 拆除完成 ─────────────── Disconnecting
//! ```

use std::sync::atomic::{AtomicU8, Ordering};

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ConnectionState {
    /// 未连接（默认）
    #[default]
    Disconnected = 0,

    /// 正在打开串口并探测模块
    Connecting = 1,

    /// 已连接，监控线程运行中
    Connected = 2,

    /// 正在拆除（取消监控、关闭串口）
    Disconnecting = 3,
}

impl ConnectionState {
    /// 从 u8 转换
    ///
    /// 如果值无效，返回 Disconnected。
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Disconnecting,
            _ => Self::Disconnected,
        }
    }

    /// 转换为 u8
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// 是否已连接
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }

    /// 状态机是否允许 `self -> next`
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, Disconnecting)
                | (Disconnecting, Disconnected)
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Disconnecting => "Disconnecting",
        };
        f.write_str(name)
    }
}

/// 连接状态（原子版本，管理器与监控线程共享）
///
/// 所有迁移都通过 [`transition`](Self::transition) 的 CAS 完成，
/// 因此管理器与监控线程同时尝试 `Connected -> Disconnecting` 时只有一方成功，
/// 状态变化事件也只会发出一次。
#[derive(Debug, Default)]
pub struct AtomicConnectionState {
    inner: AtomicU8,
}

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    /// 当前状态
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.load(Ordering::Acquire))
    }

    /// 比较并交换
    ///
    /// 当前值等于 `from` 且迁移合法时设置为 `to`，返回 `Ok(from)`；
    /// 否则返回 `Err(实际状态)`，不做修改。
    pub fn transition(
        &self,
        from: ConnectionState,
        to: ConnectionState,
    ) -> Result<ConnectionState, ConnectionState> {
        if !from.can_transition_to(to) {
            return Err(self.get());
        }
        self.inner
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .map(ConnectionState::from_u8)
            .map_err(ConnectionState::from_u8)
    }
}
