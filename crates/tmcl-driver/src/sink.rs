//! 状态输出（Status Sink）
//!
//! 会话、监控线程与连接管理器通过 [`StatusSink`] 向展示层报告：
//! 操作日志、位置快照、连接状态变化、连接丢失。
//!
//! 回调可能在监控线程上触发，实现必须快速返回且不能回调管理器。
//! 推荐使用 [`ChannelSink`]：把事件投递到通道，由展示线程自己取出处理。
//!
//! ```rust
//! use tmcl_driver::sink::{ChannelSink, StatusEvent, StatusSink, LogLine};
//!
//! let (sink, events) = ChannelSink::new();
//! sink.on_log(LogLine::now("Motor stopped"));
//!
//! match events.try_recv() {
//!     Ok(StatusEvent::Log(line)) => assert_eq!(line.message, "Motor stopped"),
//!     other => panic!("unexpected event: {:?}", other),
//! }
//! ```

use crate::state::ConnectionState;
use chrono::{DateTime, Local};
use crossbeam_channel::{Receiver, Sender, unbounded};

/// 一条带时间戳的操作日志
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl LogLine {
    /// 以当前本地时间创建
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            message: message.into(),
        }
    }
}

/// 格式：`[HH:MM:SS] message`
impl std::fmt::Display for LogLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

/// 一次位置监控采样
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionSnapshot {
    /// 实际位置（steps）
    pub position: i32,
    /// 实际速度（steps/s）
    pub speed: i32,
    pub timestamp: DateTime<Local>,
}

impl PositionSnapshot {
    pub fn new(position: i32, speed: i32) -> Self {
        Self {
            position,
            speed,
            timestamp: Local::now(),
        }
    }
}

impl std::fmt::Display for PositionSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] position={} speed={}",
            self.timestamp.format("%H:%M:%S"),
            self.position,
            self.speed
        )
    }
}

/// 状态输出接口
pub trait StatusSink: Send + Sync {
    /// 操作日志
    fn on_log(&self, line: LogLine);

    /// 位置快照（监控线程调用）
    fn on_position_update(&self, snapshot: PositionSnapshot);

    /// 连接状态变化
    fn on_connection_state_changed(&self, state: ConnectionState);

    /// 监控线程发现链路失效
    ///
    /// 默认实现转为一条日志。
    fn on_connection_lost(&self, reason: &str) {
        self.on_log(LogLine::now(format!("Connection lost: {}", reason)));
    }
}

/// [`ChannelSink`] 投递的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    Log(LogLine),
    Position(PositionSnapshot),
    StateChanged(ConnectionState),
    ConnectionLost(String),
}

/// 把所有回调转为 [`StatusEvent`] 投递到无界通道
///
/// 接收端被丢弃后事件被静默丢弃。
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<StatusEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<StatusEvent>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }

    fn emit(&self, event: StatusEvent) {
        let _ = self.tx.send(event);
    }
}

impl StatusSink for ChannelSink {
    fn on_log(&self, line: LogLine) {
        self.emit(StatusEvent::Log(line));
    }

    fn on_position_update(&self, snapshot: PositionSnapshot) {
        self.emit(StatusEvent::Position(snapshot));
    }

    fn on_connection_state_changed(&self, state: ConnectionState) {
        self.emit(StatusEvent::StateChanged(state));
    }

    fn on_connection_lost(&self, reason: &str) {
        self.emit(StatusEvent::ConnectionLost(reason.to_string()));
    }
}
