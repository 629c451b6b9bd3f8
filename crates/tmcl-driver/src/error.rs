//! 驱动层错误类型定义

use std::time::Duration;
use thiserror::Error;
use tmcl_protocol::ProtocolError;
use tmcl_serial::SerialError;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 已有活动连接（状态不是 Disconnected）
    #[error("Already connected")]
    AlreadyConnected,

    /// 没有活动连接，或会话已关闭
    #[error("Not connected")]
    NotConnected,

    /// 串口打开 / 关闭 / IO 失败
    #[error("Transport error: {0}")]
    Transport(SerialError),

    /// 应答超时、坏帧或模块拒绝
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 参数越界（地址、速度等）
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// 监控线程无法启动或异常退出
    #[error("Monitor thread error: {0}")]
    MonitorThread(String),
}

impl DriverError {
    /// 将一次交换中的传输层错误归类
    ///
    /// 超时与坏帧属于协议错误；设备 / IO 故障属于传输错误。
    pub fn from_exchange(err: SerialError, timeout: Duration) -> Self {
        match err {
            SerialError::Timeout => DriverError::Protocol(ProtocolError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
            SerialError::Frame(e) => DriverError::Protocol(e),
            other => DriverError::Transport(other),
        }
    }

    /// 是否为协议错误
    pub fn is_protocol(&self) -> bool {
        matches!(self, DriverError::Protocol(_))
    }

    /// 是否为超时
    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Protocol(ProtocolError::Timeout { .. }))
    }
}

impl From<SerialError> for DriverError {
    fn from(err: SerialError) -> Self {
        match err {
            SerialError::Frame(e) => DriverError::Protocol(e),
            other => DriverError::Transport(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_display() {
        assert_eq!(DriverError::AlreadyConnected.to_string(), "Already connected");
        assert_eq!(DriverError::NotConnected.to_string(), "Not connected");

        let msg = DriverError::InvalidArgument("velocity must be positive".into()).to_string();
        assert!(msg.contains("Invalid argument") && msg.contains("velocity"));

        let msg = DriverError::Transport(SerialError::Closed).to_string();
        assert_eq!(msg, "Transport error: Port closed");
    }

    #[test]
    fn test_exchange_timeout_is_protocol() {
        let err = DriverError::from_exchange(SerialError::Timeout, Duration::from_millis(250));
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Protocol error: No reply within 250 ms");
    }

    #[test]
    fn test_exchange_bad_frame_is_protocol() {
        let err = DriverError::from_exchange(
            SerialError::Frame(ProtocolError::UnknownStatus(9)),
            Duration::from_secs(1),
        );
        assert!(matches!(
            err,
            DriverError::Protocol(ProtocolError::UnknownStatus(9))
        ));
    }

    #[test]
    fn test_exchange_io_is_transport() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged");
        let err = DriverError::from_exchange(SerialError::Io(io), Duration::from_secs(1));
        assert!(matches!(err, DriverError::Transport(SerialError::Io(_))));
        assert!(!err.is_protocol());
    }

    #[test]
    fn test_from_serial_error() {
        let err: DriverError = SerialError::Closed.into();
        assert!(matches!(err, DriverError::Transport(SerialError::Closed)));
    }
}
