//! # TMCL Serial Transport Layer
//!
//! 串口传输抽象层：为上层会话提供统一的"发送一帧 / 限时接收一帧"接口。
//!
//! - [`SerialTransport`]: 基于 `serialport` 的真实串口
//! - [`SimulatedMotor`]: 内存中的 TMCL 模块模拟器（无硬件调试、测试）
//! - [`available_ports`]: 串口枚举
//!
//! 传输层不理解指令语义，只负责帧的收发与超时。

use std::time::Duration;
use thiserror::Error;

pub use tmcl_protocol::{ProtocolError, ReplyFrame, RequestFrame};

pub mod discovery;
pub mod serial;
pub mod sim;

pub use discovery::{PortInfo, available_ports};
pub use serial::SerialTransport;
pub use sim::{SimHandle, SimulatedMotor};

/// 默认波特率
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// 默认应答超时
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serial port error: {0}")]
    Port(#[from] serialport::Error),
    #[error("Read timeout")]
    Timeout,
    #[error("Frame error: {0}")]
    Frame(#[from] ProtocolError),
    #[error("Port closed")]
    Closed,
}

impl SerialError {
    /// 是否属于协议层面的失败（超时、坏帧），而非设备 / IO 故障
    pub fn is_protocol(&self) -> bool {
        matches!(self, SerialError::Timeout | SerialError::Frame(_))
    }
}

/// 单条半双工链路
///
/// 实现者一次只处理一个请求：`send` 之后必须 `receive_timeout`，
/// 才能发送下一个请求。并发调用的串行化由上层负责。
pub trait Transport: Send {
    /// 发送一个请求帧
    fn send(&mut self, frame: &RequestFrame) -> Result<(), SerialError>;

    /// 阻塞等待一个完整应答帧，最多等待 `timeout`
    fn receive_timeout(&mut self, timeout: Duration) -> Result<ReplyFrame, SerialError>;

    /// 一次完整的 send-then-receive 交换
    fn exchange(
        &mut self,
        request: &RequestFrame,
        timeout: Duration,
    ) -> Result<ReplyFrame, SerialError> {
        self.send(request)?;
        self.receive_timeout(timeout)
    }

    /// 关闭底层设备；之后的调用返回 `SerialError::Closed`
    fn close(&mut self) -> Result<(), SerialError> {
        Ok(())
    }
}

/// 打开串口所需的参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSettings {
    /// 设备路径（如 "/dev/ttyACM0"、"COM3"）
    pub path: String,
    /// 波特率
    pub baud_rate: u32,
    /// 应答超时
    pub timeout: Duration,
}

impl PortSettings {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// 传输工厂：决定 `connect` 时如何打开一条链路
///
/// 闭包 `Fn(&PortSettings) -> Result<Box<dyn Transport>, SerialError>` 自动实现此 trait，
/// 测试可以借此注入 mock 传输。
pub trait Connector: Send + Sync {
    fn open(&self, settings: &PortSettings) -> Result<Box<dyn Transport>, SerialError>;
}

impl<F> Connector for F
where
    F: Fn(&PortSettings) -> Result<Box<dyn Transport>, SerialError> + Send + Sync,
{
    fn open(&self, settings: &PortSettings) -> Result<Box<dyn Transport>, SerialError> {
        self(settings)
    }
}

/// 打开真实串口的工厂
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    fn open(&self, settings: &PortSettings) -> Result<Box<dyn Transport>, SerialError> {
        let transport =
            SerialTransport::open(&settings.path, settings.baud_rate, settings.timeout)?;
        Ok(Box::new(transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_error_classification() {
        assert!(SerialError::Timeout.is_protocol());
        assert!(SerialError::Frame(ProtocolError::UnknownStatus(7)).is_protocol());
        assert!(!SerialError::Closed.is_protocol());
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        assert!(!SerialError::Io(io).is_protocol());
    }

    #[test]
    fn test_port_settings_defaults() {
        let settings = PortSettings::new("/dev/ttyACM0");
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_closure_connector() {
        let connector = |settings: &PortSettings| -> Result<Box<dyn Transport>, SerialError> {
            assert_eq!(settings.path, "sim");
            Ok(Box::new(SimulatedMotor::new(None)))
        };
        let mut transport = connector.open(&PortSettings::new("sim")).unwrap();
        assert!(transport.close().is_ok());
    }
}
