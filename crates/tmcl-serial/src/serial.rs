//! 串口传输实现
//!
//! 基于 `serialport` crate，8N1、无流控。
//!
//! ## 接收策略
//!
//! TMCL 应答固定 9 字节。`receive_timeout` 在截止时间内反复读取，
//! 直到凑满 9 字节；截止时间到达仍未凑满则返回 `SerialError::Timeout`。
//! 每次发送前清空输入缓冲，丢弃上一次超时交换可能残留的迟到字节。

use crate::{SerialError, Transport};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::{Duration, Instant};
use tmcl_protocol::{FRAME_LEN, ReplyFrame, RequestFrame};
use tracing::{debug, info, trace, warn};

/// 串口传输
pub struct SerialTransport {
    /// 已打开的串口（`close` 后为 None）
    port: Option<Box<dyn SerialPort>>,
    /// 设备路径（用于日志）
    path: String,
}

impl SerialTransport {
    /// 打开串口
    ///
    /// # 参数
    /// * `path` - 串口路径（如 "/dev/ttyACM0"）
    /// * `baud_rate` - 波特率（TMCL 模块出厂默认 9600）
    /// * `timeout` - 默认读超时
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self, SerialError> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()?;

        info!("Opened serial port: {} at {} baud", path, baud_rate);

        Ok(Self {
            port: Some(port),
            path: path.to_string(),
        })
    }

    /// 设备路径
    pub fn path(&self) -> &str {
        &self.path
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>, SerialError> {
        self.port.as_mut().ok_or(SerialError::Closed)
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, frame: &RequestFrame) -> Result<(), SerialError> {
        let bytes = frame.to_bytes();
        let port = self.port_mut()?;

        if let Err(e) = port.clear(ClearBuffer::Input) {
            warn!("Failed to clear serial input buffer: {}", e);
        }

        port.write_all(&bytes)?;
        port.flush()?;
        trace!("Serial TX: {:02X?}", bytes);
        Ok(())
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<ReplyFrame, SerialError> {
        let deadline = Instant::now() + timeout;
        let port = self.port_mut()?;
        let mut buffer = [0u8; FRAME_LEN];
        let mut filled = 0;

        while filled < FRAME_LEN {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!("Serial RX timeout after {} of {} bytes", filled, FRAME_LEN);
                return Err(SerialError::Timeout);
            }
            port.set_timeout(remaining)?;

            match port.read(&mut buffer[filled..]) {
                Ok(0) => continue,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    debug!("Serial RX timeout after {} of {} bytes", filled, FRAME_LEN);
                    return Err(SerialError::Timeout);
                },
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        trace!("Serial RX: {:02X?}", buffer);
        Ok(ReplyFrame::from_bytes(&buffer)?)
    }

    fn close(&mut self) -> Result<(), SerialError> {
        match self.port.take() {
            Some(port) => {
                // 串口在 drop 时关闭
                drop(port);
                info!("Closed serial port: {}", self.path);
                Ok(())
            },
            None => Err(SerialError::Closed),
        }
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("path", &self.path)
            .field("open", &self.port.is_some())
            .finish()
    }
}
