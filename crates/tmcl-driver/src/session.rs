//! MotorSession - 串行化的电机会话
//!
//! 每个语义指令对应一次阻塞的请求 / 应答交换。链路是半双工停等协议，
//! 所有交换都在同一把锁内完成：前台指令与监控线程的查询绝不会交错。
//!
//! # 架构
//!
//! ```text
//! ┌──────────────────────────┐
//! │ MotorSession             │
//! ├──────────────────────────┤
//! │ link: Mutex<Option<..>>  │ ← 唯一共享的可变资源（close 后为 None）
//! │ sink                     │ ← 操作日志
//! │ metrics                  │ ← 原子计数
//! └──────────────────────────┘
//!     ▲              ▲
//!     │ 前台指令      │ poll_status（监控线程）
//! ```

use crate::DriverError;
use crate::cancel::CancellationObserver;
use crate::metrics::{MetricsSnapshot, SessionMetrics};
use crate::sink::{LogLine, StatusSink};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tmcl_protocol::{AxisParameter, ModuleAddress, MoveType, ReferenceSearchType, RequestFrame};
use tmcl_serial::Transport;
use tracing::{debug, warn};

/// 位置与速度（一次 `query_status` 的结果）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorStatus {
    pub position: i32,
    pub speed: i32,
}

/// 电机会话
pub struct MotorSession {
    address: ModuleAddress,
    motor: u8,
    timeout: Duration,
    /// 链路锁：持有期间恰好进行一次完整交换（`query_status` 为两次）
    link: Mutex<Option<Box<dyn Transport>>>,
    sink: Arc<dyn StatusSink>,
    metrics: SessionMetrics,
}

impl MotorSession {
    /// 接管一条已打开的链路
    pub fn new(
        transport: Box<dyn Transport>,
        address: ModuleAddress,
        motor: u8,
        timeout: Duration,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            address,
            motor,
            timeout,
            link: Mutex::new(Some(transport)),
            sink,
            metrics: SessionMetrics::new(),
        }
    }

    pub fn address(&self) -> ModuleAddress {
        self.address
    }

    pub fn motor(&self) -> u8 {
        self.motor
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 链路是否仍然打开
    pub fn is_open(&self) -> bool {
        self.link.lock().is_some()
    }

    /// 计数器快照
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub(crate) fn record_snapshot(&self) {
        self.metrics.record_snapshot();
    }

    /// 向左（负方向）匀速旋转
    pub fn rotate_left(&self, velocity: i32) -> Result<(), DriverError> {
        self.check_velocity(velocity, "rotating left")?;
        self.command(
            RequestFrame::rotate_left(self.address, self.motor, velocity),
            "rotating left",
            format!("Rotating left at {} steps/sec", velocity),
        )
    }

    /// 向右（正方向）匀速旋转
    pub fn rotate_right(&self, velocity: i32) -> Result<(), DriverError> {
        self.check_velocity(velocity, "rotating right")?;
        self.command(
            RequestFrame::rotate_right(self.address, self.motor, velocity),
            "rotating right",
            format!("Rotating right at {} steps/sec", velocity),
        )
    }

    /// 停止电机
    pub fn stop(&self) -> Result<(), DriverError> {
        self.command(
            RequestFrame::stop(self.address, self.motor),
            "stopping motor",
            "Motor stopped".to_string(),
        )
    }

    /// 移动到绝对位置
    pub fn move_absolute(&self, position: i32) -> Result<(), DriverError> {
        self.command(
            RequestFrame::move_to(self.address, self.motor, MoveType::Absolute, position),
            "moving to absolute position",
            format!("Moving to absolute position: {}", position),
        )
    }

    /// 相对当前位置移动
    pub fn move_relative(&self, offset: i32) -> Result<(), DriverError> {
        self.command(
            RequestFrame::move_to(self.address, self.motor, MoveType::Relative, offset),
            "moving by relative offset",
            format!("Moving by relative offset: {}", offset),
        )
    }

    /// 启动回零
    ///
    /// 只发送启动指令，不等待回零完成。
    pub fn reference_search(&self) -> Result<(), DriverError> {
        self.command(
            RequestFrame::reference_search(self.address, self.motor, ReferenceSearchType::Start),
            "starting reference search",
            "Reference search started".to_string(),
        )
    }

    /// 读取实际位置
    pub fn query_position(&self) -> Result<i32, DriverError> {
        let request =
            RequestFrame::get_axis_parameter(self.address, self.motor, AxisParameter::ActualPosition);
        self.with_link(|link| self.exchange_on(link, &request))
            .inspect_err(|e| self.log(format!("Error reading position: {}", e)))
    }

    /// 读取实际位置与速度
    ///
    /// 两次交换在同一次加锁内完成。
    pub fn query_status(&self) -> Result<MotorStatus, DriverError> {
        let (position_request, speed_request) = self.status_requests();

        self.with_link(|link| {
            let position = self.exchange_on(link, &position_request)?;
            let speed = self.exchange_on(link, &speed_request)?;
            Ok(MotorStatus { position, speed })
        })
        .inspect_err(|e| self.log(format!("Error reading status: {}", e)))
    }

    /// 监控线程的状态查询
    ///
    /// 与 `query_status` 持有同一次锁，但拿到锁后、两次交换之间都检查取消信号。
    /// 已取消时返回 `Ok(None)` 且不再发起交换，取消延迟不超过一次交换超时。
    /// 失败由监控线程报告，这里不写操作日志。
    pub(crate) fn poll_status(
        &self,
        cancel: &CancellationObserver,
    ) -> Result<Option<MotorStatus>, DriverError> {
        let (position_request, speed_request) = self.status_requests();

        self.with_link(|link| {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            let position = self.exchange_on(link, &position_request)?;
            if cancel.is_cancelled() {
                debug!("Status poll cancelled after position reply");
                return Ok(None);
            }
            let speed = self.exchange_on(link, &speed_request)?;
            Ok(Some(MotorStatus { position, speed }))
        })
    }

    /// 关闭链路
    ///
    /// 等待正在进行的交换结束后取出链路并关闭；之后所有操作返回 `NotConnected`。
    pub fn close(&self) -> Result<(), DriverError> {
        let transport = self.link.lock().take();
        match transport {
            Some(mut transport) => {
                debug!("Closing link to module {}", self.address);
                transport.close().map_err(DriverError::Transport)
            },
            None => Err(DriverError::NotConnected),
        }
    }

    fn status_requests(&self) -> (RequestFrame, RequestFrame) {
        (
            RequestFrame::get_axis_parameter(self.address, self.motor, AxisParameter::ActualPosition),
            RequestFrame::get_axis_parameter(self.address, self.motor, AxisParameter::ActualSpeed),
        )
    }

    fn check_velocity(&self, velocity: i32, action: &str) -> Result<(), DriverError> {
        if velocity > 0 {
            return Ok(());
        }
        let err = DriverError::InvalidArgument(format!(
            "velocity must be a positive integer, got {}",
            velocity
        ));
        self.log(format!("Error {}: {}", action, err));
        Err(err)
    }

    fn command(&self, request: RequestFrame, action: &str, done: String) -> Result<(), DriverError> {
        match self.with_link(|link| self.exchange_on(link, &request)) {
            Ok(_) => {
                self.log(done);
                Ok(())
            },
            Err(e) => {
                self.log(format!("Error {}: {}", action, e));
                Err(e)
            },
        }
    }

    fn with_link<T>(
        &self,
        f: impl FnOnce(&mut dyn Transport) -> Result<T, DriverError>,
    ) -> Result<T, DriverError> {
        let mut guard = self.link.lock();
        let link = guard.as_mut().ok_or(DriverError::NotConnected)?;
        f(link.as_mut())
    }

    /// 一次交换；调用方必须持有链路锁
    fn exchange_on(&self, link: &mut dyn Transport, request: &RequestFrame) -> Result<i32, DriverError> {
        self.metrics.record_exchange();
        let result = link
            .exchange(request, self.timeout)
            .map_err(|e| DriverError::from_exchange(e, self.timeout))
            .and_then(|reply| Ok(reply.value_for(request)?));

        if let Err(e) = &result {
            self.metrics.record_failure(e.is_timeout());
            warn!(
                "{} to module {} failed: {}",
                request.opcode.mnemonic(),
                self.address,
                e
            );
        }
        result
    }

    fn log(&self, message: String) {
        self.sink.on_log(LogLine::now(message));
    }
}

impl std::fmt::Debug for MotorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotorSession")
            .field("address", &self.address)
            .field("motor", &self.motor)
            .field("timeout", &self.timeout)
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}
