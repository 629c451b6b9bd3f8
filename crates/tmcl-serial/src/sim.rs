//! 内存中的 TMCL 模块模拟器
//!
//! 实现 [`Transport`]，无需硬件即可驱动完整的会话生命周期（CLI 的 `sim` 端口、测试）。
//!
//! # 简化
//!
//! - MVP / RFS 立即到位（不模拟加减速）
//! - ROR / ROL 以恒定速度积分位置
//! - 发往其他地址的请求不会得到应答（与真实总线一致，接收端超时）

use crate::{SerialError, Transport};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tmcl_protocol::{
    AxisParameter, ModuleAddress, MoveType, Opcode, ReferenceSearchType, ReplyFrame, RequestFrame,
    Status,
};
use tracing::trace;

#[derive(Debug)]
struct SimState {
    /// 只应答该地址；None 表示应答任意地址
    address: Option<ModuleAddress>,
    /// 实际位置（浮点积分，读取时取整）
    position: f64,
    /// 实际速度（steps/s，带符号）
    speed: i32,
    /// 目标位置
    target: i32,
    last_update: Instant,
    /// 等待被 `receive_timeout` 取走的应答
    pending: Option<ReplyFrame>,
    /// 已处理的请求数
    requests: u64,
    closed: bool,
}

impl SimState {
    fn advance(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_update).as_secs_f64();
        self.position += self.speed as f64 * dt;
        self.last_update = now;
    }

    fn actual_position(&self) -> i32 {
        self.position.round() as i32
    }

    fn handle(&mut self, request: &RequestFrame) -> (Status, i32) {
        self.advance();
        match request.opcode {
            Opcode::RotateRight => {
                self.speed = request.value;
                (Status::Success, request.value)
            },
            Opcode::RotateLeft => {
                self.speed = request.value.saturating_neg();
                (Status::Success, request.value)
            },
            Opcode::MotorStop => {
                self.speed = 0;
                (Status::Success, 0)
            },
            Opcode::MoveToPosition => {
                let target = match MoveType::try_from(request.kind) {
                    Ok(MoveType::Absolute) => request.value,
                    Ok(MoveType::Relative) => self.actual_position().saturating_add(request.value),
                    _ => return (Status::WrongType, 0),
                };
                self.speed = 0;
                self.target = target;
                self.position = target as f64;
                (Status::Success, target)
            },
            Opcode::SetAxisParameter => (Status::Success, request.value),
            Opcode::GetAxisParameter => match AxisParameter::try_from(request.kind) {
                Ok(AxisParameter::TargetPosition) => (Status::Success, self.target),
                Ok(AxisParameter::ActualPosition) => (Status::Success, self.actual_position()),
                Ok(AxisParameter::TargetSpeed) | Ok(AxisParameter::ActualSpeed) => {
                    (Status::Success, self.speed)
                },
                Ok(AxisParameter::PositionReached) => {
                    (Status::Success, i32::from(self.speed == 0 && self.actual_position() == self.target))
                },
                _ => (Status::WrongType, 0),
            },
            Opcode::ReferenceSearch => match ReferenceSearchType::try_from(request.kind) {
                Ok(ReferenceSearchType::Start) => {
                    self.speed = 0;
                    self.target = 0;
                    self.position = 0.0;
                    (Status::Success, 0)
                },
                Ok(ReferenceSearchType::Stop) => (Status::Success, 0),
                Ok(ReferenceSearchType::Status) => (Status::Success, 0),
                Err(_) => (Status::WrongType, 0),
            },
        }
    }
}

/// 模拟器的观察 / 操控句柄（可在测试线程中持有）
#[derive(Debug, Clone)]
pub struct SimHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimHandle {
    /// 当前实际位置
    pub fn position(&self) -> i32 {
        let mut state = self.state.lock();
        state.advance();
        state.actual_position()
    }

    /// 当前实际速度
    pub fn speed(&self) -> i32 {
        self.state.lock().speed
    }

    /// 强制设置位置（模拟外力 / 初始状态）
    pub fn set_position(&self, position: i32) {
        let mut state = self.state.lock();
        state.position = position as f64;
        state.target = position;
        state.last_update = Instant::now();
    }

    /// 已收到的请求数
    pub fn requests(&self) -> u64 {
        self.state.lock().requests
    }

    /// 模拟器是否已被关闭
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

/// TMCL 模块模拟器
#[derive(Debug)]
pub struct SimulatedMotor {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedMotor {
    /// 创建模拟器
    ///
    /// `address` 为 None 时应答任意模块地址。
    pub fn new(address: Option<ModuleAddress>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                address,
                position: 0.0,
                speed: 0,
                target: 0,
                last_update: Instant::now(),
                pending: None,
                requests: 0,
                closed: false,
            })),
        }
    }

    /// 获取观察句柄
    pub fn handle(&self) -> SimHandle {
        SimHandle {
            state: self.state.clone(),
        }
    }
}

impl Transport for SimulatedMotor {
    fn send(&mut self, frame: &RequestFrame) -> Result<(), SerialError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(SerialError::Closed);
        }
        state.requests += 1;

        // 帧经过一次编解码，保证模拟器看到的与线上一致
        let request = RequestFrame::from_bytes(&frame.to_bytes())?;
        if state.address.is_some_and(|address| address != request.address) {
            state.pending = None;
            return Ok(());
        }

        let (status, value) = state.handle(&request);
        trace!("Sim {} -> {} {}", request.opcode.mnemonic(), status, value);
        state.pending = Some(ReplyFrame::for_request(&request, status, value));
        Ok(())
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<ReplyFrame, SerialError> {
        let pending = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(SerialError::Closed);
            }
            state.pending.take()
        };

        match pending {
            Some(reply) => Ok(ReplyFrame::from_bytes(&reply.to_bytes())?),
            None => {
                // 无应答：与真实链路一样等满超时
                std::thread::sleep(timeout);
                Err(SerialError::Timeout)
            },
        }
    }

    fn close(&mut self) -> Result<(), SerialError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(SerialError::Closed);
        }
        state.closed = true;
        state.pending = None;
        Ok(())
    }
}
