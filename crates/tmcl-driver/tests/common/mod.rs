//! 测试用 Mock 链路
//!
//! 在 [`SimulatedMotor`] 外包一层探针：统计交换次数、检测交错、
//! 注入失败、模拟挂起的应答。

#![allow(dead_code)]

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tmcl_driver::{
    ChannelSink, ConnectionConfig, ConnectionManager, ConnectionState, PortSettings,
    SerialError, StatusEvent, Transport,
};
use tmcl_protocol::{Opcode, ReplyFrame, RequestFrame};
use tmcl_serial::{SimHandle, SimulatedMotor};

/// 链路探针（测试线程与 Mock 共享）
#[derive(Default)]
pub struct MockLink {
    /// 完成 `send` 的交换数
    pub exchanges: AtomicU64,
    /// 当前是否有交换在进行
    in_flight: AtomicBool,
    /// 是否观察到两个交换重叠
    pub overlap_detected: AtomicBool,
    /// 关闭后仍尝试发送的次数
    pub sends_after_close: AtomicU64,
    pub closed: AtomicBool,
    /// 第 N 次之后的交换全部超时（0 表示不注入）
    pub fail_after: AtomicU64,
    /// 每次接收前的人为延迟（微秒）
    pub reply_delay_us: AtomicU64,
    /// 挂起开关：为 true 时接收阻塞，直到放行或超时
    hang: Mutex<bool>,
    hang_released: Condvar,
    /// 正在挂起的接收数
    pub hanging: AtomicU64,
    /// 发送过的请求（按顺序）
    pub requests: Mutex<Vec<RequestFrame>>,
    sim: Mutex<Option<SimHandle>>,
}

impl MockLink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn exchanges(&self) -> u64 {
        self.exchanges.load(Ordering::SeqCst)
    }

    pub fn set_hang(&self, hang: bool) {
        let mut guard = self.hang.lock();
        *guard = hang;
        if !hang {
            self.hang_released.notify_all();
        }
    }

    pub fn sim(&self) -> Option<SimHandle> {
        self.sim.lock().clone()
    }

    pub fn opcodes(&self) -> Vec<(Opcode, u8)> {
        self.requests
            .lock()
            .iter()
            .map(|request| (request.opcode, request.kind))
            .collect()
    }

    /// 打开一条新链路（每次 connect 一个新模拟器）
    pub fn open(self: &Arc<Self>) -> MockTransport {
        let sim = SimulatedMotor::new(None);
        *self.sim.lock() = Some(sim.handle());
        self.closed.store(false, Ordering::SeqCst);
        MockTransport {
            inner: sim,
            link: self.clone(),
            failing: false,
        }
    }

    /// 作为 `ConnectionManager` 的链路工厂
    pub fn connector(
        self: &Arc<Self>,
    ) -> impl Fn(&PortSettings) -> Result<Box<dyn Transport>, SerialError> + Send + Sync + 'static
    {
        let link = self.clone();
        move |_settings: &PortSettings| -> Result<Box<dyn Transport>, SerialError> {
            Ok(Box::new(link.open()))
        }
    }
}

pub struct MockTransport {
    inner: SimulatedMotor,
    link: Arc<MockLink>,
    failing: bool,
}

impl Transport for MockTransport {
    fn send(&mut self, frame: &RequestFrame) -> Result<(), SerialError> {
        let link = &self.link;
        if link.closed.load(Ordering::SeqCst) {
            link.sends_after_close.fetch_add(1, Ordering::SeqCst);
            return Err(SerialError::Closed);
        }
        if link.in_flight.swap(true, Ordering::SeqCst) {
            link.overlap_detected.store(true, Ordering::SeqCst);
        }

        let count = link.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
        link.requests.lock().push(*frame);

        let fail_after = link.fail_after.load(Ordering::SeqCst);
        self.failing = fail_after != 0 && count > fail_after;
        if self.failing {
            return Ok(());
        }
        self.inner.send(frame)
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<ReplyFrame, SerialError> {
        let result = self.receive_inner(timeout);
        self.link.in_flight.store(false, Ordering::SeqCst);
        result
    }

    fn close(&mut self) -> Result<(), SerialError> {
        if self.link.closed.swap(true, Ordering::SeqCst) {
            return Err(SerialError::Closed);
        }
        self.inner.close()
    }
}

impl MockTransport {
    fn receive_inner(&mut self, timeout: Duration) -> Result<ReplyFrame, SerialError> {
        let link = &self.link;
        let delay = link.reply_delay_us.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_micros(delay));
        }

        let deadline = Instant::now() + timeout;
        {
            let mut hang = link.hang.lock();
            if *hang {
                link.hanging.fetch_add(1, Ordering::SeqCst);
                while *hang {
                    if link.hang_released.wait_until(&mut hang, deadline).timed_out() {
                        break;
                    }
                }
                link.hanging.fetch_sub(1, Ordering::SeqCst);
                if *hang {
                    return Err(SerialError::Timeout);
                }
            }
        }

        if self.failing {
            return Err(SerialError::Timeout);
        }
        self.inner.receive_timeout(timeout)
    }
}

/// 使用 Mock 链路创建管理器
pub fn manager_with(
    link: &Arc<MockLink>,
    config: ConnectionConfig,
) -> (ConnectionManager, crossbeam_channel::Receiver<StatusEvent>) {
    let (sink, rx) = ChannelSink::new();
    let manager = ConnectionManager::new(link.connector(), Arc::new(sink), config);
    (manager, rx)
}

pub fn fast_config(poll_interval_ms: u64) -> ConnectionConfig {
    ConnectionConfig {
        timeout_ms: 200,
        poll_interval_ms,
        ..ConnectionConfig::default()
    }
}

pub fn states(events: &[StatusEvent]) -> Vec<ConnectionState> {
    events
        .iter()
        .filter_map(|event| match event {
            StatusEvent::StateChanged(state) => Some(*state),
            _ => None,
        })
        .collect()
}

pub fn log_messages(events: &[StatusEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            StatusEvent::Log(line) => Some(line.message.clone()),
            _ => None,
        })
        .collect()
}

/// 轮询直到条件成立或超时
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
