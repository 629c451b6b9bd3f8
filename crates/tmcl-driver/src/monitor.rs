//! PositionMonitor - 后台位置监控线程
//!
//! 以固定间隔读取会话的位置与速度，把结果作为
//! [`PositionSnapshot`] 发布到 [`StatusSink`]。
//!
//! 监控器只能由连接管理器创建，随连接一起启动、取消并 join。
//!
//! # 终止
//!
//! - **取消**：每次交换前都检查取消信号（包括一次状态查询的两次交换之间）；
//!   周期间的等待可被立即唤醒。取消之后才观察到的失败按取消处理。
//! - **失败**：任一次查询失败即终止。记录日志、报告连接丢失、把共享状态
//!   迁移到 Disconnecting，随后线程返回 [`MonitorExit::Failed`]。
//!   链路的拆除由连接管理器的 `disconnect()` 完成。

use crate::DriverError;
use crate::cancel::CancellationObserver;
use crate::session::MotorSession;
use crate::sink::{LogLine, PositionSnapshot, StatusSink};
use crate::state::{AtomicConnectionState, ConnectionState};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

/// 监控线程名
pub const MONITOR_THREAD_NAME: &str = "tmcl-position-monitor";

/// 监控配置
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// 轮询间隔
    pub poll_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// 监控线程的退出原因
#[derive(Debug)]
pub enum MonitorExit {
    /// 收到取消信号
    Cancelled,
    /// 查询失败（链路失效）
    Failed(DriverError),
}

impl std::fmt::Display for MonitorExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorExit::Cancelled => f.write_str("cancelled"),
            MonitorExit::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// 位置监控器
pub struct PositionMonitor {
    handle: Option<thread::JoinHandle<MonitorExit>>,
    running: Arc<AtomicBool>,
}

impl PositionMonitor {
    /// 启动监控线程
    ///
    /// # 参数
    ///
    /// - `session`: 被轮询的会话
    /// - `cancel`: 取消信号（弱引用，令牌被丢弃视为取消）
    /// - `state`: 与连接管理器共享的连接状态
    /// - `sink`: 快照与事件的输出
    pub(crate) fn start(
        session: Arc<MotorSession>,
        cancel: CancellationObserver,
        state: Arc<AtomicConnectionState>,
        sink: Arc<dyn StatusSink>,
        config: MonitorConfig,
    ) -> Result<Self, DriverError> {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        let handle = thread::Builder::new()
            .name(MONITOR_THREAD_NAME.into())
            .spawn(move || {
                let exit = Self::monitor_loop(&session, &cancel, &state, sink.as_ref(), &config);
                running_clone.store(false, Ordering::Release);
                exit
            })
            .map_err(|e| {
                DriverError::MonitorThread(format!("failed to spawn position monitor: {}", e))
            })?;

        Ok(PositionMonitor {
            handle: Some(handle),
            running,
        })
    }

    /// 监控循环
    fn monitor_loop(
        session: &MotorSession,
        cancel: &CancellationObserver,
        state: &AtomicConnectionState,
        sink: &dyn StatusSink,
        config: &MonitorConfig,
    ) -> MonitorExit {
        debug!("Position monitor started ({:?} interval)", config.poll_interval);

        loop {
            if cancel.is_cancelled() {
                debug!("Position monitor cancelled");
                return MonitorExit::Cancelled;
            }

            match session.poll_status(cancel) {
                Ok(None) => {
                    debug!("Position monitor cancelled");
                    return MonitorExit::Cancelled;
                },
                Ok(Some(status)) => {
                    session.record_snapshot();
                    sink.on_position_update(PositionSnapshot::new(status.position, status.speed));
                },
                Err(e) => {
                    if cancel.is_cancelled() {
                        debug!("Position query failed after cancellation: {}", e);
                        return MonitorExit::Cancelled;
                    }
                    return Self::fail(state, sink, e);
                },
            }

            if cancel.wait_timeout(config.poll_interval) {
                debug!("Position monitor cancelled");
                return MonitorExit::Cancelled;
            }
        }
    }

    fn fail(state: &AtomicConnectionState, sink: &dyn StatusSink, err: DriverError) -> MonitorExit {
        error!("Position monitor stopped: {}", err);
        sink.on_log(LogLine::now(format!("Position monitoring stopped: {}", err)));
        sink.on_connection_lost(&err.to_string());

        if state
            .transition(ConnectionState::Connected, ConnectionState::Disconnecting)
            .is_ok()
        {
            info!("Connection state: {}", ConnectionState::Disconnecting);
            sink.on_connection_state_changed(ConnectionState::Disconnecting);
        }
        MonitorExit::Failed(err)
    }

    /// 等待线程结束并取回退出原因
    ///
    /// 调用前应先取消，否则会一直阻塞到链路失效。
    /// 所有者必须在关闭会话前 join：未 join 就丢弃的监控器不会等待线程退出。
    pub fn join(mut self) -> MonitorExit {
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                MonitorExit::Failed(DriverError::MonitorThread(
                    "position monitor panicked".to_string(),
                ))
            }),
            None => MonitorExit::Cancelled,
        }
    }

    /// 监控循环是否仍在运行
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// 线程是否已经结束（可以无阻塞地 join）
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|handle| handle.is_finished())
    }
}

impl Drop for PositionMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                // 令牌丢弃后观察者读到取消，线程在当前交换结束后自行退出
                debug!("Detaching position monitor thread");
            }
        }
    }
}

impl std::fmt::Debug for PositionMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionMonitor")
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use crate::sink::{ChannelSink, StatusEvent};
    use std::time::Instant;
    use tmcl_protocol::ModuleAddress;
    use tmcl_serial::{SimHandle, SimulatedMotor};

    fn start_sim_monitor(
        interval: Duration,
    ) -> (
        PositionMonitor,
        CancellationToken,
        SimHandle,
        crossbeam_channel::Receiver<StatusEvent>,
    ) {
        let sim = SimulatedMotor::new(None);
        let handle = sim.handle();
        let (sink, rx) = ChannelSink::new();
        let sink: Arc<dyn StatusSink> = Arc::new(sink);
        let session = Arc::new(MotorSession::new(
            Box::new(sim),
            ModuleAddress::new(1).unwrap(),
            0,
            Duration::from_millis(50),
            sink.clone(),
        ));
        let token = CancellationToken::new();
        let state = Arc::new(AtomicConnectionState::new(ConnectionState::Connected));
        let monitor = PositionMonitor::start(
            session,
            token.observer(),
            state,
            sink,
            MonitorConfig {
                poll_interval: interval,
            },
        )
        .unwrap();
        (monitor, token, handle, rx)
    }

    #[test]
    fn test_publishes_snapshots() {
        let (monitor, token, sim, rx) = start_sim_monitor(Duration::from_millis(10));
        sim.set_position(77);

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(event, StatusEvent::Position(_)));

        token.cancel();
        assert!(matches!(monitor.join(), MonitorExit::Cancelled));
    }

    #[test]
    fn test_cancel_interrupts_long_interval() {
        let (monitor, token, _sim, rx) = start_sim_monitor(Duration::from_secs(30));
        // 第一次采样立即发生
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(monitor.is_running());

        let start = Instant::now();
        token.cancel();
        assert!(matches!(monitor.join(), MonitorExit::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_dropped_token_stops_monitor() {
        let (monitor, token, _sim, _rx) = start_sim_monitor(Duration::from_secs(30));
        drop(token);
        assert!(matches!(monitor.join(), MonitorExit::Cancelled));
    }

    #[test]
    fn test_thread_is_named() {
        let (monitor, token, _sim, _rx) = start_sim_monitor(Duration::from_millis(10));
        let name = monitor
            .handle
            .as_ref()
            .and_then(|h| h.thread().name().map(str::to_string));
        assert_eq!(name.as_deref(), Some(MONITOR_THREAD_NAME));
        token.cancel();
        monitor.join();
    }
}
