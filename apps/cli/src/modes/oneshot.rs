//! One-shot 模式
//!
//! 每个命令独立执行：
//! 1. 合并配置
//! 2. 连接（打开串口 + 探测）
//! 3. 执行操作
//! 4. 断开连接

use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tmcl_driver::{ChannelSink, ConnectionManager, DriverError, MotorSession, StatusEvent};

use crate::commands::{Direction, MoveTarget};
use crate::connection::{self, ConnectionArgs};
use crate::events::print_event;

/// One-shot 模式
pub struct OneShotMode {
    manager: ConnectionManager,
    session: Arc<MotorSession>,
    events: Receiver<StatusEvent>,
}

impl OneShotMode {
    /// 连接到电机
    pub fn connect(args: &ConnectionArgs) -> Result<Self> {
        let config = args.resolve_config()?;
        let port = args.port()?;

        let (sink, events) = ChannelSink::new();
        let mut manager = connection::manager(Arc::new(sink), config);

        match manager.connect(port, args.address) {
            Ok(session) => {
                let mode = Self {
                    manager,
                    session,
                    events,
                };
                mode.flush_events(false);
                Ok(mode)
            },
            Err(e) => {
                for event in events.try_iter() {
                    print_event(&event, false);
                }
                Err(e.into())
            },
        }
    }

    /// 位置查询
    pub fn position(self) -> Result<()> {
        let status = self.run(|session| session.query_status())?;
        println!("📍 Position: {} steps", status.position);
        println!("   Speed:    {} steps/s", status.speed);
        Ok(())
    }

    /// 移动
    pub fn move_to(self, target: MoveTarget) -> Result<()> {
        self.run(|session| match target {
            MoveTarget::Absolute(position) => session.move_absolute(position),
            MoveTarget::Relative(offset) => session.move_relative(offset),
        })
    }

    /// 匀速旋转（断开后电机继续转动）
    pub fn rotate(self, direction: Direction, velocity: i32) -> Result<()> {
        self.run(|session| match direction {
            Direction::Left => session.rotate_left(velocity),
            Direction::Right => session.rotate_right(velocity),
        })
    }

    /// 停止
    pub fn stop(self) -> Result<()> {
        self.run(|session| session.stop())
    }

    /// 回零
    pub fn home(self) -> Result<()> {
        self.run(|session| session.reference_search())
    }

    /// 打印位置快照，直到 Ctrl+C、时长用尽或连接丢失
    pub fn monitor(mut self, duration: Option<Duration>) -> Result<()> {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();
        ctrlc::set_handler(move || {
            running_clone.store(false, Ordering::SeqCst);
        })?;

        let deadline = duration.map(|d| Instant::now() + d);
        println!("📊 Monitoring (Ctrl+C to stop)...");

        while running.load(Ordering::SeqCst) && deadline.is_none_or(|d| Instant::now() < d) {
            match self.events.recv_timeout(Duration::from_millis(100)) {
                Ok(event) => {
                    print_event(&event, true);
                    if let StatusEvent::ConnectionLost(reason) = event {
                        if let Err(e) = self.manager.disconnect() {
                            tracing::warn!("Error during teardown: {}", e);
                        }
                        self.flush_events(true);
                        anyhow::bail!("Connection lost: {}", reason);
                    }
                },
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.finish()
    }

    /// 执行一个操作后断开；无论操作成败都先完成断开并输出日志
    fn run<T>(
        mut self,
        op: impl FnOnce(&MotorSession) -> Result<T, DriverError>,
    ) -> Result<T> {
        let result = op(&self.session);
        let teardown = self.manager.disconnect();
        self.flush_events(false);
        let value = result?;
        teardown?;
        Ok(value)
    }

    fn finish(self) -> Result<()> {
        self.run(|_| Ok(()))
    }

    fn flush_events(&self, show_positions: bool) {
        for event in self.events.try_iter() {
            print_event(&event, show_positions);
        }
    }
}
