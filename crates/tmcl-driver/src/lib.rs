//! 驱动层模块
//!
//! 在串口传输之上提供 TMCL 电机的会话与连接管理：
//! - [`ConnectionManager`]：连接生命周期（打开、探测、监控、拆除）
//! - [`MotorSession`]：串行化的语义指令（旋转、停止、移动、回零、查询）
//! - [`PositionMonitor`]：后台位置轮询线程，可取消、可 join
//! - [`StatusSink`]：日志 / 快照 / 状态事件输出
//!
//! # 示例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tmcl_driver::{ChannelSink, ConnectionConfig, ConnectionManager};
//!
//! let (sink, events) = ChannelSink::new();
//! let mut manager = ConnectionManager::serial(Arc::new(sink), ConnectionConfig::default());
//!
//! let session = manager.connect("/dev/ttyACM0", 1)?;
//! session.move_absolute(500)?;
//!
//! for event in events.try_iter() {
//!     println!("{:?}", event);
//! }
//! manager.disconnect()?;
//! # Ok::<(), tmcl_driver::DriverError>(())
//! ```

pub mod cancel;
pub mod config;
mod connection;
mod error;
pub mod metrics;
pub mod monitor;
mod session;
pub mod sink;
pub mod state;

pub use cancel::{CancellationObserver, CancellationToken};
pub use config::{ConfigError, ConnectionConfig};
pub use connection::ConnectionManager;
pub use error::DriverError;
pub use metrics::{MetricsSnapshot, SessionMetrics};
pub use monitor::{MonitorConfig, MonitorExit, PositionMonitor};
pub use session::{MotorSession, MotorStatus};
pub use sink::{ChannelSink, LogLine, PositionSnapshot, StatusEvent, StatusSink};
pub use state::{AtomicConnectionState, ConnectionState};

pub use tmcl_protocol::{ModuleAddress, ProtocolError};
pub use tmcl_serial::{Connector, PortSettings, SerialConnector, SerialError, SimulatedMotor, Transport};
