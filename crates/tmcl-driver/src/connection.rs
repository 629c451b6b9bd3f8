//! ConnectionManager - 连接生命周期
//!
//! 唯一持有链路、会话、监控线程与取消令牌的对象。
//!
//! # 拆除顺序
//!
//! `disconnect()` 是一次会合：先发出取消信号，`join` 监控线程，
//! 确认它不可能再访问链路之后才关闭串口。

use crate::DriverError;
use crate::cancel::CancellationToken;
use crate::config::ConnectionConfig;
use crate::monitor::{MonitorConfig, MonitorExit, PositionMonitor};
use crate::session::MotorSession;
use crate::sink::{LogLine, StatusSink};
use crate::state::{AtomicConnectionState, ConnectionState};
use std::sync::Arc;
use tmcl_protocol::ModuleAddress;
use tmcl_serial::{Connector, PortSettings, SerialConnector};
use tracing::{debug, info, warn};

/// 一次已建立的连接
struct ActiveConnection {
    port: String,
    session: Arc<MotorSession>,
    monitor: PositionMonitor,
    cancel: CancellationToken,
}

/// 连接管理器
pub struct ConnectionManager {
    connector: Box<dyn Connector>,
    sink: Arc<dyn StatusSink>,
    config: ConnectionConfig,
    state: Arc<AtomicConnectionState>,
    active: Option<ActiveConnection>,
    last_exit: Option<MonitorExit>,
}

impl ConnectionManager {
    /// 使用自定义链路工厂创建
    pub fn new(
        connector: impl Connector + 'static,
        sink: Arc<dyn StatusSink>,
        config: ConnectionConfig,
    ) -> Self {
        Self {
            connector: Box::new(connector),
            sink,
            config,
            state: Arc::new(AtomicConnectionState::default()),
            active: None,
            last_exit: None,
        }
    }

    /// 使用真实串口创建
    pub fn serial(sink: Arc<dyn StatusSink>, config: ConnectionConfig) -> Self {
        Self::new(SerialConnector, sink, config)
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// 当前连接的端口名
    pub fn port(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.port.as_str())
    }

    /// 当前会话
    pub fn session(&self) -> Result<Arc<MotorSession>, DriverError> {
        self.active
            .as_ref()
            .map(|active| active.session.clone())
            .ok_or(DriverError::NotConnected)
    }

    /// 监控线程是否仍在运行
    pub fn is_monitor_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.monitor.is_running())
    }

    /// 监控线程已报告链路失效，等待 `disconnect()` 完成拆除
    pub fn is_link_lost(&self) -> bool {
        self.active.is_some() && self.state() == ConnectionState::Disconnecting
    }

    /// 上一次连接的监控线程退出原因（在 `disconnect()` 之后可用）
    pub fn monitor_exit(&self) -> Option<&MonitorExit> {
        self.last_exit.as_ref()
    }

    /// 建立连接
    ///
    /// 打开串口，读取一次位置作为存活探测，成功后启动监控线程。
    /// 任一步失败都会回到 Disconnected，已打开的串口会被关闭。
    pub fn connect(&mut self, port: &str, address: u32) -> Result<Arc<MotorSession>, DriverError> {
        let address = ModuleAddress::new(address).map_err(|e| {
            let err = DriverError::InvalidArgument(e.to_string());
            self.log(format!("Connection failed: {}", err));
            err
        })?;
        if port.trim().is_empty() {
            let err = DriverError::InvalidArgument("no serial port selected".to_string());
            self.log(format!("Connection failed: {}", err));
            return Err(err);
        }
        self.config.validate()?;

        if self
            .state
            .transition(ConnectionState::Disconnected, ConnectionState::Connecting)
            .is_err()
        {
            return Err(DriverError::AlreadyConnected);
        }
        self.emit_state(ConnectionState::Connecting);
        self.log(format!("Connecting to {} (Module {})...", port, address));

        let settings = PortSettings {
            path: port.to_string(),
            baud_rate: self.config.baud_rate,
            timeout: self.config.timeout(),
        };
        let transport = match self.connector.open(&settings) {
            Ok(transport) => transport,
            Err(e) => return Err(self.abort_connect(DriverError::Transport(e))),
        };

        let session = Arc::new(MotorSession::new(
            transport,
            address,
            self.config.motor,
            self.config.timeout(),
            self.sink.clone(),
        ));

        let position = match session.query_position() {
            Ok(position) => position,
            Err(e) => {
                if let Err(close_err) = session.close() {
                    warn!("Failed to close {} after probe failure: {}", port, close_err);
                }
                return Err(self.abort_connect(e));
            },
        };

        let _ = self
            .state
            .transition(ConnectionState::Connecting, ConnectionState::Connected);
        info!("Connected to {} (module {}), position {}", port, address, position);
        self.emit_state(ConnectionState::Connected);
        self.log(format!("Connected successfully! Current position: {}", position));

        let cancel = CancellationToken::new();
        let monitor = match PositionMonitor::start(
            session.clone(),
            cancel.observer(),
            self.state.clone(),
            self.sink.clone(),
            MonitorConfig {
                poll_interval: self.config.poll_interval(),
            },
        ) {
            Ok(monitor) => monitor,
            Err(e) => {
                self.log(format!("Connection failed: {}", e));
                let _ = self.teardown(&session);
                return Err(e);
            },
        };

        self.last_exit = None;
        self.active = Some(ActiveConnection {
            port: port.to_string(),
            session: session.clone(),
            monitor,
            cancel,
        });
        Ok(session)
    }

    /// 断开连接
    ///
    /// 取消并 `join` 监控线程后关闭串口。关闭失败时返回 `Transport` 错误，
    /// 但状态仍然回到 Disconnected。
    pub fn disconnect(&mut self) -> Result<(), DriverError> {
        let Some(active) = self.active.take() else {
            return Err(DriverError::NotConnected);
        };

        if self
            .state
            .transition(ConnectionState::Connected, ConnectionState::Disconnecting)
            .is_ok()
        {
            self.emit_state(ConnectionState::Disconnecting);
        }

        active.cancel.cancel();
        let exit = active.monitor.join();
        debug!("Position monitor exited: {}", exit);
        self.last_exit = Some(exit);

        let result = self.teardown(&active.session);
        match &result {
            Ok(()) => self.log("Disconnected from motor".to_string()),
            Err(e) => self.log(format!("Error during disconnection: {}", e)),
        }
        info!("Disconnected from {}", active.port);
        result
    }

    /// 关闭会话并回到 Disconnected（监控线程必须已经结束）
    fn teardown(&self, session: &MotorSession) -> Result<(), DriverError> {
        if self
            .state
            .transition(ConnectionState::Connected, ConnectionState::Disconnecting)
            .is_ok()
        {
            self.emit_state(ConnectionState::Disconnecting);
        }

        let result = session.close();

        let _ = self
            .state
            .transition(ConnectionState::Disconnecting, ConnectionState::Disconnected);
        self.emit_state(ConnectionState::Disconnected);
        result
    }

    fn abort_connect(&self, err: DriverError) -> DriverError {
        let _ = self
            .state
            .transition(ConnectionState::Connecting, ConnectionState::Disconnected);
        self.emit_state(ConnectionState::Disconnected);
        self.log(format!("Connection failed: {}", err));
        warn!("Connection failed: {}", err);
        err
    }

    fn emit_state(&self, state: ConnectionState) {
        debug!("Connection state: {}", state);
        self.sink.on_connection_state_changed(state);
    }

    fn log(&self, message: String) {
        self.sink.on_log(LogLine::now(message));
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if self.active.is_some() {
            if let Err(e) = self.disconnect() {
                warn!("Error during teardown: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .field("port", &self.port())
            .field("config", &self.config)
            .finish()
    }
}
