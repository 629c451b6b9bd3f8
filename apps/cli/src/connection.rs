//! 连接参数
//!
//! 全局命令行参数 + 可选 TOML 配置文件。命令行参数优先于配置文件。
//! 端口名 `sim` 使用内置模拟器，无需硬件。

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tmcl_driver::{ConnectionConfig, ConnectionManager, StatusSink};
use tmcl_serial::{
    Connector, PortSettings, SerialConnector, SerialError, SimulatedMotor, Transport,
};

/// 内置模拟器的端口名
pub const SIM_PORT: &str = "sim";

/// 连接参数（所有子命令共享）
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// 串口设备（如 /dev/ttyACM0、COM3；`sim` 为内置模拟器）
    #[arg(short, long, global = true)]
    pub port: Option<String>,

    /// 模块地址（1-255）
    #[arg(short, long, global = true, default_value_t = 1)]
    pub address: u32,

    /// 波特率（覆盖配置文件）
    #[arg(long, global = true)]
    pub baud: Option<u32>,

    /// 应答超时，毫秒（覆盖配置文件）
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// 位置轮询间隔，毫秒（覆盖配置文件）
    #[arg(long, global = true)]
    pub poll_ms: Option<u64>,

    /// TOML 配置文件
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

impl ConnectionArgs {
    /// 合并配置文件与命令行参数
    pub fn resolve_config(&self) -> Result<ConnectionConfig> {
        let mut config = match &self.config {
            Some(path) => ConnectionConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ConnectionConfig::default(),
        };

        if let Some(baud) = self.baud {
            config.baud_rate = baud;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if let Some(poll_ms) = self.poll_ms {
            config.poll_interval_ms = poll_ms;
        }

        config.validate()?;
        Ok(config)
    }

    /// 要连接的端口
    pub fn port(&self) -> Result<&str> {
        self.port
            .as_deref()
            .context("No serial port given; use --port <device> (or --port sim)")
    }
}

/// 打开链路：`sim` 为模拟器，其余为真实串口
pub fn open_transport(settings: &PortSettings) -> Result<Box<dyn Transport>, SerialError> {
    if settings.path == SIM_PORT {
        tracing::info!("Using built-in TMCL simulator");
        return Ok(Box::new(SimulatedMotor::new(None)));
    }
    SerialConnector.open(settings)
}

/// 创建连接管理器
pub fn manager(sink: Arc<dyn StatusSink>, config: ConnectionConfig) -> ConnectionManager {
    ConnectionManager::new(open_transport, sink, config)
}
