//! 连接配置
//!
//! 只读：从 TOML 文档加载，缺省字段取默认值。不提供保存。
//!
//! ```toml
//! baud_rate = 9600
//! timeout_ms = 1000
//! poll_interval_ms = 500
//! motor = 0
//! ```

use crate::DriverError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// 配置加载错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] DriverError),
}

/// 连接参数
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionConfig {
    /// 波特率
    pub baud_rate: u32,
    /// 单次交换的应答超时（毫秒）
    pub timeout_ms: u64,
    /// 位置监控轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 电机编号（单轴模块为 0）
    pub motor: u8,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            baud_rate: tmcl_serial::DEFAULT_BAUD_RATE,
            timeout_ms: 1000,
            poll_interval_ms: 500,
            motor: 0,
        }
    }
}

impl ConnectionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 检查取值范围
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.baud_rate == 0 {
            return Err(DriverError::InvalidArgument("baud_rate must be non-zero".into()));
        }
        if self.timeout_ms == 0 {
            return Err(DriverError::InvalidArgument("timeout_ms must be non-zero".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(DriverError::InvalidArgument(
                "poll_interval_ms must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// 解析 TOML 文本并校验
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// 读取 TOML 文件并校验
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}
