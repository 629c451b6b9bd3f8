//! 模块地址

use crate::ProtocolError;

/// TMCL 模块地址（1-255）
///
/// 同一串口总线上可以挂多个模块，每个会话只寻址其中一个。
/// 地址 0 不是合法的模块地址。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModuleAddress(u8);

impl ModuleAddress {
    /// 最小合法地址
    pub const MIN: u8 = 1;
    /// 最大合法地址
    pub const MAX: u8 = 255;

    /// 从任意整数创建地址，超出 [1, 255] 时返回错误
    pub fn new(value: u32) -> Result<Self, ProtocolError> {
        if (Self::MIN as u32..=Self::MAX as u32).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ProtocolError::InvalidAddress { value })
        }
    }

    /// 原始字节值
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u32> for ModuleAddress {
    type Error = ProtocolError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl std::fmt::Display for ModuleAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
