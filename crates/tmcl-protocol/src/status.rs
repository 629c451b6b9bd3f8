//! 应答状态码

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 模块应答状态
///
/// 100 / 101 表示成功，1-6 表示模块拒绝了请求。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Status {
    WrongChecksum = 1,
    InvalidCommand = 2,
    WrongType = 3,
    InvalidValue = 4,
    EepromLocked = 5,
    CommandNotAvailable = 6,
    Success = 100,
    CommandLoaded = 101,
}

impl Status {
    /// 是否为成功状态
    pub fn is_success(self) -> bool {
        matches!(self, Status::Success | Status::CommandLoaded)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Status::WrongChecksum => "wrong checksum",
            Status::InvalidCommand => "invalid command",
            Status::WrongType => "wrong type",
            Status::InvalidValue => "invalid value",
            Status::EepromLocked => "configuration EEPROM locked",
            Status::CommandNotAvailable => "command not available",
            Status::Success => "success",
            Status::CommandLoaded => "command loaded into EEPROM",
        };
        write!(f, "{} ({})", text, u8::from(*self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_codes() {
        assert!(Status::Success.is_success());
        assert!(Status::CommandLoaded.is_success());
        assert!(!Status::InvalidValue.is_success());
    }

    #[test]
    fn test_from_u8() {
        assert_eq!(Status::try_from(100).unwrap(), Status::Success);
        assert_eq!(Status::try_from(4).unwrap(), Status::InvalidValue);
        assert!(Status::try_from(0).is_err());
        assert!(Status::try_from(99).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Status::WrongType.to_string(), "wrong type (3)");
    }
}
