//! # TMCL Protocol
//!
//! Trinamic Motion Control Language (TMCL) 二进制协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `address`: 模块地址（1-255）
//! - `command`: 指令码、运动类型、轴参数
//! - `frame`: 请求帧 / 应答帧的编解码
//! - `status`: 应答状态码
//!
//! ## 帧格式
//!
//! ```text
//! 请求 (9 字节): [模块地址][指令码][类型][电机号][值 ×4 (大端)][校验和]
//! 应答 (9 字节): [应答地址][模块地址][状态][指令码回显][值 ×4 (大端)][校验和]
//! ```
//!
//! 校验和为前 8 字节之和（按 256 取模）。
//!
//! 协议是严格的半双工 stop-and-wait：任意时刻只能有一个未完成的请求。

pub mod address;
pub mod command;
pub mod frame;
pub mod status;

// 重新导出常用类型
pub use address::ModuleAddress;
pub use command::{AxisParameter, MoveType, Opcode, ReferenceSearchType};
pub use frame::{FRAME_LEN, REPLY_ADDRESS, ReplyFrame, RequestFrame, checksum};
pub use status::Status;

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("Reply from module {actual}, expected module {expected}")]
    AddressMismatch { expected: u8, actual: u8 },

    #[error("Reply echoes opcode {actual}, expected opcode {expected}")]
    OpcodeMismatch { expected: u8, actual: u8 },

    #[error("Unknown opcode: {0}")]
    UnknownOpcode(u8),

    #[error("Unknown status code: {0}")]
    UnknownStatus(u8),

    #[error("Module rejected opcode {opcode}: {status}")]
    Rejected { status: Status, opcode: u8 },

    /// stop-and-wait 超时：在规定时间内没有收到完整应答
    #[error("No reply within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("Invalid module address: {value} (expected 1-255)")]
    InvalidAddress { value: u32 },
}

/// 大端字节序转 i32
pub fn bytes_to_i32_be(bytes: [u8; 4]) -> i32 {
    i32::from_be_bytes(bytes)
}

/// i32 转大端字节序
pub fn i32_to_bytes_be(value: i32) -> [u8; 4] {
    value.to_be_bytes()
}
