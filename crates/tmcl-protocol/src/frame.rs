//! 请求帧 / 应答帧
//!
//! 两种帧都是固定 9 字节，值字段为大端 i32。

use crate::command::{AxisParameter, MoveType, Opcode, ReferenceSearchType};
use crate::{ModuleAddress, ProtocolError, Status, bytes_to_i32_be, i32_to_bytes_be};

/// TMCL 帧长度（请求与应答相同）
pub const FRAME_LEN: usize = 9;

/// 主机应答地址（模块回复帧的第一个字节）
pub const REPLY_ADDRESS: u8 = 2;

/// 计算校验和（所有字节之和，按 256 取模）
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

fn verify_frame(bytes: &[u8]) -> Result<[u8; FRAME_LEN], ProtocolError> {
    let raw: [u8; FRAME_LEN] = bytes.try_into().map_err(|_| ProtocolError::InvalidLength {
        expected: FRAME_LEN,
        actual: bytes.len(),
    })?;

    let expected = checksum(&raw[..8]);
    if expected != raw[8] {
        return Err(ProtocolError::ChecksumMismatch {
            expected,
            actual: raw[8],
        });
    }
    Ok(raw)
}

/// 主机发往模块的请求帧
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestFrame {
    /// 目标模块地址
    pub address: ModuleAddress,
    /// 指令码
    pub opcode: Opcode,
    /// 类型字段（MVP 运动类型、GAP 参数号等）
    pub kind: u8,
    /// 电机 / bank 编号
    pub motor: u8,
    /// 值
    pub value: i32,
}

impl RequestFrame {
    /// 通用构造器
    pub fn new(address: ModuleAddress, opcode: Opcode, kind: u8, motor: u8, value: i32) -> Self {
        Self {
            address,
            opcode,
            kind,
            motor,
            value,
        }
    }

    /// ROR
    pub fn rotate_right(address: ModuleAddress, motor: u8, velocity: i32) -> Self {
        Self::new(address, Opcode::RotateRight, 0, motor, velocity)
    }

    /// ROL
    pub fn rotate_left(address: ModuleAddress, motor: u8, velocity: i32) -> Self {
        Self::new(address, Opcode::RotateLeft, 0, motor, velocity)
    }

    /// MST
    pub fn stop(address: ModuleAddress, motor: u8) -> Self {
        Self::new(address, Opcode::MotorStop, 0, motor, 0)
    }

    /// MVP
    pub fn move_to(address: ModuleAddress, motor: u8, move_type: MoveType, value: i32) -> Self {
        Self::new(address, Opcode::MoveToPosition, move_type.into(), motor, value)
    }

    /// GAP
    pub fn get_axis_parameter(address: ModuleAddress, motor: u8, parameter: AxisParameter) -> Self {
        Self::new(address, Opcode::GetAxisParameter, parameter.into(), motor, 0)
    }

    /// RFS
    pub fn reference_search(
        address: ModuleAddress,
        motor: u8,
        search: ReferenceSearchType,
    ) -> Self {
        Self::new(address, Opcode::ReferenceSearch, search.into(), motor, 0)
    }

    /// 编码为 9 字节
    pub fn to_bytes(&self) -> [u8; FRAME_LEN] {
        let value = i32_to_bytes_be(self.value);
        let mut raw = [
            self.address.get(),
            self.opcode.into(),
            self.kind,
            self.motor,
            value[0],
            value[1],
            value[2],
            value[3],
            0,
        ];
        raw[8] = checksum(&raw[..8]);
        raw
    }

    /// 从 9 字节解码（模块侧 / 模拟器使用）
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let raw = verify_frame(bytes)?;
        let address = ModuleAddress::new(raw[0] as u32)?;
        let opcode = Opcode::try_from(raw[1]).map_err(|_| ProtocolError::UnknownOpcode(raw[1]))?;
        Ok(Self {
            address,
            opcode,
            kind: raw[2],
            motor: raw[3],
            value: bytes_to_i32_be([raw[4], raw[5], raw[6], raw[7]]),
        })
    }
}

/// 模块返回的应答帧
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyFrame {
    /// 应答地址（主机地址）
    pub reply_address: u8,
    /// 发出应答的模块地址
    pub module_address: u8,
    /// 状态码
    pub status: Status,
    /// 回显的指令码
    pub opcode: u8,
    /// 值
    pub value: i32,
}

impl ReplyFrame {
    /// 针对某个请求构造应答（模拟器使用）
    pub fn for_request(request: &RequestFrame, status: Status, value: i32) -> Self {
        Self {
            reply_address: REPLY_ADDRESS,
            module_address: request.address.get(),
            status,
            opcode: request.opcode.into(),
            value,
        }
    }

    /// 编码为 9 字节
    pub fn to_bytes(&self) -> [u8; FRAME_LEN] {
        let value = i32_to_bytes_be(self.value);
        let mut raw = [
            self.reply_address,
            self.module_address,
            self.status.into(),
            self.opcode,
            value[0],
            value[1],
            value[2],
            value[3],
            0,
        ];
        raw[8] = checksum(&raw[..8]);
        raw
    }

    /// 从 9 字节解码，校验长度、校验和与状态码
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let raw = verify_frame(bytes)?;
        let status = Status::try_from(raw[2]).map_err(|_| ProtocolError::UnknownStatus(raw[2]))?;
        Ok(Self {
            reply_address: raw[0],
            module_address: raw[1],
            status,
            opcode: raw[3],
            value: bytes_to_i32_be([raw[4], raw[5], raw[6], raw[7]]),
        })
    }

    /// 校验应答是否属于 `request`，成功时返回值字段
    ///
    /// # 错误
    /// - `AddressMismatch`: 应答来自其他模块
    /// - `OpcodeMismatch`: 指令码回显不一致（上一次交换残留的应答）
    /// - `Rejected`: 模块返回错误状态
    pub fn value_for(&self, request: &RequestFrame) -> Result<i32, ProtocolError> {
        if self.module_address != request.address.get() {
            return Err(ProtocolError::AddressMismatch {
                expected: request.address.get(),
                actual: self.module_address,
            });
        }
        let opcode: u8 = request.opcode.into();
        if self.opcode != opcode {
            return Err(ProtocolError::OpcodeMismatch {
                expected: opcode,
                actual: self.opcode,
            });
        }
        if !self.status.is_success() {
            return Err(ProtocolError::Rejected {
                status: self.status,
                opcode,
            });
        }
        Ok(self.value)
    }
}
