//! 指令定义
//!
//! 只覆盖本工具用到的 TMCL 指令子集。

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// TMCL 指令码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Opcode {
    /// ROR：以给定速度向右旋转
    RotateRight = 1,
    /// ROL：以给定速度向左旋转
    RotateLeft = 2,
    /// MST：停止电机
    MotorStop = 3,
    /// MVP：移动到位置（绝对 / 相对）
    MoveToPosition = 4,
    /// SAP：设置轴参数
    SetAxisParameter = 5,
    /// GAP：读取轴参数
    GetAxisParameter = 6,
    /// RFS：参考点搜索（回零）
    ReferenceSearch = 13,
}

impl Opcode {
    /// TMCL 助记符
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::RotateRight => "ROR",
            Opcode::RotateLeft => "ROL",
            Opcode::MotorStop => "MST",
            Opcode::MoveToPosition => "MVP",
            Opcode::SetAxisParameter => "SAP",
            Opcode::GetAxisParameter => "GAP",
            Opcode::ReferenceSearch => "RFS",
        }
    }
}

/// MVP 运动类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum MoveType {
    /// 绝对位置
    Absolute = 0,
    /// 相对当前位置的偏移
    Relative = 1,
    /// 坐标
    Coordinate = 2,
}

/// 轴参数编号（GAP/SAP 的 type 字段）
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum AxisParameter {
    TargetPosition = 0,
    ActualPosition = 1,
    TargetSpeed = 2,
    ActualSpeed = 3,
    MaxPositioningSpeed = 4,
    MaxAcceleration = 5,
    PositionReached = 8,
}

/// RFS 子命令
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ReferenceSearchType {
    Start = 0,
    Stop = 1,
    Status = 2,
}
