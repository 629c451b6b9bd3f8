//! 匀速旋转命令

use clap::{Args, ValueEnum};

/// 旋转方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Direction {
    Left,
    Right,
}

/// 旋转命令参数
#[derive(Args, Debug)]
pub struct RotateCommand {
    /// 方向
    #[arg(value_enum)]
    pub direction: Direction,

    /// 速度（steps/s，必须为正）
    #[arg(short, long, default_value_t = 1000, allow_negative_numbers = true)]
    pub velocity: i32,
}
