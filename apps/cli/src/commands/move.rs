//! 移动命令

use anyhow::Result;
use clap::{ArgGroup, Args};

/// 移动命令参数
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("target").required(true).args(["absolute", "relative"])))]
pub struct MoveCommand {
    /// 绝对目标位置（steps）
    #[arg(long, allow_negative_numbers = true)]
    pub absolute: Option<i32>,

    /// 相对当前位置的偏移（steps）
    #[arg(long, allow_negative_numbers = true)]
    pub relative: Option<i32>,
}

/// 移动目标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveTarget {
    Absolute(i32),
    Relative(i32),
}

impl MoveCommand {
    pub fn target(&self) -> Result<MoveTarget> {
        match (self.absolute, self.relative) {
            (Some(position), None) => Ok(MoveTarget::Absolute(position)),
            (None, Some(offset)) => Ok(MoveTarget::Relative(offset)),
            _ => anyhow::bail!("Specify exactly one of --absolute or --relative"),
        }
    }
}
