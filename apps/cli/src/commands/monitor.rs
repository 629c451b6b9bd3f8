//! 位置监控命令

use clap::Args;
use std::time::Duration;

/// 监控命令参数
#[derive(Args, Debug)]
pub struct MonitorCommand {
    /// 监控时长（秒）；省略则运行到 Ctrl+C
    #[arg(short, long)]
    pub duration_secs: Option<u64>,
}

impl MonitorCommand {
    pub fn duration(&self) -> Option<Duration> {
        self.duration_secs.map(Duration::from_secs)
    }
}
