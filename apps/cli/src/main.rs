//! # TMCL CLI
//!
//! Command-line interface for TMCL stepper motor modules.
//!
//! ## 双模式架构
//!
//! ### One-shot 模式（脚本 / CI）
//!
//! ```bash
//! # 每个命令：连接 -> 执行 -> 断开
//! tmcl-cli --port /dev/ttyACM0 --address 1 move --absolute 500
//! tmcl-cli --port sim monitor --duration-secs 5
//! ```
//!
//! ### REPL 模式（调试）
//!
//! ```bash
//! $ tmcl-cli shell
//! tmcl> connect /dev/ttyACM0 1
//! tmcl> right 1000
//! tmcl> stop
//! tmcl> exit
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod connection;
mod events;
mod modes;

use commands::{MonitorCommand, MoveCommand, RotateCommand, list_ports};
use connection::ConnectionArgs;
use modes::oneshot::OneShotMode;
use modes::repl::run_repl;

/// TMCL CLI - 步进电机模块命令行工具
#[derive(Parser, Debug)]
#[command(name = "tmcl-cli")]
#[command(about = "Command-line interface for TMCL stepper motor modules", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 列出串口
    Ports,

    /// 查询当前位置与速度
    Position,

    /// 移动到绝对位置或按偏移移动
    Move {
        #[command(flatten)]
        args: MoveCommand,
    },

    /// 匀速旋转
    Rotate {
        #[command(flatten)]
        args: RotateCommand,
    },

    /// 停止电机
    Stop,

    /// 启动回零
    Home,

    /// 持续打印位置快照
    Monitor {
        #[command(flatten)]
        args: MonitorCommand,
    },

    /// 启动交互式 Shell（REPL 模式）
    Shell,
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tmcl_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ports => list_ports(),

        Commands::Position => OneShotMode::connect(&cli.connection)?.position(),

        Commands::Move { args } => {
            let target = args.target()?;
            OneShotMode::connect(&cli.connection)?.move_to(target)
        },

        Commands::Rotate { args } => {
            OneShotMode::connect(&cli.connection)?.rotate(args.direction, args.velocity)
        },

        Commands::Stop => OneShotMode::connect(&cli.connection)?.stop(),

        Commands::Home => OneShotMode::connect(&cli.connection)?.home(),

        Commands::Monitor { args } => {
            OneShotMode::connect(&cli.connection)?.monitor(args.duration())
        },

        Commands::Shell => {
            let config = cli.connection.resolve_config()?;
            run_repl(config, cli.connection.address)
        },
    }
}
