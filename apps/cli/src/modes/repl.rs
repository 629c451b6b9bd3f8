//! REPL 模式（交互式 Shell）
//!
//! 专用输入线程 + 通道：rustyline 在输入线程上阻塞读取，
//! 主线程同时等待用户输入与驱动的状态事件。

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, bounded, select};
use rustyline::Editor;
use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use tmcl_driver::{
    ChannelSink, ConnectionConfig, ConnectionManager, PositionSnapshot, StatusEvent,
};

use crate::commands::list_ports;
use crate::connection;
use crate::events::print_event;

/// Ctrl+C 在输入线程中被转换成这条命令
const INTERRUPT: &str = "\u{3}";

/// 命令处理后的去向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// REPL 会话（跨命令保持连接）
pub struct ReplSession {
    manager: ConnectionManager,
    events: Receiver<StatusEvent>,
    last_snapshot: Option<PositionSnapshot>,
    default_address: u32,
}

impl ReplSession {
    /// 创建新会话
    pub fn new(config: ConnectionConfig, default_address: u32) -> Self {
        let (sink, events) = ChannelSink::new();
        Self {
            manager: connection::manager(Arc::new(sink), config),
            events,
            last_snapshot: None,
            default_address,
        }
    }

    /// 状态事件接收端
    pub fn events(&self) -> Receiver<StatusEvent> {
        self.events.clone()
    }

    /// 处理一个状态事件
    ///
    /// 位置快照只缓存不打印；连接丢失时自动完成断开。
    pub fn on_event(&mut self, event: StatusEvent) {
        match &event {
            StatusEvent::Position(snapshot) => self.last_snapshot = Some(*snapshot),
            StatusEvent::ConnectionLost(_) => {
                print_event(&event, false);
                if self.manager.session().is_ok() {
                    if let Err(e) = self.manager.disconnect() {
                        eprintln!("❌ Error: {}", e);
                    }
                }
                self.last_snapshot = None;
            },
            _ => print_event(&event, false),
        }
    }

    /// 打印所有已到达的事件
    pub fn drain_events(&mut self) {
        let pending: Vec<_> = self.events.try_iter().collect();
        for event in pending {
            self.on_event(event);
        }
    }

    /// 处理一行输入
    pub fn handle_command(&mut self, line: &str) -> Result<Flow> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = parts.first() else {
            return Ok(Flow::Continue);
        };

        match command {
            "connect" => {
                let port = parts.get(1).copied().context("Usage: connect <port> [address]")?;
                let address = match parts.get(2) {
                    Some(_) => parse_arg::<u32>(&parts, 2, "address")?,
                    None => self.default_address,
                };
                self.manager.connect(port, address)?;
            },
            "disconnect" => {
                self.manager.disconnect()?;
                self.last_snapshot = None;
            },
            "left" => {
                let velocity = parse_arg_or(&parts, 1, "velocity", 1000)?;
                self.manager.session()?.rotate_left(velocity)?;
            },
            "right" => {
                let velocity = parse_arg_or(&parts, 1, "velocity", 1000)?;
                self.manager.session()?.rotate_right(velocity)?;
            },
            "stop" => self.manager.session()?.stop()?,
            "abs" => {
                let position = parse_arg(&parts, 1, "position")?;
                self.manager.session()?.move_absolute(position)?;
            },
            "rel" => {
                let offset = parse_arg(&parts, 1, "offset")?;
                self.manager.session()?.move_relative(offset)?;
            },
            "home" => self.manager.session()?.reference_search()?,
            "pos" => {
                let status = self.manager.session()?.query_status()?;
                println!("📍 Position: {} steps, speed: {} steps/s", status.position, status.speed);
            },
            "status" => self.print_status(),
            "ports" => list_ports()?,
            "help" => print_help(),
            "exit" | "quit" => return Ok(Flow::Exit),
            INTERRUPT => self.interrupt(),
            _ => anyhow::bail!("Unknown command: {}", command),
        }

        Ok(Flow::Continue)
    }

    /// Ctrl+C：已连接时停止电机
    fn interrupt(&mut self) {
        if let Ok(session) = self.manager.session() {
            eprintln!("🛑 Stopping motor...");
            if let Err(e) = session.stop() {
                eprintln!("❌ Error: {}", e);
            }
        }
    }

    fn print_status(&self) {
        println!("📊 State: {}", self.manager.state());
        if let Some(port) = self.manager.port() {
            println!("   Port:  {}", port);
        }
        if let Ok(session) = self.manager.session() {
            println!("   Module: {} (motor {})", session.address(), session.motor());
            println!("   Link:   {}", session.metrics());
        }
        match &self.last_snapshot {
            Some(snapshot) => println!("   Last:   {}", snapshot),
            None => println!("   Last:   -"),
        }
    }
}

fn parse_arg<T: FromStr>(parts: &[&str], index: usize, name: &str) -> Result<T> {
    let raw = parts
        .get(index)
        .with_context(|| format!("Missing <{}>", name))?;
    raw.parse::<T>()
        .map_err(|_| anyhow::anyhow!("Invalid {}: {}", name, raw))
}

fn parse_arg_or<T: FromStr>(parts: &[&str], index: usize, name: &str, default: T) -> Result<T> {
    match parts.get(index) {
        Some(_) => parse_arg(parts, index, name),
        None => Ok(default),
    }
}

/// REPL 输入（专用输入线程）
pub struct ReplInput {
    command_rx: Receiver<String>,
    _input_thread: thread::JoinHandle<Result<()>>,
}

impl ReplInput {
    /// 创建专用输入线程（保留历史记录）
    pub fn new() -> Self {
        let (command_tx, command_rx) = bounded::<String>(10);

        let input_thread = thread::spawn(move || {
            use rustyline::history::DefaultHistory;

            let mut rl = Editor::<(), DefaultHistory>::new()
                .map_err(|e| anyhow::anyhow!("Failed to initialize readline: {}", e))?;

            let history_path = ".tmcl_history";
            rl.load_history(history_path).ok(); // 首次运行没有历史

            println!("TMCL CLI v{} - interactive shell", env!("CARGO_PKG_VERSION"));
            println!("Type 'help' for commands, 'exit' to quit");
            println!();

            loop {
                match rl.readline("tmcl> ") {
                    Ok(line) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            continue;
                        }

                        let exit = line == "exit" || line == "quit";
                        let _ = rl.add_history_entry(line.clone());
                        if command_tx.send(line).is_err() || exit {
                            break;
                        }
                    },
                    Err(rustyline::error::ReadlineError::Interrupted) => {
                        println!("^C");
                        let _ = command_tx.send(INTERRUPT.to_string());
                    },
                    Err(rustyline::error::ReadlineError::Eof) => break,
                    Err(err) => {
                        eprintln!("Error: {:?}", err);
                        break;
                    },
                }
            }

            rl.save_history(history_path).ok();
            Ok(())
        });

        Self {
            command_rx,
            _input_thread: input_thread,
        }
    }

    pub fn commands(&self) -> &Receiver<String> {
        &self.command_rx
    }
}

/// 运行 REPL 模式
pub fn run_repl(config: ConnectionConfig, default_address: u32) -> Result<()> {
    let mut session = ReplSession::new(config, default_address);
    let events = session.events();
    let input = ReplInput::new();

    println!("💡 Use 'connect <port> [address]' to connect ('connect sim' for the simulator)");

    loop {
        select! {
            recv(input.commands()) -> line => {
                // 输入线程结束（Ctrl+D）
                let Ok(line) = line else { break };

                match session.handle_command(&line) {
                    Ok(Flow::Exit) => break,
                    Ok(Flow::Continue) => {},
                    Err(err) => {
                        eprintln!("❌ Error: {}", err);
                        print_help_hint(&line);
                    },
                }
                session.drain_events();
            },
            recv(events) -> event => {
                if let Ok(event) = event {
                    session.on_event(event);
                }
            },
        }
    }

    if session.manager.session().is_ok() {
        session.manager.disconnect()?;
        session.drain_events();
    }
    println!("👋 Bye");
    Ok(())
}

/// 打印帮助信息
fn print_help() {
    println!("Commands:");
    println!("  connect <port> [address]   Connect (port 'sim' = simulator)");
    println!("  disconnect                 Disconnect");
    println!("  left [velocity]            Rotate left (default 1000 steps/s)");
    println!("  right [velocity]           Rotate right (default 1000 steps/s)");
    println!("  stop                       Stop the motor");
    println!("  abs <position>             Move to absolute position");
    println!("  rel <offset>               Move by relative offset");
    println!("  home                       Start reference search");
    println!("  pos                        Query position and speed");
    println!("  status                     Connection state and last snapshot");
    println!("  ports                      List serial ports");
    println!("  help                       Show this help");
    println!("  exit / quit                Quit");
    println!();
    println!("Keys:");
    println!("  Ctrl+C                     Stop the motor");
    println!("  Ctrl+D                     Quit");
    println!();
}

/// 提供基于错误的帮助提示
fn print_help_hint(command: &str) {
    if command.starts_with("connect") {
        eprintln!("💡 Hint: 'connect /dev/ttyACM0 1' or 'connect sim'");
    } else if command.starts_with("abs") || command.starts_with("rel") {
        eprintln!("💡 Hint: 'abs 500' or 'rel -200'");
    } else {
        eprintln!("💡 Hint: type 'help' for all commands");
    }
}
