//! 运行模式
//!
//! 支持两种模式：
//! - One-shot 模式：每次命令独立连接
//! - REPL 模式：交互式 Shell，连接跨命令保持

pub mod oneshot;
pub mod repl;
