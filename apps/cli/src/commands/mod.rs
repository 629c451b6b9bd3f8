//! 命令定义

pub mod monitor;
pub mod r#move;
pub mod ports;
pub mod rotate;

pub use monitor::MonitorCommand;
pub use r#move::{MoveCommand, MoveTarget};
pub use ports::list_ports;
pub use rotate::{Direction, RotateCommand};
