//! 状态事件输出

use tmcl_driver::StatusEvent;

/// 打印一个状态事件
///
/// `show_positions` 为 false 时忽略位置快照。
pub fn print_event(event: &StatusEvent, show_positions: bool) {
    match event {
        StatusEvent::Log(line) => println!("{}", line),
        StatusEvent::Position(snapshot) if show_positions => println!("{}", snapshot),
        StatusEvent::Position(_) => {},
        StatusEvent::StateChanged(state) => tracing::debug!("Connection state: {}", state),
        StatusEvent::ConnectionLost(reason) => eprintln!("⚠️  Connection lost: {}", reason),
    }
}
