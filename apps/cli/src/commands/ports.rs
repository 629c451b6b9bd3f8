//! 串口枚举

use anyhow::Result;

const NO_PORTS_HINT: &str = "💡 Hint: use --port sim to connect to the built-in simulator";

/// 列出可用串口
pub fn list_ports() -> Result<()> {
    let ports = tmcl_serial::available_ports()?;
    println!("Found {} serial ports", ports.len());
    for port in &ports {
        println!("  {}", port);
    }
    if ports.is_empty() {
        println!("{}", NO_PORTS_HINT);
    }
    Ok(())
}
