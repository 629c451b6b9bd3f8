//! 串口枚举
//!
//! 对 `serialport::available_ports` 的薄封装。结果仅供操作者参考：
//! 列出的端口可能在打开前消失，是否存在以打开结果为准。

use crate::SerialError;
use serialport::SerialPortType;

/// 发现的串口设备
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// 系统设备名（如 "/dev/ttyACM0"、"COM3"）
    pub name: String,
    /// 设备描述；系统未提供有效信息时为空
    pub description: String,
}

impl std::fmt::Display for PortInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.description.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} ({})", self.name, self.description)
        }
    }
}

fn describe(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let vendor = usb.manufacturer.as_deref().unwrap_or("");
            let product = usb.product.as_deref().unwrap_or("");
            let label = format!("{} {}", vendor, product).trim().to_string();
            if label.is_empty() {
                format!("USB {:04x}:{:04x}", usb.vid, usb.pid)
            } else {
                label
            }
        },
        SerialPortType::PciPort => "PCI".to_string(),
        SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        SerialPortType::Unknown => String::new(),
    }
}

/// 列出系统报告的串口
pub fn available_ports() -> Result<Vec<PortInfo>, SerialError> {
    let ports = serialport::available_ports()?;
    tracing::debug!("Found {} serial ports", ports.len());
    Ok(ports
        .into_iter()
        .map(|port| PortInfo {
            description: describe(&port.port_type),
            name: port.port_name,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_non_usb() {
        assert_eq!(describe(&SerialPortType::PciPort), "PCI");
        assert_eq!(describe(&SerialPortType::Unknown), "");
    }

    #[test]
    fn test_port_info_display() {
        let bare = PortInfo {
            name: "/dev/ttyS0".to_string(),
            description: String::new(),
        };
        assert_eq!(bare.to_string(), "/dev/ttyS0");

        let usb = PortInfo {
            name: "/dev/ttyACM0".to_string(),
            description: "Trinamic TMCM-1110".to_string(),
        };
        assert_eq!(usb.to_string(), "/dev/ttyACM0 (Trinamic TMCM-1110)");
    }
}
