//! Serial port handling
//!
//! Port discovery and async port opening for the controller link.

use std::collections::BTreeMap;
#[cfg(target_os = "linux")]
use std::fs;

use serialport::{SerialPortInfo, SerialPortType};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::info;

use super::ProtocolError;

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// OS name of the port, `/dev/ttyUSB0` or `COM5`
    pub name: String,
    /// USB vendor id
    pub vid: Option<u16>,
    /// USB product id
    pub pid: Option<u16>,
    /// USB product string
    pub product: Option<String>,
}

impl PortInfo {
    fn bare(name: String) -> Self {
        Self {
            name,
            vid: None,
            pid: None,
            product: None,
        }
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb) => Self {
                name: info.port_name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                product: usb.product,
            },
            _ => Self::bare(info.port_name),
        }
    }
}

/// Ordering class of a port name: CDC-ACM adapters first, then USB-serial,
/// then everything else
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum PortClass {
    Acm,
    UsbSerial,
    Other,
}

fn port_sort_key(name: &str) -> (PortClass, usize, &str) {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let numbered = |prefix: &str| {
        base.strip_prefix(prefix)
            .map(|n| n.parse::<usize>().unwrap_or(usize::MAX))
    };
    if let Some(n) = numbered("ttyACM") {
        (PortClass::Acm, n, base)
    } else if let Some(n) = numbered("ttyUSB") {
        (PortClass::UsbSerial, n, base)
    } else {
        (PortClass::Other, numbered("COM").unwrap_or(0), base)
    }
}

/// Linux device nodes that enumeration can miss for some USB adapters
#[cfg(target_os = "linux")]
fn dev_nodes() -> Vec<String> {
    let Ok(entries) = fs::read_dir("/dev") else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with("ttyACM") || name.starts_with("ttyUSB"))
        .map(|name| format!("/dev/{name}"))
        .collect()
}

#[cfg(not(target_os = "linux"))]
fn dev_nodes() -> Vec<String> {
    Vec::new()
}

/// Every serial port the controller could be on, in a stable order
pub fn list_ports() -> Vec<PortInfo> {
    let mut found: BTreeMap<String, PortInfo> = serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(|info| {
            let port = PortInfo::from(info);
            (port.name.clone(), port)
        })
        .collect();
    for node in dev_nodes() {
        found
            .entry(node.clone())
            .or_insert_with(|| PortInfo::bare(node));
    }

    let mut ports: Vec<PortInfo> = found.into_values().collect();
    ports.sort_by(|a, b| port_sort_key(&a.name).cmp(&port_sort_key(&b.name)));
    ports
}

/// Open the controller link: 8N1, no flow control
pub fn open_port(name: &str, baud_rate: u32) -> Result<SerialStream, ProtocolError> {
    let stream = tokio_serial::new(name, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|e| match e.kind {
            tokio_serial::ErrorKind::NoDevice => ProtocolError::PortNotFound(name.to_string()),
            _ => ProtocolError::SerialError(e.to_string()),
        })?;
    info!("serial port {} open at {} baud", name, baud_rate);
    Ok(stream)
}
