//! Printer configuration and status

use crab_printer::{Endpoint, PaperSize, TextEncoding, tspl};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which physical output a job targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterRole {
    Label,
    Bill,
}

impl PrinterRole {
    pub const ALL: [PrinterRole; 2] = [PrinterRole::Label, PrinterRole::Bill];

    pub fn as_str(self) -> &'static str {
        match self {
            PrinterRole::Label => "label",
            PrinterRole::Bill => "bill",
        }
    }

    /// Slot index for per-role arrays
    pub(crate) fn index(self) -> usize {
        match self {
            PrinterRole::Label => 0,
            PrinterRole::Bill => 1,
        }
    }
}

impl fmt::Display for PrinterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    #[default]
    Network,
    Usb,
    Serial,
}

/// 打印机配置 (每个角色一份)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrinterConfig {
    pub connection_type: ConnectionType,

    // network
    #[serde(alias = "IP", alias = "ip")]
    pub host: String,
    pub port: u16,

    // usb
    pub usb_device: String,

    // serial
    pub serial_port: String,
    pub baud_rate: u32,

    // label stock
    pub label_width_mm: f32,
    pub label_height_mm: f32,
    pub label_gap_mm: f32,
    pub dpi: u32,

    // bill paper
    pub paper_size: PaperSize,
    pub text_encoding: TextEncoding,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            connection_type: ConnectionType::Network,
            host: String::new(),
            port: 9100,
            usb_device: String::new(),
            serial_port: String::new(),
            baud_rate: 9600,
            label_width_mm: 40.0,
            label_height_mm: 30.0,
            label_gap_mm: 2.0,
            dpi: 203,
            paper_size: PaperSize::Mm80,
            text_encoding: TextEncoding::Gbk,
        }
    }
}

impl PrinterConfig {
    /// Network printer at host:9100
    pub fn network(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Resolve the transport endpoint
    ///
    /// Fails with a description of the missing field when the address
    /// required by `connection_type` is empty.
    pub fn endpoint(&self) -> Result<Endpoint, String> {
        match self.connection_type {
            ConnectionType::Network => {
                let host = self.host.trim();
                if host.is_empty() {
                    return Err("network printer has no host configured".to_string());
                }
                Ok(Endpoint::Network {
                    host: host.to_string(),
                    port: if self.port == 0 { 9100 } else { self.port },
                })
            }
            ConnectionType::Usb => {
                let device = self.usb_device.trim();
                if device.is_empty() {
                    return Err("usb printer has no device configured".to_string());
                }
                Ok(Endpoint::Usb {
                    device: device.to_string(),
                })
            }
            ConnectionType::Serial => {
                let port = self.serial_port.trim();
                if port.is_empty() {
                    return Err("serial printer has no port configured".to_string());
                }
                Ok(Endpoint::Serial {
                    port: port.to_string(),
                    baud_rate: if self.baud_rate == 0 { 9600 } else { self.baud_rate },
                })
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        self.endpoint().is_ok()
    }

    /// Label width in printer dots
    pub fn label_dots(&self) -> u32 {
        tspl::mm_to_dots(self.label_width_mm, self.dpi)
    }
}

/// Advisory connection state per role, never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Unknown,
    Connected,
    Disconnected,
    Testing,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_host_is_invalid() {
        let cfg = PrinterConfig::default();
        assert!(!cfg.is_valid());
        assert!(cfg.endpoint().unwrap_err().contains("host"));
    }

    #[test]
    fn test_required_field_follows_connection_type() {
        let cfg = PrinterConfig {
            connection_type: ConnectionType::Usb,
            host: "10.0.0.9".into(),
            ..Default::default()
        };
        assert!(!cfg.is_valid());

        let cfg = PrinterConfig {
            connection_type: ConnectionType::Serial,
            serial_port: "/dev/ttyS0".into(),
            baud_rate: 0,
            ..Default::default()
        };
        assert_eq!(
            cfg.endpoint().unwrap(),
            Endpoint::Serial {
                port: "/dev/ttyS0".into(),
                baud_rate: 9600
            }
        );
    }

    #[test]
    fn test_accepts_legacy_ip_field() {
        let cfg: PrinterConfig =
            serde_json::from_str(r#"{"connectionType":"network","IP":"192.168.1.20"}"#).unwrap();
        assert_eq!(cfg.host, "192.168.1.20");
        assert_eq!(cfg.port, 9100);
    }

    #[test]
    fn test_label_dots() {
        let cfg = PrinterConfig::default();
        assert_eq!(cfg.label_dots(), 320);
    }
}
