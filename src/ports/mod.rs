//! Transport boundary.
//!
//! The decode engine never talks to a device directly: a [`Port`] hands
//! raw bytes back and forth, and implementations own connection
//! management, retry and chunked writes. Only the canned-response test
//! port ships here; serial/USB/BLE ports plug in behind the same trait.

pub mod test;

use async_trait::async_trait;
use serde::Deserialize;

use crate::prelude::Result;

/// The kinds of link a protocol may run over. Checked against the
/// protocol's supported set when a device is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortType {
    Test,
    Serial,
    Usb,
    Ble,
}

impl std::fmt::Display for PortType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PortType::Test => "test",
            PortType::Serial => "serial",
            PortType::Usb => "usb",
            PortType::Ble => "ble",
        };
        write!(f, "{name}")
    }
}

/// A device link. `send_and_receive` is the only call the command flow
/// makes once connected.
#[async_trait]
pub trait Port: Send {
    async fn connect(&mut self) -> Result<bool>;

    fn is_connected(&self) -> bool;

    async fn disconnect(&mut self) -> Result<()>;

    async fn send_and_receive(&mut self, full_command: &[u8]) -> Result<Vec<u8>>;
}
