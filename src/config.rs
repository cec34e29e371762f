use std::collections::HashMap;

use serde::Deserialize;

use crate::ports::PortType;
use crate::prelude::*;
use crate::protocols::{get_protocol_definition, ProtocolHandler};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "Vec::new")]
    pub devices: Vec<Device>,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,
}

// Device {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Device {
    pub name: String,
    pub protocol: String,
    pub model: Option<String>,

    #[serde(default = "Config::default_port")]
    pub port: PortType,

    #[serde(default = "Vec::new")]
    pub commands: Vec<String>,

    /// Execution-time overrides passed to every command on this device,
    /// e.g. `temperature: F`.
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

impl Device {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn port(&self) -> PortType {
        self.port
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn overrides(&self) -> Option<&HashMap<String, String>> {
        if self.overrides.is_empty() {
            None
        } else {
            Some(&self.overrides)
        }
    }
} // }}}

impl Config {
    pub fn new(config_file: String) -> Result<Self> {
        let content = std::fs::read_to_string(&config_file)
            .map_err(|err| anyhow!("error reading config file {}: {}", config_file, err))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|err| anyhow!("error parsing config file {}: {}", config_file, err))?;
        config.validate()?;
        Ok(config)
    }

    pub fn loglevel(&self) -> &str {
        &self.loglevel
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Fail fast on unknown protocols and device/port combinations the
    /// protocol does not support.
    pub fn validate(&self) -> Result<()> {
        for device in &self.devices {
            let protocol = get_protocol_definition(device.protocol(), device.model())
                .map_err(|err| anyhow!("device '{}': {}", device.name(), err))?;
            if !protocol.supported_ports().contains(&device.port()) {
                bail!(
                    "device '{}': protocol {} does not support {} ports",
                    device.name(),
                    protocol.protocol_id(),
                    device.port()
                );
            }
        }
        Ok(())
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }

    fn default_port() -> PortType {
        PortType::Test
    }
}
