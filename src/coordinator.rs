//! Per-device command execution.
//!
//! Each configured device runs a sequential flow: resolve the command,
//! build the full wire command, hand it to the port, decode the raw
//! response, render the result. The engine is stateless so devices never
//! need to synchronise with each other.

use crate::format::{JsonFormat, SimpleFormat};
use crate::ports::test::TestPort;
use crate::ports::{Port, PortType};
use crate::prelude::*;
use crate::protocols::{get_protocol_definition, ProtocolHandler};

pub struct Coordinator {
    device: Device,
    protocol: DeviceProtocol,
    json: bool,
}

impl Coordinator {
    pub fn new(device: Device, json: bool) -> Result<Self> {
        let mut protocol = get_protocol_definition(device.protocol(), device.model())?;
        protocol.set_port_type(device.port());
        Ok(Self {
            device,
            protocol,
            json,
        })
    }

    pub fn device_name(&self) -> &str {
        self.device.name()
    }

    /// Run every configured command once. A failed command is reported
    /// and the flow moves on; garbage from one response must not take
    /// the device loop down.
    pub async fn run(&self, commands: &[String]) -> Result<()> {
        match self.device.port() {
            PortType::Test => {
                let mut port = TestPort::new();
                port.connect().await?;
                for code in commands {
                    // replay the command's own canned captures so offline
                    // runs produce output
                    if let Ok(resolved) = self.protocol.get_command_definition(code) {
                        port.prime(resolved.definition.test_responses());
                    }
                    if let Err(e) = self.run_command(&mut port, code).await {
                        warn!("{}: command {} failed: {}", self.device.name(), code, e);
                    }
                }
                port.disconnect().await?;
                Ok(())
            }
            other => bail!(
                "no {} port implementation is available in this build",
                other
            ),
        }
    }

    pub async fn run_command(&self, port: &mut dyn Port, code: &str) -> Result<()> {
        let resolved = self.protocol.get_command_definition(code)?;
        let full_command = self.protocol.get_full_command(code)?;
        info!(
            "{}: sending {} as {:02x?}",
            self.device.name(),
            resolved.code,
            full_command
        );

        let raw_response = port.send_and_receive(&full_command).await?;
        let result =
            self.protocol
                .decode_response(&raw_response, &resolved, self.device.overrides());

        if self.json {
            println!("{}", JsonFormat::format(self.device.name(), &result));
        } else {
            for line in SimpleFormat::format(&result) {
                println!("{}: {}", self.device.name(), line);
            }
        }
        Ok(())
    }
}
