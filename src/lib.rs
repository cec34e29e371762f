// Module declarations for the application's core components
pub mod config;      // Configuration management
pub mod coordinator; // Per-device command execution
pub mod error;       // Protocol engine error types
pub mod format;      // Result rendering
pub mod options;     // Command line options parsing
pub mod ports;       // Transport boundary and test port
pub mod prelude;     // Common imports and types
pub mod protocols;   // Protocol tables and the decode engine

// Get the package version from Cargo.toml
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::coordinator::Coordinator;
use crate::prelude::*;
use crate::protocols::{get_protocol_definition, ProtocolHandler, SUPPORTED_PROTOCOLS};

/// Print the protocol registry.
pub fn list_protocols() -> Result<()> {
    println!("Supported protocols");
    for name in SUPPORTED_PROTOCOLS {
        let protocol = get_protocol_definition(name, None)?;
        println!(
            "{name}: {} ({} commands)",
            protocol.protocol_id(),
            protocol.command_definitions().len()
        );
    }
    Ok(())
}

/// Print the commands a protocol understands, with aliases and help.
pub fn list_commands(protocol_name: &str) -> Result<()> {
    let protocol = get_protocol_definition(protocol_name, None)?;
    println!("Commands in protocol: {}", protocol.protocol_id());
    let mut definitions: Vec<_> = protocol.command_definitions().values().collect();
    definitions.sort_by(|a, b| a.code.cmp(&b.code));
    for definition in definitions {
        println!(
            "{} - {}{}",
            definition.code, definition.description, definition.help_text
        );
    }
    Ok(())
}

/// Main application flow: load the config, then run each device's
/// commands once.
pub async fn app(options: Options) -> Result<()> {
    if options.list_protocols {
        return list_protocols();
    }
    if let Some(protocol_name) = &options.list_commands {
        return list_commands(protocol_name);
    }

    info!(
        "starting powerdev-bridge {} with config file: {}",
        CARGO_PKG_VERSION, options.config_file
    );
    let config = Config::new(options.config_file.clone())?;

    // tighten or loosen the default filter once the config is loaded
    match config.loglevel().parse::<log::LevelFilter>() {
        Ok(level) => log::set_max_level(level),
        Err(_) => warn!("unknown loglevel '{}', keeping default", config.loglevel()),
    }

    for device in config.devices() {
        let coordinator = Coordinator::new(device.clone(), options.json)?;
        let commands = match &options.adhoc_command {
            Some(adhoc) => vec![adhoc.clone()],
            None => device.commands().to_vec(),
        };
        if commands.is_empty() {
            warn!("{}: no commands configured, skipping", device.name());
            continue;
        }
        if let Err(e) = coordinator.run(&commands).await {
            error!("{}: device run failed: {}", coordinator.device_name(), e);
        }
    }

    Ok(())
}
