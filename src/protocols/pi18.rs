//! PI18 protocol: same CRC16 as PI30 but `^Plll`/`^Slll` framed commands
//! and `^Dlll` framed responses, with its own `^1`/`^0` ack tokens.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::error::{Error, Result};
use crate::ports::PortType;
use crate::protocols::command_definition::{
    CommandCategory, CommandDefinition, CommandType, ResultShape,
};
use crate::protocols::crc::crc_pi30;
use crate::protocols::reading_definition::{
    ReadingDefinition, ReadingKind, ResponseKind,
};
use crate::protocols::template::Template;
use crate::protocols::{build_command_map, ProtocolHandler};

/// PI18 protocol handler.
#[derive(Debug, Clone)]
pub struct Pi18 {
    commands: HashMap<String, Arc<CommandDefinition>>,
    port_type: PortType,
}

impl Pi18 {
    pub fn new() -> Result<Self> {
        let mut definitions = query_commands()?;
        definitions.extend(setter_commands()?);
        Ok(Self {
            commands: build_command_map("PI18", definitions)?,
            port_type: PortType::Test,
        })
    }
}

impl ProtocolHandler for Pi18 {
    fn protocol_id(&self) -> &str {
        "PI18"
    }

    fn command_definitions(&self) -> &HashMap<String, Arc<CommandDefinition>> {
        &self.commands
    }

    fn supported_ports(&self) -> Vec<PortType> {
        vec![PortType::Test, PortType::Serial, PortType::Usb]
    }

    fn port_type(&self) -> PortType {
        self.port_type
    }

    fn set_port_type(&mut self, port_type: PortType) {
        self.port_type = port_type;
    }

    fn id_command(&self) -> Option<&str> {
        Some("ID")
    }

    /// Full command is `^PlllCCC` (query) or `^SlllCCC` (setter), where
    /// lll is the frame length including the CRC and terminator.
    fn get_full_command(&self, code: &str) -> Result<Vec<u8>> {
        let resolved = self.get_command_definition(code)?;
        let prefix = match resolved.definition.command_type {
            CommandType::Setter => "^S",
            _ => "^P",
        };
        let length = resolved.code.len() + 3;
        let mut full_command = format!("{prefix}{length:03}{}", resolved.code).into_bytes();
        let (crc_high, crc_low) = crc_pi30(&full_command);
        full_command.extend_from_slice(&[crc_high, crc_low, b'\r']);
        debug!("full command: {:02x?}", full_command);
        Ok(full_command)
    }

    fn check_crc(&self, response: &[u8], _definition: &CommandDefinition) -> Result<()> {
        if response.starts_with(b"^D") || response.starts_with(b"^1") || response.starts_with(b"^0")
        {
            let (calc_high, calc_low) = crc_pi30(&response[..response.len() - 3]);
            let crc_high = response[response.len() - 3];
            let crc_low = response[response.len() - 2];
            if (calc_high, calc_low) != (crc_high, crc_low) {
                return Err(Error::InvalidCrc {
                    got: format!("\\x{crc_high:02x}\\x{crc_low:02x}"),
                    calculated: format!("\\x{calc_high:02x}\\x{calc_low:02x}"),
                });
            }
            return Ok(());
        }
        Err(Error::InvalidResponse(
            "response starts with invalid character - crc check fails".into(),
        ))
    }

    fn trim_response(&self, response: &[u8], _definition: &CommandDefinition) -> Vec<u8> {
        let mut payload = response;
        if payload.starts_with(b"^D") && payload.len() >= 5 {
            // drop ^Dlll where lll is the frame length
            payload = &payload[5..];
        }
        if payload.ends_with(b"\r") && payload.len() >= 3 {
            // has a checksum, drop the last three bytes
            payload = &payload[..payload.len() - 3];
        }
        if payload.starts_with(b"(") {
            payload = &payload[1..];
        }
        payload.to_vec()
    }
}

fn query_commands() -> Result<Vec<CommandDefinition>> {
    let div10 = Template::parse("r/10")?;
    Ok(vec![
        CommandDefinition::new("PI", "Protocol ID inquiry", ResultShape::Single)
            .help(" -- queries the protocol ID")
            .category(CommandCategory::Info)
            .command_type(CommandType::Query)
            .reading(ReadingDefinition::message("Protocol ID"))
            .test_response(b"^D00518\x3b\x03\r")
            .build()?,
        CommandDefinition::new("ID", "Device Serial Number inquiry", ResultShape::Single)
            .aliases(&["get_id", "default"])
            .help(" -- queries the device serial number")
            .category(CommandCategory::Info)
            .command_type(CommandType::Query)
            .reading(ReadingDefinition::new(
                ReadingKind::Message,
                "Serial Number",
                ResponseKind::String,
            ))
            .test_response(b"^D0091234\x83\xf7\r")
            .build()?,
        CommandDefinition::new("ET", "Total PV Generated Energy Inquiry", ResultShape::Single)
            .command_type(CommandType::Query)
            .reading(
                ReadingDefinition::new(
                    ReadingKind::WattHours,
                    "Total PV Generated Energy",
                    ResponseKind::Int,
                )
                .icon("mdi:solar-power")
                .device_class("energy")
                .state_class("total"),
            )
            .test_response(b"^D01105580051\x0b\x9f\r")
            .build()?,
        CommandDefinition::new("EY", "Yearly PV Generated Energy Inquiry", ResultShape::Single)
            .command_type(CommandType::Query)
            .regex("EY(\\d\\d\\d\\d)$")
            .readings(vec![
                ReadingDefinition::new(
                    ReadingKind::WattHours,
                    "PV Generated Energy for Year",
                    ResponseKind::Int,
                )
                .icon("mdi:counter")
                .device_class("energy")
                .state_class("total"),
                ReadingDefinition::new(ReadingKind::Year, "Year", ResponseKind::InfoFromCommand)
                    .slice(2, 6),
            ])
            .test_response(b"^D01105580051\x0b\x9f\r")
            .build()?,
        CommandDefinition::new("MOD", "Mode inquiry", ResultShape::Single)
            .command_type(CommandType::Query)
            .reading(
                ReadingDefinition::new(ReadingKind::Message, "Device Mode", ResponseKind::Option)
                    .options_map(&[
                        ("00", "Power on"),
                        ("01", "Standby"),
                        ("02", "Bypass"),
                        ("03", "Battery"),
                        ("04", "Fault"),
                        ("05", "Hybrid mode(Line mode, Grid mode)"),
                    ]),
            )
            .test_response(b"^D00505\xd9\x9f\r")
            .build()?,
        CommandDefinition::new(
            "MCHGCR",
            "Max Charging Current Options inquiry",
            ResultShape::Multivalued,
        )
        .help(" -- queries the maximum charging current setting of the Inverter")
        .command_type(CommandType::Query)
        .reading(ReadingDefinition::new(
            ReadingKind::MessageAmps,
            "Max Charging Current Options",
            ResponseKind::String,
        ))
        .test_response(b"^D034010,020,030,040,050,060,070,080\x16\x31\r")
        .build()?,
        CommandDefinition::new("VFW", "Device CPU version inquiry", ResultShape::CommaDelimited)
            .command_type(CommandType::Query)
            .readings(vec![
                ReadingDefinition::message("Main CPU Version"),
                ReadingDefinition::message("Slave 1 CPU Version"),
                ReadingDefinition::message("Slave 2 CPU Version"),
            ])
            .test_response(b"^D02005220,00000,00000\x3e\xf8\r")
            .build()?,
        gs(&div10)?,
    ])
}

// {{{ GS
fn gs(div10: &Template) -> Result<CommandDefinition> {
    CommandDefinition::new("GS", "General Status Parameters inquiry", ResultShape::CommaDelimited)
        .command_type(CommandType::Query)
        .readings(vec![
            ReadingDefinition::new(ReadingKind::Volts, "AC Input Voltage", ResponseKind::TemplateInt)
                .template(div10.clone())
                .icon("mdi:transmission-tower-export")
                .device_class("voltage"),
            ReadingDefinition::new(
                ReadingKind::Frequency,
                "AC Input Frequency",
                ResponseKind::TemplateInt,
            )
            .template(div10.clone())
            .icon("mdi:current-ac")
            .device_class("frequency"),
            ReadingDefinition::new(
                ReadingKind::Volts,
                "AC Output Voltage",
                ResponseKind::TemplateInt,
            )
            .template(div10.clone())
            .icon("mdi:transmission-tower-export")
            .device_class("voltage"),
            ReadingDefinition::new(
                ReadingKind::Frequency,
                "AC Output Frequency",
                ResponseKind::TemplateInt,
            )
            .template(div10.clone())
            .icon("mdi:current-ac")
            .device_class("frequency"),
            ReadingDefinition::new(
                ReadingKind::ApparentPower,
                "AC Output Apparent Power",
                ResponseKind::Int,
            )
            .icon("mdi:power-plug")
            .device_class("apparent_power"),
            ReadingDefinition::new(ReadingKind::Watts, "AC Output Active Power", ResponseKind::Int)
                .icon("mdi:power-plug")
                .device_class("power")
                .state_class("measurement"),
            ReadingDefinition::new(ReadingKind::Percentage, "AC Output Load", ResponseKind::Int)
                .icon("mdi:brightness-percent"),
            ReadingDefinition::new(ReadingKind::Volts, "Battery Voltage", ResponseKind::TemplateInt)
                .template(div10.clone())
                .icon("mdi:battery-outline")
                .device_class("voltage"),
            ReadingDefinition::new(
                ReadingKind::Volts,
                "Battery Voltage from SCC",
                ResponseKind::TemplateInt,
            )
            .template(div10.clone())
            .icon("mdi:battery-outline")
            .device_class("voltage"),
            ReadingDefinition::new(
                ReadingKind::Volts,
                "Battery Voltage from SCC2",
                ResponseKind::TemplateInt,
            )
            .template(div10.clone())
            .icon("mdi:battery-outline")
            .device_class("voltage"),
            ReadingDefinition::new(
                ReadingKind::Current,
                "Battery Discharge Current",
                ResponseKind::Int,
            )
            .icon("mdi:battery-negative")
            .device_class("current"),
            ReadingDefinition::new(
                ReadingKind::Current,
                "Battery Charging Current",
                ResponseKind::Int,
            )
            .icon("mdi:current-dc")
            .device_class("current"),
            ReadingDefinition::new(ReadingKind::Percentage, "Battery Capacity", ResponseKind::Int)
                .icon("mdi:brightness-percent")
                .device_class("battery"),
            ReadingDefinition::new(
                ReadingKind::Temperature,
                "Inverter heat sink temperature",
                ResponseKind::Int,
            )
            .icon("mdi:details")
            .device_class("temperature"),
            ReadingDefinition::new(
                ReadingKind::Temperature,
                "MPPT1 charger temperature",
                ResponseKind::Int,
            )
            .icon("mdi:details")
            .device_class("temperature"),
            ReadingDefinition::new(
                ReadingKind::Temperature,
                "MPPT2 charger temperature",
                ResponseKind::Int,
            )
            .icon("mdi:details")
            .device_class("temperature"),
            ReadingDefinition::new(ReadingKind::Watts, "MPPT1 Input Power", ResponseKind::Int)
                .icon("mdi:solar-power")
                .device_class("power")
                .state_class("measurement"),
            ReadingDefinition::new(ReadingKind::Watts, "MPPT2 Input Power", ResponseKind::Int)
                .icon("mdi:solar-power")
                .device_class("power")
                .state_class("measurement"),
            ReadingDefinition::new(
                ReadingKind::Volts,
                "MPPT1 Input Voltage",
                ResponseKind::TemplateInt,
            )
            .template(div10.clone())
            .icon("mdi:solar-power")
            .device_class("voltage"),
            ReadingDefinition::new(
                ReadingKind::Volts,
                "MPPT2 Input Voltage",
                ResponseKind::TemplateInt,
            )
            .template(div10.clone())
            .icon("mdi:solar-power")
            .device_class("voltage"),
            ReadingDefinition::new(
                ReadingKind::Message,
                "Setting value configuration state",
                ResponseKind::Option,
            )
            .options_map(&[("0", "Nothing changed"), ("1", "Something changed")]),
            ReadingDefinition::new(ReadingKind::Message, "MPPT1 charger status", ResponseKind::Option)
                .options_map(&[
                    ("0", "abnormal"),
                    ("1", "normal but not charged"),
                    ("2", "charging"),
                ]),
            ReadingDefinition::new(ReadingKind::Message, "MPPT2 charger status", ResponseKind::Option)
                .options_map(&[
                    ("0", "abnormal"),
                    ("1", "normal but not charged"),
                    ("2", "charging"),
                ]),
            ReadingDefinition::new(ReadingKind::Message, "Load connection", ResponseKind::Option)
                .options_map(&[("0", "disconnect"), ("1", "connect")]),
            ReadingDefinition::new(
                ReadingKind::Message,
                "Battery power direction",
                ResponseKind::Option,
            )
            .options_map(&[("0", "donothing"), ("1", "charge"), ("2", "discharge")]),
            ReadingDefinition::new(
                ReadingKind::Message,
                "DC/AC power direction",
                ResponseKind::Option,
            )
            .options_map(&[("0", "donothing"), ("1", "AC-DC"), ("2", "DC-AC")]),
            ReadingDefinition::new(
                ReadingKind::Message,
                "Line power direction",
                ResponseKind::Option,
            )
            .options_map(&[("0", "donothing"), ("1", "input"), ("2", "output")]),
            ReadingDefinition::new(
                ReadingKind::Message,
                "Parallel instance number",
                ResponseKind::List,
            )
            .options_list(&["Not valid", "valid"]),
        ])
        .test_response(
            b"^D1062232,499,2232,499,1406,1376,028,549,000,000,000,010,095,060,000,000,0082,0000,1604,0000,0,2,0,1,1,1,1,0D\x12\r",
        )
        .build()
}
// }}}

fn setter(code: &str, description: &str, help_text: &str) -> CommandDefinition {
    CommandDefinition::new(code, description, ResultShape::Ack)
        .help(help_text)
        .category(CommandCategory::Settings)
        .command_type(CommandType::Setter)
        .reading(
            ReadingDefinition::new(ReadingKind::Ack, description, ResponseKind::Ack)
                .ack_codes("^1", "^0"),
        )
        .test_response(b"^0\x1b\xe3\r")
        .test_response(b"^1\x0b\xc2\r")
}

fn setter_commands() -> Result<Vec<CommandDefinition>> {
    Ok(vec![
        setter(
            "POP",
            "Set Device Output Source Priority",
            " -- examples: POP0 (set utility first), POP1 (set solar first)",
        )
        .regex("POP([01])$")
        .build()?,
        setter(
            "PSP",
            "Set Solar Power priority",
            " -- examples: PSP0 (Battery-Load-Utility + AC Charge), PSP1 (Load-Battery-Utility)",
        )
        .regex("PSP([01])$")
        .build()?,
        setter(
            "PEI",
            "Set Machine type, enable: Grid-Tie",
            " -- examples: PEI (enable Grid-Tie)",
        )
        .build()?,
        setter(
            "PDI",
            "Set Machine type, disable: Grid-Tie",
            " -- examples: PDI (disable Grid-Tie)",
        )
        .build()?,
        setter(
            "PBT",
            "Set Battery Type",
            " -- examples: PBT0 (set battery as AGM), PBT1 (set battery as FLOODED), PBT2 (set battery as USER)",
        )
        .regex("PBT([012])$")
        .build()?,
    ])
}
