//! Neey/Heltec battery balancer protocol: BLE device with 0xAA55 framed
//! commands (XOR checksum) and 0x55AA framed replies (sum checksum),
//! carrying little-endian float arrays for per-cell data.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::{Error, Result};
use crate::ports::PortType;
use crate::protocols::binary::{BinaryLayout, FieldType};
use crate::protocols::command_definition::{
    CommandCategory, CommandDefinition, CommandType, ResultShape,
};
use crate::protocols::crc::{checksum_sum, checksum_xor};
use crate::protocols::reading_definition::{
    ReadingDefinition, ReadingKind, ResponseKind,
};
use crate::protocols::{build_command_map, ProtocolHandler};

/// Reply frames start 0x55 0xAA; command frames start 0xAA 0x55.
const REPLY_MARKER: &[u8] = b"\x55\xaa";
const MODULE_ADDRESS: u8 = 0x11;
const COMMAND_LENGTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum NeeyCommand {
    DeviceInfo = 0x01,
    CellInfo = 0x02,
    Settings = 0x04,
}

/// Neey balancer protocol handler.
#[derive(Debug, Clone)]
pub struct Neey {
    commands: HashMap<String, Arc<CommandDefinition>>,
    port_type: PortType,
}

impl Neey {
    pub fn new() -> Result<Self> {
        Ok(Self {
            commands: build_command_map("NEEY", commands()?)?,
            port_type: PortType::Test,
        })
    }
}

fn last_frame_start(response: &[u8]) -> Option<usize> {
    response
        .windows(REPLY_MARKER.len())
        .rposition(|pair| pair == REPLY_MARKER)
}

fn reply_marker_count(response: &[u8]) -> usize {
    response
        .windows(REPLY_MARKER.len())
        .filter(|pair| *pair == REPLY_MARKER)
        .count()
}

impl ProtocolHandler for Neey {
    fn protocol_id(&self) -> &str {
        "NEEY"
    }

    fn command_definitions(&self) -> &HashMap<String, Arc<CommandDefinition>> {
        &self.commands
    }

    fn supported_ports(&self) -> Vec<PortType> {
        vec![PortType::Test, PortType::Ble]
    }

    fn port_type(&self) -> PortType {
        self.port_type
    }

    fn set_port_type(&mut self, port_type: PortType) {
        self.port_type = port_type;
    }

    fn id_command(&self) -> Option<&str> {
        Some("info")
    }

    /// 20 byte command frame: AA 55, module address, function, command
    /// code, length, padded payload, XOR checksum, FF terminator. The
    /// device expects the length field big-endian for cell_info only.
    fn get_full_command(&self, code: &str) -> Result<Vec<u8>> {
        let resolved = self.get_command_definition(code)?;
        let command_code = resolved.definition.command_code.ok_or_else(|| {
            Error::Config(format!(
                "command '{}' has no command code",
                resolved.definition.code
            ))
        })?;

        let mut full_command = vec![0u8; COMMAND_LENGTH];
        full_command[0] = 0xaa;
        full_command[1] = 0x55;
        full_command[2] = MODULE_ADDRESS;
        full_command[3] = 0x01; // read
        full_command[4..6].copy_from_slice(&command_code.to_le_bytes());
        let length = COMMAND_LENGTH as u16;
        if resolved.definition.code == "cell_info" {
            full_command[6..8].copy_from_slice(&length.to_be_bytes());
        } else {
            full_command[6..8].copy_from_slice(&length.to_le_bytes());
        }
        if let Some(data) = resolved.definition.command_data {
            full_command[8..10].copy_from_slice(&data.to_le_bytes());
        }
        full_command[COMMAND_LENGTH - 2] = checksum_xor(&full_command[..COMMAND_LENGTH - 2]);
        full_command[COMMAND_LENGTH - 1] = 0xff;
        debug!("full_command: {:02x?}", full_command);
        Ok(full_command)
    }

    fn check_valid(&self, response: &[u8], _definition: &CommandDefinition) -> Result<()> {
        if response.is_empty() {
            return Err(Error::InvalidResponse("response is empty".into()));
        }
        if response.len() <= 6 {
            return Err(Error::InvalidResponse("response is too short".into()));
        }
        if response[0] != 0x55 {
            return Err(Error::InvalidResponse(
                "response has incorrect start byte".into(),
            ));
        }
        if response[response.len() - 1] != 0xff {
            return Err(Error::InvalidResponse(
                "response has incorrect end byte".into(),
            ));
        }
        Ok(())
    }

    /// Sum checksum sits in the second-to-last byte. For a multi-frame
    /// notification burst only the last frame can be verified.
    fn check_crc(&self, response: &[u8], _definition: &CommandDefinition) -> Result<()> {
        let mut frame = response;
        if reply_marker_count(response) > 1 {
            if let Some(start) = last_frame_start(response) {
                frame = &response[start..];
            }
        }
        let calculated = checksum_sum(&frame[..frame.len() - 2]);
        let received = frame[frame.len() - 2];
        if received != calculated {
            return Err(Error::InvalidCrc {
                got: format!("\\x{received:02x}"),
                calculated: format!("\\x{calculated:02x}"),
            });
        }
        Ok(())
    }

    /// Keep only the last complete frame; layout parsing handles the rest.
    fn trim_response(&self, response: &[u8], _definition: &CommandDefinition) -> Vec<u8> {
        match last_frame_start(response) {
            Some(start) => response[start..].to_vec(),
            None => response.to_vec(),
        }
    }
}

fn frame_header(command: NeeyCommand) -> BinaryLayout {
    BinaryLayout::new()
        .constant("start_flag", b"\x55\xaa")
        .bytes("module_address", 1)
        .bytes("function", 1)
        .constant_byte("command", command as u8)
        .skip(1) // command code high byte
        .scalar("length", FieldType::U16le)
}

fn commands() -> Result<Vec<CommandDefinition>> {
    Ok(vec![
        device_info()?,
        cell_info()?,
        settings()?,
    ])
}

fn device_info() -> Result<CommandDefinition> {
    CommandDefinition::new("info", "get the balancer information", ResultShape::Binary)
        .aliases(&["device_info", "default"])
        .category(CommandCategory::Info)
        .command_type(CommandType::ReadUntilDone)
        .command_code(NeeyCommand::DeviceInfo as u16)
        .layout(
            frame_header(NeeyCommand::DeviceInfo)
                .bytes("model", 16)
                .bytes("hw_version", 8)
                .bytes("sw_version", 8)
                .bytes("protocol_version", 8)
                .bytes("production_date", 8)
                .scalar("power_on_count", FieldType::U32le)
                .scalar("total_runtime", FieldType::U32le)
                .skip(34)
                .bytes("crc", 1)
                .bytes("end_flag", 1),
        )
        .min_response_length(100)
        .readings(vec![
            ReadingDefinition::new(ReadingKind::Message, "model", ResponseKind::BytesStripNulls)
                .keyed("model"),
            ReadingDefinition::new(ReadingKind::Message, "hw_version", ResponseKind::BytesStripNulls)
                .keyed("hw_version"),
            ReadingDefinition::new(ReadingKind::Message, "sw_version", ResponseKind::BytesStripNulls)
                .keyed("sw_version"),
            ReadingDefinition::new(
                ReadingKind::Message,
                "protocol_version",
                ResponseKind::BytesStripNulls,
            )
            .keyed("protocol_version"),
            ReadingDefinition::new(
                ReadingKind::Message,
                "production_date",
                ResponseKind::BytesStripNulls,
            )
            .keyed("production_date"),
            ReadingDefinition::new(ReadingKind::Number, "power_on_count", ResponseKind::Int)
                .keyed("power_on_count"),
            ReadingDefinition::new(ReadingKind::TimeSeconds, "total_runtime", ResponseKind::Int)
                .keyed("total_runtime"),
        ])
        .test_response(
            b"U\xaa\x11\x01\x01\x00d\x00GW-24S4EB\x00\x00\x00\x00\x00\x00\x00HW-2.8.0ZH-1.2.3V1.0.0\x00\x0020220916\x04\x00\x00\x00n\x85?\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00G\xff",
        )
        .build()
}

fn cell_info() -> Result<CommandDefinition> {
    let mut definition = CommandDefinition::new(
        "cell_info",
        "get the cell voltage and resistance data",
        ResultShape::Binary,
    )
    .command_type(CommandType::ReadUntilDone)
    .command_code(NeeyCommand::CellInfo as u16)
    .layout(
        frame_header(NeeyCommand::CellInfo)
            .scalar("frame_counter", FieldType::U8)
            .array("cell", "voltage", 24, FieldType::F32le)
            .array("cell", "resistance", 24, FieldType::F32le)
            .scalar("total_voltage", FieldType::F32le)
            .scalar("average_cell_voltage", FieldType::F32le)
            .scalar("delta_cell_voltage", FieldType::F32le)
            .scalar("max_voltage_cell", FieldType::U8)
            .scalar("min_voltage_cell", FieldType::U8)
            .skip(1)
            .scalar("operation_status", FieldType::U8)
            .scalar("balancing_current", FieldType::F32le)
            .scalar("temperature_1", FieldType::F32le)
            .scalar("temperature_2", FieldType::F32le)
            .bytes("cell_detection_failed", 3)
            .bytes("cell_overvoltage_failed", 3)
            .bytes("cell_undervoltage_failed", 3)
            .bytes("cell_polarity_error", 3)
            .bytes("excessive_line_resistance", 3)
            .bytes("overheating", 1)
            .bytes("charging_fault", 1)
            .bytes("discharge_fault", 1)
            .bytes("read_write_error", 1)
            .skip(6)
            .scalar("uptime", FieldType::F32le)
            .skip(40)
            .bytes("crc", 1)
            .bytes("end_flag", 1),
    )
    .min_response_length(300)
    .readings(vec![
        ReadingDefinition::new(ReadingKind::Volts, "total_voltage", ResponseKind::Float)
            .keyed("total_voltage"),
        ReadingDefinition::new(ReadingKind::Volts, "average_cell_voltage", ResponseKind::Float)
            .keyed("average_cell_voltage"),
        ReadingDefinition::new(ReadingKind::Volts, "delta_cell_voltage", ResponseKind::Float)
            .keyed("delta_cell_voltage"),
        ReadingDefinition::new(ReadingKind::Number, "max_voltage_cell", ResponseKind::Int)
            .keyed("max_voltage_cell"),
        ReadingDefinition::new(ReadingKind::Number, "min_voltage_cell", ResponseKind::Int)
            .keyed("min_voltage_cell"),
        ReadingDefinition::new(ReadingKind::Message, "operation_status", ResponseKind::Option)
            .keyed("operation_status")
            .options_map(&[
                ("1", "wrong cell count"),
                ("2", "line resistance test"),
                ("3", "line resistance exceeded"),
                ("4", "system test completed"),
                ("5", "balancing"),
                ("6", "balancing finished"),
                ("7", "low voltage"),
                ("8", "system overtemperature"),
                ("9", "host fails"),
                ("10", "low battery voltage - balancing stopped"),
                ("11", "temperature too high - balancing stopped"),
                ("12", "self test completed"),
            ]),
        ReadingDefinition::new(ReadingKind::Current, "balancing_current", ResponseKind::Float)
            .keyed("balancing_current"),
        ReadingDefinition::new(ReadingKind::Temperature, "temperature_1", ResponseKind::Float)
            .keyed("temperature_1"),
        ReadingDefinition::new(ReadingKind::Temperature, "temperature_2", ResponseKind::Float)
            .keyed("temperature_2"),
    ])
    .test_response(
        b"U\xaa\x11\x01\x02\x00,\x01\xed\xb2\x15S@4zT@\xe5}T@JuT@o{T@\xd0\x82T@ \x7fT@o{T@\xaflT@\x9aqT@\xf9xT@4zT@ \x7fT@_pT@[\x80T@\xb3\\T@\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\xee\x971>b9;>m\x852>\xb5\xf00>\x14R0>\xd1s3>\x86d5>\xdb\xaf7>f\xf7:>,\xa8@>\xb3)@>\x86\xcd=>\xf2W8>\xd3~3>\x19c1>^\xfe.>\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x9faTB\x9faT@\x00\x8f\xb6<\x05\x00\x0f\x05\xc4?\x81\xc0\xaeG\xf5A\xaeG\xf5A\x00\x00\xff\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x8a\x8a\x04\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\xbe\xff",
    );

    for cell in 1..=24 {
        let voltage_key = format!("cell_{cell:02}_voltage");
        let resistance_key = format!("cell_{cell:02}_resistance");
        definition = definition
            .reading(
                ReadingDefinition::new(ReadingKind::Volts, &voltage_key, ResponseKind::Float)
                    .keyed(&voltage_key),
            )
            .reading(
                ReadingDefinition::new(
                    ReadingKind::Number,
                    &resistance_key,
                    ResponseKind::Float,
                )
                .keyed(&resistance_key),
            );
    }
    definition.build()
}

fn settings() -> Result<CommandDefinition> {
    CommandDefinition::new("settings", "get the balancer settings", ResultShape::Binary)
        .category(CommandCategory::Settings)
        .command_type(CommandType::ReadUntilDone)
        .command_code(NeeyCommand::Settings as u16)
        .layout(
            frame_header(NeeyCommand::Settings)
                .scalar("cell_count", FieldType::U8)
                .scalar("balance_trigger_voltage", FieldType::F32le)
                .scalar("max_balance_current", FieldType::F32le)
                .scalar("balance_stop_voltage", FieldType::F32le)
                .scalar("balancing_enabled", FieldType::U8)
                .scalar("buzzer_mode", FieldType::U8)
                .scalar("battery_type", FieldType::U8)
                .scalar("nominal_battery_capacity", FieldType::U32le)
                .scalar("balance_start_voltage", FieldType::F32le)
                .skip(66)
                .bytes("crc", 1)
                .bytes("end_flag", 1),
        )
        .min_response_length(100)
        .readings(vec![
            ReadingDefinition::new(ReadingKind::Number, "cell_count", ResponseKind::Int)
                .keyed("cell_count"),
            ReadingDefinition::new(
                ReadingKind::Volts,
                "balance_trigger_voltage",
                ResponseKind::Float,
            )
            .keyed("balance_trigger_voltage"),
            ReadingDefinition::new(
                ReadingKind::Current,
                "max_balance_current",
                ResponseKind::Float,
            )
            .keyed("max_balance_current"),
            ReadingDefinition::new(
                ReadingKind::Volts,
                "balance_stop_voltage",
                ResponseKind::Float,
            )
            .keyed("balance_stop_voltage"),
            ReadingDefinition::new(ReadingKind::Message, "balancing_enabled", ResponseKind::Bool)
                .keyed("balancing_enabled"),
            ReadingDefinition::new(ReadingKind::Message, "buzzer_mode", ResponseKind::Option)
                .keyed("buzzer_mode")
                .options_map(&[("1", "off"), ("2", "beep once"), ("3", "beep regular")]),
            ReadingDefinition::new(ReadingKind::Message, "battery_type", ResponseKind::Option)
                .keyed("battery_type")
                .options_map(&[("1", "NCM"), ("2", "LFP"), ("3", "LTO"), ("4", "PbAc")]),
            ReadingDefinition::new(
                ReadingKind::Energy,
                "nominal_battery_capacity",
                ResponseKind::Int,
            )
            .keyed("nominal_battery_capacity"),
            ReadingDefinition::new(
                ReadingKind::Volts,
                "balance_start_voltage",
                ResponseKind::Float,
            )
            .keyed("balance_start_voltage"),
        ])
        .test_response(
            b"U\xaa\x11\x01\x04\x00d\x00\x10\n\xd7\xa3;\x00\x00\x80@\x00\x00 @\x01\x01\x02\x18\x01\x00\x00ff&@\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\xb7\xff",
        )
        .build()
}
