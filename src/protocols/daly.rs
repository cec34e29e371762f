//! Daly BMS protocol: fixed 13-byte binary frames with a single-byte sum
//! checksum, spoken over serial, USB and BLE.
//!
//! Cell voltages arrive as a burst of frames (three cells per frame) that
//! cannot be checksummed as a whole; the split stage screens each frame
//! individually instead.

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
use crate::protocols::crc::checksum_sum;
use crate::protocols::reading_definition::{
    ReadingDefinition, ReadingKind, ResponseKind,
};
use crate::protocols::result::RawValue;
use crate::protocols::template::Template;
use crate::protocols::{build_command_map, split_by_shape, ProtocolHandler, SplitResponse};

const START_BYTE: u8 = 0xa5;
const DATA_LENGTH: u8 = 8;
const FRAME_LENGTH: usize = 13;

/// Function codes understood by the BMS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum DalyFunction {
    Soc = 0x90,
    CellVoltageRange = 0x91,
    Temperatures = 0x92,
    Mosfet = 0x93,
    Status = 0x94,
    CellVoltages = 0x95,
}

/// Daly BMS protocol handler.
#[derive(Debug, Clone)]
pub struct Daly {
    commands: HashMap<String, Arc<CommandDefinition>>,
    port_type: PortType,
}

impl Daly {
    pub fn new() -> Result<Self> {
        Ok(Self {
            commands: build_command_map("DALY", commands()?)?,
            port_type: PortType::Test,
        })
    }

    /// Cell voltage bursts: split on the frame marker, screen each chunk's
    /// checksum, function code and frame counter, then emit three cells
    /// per good frame. Zero cells are "not present" and skipped.
    fn split_cell_voltages(&self, response: &[u8]) -> SplitResponse {
        let starts: Vec<usize> = response
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| *pair == [START_BYTE, 0x01])
            .map(|(position, _)| position)
            .collect();

        let mut cells = Vec::new();
        for (index, &start) in starts.iter().enumerate() {
            let end = starts.get(index + 1).copied().unwrap_or(response.len());
            let frame = &response[start..end];
            if frame.len() < FRAME_LENGTH
                || checksum_sum(&frame[..frame.len() - 1]) != frame[frame.len() - 1]
            {
                debug!("frame has incorrect checksum: {frame:02x?}");
                continue;
            }
            if frame[2] != u8::from(DalyFunction::CellVoltages) {
                debug!("frame has incorrect function code: {frame:02x?}");
                continue;
            }
            let frame_number = usize::from(frame[4]);
            if frame_number == 0 || frame_number > 14 {
                debug!("frame counter {frame_number} out of range");
                continue;
            }
            let cell_offset = (frame_number - 1) * 3;
            for position in 0..3 {
                let at = 5 + position * 2;
                let voltage = i64::from(u16::from_be_bytes([frame[at], frame[at + 1]]));
                if voltage <= 0 {
                    continue;
                }
                cells.push((
                    format!("cell_{:02}_voltage", cell_offset + position + 1),
                    RawValue::Int(voltage),
                ));
            }
        }
        SplitResponse::Keyed(cells)
    }
}

impl ProtocolHandler for Daly {
    fn protocol_id(&self) -> &str {
        "DALY"
    }

    fn command_definitions(&self) -> &HashMap<String, Arc<CommandDefinition>> {
        &self.commands
    }

    fn supported_ports(&self) -> Vec<PortType> {
        vec![PortType::Test, PortType::Serial, PortType::Usb, PortType::Ble]
    }

    fn port_type(&self) -> PortType {
        self.port_type
    }

    fn set_port_type(&mut self, port_type: PortType) {
        self.port_type = port_type;
    }

    fn id_command(&self) -> Option<&str> {
        Some("SOC")
    }

    /// Frame: start flag, source, function code, data length, zero padded
    /// payload, sum checksum. Serial/USB frames get a trailing newline;
    /// BLE writes must not.
    fn get_full_command(&self, code: &str) -> Result<Vec<u8>> {
        let resolved = self.get_command_definition(code)?;
        let function = resolved.definition.command_code.ok_or_else(|| {
            Error::Config(format!(
                "command '{}' has no function code",
                resolved.definition.code
            ))
        })?;
        let source = if self.port_type == PortType::Ble { 0x80 } else { 0x40 };

        let mut full_command = vec![START_BYTE, source, function as u8, DATA_LENGTH];
        full_command.extend_from_slice(&[0; DATA_LENGTH as usize]);
        full_command.push(checksum_sum(&full_command));
        if self.port_type != PortType::Ble {
            full_command.push(b'\n');
        }
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
        if count_start_bytes(response) > 1 {
            // multiframe response, the length field only covers one frame
            return Ok(());
        }
        if response[0] != START_BYTE {
            return Err(Error::InvalidResponse(
                "response has incorrect start byte".into(),
            ));
        }
        if usize::from(response[3]) != response[4..response.len() - 1].len() {
            return Err(Error::InvalidResponse(
                "response length does not match expected".into(),
            ));
        }
        Ok(())
    }

    fn check_crc(&self, response: &[u8], _definition: &CommandDefinition) -> Result<()> {
        if count_start_bytes(response) > 1 {
            // multiframe checksums are screened per frame during split
            return Ok(());
        }
        let calculated = checksum_sum(&response[..response.len() - 1]);
        let received = response[response.len() - 1];
        if received != calculated {
            return Err(Error::InvalidCrc {
                got: format!("\\x{received:02x}"),
                calculated: format!("\\x{calculated:02x}"),
            });
        }
        Ok(())
    }

    /// Layout parsing handles offsets itself; only cell voltage bursts
    /// need leading garbage stripped back to the first frame marker.
    fn trim_response(&self, response: &[u8], definition: &CommandDefinition) -> Vec<u8> {
        if definition.code == "cell_voltages" && response.first() != Some(&START_BYTE) {
            if let Some(start) = response.iter().position(|b| *b == START_BYTE) {
                return response[start..].to_vec();
            }
        }
        response.to_vec()
    }

    fn split_response(
        &self,
        response: &[u8],
        definition: &CommandDefinition,
    ) -> Result<SplitResponse> {
        if definition.code == "cell_voltages" {
            return Ok(self.split_cell_voltages(response));
        }
        split_by_shape(response, definition)
    }
}

fn count_start_bytes(response: &[u8]) -> usize {
    response.iter().filter(|b| **b == START_BYTE).count()
}

// every reply frame shares the same four byte header and trailing checksum
fn frame_layout(function: DalyFunction) -> BinaryLayout {
    BinaryLayout::new()
        .constant("start_flag", b"\xa5")
        .bytes("module_address", 1)
        .constant_byte("command_id", function as u8)
        .scalar("data_length", FieldType::U8)
}

fn commands() -> Result<Vec<CommandDefinition>> {
    let div10 = Template::parse("r/10")?;
    let div1000 = Template::parse("r/1000")?;
    let minus40 = Template::parse("r-40")?;

    let mut definitions = vec![
        CommandDefinition::new("SOC", "get the battery state of charge", ResultShape::Binary)
            .aliases(&["soc", "state of charge", "default"])
            .category(CommandCategory::Data)
            .command_type(CommandType::ReadUntilDone)
            .command_code(DalyFunction::Soc as u16)
            .layout(
                frame_layout(DalyFunction::Soc)
                    .scalar("battery_voltage", FieldType::U16be)
                    .scalar("acquisition_voltage", FieldType::U16be)
                    .scalar("current", FieldType::U16be)
                    .scalar("soc", FieldType::U16be)
                    .bytes("checksum", 1),
            )
            .min_response_length(13)
            .readings(vec![
                ReadingDefinition::new(
                    ReadingKind::Volts,
                    "Battery Bank Voltage",
                    ResponseKind::TemplateInt,
                )
                .keyed("battery_voltage")
                .template(div10.clone()),
                ReadingDefinition::new(ReadingKind::Current, "Current", ResponseKind::TemplateInt)
                    .keyed("current")
                    .template(Template::parse("(r-30000)/10")?),
                ReadingDefinition::new(ReadingKind::Percentage, "SOC", ResponseKind::TemplateInt)
                    .keyed("soc")
                    .template(div10.clone()),
            ])
            .test_response(b"\xa5\x01\x90\x08\x02\x10\x00\x00\x75\x6f\x03\xbc\xf3")
            .test_response(b"\xa5\x01\x90\x08\x01\x09\x00\x00\x75\xcf\x03\x0a\x99")
            .build()?,
        CommandDefinition::new(
            "cell_voltage_range",
            "get the highest and lowest cell voltage data",
            ResultShape::Binary,
        )
        .aliases(&["cvr", "CVR"])
        .command_type(CommandType::ReadUntilDone)
        .command_code(DalyFunction::CellVoltageRange as u16)
        .layout(
            frame_layout(DalyFunction::CellVoltageRange)
                .scalar("highest_voltage", FieldType::U16be)
                .scalar("highest_cell", FieldType::U8)
                .scalar("lowest_voltage", FieldType::U16be)
                .scalar("lowest_cell", FieldType::U8)
                .bytes("rest", 2)
                .bytes("checksum", 1),
        )
        .min_response_length(13)
        .readings(vec![
            ReadingDefinition::new(ReadingKind::Volts, "highest_voltage", ResponseKind::TemplateInt)
                .keyed("highest_voltage")
                .template(div1000.clone()),
            ReadingDefinition::new(ReadingKind::Number, "highest_cell", ResponseKind::Int)
                .keyed("highest_cell"),
            ReadingDefinition::new(ReadingKind::Volts, "lowest_voltage", ResponseKind::TemplateInt)
                .keyed("lowest_voltage")
                .template(div1000.clone()),
            ReadingDefinition::new(ReadingKind::Number, "lowest_cell", ResponseKind::Int)
                .keyed("lowest_cell"),
        ])
        .test_response(b"\xa5\x01\x91\x08\x0c\xfc\x07\x0c\xe3\x01\x03\xc7\x08")
        .build()?,
        CommandDefinition::new(
            "temperatures",
            "get the highest and lowest temperature sensor data",
            ResultShape::Binary,
        )
        .command_type(CommandType::ReadUntilDone)
        .command_code(DalyFunction::Temperatures as u16)
        .layout(
            frame_layout(DalyFunction::Temperatures)
                .scalar("highest_temperature", FieldType::U8)
                .scalar("highest_sensor", FieldType::U8)
                .scalar("lowest_temperature", FieldType::U8)
                .scalar("lowest_sensor", FieldType::U8)
                .bytes("rest", 4)
                .bytes("checksum", 1),
        )
        .min_response_length(13)
        .readings(vec![
            ReadingDefinition::new(
                ReadingKind::Temperature,
                "highest_temperature",
                ResponseKind::TemplateInt,
            )
            .keyed("highest_temperature")
            .template(minus40.clone()),
            ReadingDefinition::new(ReadingKind::Number, "highest_sensor", ResponseKind::Int)
                .keyed("highest_sensor"),
            ReadingDefinition::new(
                ReadingKind::Temperature,
                "lowest_temperature",
                ResponseKind::TemplateInt,
            )
            .keyed("lowest_temperature")
            .template(minus40.clone()),
            ReadingDefinition::new(ReadingKind::Number, "lowest_sensor", ResponseKind::Int)
                .keyed("lowest_sensor"),
        ])
        .test_response(b"\xa5\x01\x92\x08\x2e\x01\x2e\x01\x8c\x07\x03\xc5\xf9")
        .build()?,
        CommandDefinition::new(
            "mosfet",
            "get the bms mosfet states, bms cycles and battery capacity data",
            ResultShape::Binary,
        )
        .command_type(CommandType::ReadUntilDone)
        .command_code(DalyFunction::Mosfet as u16)
        .layout(
            frame_layout(DalyFunction::Mosfet)
                .scalar("mode", FieldType::I8)
                .scalar("charging_mosfet", FieldType::U8)
                .scalar("discharging_mosfet", FieldType::U8)
                .scalar("bms_cycles", FieldType::U8)
                .scalar("capacity_ah", FieldType::U32be)
                .bytes("checksum", 1),
        )
        .min_response_length(13)
        .readings(vec![
            ReadingDefinition::new(ReadingKind::Message, "mode", ResponseKind::List)
                .keyed("mode")
                .options_list(&["stationary", "charging", "discharging"]),
            ReadingDefinition::new(ReadingKind::Message, "charging_mosfet", ResponseKind::Bool)
                .keyed("charging_mosfet"),
            ReadingDefinition::new(ReadingKind::Message, "discharging_mosfet", ResponseKind::Bool)
                .keyed("discharging_mosfet"),
            ReadingDefinition::new(ReadingKind::Number, "bms_cycles", ResponseKind::Int)
                .keyed("bms_cycles"),
            ReadingDefinition::new(ReadingKind::Energy, "capacity_ah", ResponseKind::TemplateInt)
                .keyed("capacity_ah")
                .template(div1000.clone()),
        ])
        .test_response(b"\xa5\x01\x93\x08\x02\x01\x01\x97\x00\x04\x2d\xfa\x07")
        .build()?,
        CommandDefinition::new(
            "status",
            "get the number of cells, number of temperature sensors, charge and load states and bms cycle data",
            ResultShape::Binary,
        )
        .command_type(CommandType::ReadUntilDone)
        .command_code(DalyFunction::Status as u16)
        .layout(
            frame_layout(DalyFunction::Status)
                .scalar("number_of_cells", FieldType::I8)
                .scalar("number_of_temperature_sensors", FieldType::I8)
                .scalar("charger_running", FieldType::U8)
                .scalar("load_running", FieldType::U8)
                .scalar("states", FieldType::U8)
                .scalar("cycles", FieldType::U16be)
                .bytes("rest", 1)
                .bytes("checksum", 1),
        )
        .min_response_length(13)
        .readings(vec![
            ReadingDefinition::new(ReadingKind::Number, "number_of_cells", ResponseKind::Int)
                .keyed("number_of_cells"),
            ReadingDefinition::new(
                ReadingKind::Number,
                "number_of_temperature_sensors",
                ResponseKind::Int,
            )
            .keyed("number_of_temperature_sensors"),
            ReadingDefinition::new(ReadingKind::Message, "charger_running", ResponseKind::Bool)
                .keyed("charger_running"),
            ReadingDefinition::new(ReadingKind::Message, "load_running", ResponseKind::Bool)
                .keyed("load_running"),
            ReadingDefinition::new(ReadingKind::Message, "states", ResponseKind::BitEncoded)
                .keyed("states")
                .options_bits(&[
                    (0, "none"),
                    (1, "DI1"),
                    (2, "DI2"),
                    (4, "DI3"),
                    (8, "DI4"),
                    (16, "DO1"),
                    (32, "DO2"),
                    (64, "DO3"),
                    (128, "DO4"),
                ]),
            ReadingDefinition::new(ReadingKind::Number, "cycles", ResponseKind::Int).keyed("cycles"),
        ])
        .test_response(b"\xa5\x01\x94\x08\x10\x01\x00\x00\x02\x00\x1d\x88\xfa")
        .build()?,
    ];

    // one keyed definition per possible cell
    let mut cell_voltages = CommandDefinition::new(
        "cell_voltages",
        "get the voltage of each battery cell",
        ResultShape::Keyed,
    )
    .command_type(CommandType::ReadUntilDone)
    .command_code(DalyFunction::CellVoltages as u16)
    .test_response(
        b"\xa5\x01\x95\x08\x01\x0dU\x0dD\x0dN\x89\xdb\xa5\x01\x95\x08\x02\x0da\x0d\\\x0dL\x89\xfe\xa5\x01\x95\x08\x03\x0dJ\x0dV\x0dT\x89\xea\xa5\x01\x95\x08\x04\x0dY\x0d^\x0db\x89\x10\xa5\x01\x95\x08\x05\x0dR\x0d^\x0dX\x89\x00\xa5\x01\x95\x08\x06\x0dK\x00\x00\x00\x00\x89\x2a\xa5\x01\x95\x08\x07\x00\x00\x00\x00\x00\x00\x89\xd3\xa5\x01\x95\x08\x08\x00\x00\x00\x00\x00\xa5\x01\x95\x08\x09\x00\x00\x00\x00\x00\x00\x89\xd5\xa5\x01\x95\x08\x0a\x00\x00\x00\x00\x00\x00\x89\xd6\xa5\x01\x95\x08\x0b\x00\x00\x00\x00\x00\x00\x89\xd7",
    );
    for cell in 1..=30 {
        let key = format!("cell_{cell:02}_voltage");
        cell_voltages = cell_voltages.reading(
            ReadingDefinition::new(ReadingKind::Volts, &key, ResponseKind::TemplateInt)
                .keyed(&key)
                .template(div1000.clone()),
        );
    }
    definitions.push(cell_voltages.build()?);

    Ok(definitions)
}
