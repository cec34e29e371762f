//! PI30 protocol family: `(`-framed, CRC16 text protocol spoken by a wide
//! range of MPP/Voltronic style inverters over serial and USB-HID.
//!
//! The MAX model fork adds the energy history commands (QET/QEY/QEM/QED)
//! and a few extra queries on top of the standard table.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::ports::PortType;
use crate::protocols::command_definition::{
    CommandCategory, CommandDefinition, CommandType, ResultShape,
};
use crate::protocols::reading_definition::{
    CommandInfo, ReadingDefinition, ReadingKind, ResponseKind,
};
use crate::protocols::{build_command_map, ProtocolHandler};

const BATTERY_TYPES: &[&str] = &[
    "AGM",
    "Flooded",
    "User",
    "Pylontech",
    "Shinheung",
    "WECO",
    "Soltaro",
    "TBD",
    "LIb-protocol compatible",
    "3rd party Lithium",
];

const OUTPUT_SOURCE_PRIORITIES: &[&str] = &[
    "Utility > Solar > Battery",
    "Solar > Utility > Battery",
    "Solar > Battery > Utility",
];

const CHARGER_SOURCE_PRIORITIES: &[&str] =
    &["Utility first", "Solar first", "Solar + Utility", "Solar only"];

const OUTPUT_MODES: &[&str] = &[
    "single machine",
    "parallel",
    "Phase 1 of 3 phase",
    "Phase 2 of 3 phase",
    "Phase 3 of 3 phase",
    "Phase 1 of 2 phase",
    "Phase 2 of 2 phase",
];

const INVERTER_MODES: &[(&str, &str)] = &[
    ("P", "Power On Mode"),
    ("S", "Standby Mode"),
    ("L", "Line Mode"),
    ("B", "Battery Mode"),
    ("F", "Fault Mode"),
    ("H", "Power Saving Mode"),
    ("D", "Shutdown Mode"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pi30Model {
    Standard,
    Max,
}

/// PI30 protocol handler.
#[derive(Debug, Clone)]
pub struct Pi30 {
    model: Pi30Model,
    commands: HashMap<String, Arc<CommandDefinition>>,
    port_type: PortType,
}

impl Pi30 {
    pub fn new(model: Pi30Model) -> Result<Self> {
        let mut definitions = query_commands()?;
        definitions.extend(setter_commands()?);
        if model == Pi30Model::Max {
            definitions.extend(max_commands()?);
        }
        let protocol_id = match model {
            Pi30Model::Standard => "PI30",
            Pi30Model::Max => "PI30MAX",
        };
        Ok(Self {
            model,
            commands: build_command_map(protocol_id, definitions)?,
            port_type: PortType::Test,
        })
    }

    pub fn model(&self) -> Pi30Model {
        self.model
    }
}

impl ProtocolHandler for Pi30 {
    fn protocol_id(&self) -> &str {
        match self.model {
            Pi30Model::Standard => "PI30",
            Pi30Model::Max => "PI30MAX",
        }
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
        Some("QID")
    }

    fn check_valid(&self, response: &[u8], _definition: &CommandDefinition) -> Result<()> {
        if response.is_empty() {
            return Err(Error::InvalidResponse("response is empty".into()));
        }
        if response.len() <= 3 {
            return Err(Error::InvalidResponse("response is too short".into()));
        }
        if response[0] != b'(' {
            return Err(Error::InvalidResponse(
                "response missing start character '('".into(),
            ));
        }
        Ok(())
    }
}

// the CRC check and trim stages use the text protocol defaults:
// CRC16 over all but the trailing three bytes, then strip '(' and the
// CRC + carriage return tail

fn query_commands() -> Result<Vec<CommandDefinition>> {
    Ok(vec![
        // {{{ identity and firmware
        CommandDefinition::new("QPI", "Get the Inverter supported Protocol ID", ResultShape::Single)
            .category(CommandCategory::Info)
            .reading(ReadingDefinition::new(
                ReadingKind::Message,
                "Protocol Id",
                ResponseKind::Bytes,
            ))
            .test_response(b"(PI30\x9a\x0b\r")
            .build()?,
        CommandDefinition::new("QID", "Get the Serial Number of the Inverter", ResultShape::Single)
            .aliases(&["get_id", "default"])
            .category(CommandCategory::Info)
            .reading(ReadingDefinition::new(
                ReadingKind::Message,
                "Serial Number",
                ResponseKind::String,
            ))
            .test_response(b"(9293333010501\xbb\x07\r")
            .build()?,
        CommandDefinition::new("QVFW", "Get the Main CPU firmware version", ResultShape::Single)
            .category(CommandCategory::Info)
            .reading(
                ReadingDefinition::new(
                    ReadingKind::Message,
                    "Main CPU firmware version",
                    ResponseKind::Bytes,
                )
                .strip_prefix("VERFW:"),
            )
            .test_response(b"(VERFW:00072.70\x53\xa7\r")
            .build()?,
        CommandDefinition::new("QMN", "Get the Model Name", ResultShape::Single)
            .category(CommandCategory::Info)
            .reading(ReadingDefinition::new(
                ReadingKind::Message,
                "Model Name",
                ResponseKind::Bytes,
            ))
            .test_response(b"(MKS2-8000\xb2\x8d\r")
            .build()?,
        CommandDefinition::new("QGMN", "Get the General Model Number", ResultShape::Single)
            .category(CommandCategory::Info)
            .reading(ReadingDefinition::new(
                ReadingKind::Message,
                "General Model Number",
                ResponseKind::Bytes,
            ))
            .test_response(b"(044\xc8\xae\r")
            .build()?,
        // }}}
        // {{{ status queries
        CommandDefinition::new("QBOOT", "Get DSP Has Bootstrap", ResultShape::Single)
            .reading(ReadingDefinition::new(
                ReadingKind::Message,
                "DSP Has Bootstrap",
                ResponseKind::Bool,
            ))
            .test_response(b"(0\xb9\x1c\r")
            .build()?,
        CommandDefinition::new("QMOD", "Get the Inverter Mode", ResultShape::Single)
            .reading(
                ReadingDefinition::new(ReadingKind::Message, "Device Mode", ResponseKind::Option)
                    .options_map(INVERTER_MODES),
            )
            .test_response(b"(S\xe5\xd9\r")
            .test_response(b"(B\xe7\xc9\r")
            .build()?,
        CommandDefinition::new("QOPM", "Get the Inverter Output Mode", ResultShape::Single)
            .category(CommandCategory::Info)
            .reading(
                ReadingDefinition::new(ReadingKind::Message, "Output mode", ResponseKind::List)
                    .options_list(OUTPUT_MODES),
            )
            .test_response(b"(0\xb9\x1c\r")
            .build()?,
        CommandDefinition::new(
            "QMCHGCR",
            "Get the viable options for Max Charging Current",
            ResultShape::Multivalued,
        )
        .category(CommandCategory::Info)
        .reading(ReadingDefinition::new(
            ReadingKind::MessageAmps,
            "Max Charging Current Options",
            ResponseKind::String,
        ))
        .test_response(b"(010 020 030 040 050 060 070 080 090 100 110 120\x0c\xcb\r")
        .build()?,
        CommandDefinition::new(
            "QMUCHGCR",
            "Get the viable options for Max Utility Charging Current",
            ResultShape::Multivalued,
        )
        .category(CommandCategory::Info)
        .reading(ReadingDefinition::new(
            ReadingKind::MessageAmps,
            "Max Utility Charging Current",
            ResponseKind::String,
        ))
        .test_response(b"(002 010 020 030 040 050 060 070 080 090 100 110 120\xca\x23\r")
        .build()?,
        CommandDefinition::new(
            "QFLAG",
            "Get the Status of various Inverter settings",
            ResultShape::Single,
        )
        .category(CommandCategory::Settings)
        .reading(
            ReadingDefinition::new(
                ReadingKind::MultiEnableDisable,
                "Device Status",
                ResponseKind::EnableDisableFlags,
            )
            .options_map(&[
                ("a", "Buzzer"),
                ("b", "Overload Bypass"),
                ("j", "Power Saving"),
                ("k", "LCD Reset to Default"),
                ("u", "Overload Restart"),
                ("v", "Over Temperature Restart"),
                ("x", "LCD Backlight"),
                ("y", "Primary Source Interrupt Alarm"),
                ("z", "Record Fault Code"),
            ]),
        )
        .test_response(b"(EakxyDbjuvz\x2f\x29\r")
        .build()?,
        qpigs()?,
        qpiws()?,
        qdi()?,
        // }}}
    ])
}

// {{{ QPIGS
fn qpigs() -> Result<CommandDefinition> {
    CommandDefinition::new(
        "QPIGS",
        "Get the current values of various General Status parameters",
        ResultShape::Ordered,
    )
    .readings(vec![
        ReadingDefinition::new(ReadingKind::Volts, "AC Input Voltage", ResponseKind::Float)
            .icon("mdi:transmission-tower-export")
            .device_class("voltage"),
        ReadingDefinition::new(ReadingKind::Frequency, "AC Input Frequency", ResponseKind::Float)
            .icon("mdi:current-ac")
            .device_class("frequency"),
        ReadingDefinition::new(ReadingKind::Volts, "AC Output Voltage", ResponseKind::Float)
            .icon("mdi:power-plug")
            .device_class("voltage"),
        ReadingDefinition::new(ReadingKind::Frequency, "AC Output Frequency", ResponseKind::Float)
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
        ReadingDefinition::new(ReadingKind::Volts, "BUS Voltage", ResponseKind::Int)
            .icon("mdi:details")
            .device_class("voltage"),
        ReadingDefinition::new(ReadingKind::Volts, "Battery Voltage", ResponseKind::Float)
            .icon("mdi:battery-outline")
            .device_class("voltage"),
        ReadingDefinition::new(ReadingKind::Current, "Battery Charging Current", ResponseKind::Int)
            .icon("mdi:current-dc")
            .device_class("current"),
        ReadingDefinition::new(ReadingKind::Percentage, "Battery Capacity", ResponseKind::Int)
            .device_class("battery"),
        ReadingDefinition::new(
            ReadingKind::Temperature,
            "Inverter Heat Sink Temperature",
            ResponseKind::Int,
        )
        .icon("mdi:details")
        .device_class("temperature"),
        ReadingDefinition::new(ReadingKind::Current, "PV Input Current", ResponseKind::Float)
            .icon("mdi:solar-power")
            .device_class("current"),
        ReadingDefinition::new(ReadingKind::Volts, "PV Input Voltage", ResponseKind::Float)
            .icon("mdi:solar-power")
            .device_class("voltage"),
        ReadingDefinition::new(ReadingKind::Volts, "Battery Voltage from SCC", ResponseKind::Float)
            .icon("mdi:battery-outline")
            .device_class("voltage"),
        ReadingDefinition::new(ReadingKind::Current, "Battery Discharge Current", ResponseKind::Int)
            .icon("mdi:battery-negative")
            .device_class("current"),
        ReadingDefinition::new(ReadingKind::Flags, "Device Status", ResponseKind::Flags)
            .flag_names(&[
                "Is SBU Priority Version Added",
                "Is Configuration Changed",
                "Is SCC Firmware Updated",
                "Is Load On",
                "Is Battery Voltage to Steady While Charging",
                "Is Charging On",
                "Is SCC Charging On",
                "Is AC Charging On",
            ]),
        ReadingDefinition::new(ReadingKind::Current, "RSV1", ResponseKind::Int),
        ReadingDefinition::new(ReadingKind::Current, "RSV2", ResponseKind::Int),
        ReadingDefinition::new(ReadingKind::Watts, "PV Input Power", ResponseKind::Int)
            .icon("mdi:solar-power")
            .device_class("power")
            .state_class("measurement"),
        ReadingDefinition::new(ReadingKind::Flags, "Device Status2", ResponseKind::Flags)
            .flag_names(&["Is Charging to Float", "Is Switched On", "Is Dustproof Installed"]),
    ])
    .test_response(
        b"(000.0 00.0 230.0 49.9 0161 0119 003 460 57.50 012 100 0069 0014 103.8 57.45 00000 00110110 00 00 00856 010\x24\x8c\r",
    )
    .test_response(
        b"(227.2 50.0 230.3 50.0 0829 0751 010 447 54.50 020 083 0054 02.7 323.6 00.00 00000 00010110 00 00 00879 010\xf1\x8c\r",
    )
    .build()
}
// }}}

// {{{ QPIWS
fn qpiws() -> Result<CommandDefinition> {
    CommandDefinition::new("QPIWS", "Get any active Warning Status flags", ResultShape::Single)
        .reading(
            ReadingDefinition::new(ReadingKind::Flags, "Warning", ResponseKind::Flags).flag_names(
                &[
                    "PV loss warning",
                    "Inverter fault",
                    "Bus over fault",
                    "Bus under fault",
                    "Bus soft fail fault",
                    "Line fail warning",
                    "OPV short warning",
                    "Inverter voltage too low fault",
                    "Inverter voltage too high fault",
                    "Over temperature fault",
                    "Fan locked fault",
                    "Battery voltage to high fault",
                    "Battery low alarm warning",
                    "Reserved",
                    "Battery under shutdown warning",
                    "Battery derating warning",
                    "Overload fault",
                    "EEPROM fault",
                    "Inverter over current fault",
                    "Inverter soft fail fault",
                    "Self test fail fault",
                    "OP DC voltage over fault",
                    "Bat open fault",
                    "Current sensor fail fault",
                    "Battery short fault",
                    "Power limit warning",
                    "PV voltage high warning",
                    "MPPT overload fault",
                    "MPPT overload warning",
                    "Battery too low to charge warning",
                    "",
                    "Battery weak",
                ],
            ),
        )
        .test_response(b"(00000100000000001000000000000000\x56\xa6\r")
        .test_response(b"(000000000000000000000000000000000000<\x8e\r")
        .build()
}
// }}}

// {{{ QDI
fn qdi() -> Result<CommandDefinition> {
    let enabled_disabled = &["disabled", "enabled"];
    CommandDefinition::new("QDI", "Get the Inverters Default Settings", ResultShape::Ordered)
        .category(CommandCategory::Defaults)
        .readings(vec![
            ReadingDefinition::new(ReadingKind::Volts, "AC Output Voltage", ResponseKind::Float),
            ReadingDefinition::new(
                ReadingKind::Frequency,
                "AC Output Frequency",
                ResponseKind::Float,
            ),
            ReadingDefinition::new(
                ReadingKind::Current,
                "Max AC Charging Current",
                ResponseKind::Int,
            ),
            ReadingDefinition::new(ReadingKind::Volts, "Battery Under Voltage", ResponseKind::Float),
            ReadingDefinition::new(
                ReadingKind::Volts,
                "Battery Float Charge Voltage",
                ResponseKind::Float,
            ),
            ReadingDefinition::new(
                ReadingKind::Volts,
                "Battery Bulk Charge Voltage",
                ResponseKind::Float,
            ),
            ReadingDefinition::new(
                ReadingKind::Volts,
                "Battery Recharge Voltage",
                ResponseKind::Float,
            ),
            ReadingDefinition::new(ReadingKind::Current, "Max Charging Current", ResponseKind::Int),
            ReadingDefinition::new(ReadingKind::Message, "Input Voltage Range", ResponseKind::List)
                .options_list(&["Appliance", "UPS"]),
            ReadingDefinition::new(
                ReadingKind::Message,
                "Output Source Priority",
                ResponseKind::List,
            )
            .options_list(OUTPUT_SOURCE_PRIORITIES),
            ReadingDefinition::new(
                ReadingKind::Message,
                "Charger Source Priority",
                ResponseKind::List,
            )
            .options_list(CHARGER_SOURCE_PRIORITIES),
            ReadingDefinition::new(ReadingKind::Message, "Battery Type", ResponseKind::List)
                .options_list(BATTERY_TYPES),
            ReadingDefinition::new(ReadingKind::Message, "Buzzer", ResponseKind::List)
                .options_list(&["enabled", "disabled"]),
            ReadingDefinition::new(ReadingKind::Message, "Power saving", ResponseKind::List)
                .options_list(enabled_disabled),
            ReadingDefinition::new(ReadingKind::Message, "Overload restart", ResponseKind::List)
                .options_list(enabled_disabled),
            ReadingDefinition::new(
                ReadingKind::Message,
                "Over temperature restart",
                ResponseKind::List,
            )
            .options_list(enabled_disabled),
            ReadingDefinition::new(ReadingKind::Message, "LCD Backlight", ResponseKind::List)
                .options_list(enabled_disabled),
            ReadingDefinition::new(
                ReadingKind::Message,
                "Primary source interrupt alarm",
                ResponseKind::List,
            )
            .options_list(enabled_disabled),
            ReadingDefinition::new(ReadingKind::Message, "Record fault code", ResponseKind::List)
                .options_list(enabled_disabled),
            ReadingDefinition::new(ReadingKind::Message, "Overload bypass", ResponseKind::List)
                .options_list(enabled_disabled),
            ReadingDefinition::new(ReadingKind::Message, "LCD reset to default", ResponseKind::List)
                .options_list(enabled_disabled),
            ReadingDefinition::new(ReadingKind::Message, "Output mode", ResponseKind::List)
                .options_list(OUTPUT_MODES),
            ReadingDefinition::new(
                ReadingKind::Volts,
                "Battery Redischarge Voltage",
                ResponseKind::Float,
            ),
            ReadingDefinition::new(ReadingKind::Message, "PV OK condition", ResponseKind::List)
                .options_list(&[
                    "As long as one unit of inverters has connect PV, parallel system will consider PV OK",
                    "Only All of inverters have connect PV, parallel system will consider PV OK",
                ]),
            ReadingDefinition::new(ReadingKind::Message, "PV Power Balance", ResponseKind::List)
                .options_list(&[
                    "PV input max current will be the max charged current",
                    "PV input max power will be the sum of the max charged power and loads power",
                ]),
            ReadingDefinition::new(ReadingKind::Message, "Unknown Value", ResponseKind::Bytes),
        ])
        .test_response(
            b"(230.0 50.0 0030 42.0 54.0 56.4 46.0 60 0 0 2 0 0 0 0 0 1 1 0 0 1 0 54.0 0 1 000\x9e\x60\r",
        )
        .build()
}
// }}}

// {{{ setters
fn setter(code: &str, description: &str, help_text: &str) -> CommandDefinition {
    CommandDefinition::new(code, description, ResultShape::Ack)
        .help(help_text)
        .category(CommandCategory::Settings)
        .command_type(CommandType::Setter)
        .reading(ReadingDefinition::new(ReadingKind::Ack, description, ResponseKind::Ack))
        .test_response(b"(NAK\x73\x73\r")
        .test_response(b"(ACK\x39\x20\r")
}

fn setter_commands() -> Result<Vec<CommandDefinition>> {
    Ok(vec![
        setter(
            "F",
            "Set Device Output Frequency",
            " -- examples: F50 (set output frequency to 50Hz) or F60 (set output frequency to 60Hz)",
        )
        .regex("F([56]0)$")
        .build()?,
        setter(
            "PBT",
            "Set Battery Type",
            " -- examples: PBT00 (set battery as AGM), PBT01 (set battery as FLOODED), PBT02 (set battery as USER)",
        )
        .regex("PBT(0[012])$")
        .build()?,
        setter(
            "PCP",
            "Set Device Charger Priority",
            " -- examples: PCP00 (set utility first), PCP01 (set solar first), PCP03 (set solar only charging)",
        )
        .regex("PCP(0[0123])$")
        .build()?,
        setter(
            "PCVV",
            "Set Battery C.V. (constant voltage) charging voltage",
            " -- example PCVV48.0 - set charging voltage to 48V (48.0 - 58.4V for 48V unit)",
        )
        .regex("PCVV(\\d\\d\\.\\d)$")
        .build()?,
        setter(
            "POP",
            "Set Device Output Source Priority",
            " -- examples: POP00 (set utility first), POP01 (set solar first), POP02 (set SBU priority)",
        )
        .regex("POP(0[012])$")
        .build()?,
        setter(
            "PE",
            "Set the enabled state of an Inverter setting",
            " -- examples: PEa - enable a (buzzer) [a=buzzer, b=overload bypass, j=power saving, k=LCD go to default after 1min, u=overload restart, v=overtemp restart, x=backlight, y=alarm on primary source interrupt, z=fault code record]",
        )
        .regex("PE(.+)$")
        .build()?,
        setter(
            "PD",
            "Set the disabled state of an Inverter setting",
            " -- examples: PDa - disable a (buzzer)",
        )
        .regex("PD(.+)$")
        .build()?,
        setter(
            "PF",
            "Set Control Parameters to Default Values",
            " -- example PF (reset control parameters to defaults)",
        )
        .build()?,
    ])
}
// }}}

// {{{ MAX model additions
fn max_commands() -> Result<Vec<CommandDefinition>> {
    let energy_response: &[u8] = b"(00238800!J\r";
    Ok(vec![
        CommandDefinition::new("QSID", "Get the Serial Number of the Inverter", ResultShape::Single)
            .category(CommandCategory::Info)
            .reading(
                ReadingDefinition::new(ReadingKind::Message, "Serial Number", ResponseKind::String)
                    .icon("mdi:identifier"),
            )
            .test_response(b"(1492932105105335005535\x94\x0e\r")
            .build()?,
        CommandDefinition::new("QT", "Get the Device Time", ResultShape::Single)
            .reading(ReadingDefinition::new(
                ReadingKind::DateTime,
                "Device Time",
                ResponseKind::Bytes,
            ))
            .test_response(b"(20210726122606JF\r")
            .build()?,
        CommandDefinition::new("QET", "Get Total PV Generated Energy", ResultShape::Single)
            .reading(
                ReadingDefinition::new(
                    ReadingKind::WattHours,
                    "Total PV Generated Energy",
                    ResponseKind::Int,
                )
                .icon("mdi:solar-power")
                .device_class("energy")
                .state_class("total_increasing"),
            )
            .test_response(energy_response)
            .build()?,
        CommandDefinition::new("QEY", "Get Yearly PV Generated Energy", ResultShape::Ordered)
            .help(" -- display generated energy for the year, format is QEYyyyy")
            .regex("QEY(\\d\\d\\d\\d)$")
            .readings(vec![
                ReadingDefinition::new(
                    ReadingKind::WattHours,
                    "PV Generated Energy for Year",
                    ResponseKind::Int,
                )
                .icon("mdi:counter")
                .device_class("energy")
                .state_class("total_increasing"),
                ReadingDefinition::new(ReadingKind::Year, "Year", ResponseKind::InfoFromCommand)
                    .slice(3, 7),
            ])
            .test_response(energy_response)
            .build()?,
        CommandDefinition::new("QEM", "Get Monthly PV Generated Energy", ResultShape::Ordered)
            .help(" -- display generated energy for the month, format is QEMyyyymm")
            .regex("QEM(\\d\\d\\d\\d\\d\\d)$")
            .readings(vec![
                ReadingDefinition::new(
                    ReadingKind::WattHours,
                    "PV Generated Energy for Month",
                    ResponseKind::Int,
                )
                .icon("mdi:solar-power")
                .device_class("energy")
                .state_class("total_increasing"),
                ReadingDefinition::new(ReadingKind::Year, "Year", ResponseKind::InfoFromCommand)
                    .slice(3, 7),
                ReadingDefinition::new(ReadingKind::Month, "Month", ResponseKind::InfoFromCommand)
                    .slice(7, 9)
                    .command_info(CommandInfo::MonthName),
            ])
            .test_response(energy_response)
            .build()?,
        CommandDefinition::new("QED", "Get Daily PV Generated Energy", ResultShape::Ordered)
            .help(" -- display daily generated energy, format is QEDyyyymmdd")
            .regex("QED(\\d\\d\\d\\d\\d\\d\\d\\d)$")
            .readings(vec![
                ReadingDefinition::new(
                    ReadingKind::WattHours,
                    "PV Generated Energy for Day",
                    ResponseKind::Int,
                )
                .icon("mdi:solar-power")
                .device_class("energy")
                .state_class("total_increasing"),
                ReadingDefinition::new(ReadingKind::Year, "Year", ResponseKind::InfoFromCommand)
                    .slice(3, 7),
                ReadingDefinition::new(ReadingKind::Month, "Month", ResponseKind::InfoFromCommand)
                    .slice(7, 9)
                    .command_info(CommandInfo::MonthName),
                ReadingDefinition::new(ReadingKind::Day, "Day", ResponseKind::InfoFromCommand)
                    .slice(9, 11),
            ])
            .test_response(energy_response)
            .build()?,
        CommandDefinition::new(
            "QBEQI",
            "Get Battery Equalization Parameters and Status",
            ResultShape::Ordered,
        )
        .readings(vec![
            ReadingDefinition::new(ReadingKind::Message, "Equalization Enabled", ResponseKind::List)
                .options_list(&["Disabled", "Enabled"]),
            ReadingDefinition::new(ReadingKind::TimeMinutes, "Equalization Time", ResponseKind::Int),
            ReadingDefinition::new(ReadingKind::TimeDays, "Equalization Period", ResponseKind::Int),
            ReadingDefinition::new(
                ReadingKind::Current,
                "Equalization Max Current",
                ResponseKind::Int,
            ),
            ReadingDefinition::new(ReadingKind::Message, "Reserved1", ResponseKind::Bytes),
            ReadingDefinition::new(ReadingKind::Volts, "Equalization Voltage", ResponseKind::Float),
            ReadingDefinition::new(ReadingKind::Message, "Reserved2", ResponseKind::Bytes),
            ReadingDefinition::new(
                ReadingKind::TimeMinutes,
                "Equalization Over Time",
                ResponseKind::Int,
            ),
            ReadingDefinition::new(ReadingKind::Message, "Equalization Active", ResponseKind::List)
                .options_list(&["Inactive", "Active"]),
            ReadingDefinition::new(
                ReadingKind::TimeHours,
                "Equalization Elasped Time",
                ResponseKind::Int,
            ),
        ])
        .test_response(b"(1 030 030 080 021 55.40 224 030 0 0234y?\r")
        .build()?,
    ])
}
// }}}
