//! Reading definitions: how one field of a response becomes one or more
//! typed readings.
//!
//! A definition pairs a semantic reading kind (volts, watts, flags, ...)
//! with a raw response encoding and optional decode data (option maps,
//! flag name lists, arithmetic templates, slice bounds). Translation is an
//! exhaustive match over the encoding, so adding a new kind is a
//! compiler-checked change.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::error::{Error, Result};
use crate::protocols::result::{RawValue, Reading, Value};
use crate::protocols::template::Template;

/// Semantic kind of a reading; drives the default unit and any
/// kind-specific translation behaviour (ack mapping, flag fan-out,
/// temperature override).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingKind {
    Ignore,
    Ack,
    Number,
    Current,
    ApparentPower,
    Energy,
    Watts,
    WattHours,
    KilowattHours,
    Volts,
    MilliVolts,
    DateTime,
    Year,
    Month,
    Day,
    TimeSeconds,
    TimeMinutes,
    TimeHours,
    TimeDays,
    Message,
    MessageAmps,
    Flags,
    MultiEnableDisable,
    Temperature,
    Percentage,
    Frequency,
    HexStr,
}

impl ReadingKind {
    fn default_unit(self) -> &'static str {
        use ReadingKind::*;
        match self {
            Current | MessageAmps => "A",
            ApparentPower => "VA",
            Energy => "Ah",
            Watts => "W",
            WattHours => "Wh",
            KilowattHours => "kWh",
            Volts => "V",
            MilliVolts => "mV",
            TimeSeconds => "sec",
            TimeMinutes => "min",
            TimeHours => "hours",
            TimeDays => "days",
            Temperature => "°C",
            Percentage => "%",
            Frequency => "Hz",
            _ => "",
        }
    }

    /// Kinds that only make sense over a numeric encoding.
    fn is_numeric(self) -> bool {
        use ReadingKind::*;
        matches!(
            self,
            Number
                | Current
                | ApparentPower
                | Energy
                | Watts
                | WattHours
                | KilowattHours
                | Volts
                | MilliVolts
                | TimeSeconds
                | TimeMinutes
                | TimeHours
                | TimeDays
                | Temperature
                | Percentage
                | Frequency
                | HexStr
        )
    }
}

/// Raw encoding of a response field; determines how the slice is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Ack,
    /// "0" is false, anything else true.
    Bool,
    /// "1" is false, "0" is true.
    InvBool,
    Int,
    Float,
    String,
    Bytes,
    BytesStripNulls,
    /// Little endian 2 byte signed value sent as a hex string,
    /// e.g. "7800" = 0x0078 = 120.
    Le2ByteSigned,
    /// Value selects an entry from a key/value option map.
    Option,
    /// Value indexes into an option list.
    List,
    /// Integer ANDed against each bit-map key; matches joined with commas.
    BitEncoded,
    /// 'E'/'D' state tokens followed by letter keys, fanned out into one
    /// reading per letter.
    EnableDisableFlags,
    /// Positional '0'/'1' characters aligned with a flag name list.
    Flags,
    /// Integer passed through an arithmetic template.
    TemplateInt,
    /// The value is re-extracted from the issued command string rather
    /// than the response (date-suffixed commands).
    InfoFromCommand,
}

impl ResponseKind {
    fn is_numeric(self) -> bool {
        matches!(
            self,
            ResponseKind::Int
                | ResponseKind::Float
                | ResponseKind::TemplateInt
                | ResponseKind::Le2ByteSigned
                | ResponseKind::InfoFromCommand
        )
    }
}

/// How an [`ResponseKind::InfoFromCommand`] reading interprets its slice
/// of the issued command string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandInfo {
    Int,
    MonthName,
}

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Metadata for decoding one field of a response.
#[derive(Debug, Clone)]
pub struct ReadingDefinition {
    key: Option<String>,
    description: String,
    reading_kind: ReadingKind,
    response_kind: ResponseKind,
    unit: String,
    pub device_class: Option<&'static str>,
    pub state_class: Option<&'static str>,
    pub icon: Option<&'static str>,
    list_options: Vec<String>,
    map_options: Vec<(String, String)>,
    bit_options: Vec<(u64, String)>,
    flag_names: Vec<String>,
    template: Option<Template>,
    slice_bounds: Option<(usize, usize)>,
    command_info: Option<CommandInfo>,
    strip_prefix: Option<String>,
    default: Option<Value>,
    ack_codes: AckCodes,
}

#[derive(Debug, Clone)]
struct AckCodes {
    success_code: String,
    success_text: String,
    fail_code: String,
    fail_text: String,
}

impl Default for AckCodes {
    fn default() -> Self {
        Self {
            success_code: "ACK".into(),
            success_text: "Succeeded".into(),
            fail_code: "NAK".into(),
            fail_text: "Failed".into(),
        }
    }
}

impl ReadingDefinition {
    pub fn new(reading_kind: ReadingKind, description: &str, response_kind: ResponseKind) -> Self {
        Self {
            key: None,
            description: description.to_string(),
            reading_kind,
            response_kind,
            unit: reading_kind.default_unit().to_string(),
            device_class: None,
            state_class: None,
            icon: None,
            list_options: Vec::new(),
            map_options: Vec::new(),
            bit_options: Vec::new(),
            flag_names: Vec::new(),
            template: None,
            slice_bounds: None,
            command_info: None,
            strip_prefix: None,
            default: None,
            ack_codes: AckCodes::default(),
        }
    }

    /// Shorthand for a plain message field.
    pub fn message(description: &str) -> Self {
        Self::new(ReadingKind::Message, description, ResponseKind::String)
    }

    /// Field addressed by key instead of position (keyed and binary
    /// layout result shapes).
    pub fn keyed(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }

    pub fn unit_override(mut self, unit: &str) -> Self {
        self.unit = unit.to_string();
        self
    }

    pub fn icon(mut self, icon: &'static str) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn device_class(mut self, device_class: &'static str) -> Self {
        self.device_class = Some(device_class);
        self
    }

    pub fn state_class(mut self, state_class: &'static str) -> Self {
        self.state_class = Some(state_class);
        self
    }

    pub fn options_list(mut self, options: &[&str]) -> Self {
        self.list_options = options.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn options_map(mut self, options: &[(&str, &str)]) -> Self {
        self.map_options = options
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self
    }

    pub fn options_bits(mut self, options: &[(u64, &str)]) -> Self {
        self.bit_options = options.iter().map(|(k, v)| (*k, v.to_string())).collect();
        self
    }

    pub fn flag_names(mut self, flags: &[&str]) -> Self {
        self.flag_names = flags.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn template(mut self, template: Template) -> Self {
        self.template = Some(template);
        self
    }

    /// `[start, end)` byte range, used by the sliced result shape and by
    /// info-from-command readings (range into the issued command string).
    pub fn slice(mut self, start: usize, end: usize) -> Self {
        self.slice_bounds = Some((start, end));
        self
    }

    pub fn command_info(mut self, info: CommandInfo) -> Self {
        self.command_info = Some(info);
        self
    }

    pub fn strip_prefix(mut self, prefix: &str) -> Self {
        self.strip_prefix = Some(prefix.to_string());
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn ack_codes(mut self, success: &str, fail: &str) -> Self {
        self.ack_codes.success_code = success.to_string();
        self.ack_codes.fail_code = fail.to_string();
        self
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn reading_kind(&self) -> ReadingKind {
        self.reading_kind
    }

    pub fn response_kind(&self) -> ResponseKind {
        self.response_kind
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn slice_bounds(&self) -> Option<(usize, usize)> {
        self.slice_bounds
    }

    /// Eager table validation: bad protocol tables must fail at
    /// construction, not at first decode.
    pub fn validate(&self) -> Result<()> {
        if self.reading_kind.is_numeric() && !self.response_kind.is_numeric() {
            return Err(Error::Config(format!(
                "reading '{}' must have a numeric response kind, {:?} is not valid",
                self.description, self.response_kind
            )));
        }
        match self.response_kind {
            ResponseKind::Option if self.map_options.is_empty() => Err(Error::Config(format!(
                "reading '{}' needs an options map",
                self.description
            ))),
            ResponseKind::List if self.list_options.is_empty() => Err(Error::Config(format!(
                "reading '{}' needs an options list",
                self.description
            ))),
            ResponseKind::BitEncoded if self.bit_options.is_empty() => Err(Error::Config(format!(
                "reading '{}' needs a bit map",
                self.description
            ))),
            ResponseKind::Flags if self.flag_names.is_empty() => Err(Error::Config(format!(
                "reading '{}' needs flag names",
                self.description
            ))),
            ResponseKind::EnableDisableFlags if self.map_options.is_empty() => {
                Err(Error::Config(format!(
                    "reading '{}' needs a letter key map",
                    self.description
                )))
            }
            ResponseKind::InfoFromCommand if self.slice_bounds.is_none() => {
                Err(Error::Config(format!(
                    "reading '{}' needs a command slice",
                    self.description
                )))
            }
            _ => Ok(()),
        }
    }

    /// Translate a raw slice into zero or more readings.
    ///
    /// Almost always one; flag fan-out variants return one per flag and
    /// ignored fields return none. `overrides` is the execution-time
    /// override map passed down from the command trigger.
    pub fn readings_from_raw(
        &self,
        raw: &RawValue,
        command_code: &str,
        overrides: Option<&HashMap<String, String>>,
    ) -> Result<Vec<Reading>> {
        debug!("translating {:?} for '{}'", raw, self.description);
        match self.reading_kind {
            ReadingKind::Ignore => Ok(Vec::new()),
            ReadingKind::Ack => self.translate_ack(raw),
            ReadingKind::Flags => self.translate_flag_list(raw),
            ReadingKind::MultiEnableDisable => self.translate_enable_disable(raw),
            ReadingKind::Temperature => self.translate_temperature(raw, overrides),
            ReadingKind::HexStr => {
                let value = match self.translate_raw(raw, command_code)? {
                    Value::Int(i) => Value::String(format!("{i:#x}")),
                    other => other,
                };
                Ok(vec![Reading::new(raw.clone(), value, Arc::new(self.clone()))])
            }
            _ => {
                let value = self.translate_raw(raw, command_code)?;
                Ok(vec![Reading::new(raw.clone(), value, Arc::new(self.clone()))])
            }
        }
    }

    fn translate_ack(&self, raw: &RawValue) -> Result<Vec<Reading>> {
        let token = raw.display();
        let codes = &self.ack_codes;
        let text = if token == codes.success_code {
            codes.success_text.clone()
        } else if token == codes.fail_code {
            codes.fail_text.clone()
        } else {
            return Err(Error::decode(
                &self.description,
                format!("expected '{}' or '{}', got '{token}'", codes.success_code, codes.fail_code),
            ));
        };
        Ok(vec![Reading::new(raw.clone(), Value::String(text), Arc::new(self.clone()))])
    }

    /// One reading per named flag, aligned positionally with the '0'/'1'
    /// characters of the raw value. Unnamed positions are skipped.
    fn translate_flag_list(&self, raw: &RawValue) -> Result<Vec<Reading>> {
        let RawValue::Bytes(bytes) = raw else {
            return Err(Error::decode(&self.description, "expected flag characters".to_string()));
        };
        let mut readings = Vec::new();
        for (position, byte) in bytes.iter().enumerate() {
            let Some(name) = self.flag_names.get(position) else {
                break;
            };
            if name.is_empty() {
                continue;
            }
            if !byte.is_ascii_digit() {
                return Err(Error::decode(
                    &self.description,
                    format!("expected flag characters, got {:#04x}", byte),
                ));
            }
            let state = i64::from(byte - b'0');
            let definition = Arc::new(self.renamed(name));
            readings.push(Reading::new(raw.clone(), Value::Int(state), definition));
        }
        Ok(readings)
    }

    /// Expand e.g. `EakxyDbjuvz` into one enabled/disabled reading per
    /// letter key, the state set by the preceding 'E' or 'D' token.
    fn translate_enable_disable(&self, raw: &RawValue) -> Result<Vec<Reading>> {
        let RawValue::Bytes(bytes) = raw else {
            return Err(Error::decode(&self.description, "expected flag characters".to_string()));
        };
        let mut state = "unknown";
        let mut readings = Vec::new();
        for (position, byte) in bytes.iter().enumerate() {
            match byte {
                b'E' => state = "enabled",
                b'D' => state = "disabled",
                other => {
                    let letter = (*other as char).to_string();
                    let name = self
                        .map_options
                        .iter()
                        .find(|(k, _)| *k == letter)
                        .map(|(_, v)| v.clone())
                        .unwrap_or_else(|| format!("unknown_{position}"));
                    let definition = Arc::new(self.renamed(&name));
                    readings.push(Reading::new(
                        raw.clone(),
                        Value::String(state.to_string()),
                        definition,
                    ));
                }
            }
        }
        Ok(readings)
    }

    /// Temperatures are stored in celsius; an execution-time override of
    /// `temperature: F` converts to fahrenheit and rewrites the unit.
    fn translate_temperature(
        &self,
        raw: &RawValue,
        overrides: Option<&HashMap<String, String>>,
    ) -> Result<Vec<Reading>> {
        let value = self.translate_raw(raw, "")?;
        let fahrenheit = overrides
            .and_then(|o| o.get("temperature"))
            .map(|t| t.starts_with('F'))
            .unwrap_or(false);
        if !fahrenheit {
            return Ok(vec![Reading::new(raw.clone(), value, Arc::new(self.clone()))]);
        }
        let celsius = match value {
            Value::Int(i) => i as f64,
            Value::Float(f) => f,
            other => {
                return Err(Error::decode(
                    &self.description,
                    format!("expected a numeric temperature, got {other:?}"),
                ))
            }
        };
        let mut definition = self.clone();
        definition.unit = "°F".to_string();
        Ok(vec![Reading::new(
            raw.clone(),
            Value::Float(1.8 * celsius + 32.0),
            Arc::new(definition),
        )])
    }

    fn renamed(&self, description: &str) -> Self {
        let mut clone = self.clone();
        clone.description = description.to_string();
        clone
    }

    /// Interpret the raw slice as a single basic value.
    fn translate_raw(&self, raw: &RawValue, command_code: &str) -> Result<Value> {
        match self.response_kind {
            ResponseKind::Bool => Ok(Value::Bool(self.parse_bool(raw)?)),
            ResponseKind::InvBool => Ok(Value::Bool(!self.parse_bool(raw)?)),
            ResponseKind::Int => self.parse_int(raw).map(Value::Int),
            ResponseKind::TemplateInt => {
                let value = self.parse_int(raw);
                match (value, &self.template) {
                    (Ok(v), Some(template)) => Ok(template.apply_int(v)),
                    (Ok(v), None) => Ok(Value::Int(v)),
                    (Err(e), _) => Err(e),
                }
            }
            ResponseKind::Float => match raw {
                RawValue::Float(f) => Ok(Value::Float(*f)),
                RawValue::Int(i) => Ok(Value::Float(*i as f64)),
                RawValue::Bytes(bytes) => {
                    let text = utf8(bytes, &self.description)?;
                    match text.trim().parse::<f64>() {
                        Ok(f) => Ok(Value::Float(f)),
                        Err(_) => self.default_or(format!("expected a FLOAT, got '{text}'")),
                    }
                }
            },
            ResponseKind::String | ResponseKind::Bytes => {
                let mut text = raw.display();
                if let Some(prefix) = &self.strip_prefix {
                    if let Some(stripped) = text.strip_prefix(prefix.as_str()) {
                        text = stripped.to_string();
                    }
                }
                Ok(Value::String(text))
            }
            ResponseKind::BytesStripNulls => {
                let RawValue::Bytes(bytes) = raw else {
                    return Ok(Value::String(raw.display()));
                };
                let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
                let end = bytes.iter().rposition(|b| *b != 0).map_or(start, |p| p + 1);
                Ok(Value::String(
                    String::from_utf8_lossy(&bytes[start..end]).into_owned(),
                ))
            }
            ResponseKind::Le2ByteSigned => {
                let text = raw.display();
                let decoded = (text.len() == 4)
                    .then(|| u16::from_str_radix(&text, 16).ok())
                    .flatten();
                match decoded {
                    Some(hex) => {
                        let value = i16::from_le_bytes(hex.to_be_bytes());
                        Ok(Value::Int(i64::from(value)))
                    }
                    None => self.default_or(format!("expected 4 hex characters, got '{text}'")),
                }
            }
            ResponseKind::Option => {
                let key = match raw {
                    RawValue::Int(i) => i.to_string(),
                    _ => raw.display(),
                };
                match self.map_options.iter().find(|(k, _)| *k == key) {
                    Some((_, label)) => Ok(Value::String(label.clone())),
                    None => {
                        let keys: Vec<&str> =
                            self.map_options.iter().map(|(k, _)| k.as_str()).collect();
                        Err(Error::decode(
                            &self.description,
                            format!("key '{key}' not in options {keys:?}"),
                        ))
                    }
                }
            }
            ResponseKind::List => {
                let index = self.parse_int(raw)?;
                match usize::try_from(index).ok().and_then(|i| self.list_options.get(i)) {
                    Some(label) => Ok(Value::String(label.clone())),
                    None => Err(Error::decode(
                        &self.description,
                        format!(
                            "index {index} out of range for options list of {}",
                            self.list_options.len()
                        ),
                    )),
                }
            }
            ResponseKind::BitEncoded => {
                let value = self.parse_int(raw)?;
                if value == 0 {
                    let none = self
                        .bit_options
                        .iter()
                        .find(|(k, _)| *k == 0)
                        .map(|(_, v)| v.clone())
                        .unwrap_or_default();
                    return Ok(Value::String(none));
                }
                let names: Vec<&str> = self
                    .bit_options
                    .iter()
                    .filter(|(bit, _)| *bit != 0 && (value as u64) & *bit != 0)
                    .map(|(_, name)| name.as_str())
                    .collect();
                Ok(Value::String(names.join(",")))
            }
            ResponseKind::InfoFromCommand => {
                let (start, end) = self.slice_bounds.unwrap_or((0, command_code.len()));
                let slice = command_code.get(start..end.min(command_code.len())).unwrap_or("");
                let number: i64 = slice.parse().map_err(|_| {
                    Error::decode(
                        &self.description,
                        format!("expected digits in command '{command_code}' at {start}..{end}"),
                    )
                })?;
                match self.command_info.unwrap_or(CommandInfo::Int) {
                    CommandInfo::Int => Ok(Value::Int(number)),
                    CommandInfo::MonthName => {
                        let name = usize::try_from(number)
                            .ok()
                            .and_then(|n| n.checked_sub(1))
                            .and_then(|n| MONTH_NAMES.get(n))
                            .ok_or_else(|| {
                                Error::decode(
                                    &self.description,
                                    format!("month {number} out of range"),
                                )
                            })?;
                        Ok(Value::String(name.to_string()))
                    }
                }
            }
            ResponseKind::Ack | ResponseKind::Flags | ResponseKind::EnableDisableFlags => {
                Err(Error::decode(
                    &self.description,
                    format!("{:?} cannot be translated as a single value", self.response_kind),
                ))
            }
        }
    }

    fn parse_bool(&self, raw: &RawValue) -> Result<bool> {
        match raw {
            RawValue::Int(i) => Ok(*i != 0),
            RawValue::Float(f) => Ok(*f != 0.0),
            RawValue::Bytes(bytes) => {
                let text = utf8(bytes, &self.description)?;
                if let Ok(number) = text.trim().parse::<i64>() {
                    return Ok(number != 0);
                }
                match text.trim().to_ascii_lowercase().as_str() {
                    "true" => Ok(true),
                    "false" => Ok(false),
                    _ => match &self.default {
                        Some(Value::Bool(b)) => Ok(*b),
                        _ => Err(Error::decode(
                            &self.description,
                            format!("expected a BOOL, got '{text}'"),
                        )),
                    },
                }
            }
        }
    }

    fn parse_int(&self, raw: &RawValue) -> Result<i64> {
        match raw {
            RawValue::Int(i) => Ok(*i),
            RawValue::Float(f) => Ok(*f as i64),
            RawValue::Bytes(bytes) => {
                let text = utf8(bytes, &self.description)?;
                match text.trim().parse::<i64>() {
                    Ok(number) => Ok(number),
                    Err(_) => match &self.default {
                        Some(Value::Int(i)) => Ok(*i),
                        _ => Err(Error::decode(
                            &self.description,
                            format!("expected an INT, got '{text}'"),
                        )),
                    },
                }
            }
        }
    }

    fn default_or(&self, reason: String) -> Result<Value> {
        match &self.default {
            Some(value) => Ok(value.clone()),
            None => Err(Error::decode(&self.description, reason)),
        }
    }
}

fn utf8(bytes: &[u8], description: &str) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| Error::decode(description, format!("expected UTF-8, got {bytes:02x?}")))
}
