//! Protocol implementations and the shared decode pipeline.
//!
//! A protocol owns a registry of command definitions, builds full wire
//! commands (framing plus integrity code) and decodes raw responses
//! through a fixed four stage pipeline: structural validity, integrity
//! check, trim, split. Each stage has a default suitable for the
//! `(...)`-framed CRC16 text protocols and may be overridden per protocol;
//! binary framed protocols replace most of them.

pub mod binary;
pub mod command_definition;
pub mod crc;
pub mod daly;
pub mod neey;
pub mod pi18;
pub mod pi30;
pub mod reading_definition;
pub mod result;
pub mod template;

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use enum_dispatch::enum_dispatch;
use log::{debug, info};

use crate::error::{Error, Result};
use crate::ports::PortType;
use crate::protocols::command_definition::{CommandDefinition, ResolvedCommand, ResultShape};
use crate::protocols::crc::crc_pi30;
use crate::protocols::daly::Daly;
use crate::protocols::neey::Neey;
use crate::protocols::pi18::Pi18;
use crate::protocols::pi30::{Pi30, Pi30Model};
use crate::protocols::reading_definition::ResponseKind;
use crate::protocols::result::{CommandResult, RawValue, Reading};

/// Execution-time override map passed down from the command trigger,
/// e.g. `temperature: F`.
pub type Overrides = HashMap<String, String>;

/// A response payload split into per-field slices.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitResponse {
    /// The whole payload feeds reading definition 0.
    Whole(Vec<u8>),
    /// One slice per positional reading definition.
    Positional(Vec<Vec<u8>>),
    /// Field key / value pairs consumed by key.
    Keyed(Vec<(String, RawValue)>),
}

/// Behaviour shared by every protocol. Protocols override the stages
/// where their wire format departs from the text default.
#[enum_dispatch]
pub trait ProtocolHandler {
    fn protocol_id(&self) -> &str;
    fn command_definitions(&self) -> &HashMap<String, Arc<CommandDefinition>>;
    fn supported_ports(&self) -> Vec<PortType>;
    fn port_type(&self) -> PortType;
    fn set_port_type(&mut self, port_type: PortType);

    /// The command used to fetch a device's unique serial/id, if the
    /// protocol defines one.
    fn id_command(&self) -> Option<&str> {
        None
    }

    /// Resolve a human-issued code to a command definition: direct match,
    /// uppercase match, alias, then regex. The issued code is returned
    /// alongside the definition so regex-captured parameters survive
    /// without mutating shared state.
    fn get_command_definition(&self, code: &str) -> Result<ResolvedCommand> {
        let definitions = self.command_definitions();

        if let Some(definition) = definitions.get(code) {
            if !definition.has_regex() {
                debug!("found command {} in protocol {}", code, self.protocol_id());
                return Ok(ResolvedCommand {
                    definition: definition.clone(),
                    code: code.to_string(),
                });
            }
        }
        let upper = code.to_uppercase();
        if let Some(definition) = definitions.get(&upper) {
            if !definition.has_regex() {
                debug!("found command {} in protocol {}", upper, self.protocol_id());
                return Ok(ResolvedCommand {
                    definition: definition.clone(),
                    code: upper,
                });
            }
        }

        for definition in definitions.values() {
            if definition.has_alias(code) {
                return Ok(ResolvedCommand {
                    definition: definition.clone(),
                    code: definition.code.clone(),
                });
            }
            if definition.regex_match(code) {
                debug!("matched {} to {} by regex", code, definition.code);
                return Ok(ResolvedCommand {
                    definition: definition.clone(),
                    code: code.to_string(),
                });
            }
        }

        info!("no command definition found for {}", code);
        Err(Error::MissingCommandDefinition(code.to_string()))
    }

    /// Build the full wire command: issued code as ASCII, CRC16, carriage
    /// return. Binary framed protocols override this entirely.
    fn get_full_command(&self, code: &str) -> Result<Vec<u8>> {
        let resolved = self.get_command_definition(code)?;
        let mut full_command = resolved.code.into_bytes();
        let (crc_high, crc_low) = crc_pi30(&full_command);
        full_command.extend_from_slice(&[crc_high, crc_low, b'\r']);
        debug!("full command: {:02x?}", full_command);
        Ok(full_command)
    }

    /// Stage 1: structural validity.
    fn check_valid(&self, response: &[u8], _definition: &CommandDefinition) -> Result<()> {
        if response.is_empty() {
            return Err(Error::InvalidResponse("response is empty".into()));
        }
        if response.len() <= 3 {
            return Err(Error::InvalidResponse("response is too short".into()));
        }
        Ok(())
    }

    /// Stage 2: integrity. Default recomputes the CRC16 over everything
    /// but the trailing integrity bytes and terminator.
    fn check_crc(&self, response: &[u8], _definition: &CommandDefinition) -> Result<()> {
        let (calc_high, calc_low) = crc_pi30(&response[..response.len() - 3]);
        let crc_high = response[response.len() - 3];
        let crc_low = response[response.len() - 2];
        if (calc_high, calc_low) != (crc_high, crc_low) {
            return Err(Error::InvalidCrc {
                got: format!("\\x{crc_high:02x}\\x{crc_low:02x}"),
                calculated: format!("\\x{calc_high:02x}\\x{calc_low:02x}"),
            });
        }
        debug!("CRCs match");
        Ok(())
    }

    /// Stage 3: trim framing. Default drops the leading marker and the
    /// trailing integrity bytes plus terminator.
    fn trim_response(&self, response: &[u8], _definition: &CommandDefinition) -> Vec<u8> {
        response[1..response.len() - 3].to_vec()
    }

    /// Stage 4: split the payload according to the command's result shape.
    fn split_response(
        &self,
        response: &[u8],
        definition: &CommandDefinition,
    ) -> Result<SplitResponse> {
        split_by_shape(response, definition)
    }

    /// Run the full pipeline over a raw response. Decode failures become
    /// an error result carrying the raw bytes; they never propagate.
    fn decode_response(
        &self,
        raw_response: &[u8],
        command: &ResolvedCommand,
        overrides: Option<&Overrides>,
    ) -> CommandResult {
        match run_pipeline(self, raw_response, command, overrides) {
            Ok(readings) => CommandResult::success(Bytes::copy_from_slice(raw_response), readings),
            Err(error) => {
                info!("decode of {} failed: {error}", command.definition.code);
                CommandResult::failure(Bytes::copy_from_slice(raw_response), error.to_string())
            }
        }
    }
}

/// Shape-driven splitting shared by the default pipeline and protocols
/// that only override it for specific commands.
pub(crate) fn split_by_shape(
    response: &[u8],
    definition: &CommandDefinition,
) -> Result<SplitResponse> {
    debug!("splitting {:02x?} as {:?}", response, definition.result_shape);
    match definition.result_shape {
        ResultShape::Ack | ResultShape::Single | ResultShape::Multivalued => {
            Ok(SplitResponse::Whole(response.to_vec()))
        }
        ResultShape::Ordered => Ok(SplitResponse::Positional(split_on(response, |b| {
            b.is_ascii_whitespace()
        }))),
        ResultShape::CommaDelimited => {
            Ok(SplitResponse::Positional(split_on(response, |b| b == b',')))
        }
        ResultShape::Sliced => {
            let mut slices = Vec::new();
            for reading in definition.reading_definitions() {
                let (start, end) = reading
                    .slice_bounds()
                    .expect("sliced commands are validated at build time");
                if end > response.len() {
                    return Err(Error::InvalidResponse(format!(
                        "response too short for slice {start}..{end} of '{}'",
                        reading.description()
                    )));
                }
                slices.push(response[start..end].to_vec());
            }
            Ok(SplitResponse::Positional(slices))
        }
        ResultShape::Keyed => {
            let mut pairs = Vec::new();
            for line in response.split(|b| *b == b'\n') {
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                let mut parts = line.splitn(2, |b| *b == b'\t');
                let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                    continue;
                };
                pairs.push((
                    String::from_utf8_lossy(key).trim().to_string(),
                    RawValue::Bytes(value.to_vec()),
                ));
            }
            Ok(SplitResponse::Keyed(pairs))
        }
        ResultShape::Binary => {
            let min_length = definition
                .min_response_len()
                .expect("binary commands are validated at build time");
            if response.len() < min_length {
                return Err(Error::InvalidResponse(format!(
                    "response of {} bytes too short for parsing (expecting {min_length})",
                    response.len()
                )));
            }
            let layout = definition
                .binary_layout()
                .expect("binary commands are validated at build time");
            Ok(SplitResponse::Keyed(layout.parse(response)?))
        }
    }
}

fn run_pipeline<P>(
    protocol: &P,
    raw_response: &[u8],
    command: &ResolvedCommand,
    overrides: Option<&Overrides>,
) -> Result<Vec<Reading>>
where
    P: ProtocolHandler + ?Sized,
{
    let definition = &command.definition;
    protocol.check_valid(raw_response, definition)?;
    protocol.check_crc(raw_response, definition)?;
    let payload = protocol.trim_response(raw_response, definition);
    let split = protocol.split_response(&payload, definition)?;

    let mut readings = Vec::new();
    match split {
        // single-valued shapes feed the whole payload to the positional
        // loop so info-from-command readings still run after reading 0
        SplitResponse::Whole(bytes) => {
            translate_positional(definition, vec![bytes], command, overrides, &mut readings)?
        }
        SplitResponse::Positional(items) => {
            translate_positional(definition, items, command, overrides, &mut readings)?
        }
        SplitResponse::Keyed(pairs) => {
            for (key, value) in pairs {
                let Some(reading) = definition.reading_definition_for_key(&key) else {
                    debug!("no reading definition for key {key}");
                    continue;
                };
                readings.extend(reading.readings_from_raw(&value, &command.code, overrides)?);
            }
        }
    }

    Ok(readings)
}

fn translate_positional(
    definition: &CommandDefinition,
    items: Vec<Vec<u8>>,
    command: &ResolvedCommand,
    overrides: Option<&Overrides>,
    readings: &mut Vec<Reading>,
) -> Result<()> {
    let mut items = items.into_iter();
    for reading in definition.reading_definitions() {
        if reading.response_kind() == ResponseKind::InfoFromCommand {
            // value comes from the issued command, not the payload
            readings.extend(reading.readings_from_raw(
                &RawValue::Bytes(Vec::new()),
                &command.code,
                overrides,
            )?);
            continue;
        }
        let Some(item) = items.next() else {
            break;
        };
        readings.extend(reading.readings_from_raw(
            &RawValue::Bytes(item),
            &command.code,
            overrides,
        )?);
    }
    Ok(())
}

fn split_on(response: &[u8], mut separator: impl FnMut(u8) -> bool) -> Vec<Vec<u8>> {
    response
        .split(|b| separator(*b))
        .filter(|part| !part.is_empty())
        .map(|part| part.to_vec())
        .collect()
}

/// The set of implemented protocols, statically dispatched.
#[enum_dispatch(ProtocolHandler)]
#[derive(Debug, Clone)]
pub enum DeviceProtocol {
    Pi30(Pi30),
    Pi18(Pi18),
    Daly(Daly),
    Neey(Neey),
}

/// Names accepted by [`get_protocol_definition`].
pub const SUPPORTED_PROTOCOLS: &[&str] = &["pi30", "pi30max", "pi18", "daly", "neey", "heltec"];

/// Resolve a protocol by name, with an optional device-model hint for
/// families that fork behaviour by model.
pub fn get_protocol_definition(protocol: &str, model: Option<&str>) -> Result<DeviceProtocol> {
    debug!("resolving protocol: {protocol}, model: {model:?}");
    match protocol.to_lowercase().as_str() {
        "pi30" => {
            let model = match model {
                Some(m) if m.to_uppercase().contains("MAX") => Pi30Model::Max,
                _ => Pi30Model::Standard,
            };
            Ok(Pi30::new(model)?.into())
        }
        "pi30max" => Ok(Pi30::new(Pi30Model::Max)?.into()),
        "pi18" => Ok(Pi18::new()?.into()),
        "daly" => Ok(Daly::new()?.into()),
        "neey" | "heltec" => Ok(Neey::new()?.into()),
        other => Err(Error::Config(format!(
            "invalid protocol_id, no protocol found for: '{other}'"
        ))),
    }
}

/// Validate and index a protocol's command table; a protocol with zero
/// commands is a configuration error.
pub(crate) fn build_command_map(
    protocol_id: &str,
    definitions: Vec<CommandDefinition>,
) -> Result<HashMap<String, Arc<CommandDefinition>>> {
    let mut commands = HashMap::new();
    for definition in definitions {
        commands.insert(definition.code.clone(), Arc::new(definition));
    }
    if commands.is_empty() {
        return Err(Error::Config(format!(
            "attempted to load protocol '{protocol_id}' which has no valid commands"
        )));
    }
    let mut codes: Vec<&str> = commands.keys().map(|c| c.as_str()).collect();
    codes.sort_unstable();
    info!(
        "using protocol {protocol_id} with {} commands ({})",
        commands.len(),
        codes.join(", ")
    );
    Ok(commands)
}
