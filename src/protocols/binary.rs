//! Binary layout descriptors.
//!
//! Binary framed protocols describe their fixed response shapes as an
//! ordered list of named fields. The interpreter walks the raw bytes and
//! produces an ordered `(key, value)` list that the keyed decoding path
//! consumes. Repeated fields (cell voltage arrays and the like) are
//! flattened into synthetic 1-based keys such as `cell_01_voltage`, with
//! zero entries skipped where the protocol defines zero as "not present".

use nom::number::complete::{be_u16, be_u32, i8 as nom_i8, le_f32, le_u16, le_u32, u8 as nom_u8};

use crate::error::{Error, Result};
use crate::protocols::result::RawValue;

/// Numeric encoding of a single layout field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    U8,
    I8,
    U16be,
    U16le,
    U32be,
    U32le,
    F32le,
}

#[derive(Debug, Clone)]
enum LayoutField {
    /// Fixed marker bytes; parse fails if the input differs.
    Const { name: &'static str, value: &'static [u8] },
    /// A single fixed byte, e.g. a per-command function code.
    ConstByte { name: &'static str, value: u8 },
    /// A single named scalar.
    Scalar { name: &'static str, kind: FieldType },
    /// A named run of raw bytes.
    Bytes { name: &'static str, len: usize },
    /// `count` repeated values emitted as `{prefix}_{NN}_{suffix}`.
    Array {
        prefix: &'static str,
        suffix: &'static str,
        count: usize,
        kind: FieldType,
        skip_zero: bool,
    },
    /// Reserved/unused region.
    Skip { len: usize },
}

/// An ordered, reusable schema for one fixed binary frame shape.
#[derive(Debug, Clone, Default)]
pub struct BinaryLayout {
    fields: Vec<LayoutField>,
}

impl BinaryLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(mut self, name: &'static str, value: &'static [u8]) -> Self {
        self.fields.push(LayoutField::Const { name, value });
        self
    }

    pub fn constant_byte(mut self, name: &'static str, value: u8) -> Self {
        self.fields.push(LayoutField::ConstByte { name, value });
        self
    }

    pub fn scalar(mut self, name: &'static str, kind: FieldType) -> Self {
        self.fields.push(LayoutField::Scalar { name, kind });
        self
    }

    pub fn bytes(mut self, name: &'static str, len: usize) -> Self {
        self.fields.push(LayoutField::Bytes { name, len });
        self
    }

    pub fn array(
        mut self,
        prefix: &'static str,
        suffix: &'static str,
        count: usize,
        kind: FieldType,
    ) -> Self {
        self.fields.push(LayoutField::Array {
            prefix,
            suffix,
            count,
            kind,
            skip_zero: true,
        });
        self
    }

    pub fn skip(mut self, len: usize) -> Self {
        self.fields.push(LayoutField::Skip { len });
        self
    }

    /// Parse `input` into an ordered field name to value mapping.
    pub fn parse(&self, input: &[u8]) -> Result<Vec<(String, RawValue)>> {
        let mut rest = input;
        let mut values = Vec::new();

        for field in &self.fields {
            match field {
                LayoutField::Const { name, value } => {
                    let (taken, remaining) = take(rest, value.len(), name)?;
                    if taken != *value {
                        return Err(Error::InvalidResponse(format!(
                            "unexpected bytes for '{name}': got {taken:02x?}, expected {value:02x?}"
                        )));
                    }
                    rest = remaining;
                    values.push((name.to_string(), RawValue::Bytes(taken.to_vec())));
                }
                LayoutField::ConstByte { name, value } => {
                    let (taken, remaining) = take(rest, 1, name)?;
                    if taken[0] != *value {
                        return Err(Error::InvalidResponse(format!(
                            "unexpected byte for '{name}': got {:#04x}, expected {value:#04x}",
                            taken[0]
                        )));
                    }
                    rest = remaining;
                    values.push((name.to_string(), RawValue::Int(i64::from(*value))));
                }
                LayoutField::Scalar { name, kind } => {
                    let (value, remaining) = parse_value(rest, *kind, name)?;
                    rest = remaining;
                    values.push((name.to_string(), value));
                }
                LayoutField::Bytes { name, len } => {
                    let (taken, remaining) = take(rest, *len, name)?;
                    rest = remaining;
                    values.push((name.to_string(), RawValue::Bytes(taken.to_vec())));
                }
                LayoutField::Array {
                    prefix,
                    suffix,
                    count,
                    kind,
                    skip_zero,
                } => {
                    for position in 0..*count {
                        let (value, remaining) = parse_value(rest, *kind, prefix)?;
                        rest = remaining;
                        if *skip_zero && is_zero(&value) {
                            continue;
                        }
                        values.push((format!("{}_{:02}_{}", prefix, position + 1, suffix), value));
                    }
                }
                LayoutField::Skip { len } => {
                    let (_, remaining) = take(rest, *len, "reserved")?;
                    rest = remaining;
                }
            }
        }

        Ok(values)
    }
}

fn take<'a>(input: &'a [u8], len: usize, name: &str) -> Result<(&'a [u8], &'a [u8])> {
    if input.len() < len {
        return Err(Error::InvalidResponse(format!(
            "ran out of input parsing '{name}': wanted {len} bytes, {} left",
            input.len()
        )));
    }
    Ok(input.split_at(len))
}

fn parse_value<'a>(input: &'a [u8], kind: FieldType, name: &str) -> Result<(RawValue, &'a [u8])> {
    let short = |_| {
        Error::InvalidResponse(format!(
            "ran out of input parsing '{name}': {} bytes left",
            input.len()
        ))
    };
    match kind {
        FieldType::U8 => {
            let (rest, v) = nom_u8::<_, nom::error::Error<&[u8]>>(input).map_err(short)?;
            Ok((RawValue::Int(i64::from(v)), rest))
        }
        FieldType::I8 => {
            let (rest, v) = nom_i8::<_, nom::error::Error<&[u8]>>(input).map_err(short)?;
            Ok((RawValue::Int(i64::from(v)), rest))
        }
        FieldType::U16be => {
            let (rest, v) = be_u16::<_, nom::error::Error<&[u8]>>(input).map_err(short)?;
            Ok((RawValue::Int(i64::from(v)), rest))
        }
        FieldType::U16le => {
            let (rest, v) = le_u16::<_, nom::error::Error<&[u8]>>(input).map_err(short)?;
            Ok((RawValue::Int(i64::from(v)), rest))
        }
        FieldType::U32be => {
            let (rest, v) = be_u32::<_, nom::error::Error<&[u8]>>(input).map_err(short)?;
            Ok((RawValue::Int(i64::from(v)), rest))
        }
        FieldType::U32le => {
            let (rest, v) = le_u32::<_, nom::error::Error<&[u8]>>(input).map_err(short)?;
            Ok((RawValue::Int(i64::from(v)), rest))
        }
        FieldType::F32le => {
            let (rest, v) = le_f32::<_, nom::error::Error<&[u8]>>(input).map_err(short)?;
            Ok((RawValue::Float(f64::from(v)), rest))
        }
    }
}

fn is_zero(value: &RawValue) -> bool {
    match value {
        RawValue::Int(i) => *i == 0,
        RawValue::Float(f) => *f == 0.0,
        RawValue::Bytes(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soc_layout() -> BinaryLayout {
        BinaryLayout::new()
            .constant("start_flag", b"\xa5")
            .bytes("module_address", 1)
            .constant("command_id", b"\x90")
            .scalar("data_length", FieldType::U8)
            .scalar("battery_voltage", FieldType::U16be)
            .scalar("acquisition_voltage", FieldType::U16be)
            .scalar("current", FieldType::U16be)
            .scalar("soc", FieldType::U16be)
            .bytes("checksum", 1)
    }

    #[test]
    fn parses_daly_soc_frame() {
        let response = b"\xa5\x01\x90\x08\x01\x09\x00\x00\x75\xcf\x03\x0a\x99";
        let fields = soc_layout().parse(response).unwrap();

        let lookup = |key: &str| {
            fields
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(lookup("battery_voltage"), RawValue::Int(265));
        assert_eq!(lookup("current"), RawValue::Int(30159));
        assert_eq!(lookup("soc"), RawValue::Int(778));
        assert_eq!(lookup("data_length"), RawValue::Int(8));
    }

    #[test]
    fn const_mismatch_is_invalid_response() {
        let response = b"\xa4\x01\x90\x08\x01\x09\x00\x00\x75\xcf\x03\x0a\x99";
        let err = soc_layout().parse(response).unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[test]
    fn short_input_is_invalid_response() {
        let err = soc_layout().parse(b"\xa5\x01\x90").unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[test]
    fn arrays_flatten_with_one_based_keys_and_skip_zeroes() {
        let layout = BinaryLayout::new().array("cell", "voltage", 4, FieldType::U16be);
        // cells 1, 2 and 4 present; cell 3 reads zero and is dropped
        let fields = layout.parse(&[0x0c, 0xfc, 0x0d, 0x10, 0x00, 0x00, 0x0d, 0x0f]).unwrap();
        assert_eq!(
            fields,
            vec![
                ("cell_01_voltage".to_string(), RawValue::Int(0x0cfc)),
                ("cell_02_voltage".to_string(), RawValue::Int(0x0d10)),
                ("cell_04_voltage".to_string(), RawValue::Int(0x0d0f)),
            ]
        );
    }

    #[test]
    fn skip_regions_consume_input() {
        let layout = BinaryLayout::new()
            .skip(2)
            .scalar("value", FieldType::U16le);
        let fields = layout.parse(&[0xff, 0xff, 0x34, 0x12]).unwrap();
        assert_eq!(fields, vec![("value".to_string(), RawValue::Int(0x1234))]);
    }
}
