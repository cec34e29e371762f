use powerdev_bridge::error::Error;
use powerdev_bridge::protocols::result::Value;
use powerdev_bridge::protocols::{get_protocol_definition, DeviceProtocol, ProtocolHandler};

fn proto() -> DeviceProtocol {
    get_protocol_definition("pi18", None).unwrap()
}

#[test]
fn full_command_uses_query_prefix_and_length() {
    let full = proto().get_full_command("PI").unwrap();
    assert_eq!(full, b"^P005PI\x71\x8b\r");
}

#[test]
fn full_command_uses_setter_prefix_for_parameterised_setters() {
    let protocol = proto();
    let resolved = protocol.get_command_definition("POP1").unwrap();
    assert_eq!(resolved.definition.code, "POP");

    let full = protocol.get_full_command("POP1").unwrap();
    assert_eq!(full, b"^S007POP1\x0e\x10\r");
}

#[test]
fn check_crc_requires_a_known_prefix() {
    let protocol = proto();
    let definition = protocol.get_command_definition("PI").unwrap();

    protocol
        .check_crc(b"^D00518\x3b\x03\r", &definition.definition)
        .unwrap();

    let err = protocol
        .check_crc(b"(PI30\x9a\x0b\r", &definition.definition)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidResponse(_)));

    let err = protocol
        .check_crc(b"^D00518\x3b\x04\r", &definition.definition)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidCrc { .. }));
}

#[test]
fn trim_strips_the_length_prefix_and_crc_tail() {
    let protocol = proto();
    let definition = protocol.get_command_definition("PI").unwrap();
    assert_eq!(
        protocol.trim_response(b"^D00518\x3b\x03\r", &definition.definition),
        b"18"
    );
}

#[test]
fn decode_protocol_id() {
    let protocol = proto();
    let resolved = protocol.get_command_definition("PI").unwrap();
    let result = protocol.decode_response(b"^D00518\x3b\x03\r", &resolved, None);
    assert!(!result.is_error(), "{:?}", result.error_messages());
    assert_eq!(result.readings()[0].processed_value(), &Value::String("18".into()));
}

#[test]
fn decode_mode_option() {
    let protocol = proto();
    let resolved = protocol.get_command_definition("MOD").unwrap();
    let result = protocol.decode_response(b"^D00505\xd9\x9f\r", &resolved, None);
    assert!(!result.is_error());
    assert_eq!(
        result.readings()[0].processed_value(),
        &Value::String("Hybrid mode(Line mode, Grid mode)".into())
    );
}

#[test]
fn decode_general_status_scales_and_maps_fields() {
    let protocol = proto();
    let resolved = protocol.get_command_definition("GS").unwrap();
    let response = b"^D1062232,499,2232,499,1406,1376,028,549,000,000,000,010,095,060,000,000,0082,0000,1604,0000,0,2,0,1,1,1,1,0D\x12\r";
    let result = protocol.decode_response(response, &resolved, None);
    assert!(!result.is_error(), "{:?}", result.error_messages());
    assert_eq!(result.readings().len(), 28);

    let value_of = |wanted: &str| {
        result
            .readings()
            .iter()
            .find(|r| r.description() == wanted)
            .unwrap()
            .processed_value()
            .clone()
    };
    assert_eq!(value_of("AC Input Voltage"), Value::Float(223.2));
    assert_eq!(value_of("Battery Voltage"), Value::Float(54.9));
    assert_eq!(value_of("Battery Capacity"), Value::Int(95));
    assert_eq!(value_of("MPPT1 Input Power"), Value::Int(82));
    assert_eq!(value_of("MPPT1 charger status"), Value::String("charging".into()));
    assert_eq!(value_of("Battery power direction"), Value::String("charge".into()));
    assert_eq!(
        value_of("Parallel instance number"),
        Value::String("Not valid".into())
    );
}

#[test]
fn decode_yearly_energy_recovers_year_from_the_command() {
    let protocol = proto();
    let resolved = protocol.get_command_definition("EY2024").unwrap();
    assert_eq!(resolved.code, "EY2024");

    let result = protocol.decode_response(b"^D01105580051\x0b\x9f\r", &resolved, None);
    assert!(!result.is_error(), "{:?}", result.error_messages());
    assert_eq!(result.readings().len(), 2);
    assert_eq!(result.readings()[0].processed_value(), &Value::Int(5580051));
    assert_eq!(result.readings()[1].description(), "Year");
    assert_eq!(result.readings()[1].processed_value(), &Value::Int(2024));
}

#[test]
fn setter_acks_use_caret_tokens() {
    let protocol = proto();
    let resolved = protocol.get_command_definition("PEI").unwrap();

    let ok = protocol.decode_response(b"^1\x0b\xc2\r", &resolved, None);
    assert!(!ok.is_error(), "{:?}", ok.error_messages());
    assert_eq!(ok.readings()[0].processed_value(), &Value::String("Succeeded".into()));

    let fail = protocol.decode_response(b"^0\x1b\xe3\r", &resolved, None);
    assert_eq!(fail.readings()[0].processed_value(), &Value::String("Failed".into()));
}
