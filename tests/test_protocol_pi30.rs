use std::collections::HashMap;

use powerdev_bridge::error::Error;
use powerdev_bridge::format::SimpleFormat;
use powerdev_bridge::protocols::result::Value;
use powerdev_bridge::protocols::{get_protocol_definition, DeviceProtocol, ProtocolHandler};

fn proto() -> DeviceProtocol {
    get_protocol_definition("pi30", None).unwrap()
}

fn proto_max() -> DeviceProtocol {
    get_protocol_definition("pi30max", None).unwrap()
}

#[test]
fn full_command_qpi() {
    let full = proto().get_full_command("QPI").unwrap();
    assert_eq!(full, b"QPI\xbe\xac\r");
}

#[test]
fn lowercase_lookup_builds_the_uppercase_command() {
    let full = proto().get_full_command("qpi").unwrap();
    assert_eq!(full, b"QPI\xbe\xac\r");
}

#[test]
fn alias_resolves_to_the_id_command() {
    let resolved = proto().get_command_definition("get_id").unwrap();
    assert_eq!(resolved.definition.code, "QID");
    assert_eq!(resolved.code, "QID");
}

#[test]
fn unknown_command_is_missing_definition() {
    let err = proto().get_command_definition("QZZ").unwrap_err();
    assert!(matches!(err, Error::MissingCommandDefinition(_)));
}

#[test]
fn check_valid_rejects_short_and_unframed_responses() {
    let protocol = proto();
    let definition = protocol.get_command_definition("QPI").unwrap();

    let err = protocol.check_valid(b"(0\r", &definition.definition).unwrap_err();
    assert!(matches!(err, Error::InvalidResponse(_)));

    let err = protocol
        .check_valid(b"PI30\x9a\x0b\r", &definition.definition)
        .unwrap_err();
    assert!(err.to_string().contains("start character"));
}

#[test]
fn check_crc_accepts_a_real_capture() {
    let protocol = proto();
    let definition = protocol.get_command_definition("QPI").unwrap();
    protocol
        .check_crc(b"(PI30\x9a\x0b\r", &definition.definition)
        .unwrap();
}

#[test]
fn trim_drops_frame_and_integrity_bytes() {
    let protocol = proto();
    let definition = protocol.get_command_definition("QPI").unwrap();
    let trimmed = protocol.trim_response(b"(PI30\x9a\x0b\r", &definition.definition);
    assert_eq!(trimmed, b"PI30");
}

#[test]
fn decode_qpi_yields_protocol_id() {
    let protocol = proto();
    let resolved = protocol.get_command_definition("QPI").unwrap();
    let result = protocol.decode_response(b"(PI30\x9a\x0b\r", &resolved, None);
    assert!(!result.is_error());
    assert_eq!(result.readings().len(), 1);
    assert_eq!(
        result.readings()[0].processed_value(),
        &Value::String("PI30".into())
    );
}

#[test]
fn corrupted_crc_yields_an_error_result_naming_both_codes() {
    let protocol = proto();
    let resolved = protocol.get_command_definition("QPI").unwrap();
    let result = protocol.decode_response(b"(PI30\x9a\x0c\r", &resolved, None);
    assert!(result.is_error());
    assert!(result.readings().is_empty());
    let message = &result.error_messages()[0];
    assert!(message.contains("\\x9a\\x0c"), "got: {message}");
    assert!(message.contains("\\x9a\\x0b"), "calculated: {message}");
}

#[test]
fn decode_is_idempotent() {
    let protocol = proto();
    let resolved = protocol.get_command_definition("QPIGS").unwrap();
    let response = b"(000.0 00.0 230.0 49.9 0161 0119 003 460 57.50 012 100 0069 0014 103.8 57.45 00000 00110110 00 00 00856 010\x24\x8c\r";
    let first = protocol.decode_response(response, &resolved, None);
    let second = protocol.decode_response(response, &resolved, None);
    assert!(!first.is_error());
    let values: Vec<_> = first.readings().iter().map(|r| r.processed_value().clone()).collect();
    let again: Vec<_> = second.readings().iter().map(|r| r.processed_value().clone()).collect();
    assert_eq!(values, again);
}

#[test]
fn decode_qpigs_expands_status_flags() {
    let protocol = proto();
    let resolved = protocol.get_command_definition("QPIGS").unwrap();
    let response = b"(000.0 00.0 230.0 49.9 0161 0119 003 460 57.50 012 100 0069 0014 103.8 57.45 00000 00110110 00 00 00856 010\x24\x8c\r";
    let result = protocol.decode_response(response, &resolved, None);
    assert!(!result.is_error(), "{:?}", result.error_messages());

    // 19 plain readings, 8 from Device Status, 3 from Device Status2
    assert_eq!(result.readings().len(), 30);

    let by_description = |wanted: &str| {
        result
            .readings()
            .iter()
            .find(|r| r.description() == wanted)
            .unwrap()
    };
    assert_eq!(
        by_description("Battery Voltage").processed_value(),
        &Value::Float(57.5)
    );
    assert_eq!(
        by_description("AC Output Active Power").processed_value(),
        &Value::Int(119)
    );
    assert_eq!(by_description("Is Load On").processed_value(), &Value::Int(1));
    assert_eq!(
        by_description("Is AC Charging On").processed_value(),
        &Value::Int(0)
    );
    assert_eq!(by_description("Is Switched On").processed_value(), &Value::Int(1));
}

#[test]
fn temperature_override_rewrites_value_and_unit() {
    let protocol = proto();
    let resolved = protocol.get_command_definition("QPIGS").unwrap();
    let response = b"(000.0 00.0 230.0 49.9 0161 0119 003 460 57.50 012 100 0069 0014 103.8 57.45 00000 00110110 00 00 00856 010\x24\x8c\r";
    let overrides = HashMap::from([("temperature".to_string(), "F".to_string())]);
    let result = protocol.decode_response(response, &resolved, Some(&overrides));
    assert!(!result.is_error());

    let heat_sink = result
        .readings()
        .iter()
        .find(|r| r.description() == "Inverter Heat Sink Temperature")
        .unwrap();
    assert_eq!(heat_sink.processed_value(), &Value::Float(1.8 * 69.0 + 32.0));
    assert_eq!(heat_sink.unit(), "°F");
}

#[test]
fn decode_qmod_maps_the_mode_letter() {
    let protocol = proto();
    let resolved = protocol.get_command_definition("QMOD").unwrap();
    let result = protocol.decode_response(b"(S\xe5\xd9\r", &resolved, None);
    assert!(!result.is_error());
    assert_eq!(
        result.readings()[0].processed_value(),
        &Value::String("Standby Mode".into())
    );
}

#[test]
fn decode_qflag_expands_enable_disable_letters() {
    let protocol = proto();
    let resolved = protocol.get_command_definition("QFLAG").unwrap();
    let result = protocol.decode_response(b"(EakxyDbjuvz\x2f\x29\r", &resolved, None);
    assert!(!result.is_error(), "{:?}", result.error_messages());
    assert_eq!(result.readings().len(), 9);

    let state_of = |wanted: &str| {
        result
            .readings()
            .iter()
            .find(|r| r.description() == wanted)
            .unwrap()
            .processed_value()
            .clone()
    };
    assert_eq!(state_of("Buzzer"), Value::String("enabled".into()));
    assert_eq!(state_of("LCD Backlight"), Value::String("enabled".into()));
    assert_eq!(state_of("Overload Bypass"), Value::String("disabled".into()));
    assert_eq!(state_of("Record Fault Code"), Value::String("disabled".into()));
}

#[test]
fn setter_ack_decodes_to_human_text() {
    let protocol = proto();
    let resolved = protocol.get_command_definition("POP00").unwrap();
    assert_eq!(resolved.definition.code, "POP");
    assert_eq!(resolved.code, "POP00");

    let ok = protocol.decode_response(b"(ACK\x39\x20\r", &resolved, None);
    assert_eq!(ok.readings()[0].processed_value(), &Value::String("Succeeded".into()));

    let nak = protocol.decode_response(b"(NAK\x73\x73\r", &resolved, None);
    assert_eq!(nak.readings()[0].processed_value(), &Value::String("Failed".into()));
}

#[test]
fn standard_model_has_no_energy_history_commands() {
    assert!(proto().get_command_definition("QED20240101").is_err());
}

#[test]
fn max_model_decodes_dated_energy_command() {
    let protocol = proto_max();
    let resolved = protocol.get_command_definition("QED20240101").unwrap();
    assert_eq!(resolved.definition.code, "QED");
    assert_eq!(resolved.code, "QED20240101");

    let full = protocol.get_full_command("QED20240101").unwrap();
    assert_eq!(full, b"QED20240101\xf6\xb5\r");

    let result = protocol.decode_response(b"(00238800!J\r", &resolved, None);
    assert!(!result.is_error(), "{:?}", result.error_messages());

    let lines = SimpleFormat::format(&result);
    assert_eq!(
        lines,
        vec![
            "pv_generated_energy_for_day=238800Wh",
            "year=2024",
            "month=January",
            "day=1",
        ]
    );
}
