use powerdev_bridge::error::Error;
use powerdev_bridge::format::SimpleFormat;
use powerdev_bridge::ports::PortType;
use powerdev_bridge::protocols::result::Value;
use powerdev_bridge::protocols::{get_protocol_definition, DeviceProtocol, ProtocolHandler};

const SOC_RESPONSE: &[u8] = b"\xa5\x01\x90\x08\x01\x09\x00\x00\x75\xcf\x03\x0a\x99";

fn proto() -> DeviceProtocol {
    get_protocol_definition("daly", None).unwrap()
}

#[test]
fn full_command_soc_serial() {
    let mut protocol = proto();
    protocol.set_port_type(PortType::Serial);
    let full = protocol.get_full_command("SOC").unwrap();
    assert_eq!(full, b"\xa5\x40\x90\x08\x00\x00\x00\x00\x00\x00\x00\x00\x7d\x0a");
}

#[test]
fn full_command_soc_ble_changes_source_and_drops_newline() {
    let mut protocol = proto();
    protocol.set_port_type(PortType::Ble);
    let full = protocol.get_full_command("SOC").unwrap();
    assert_eq!(full, b"\xa5\x80\x90\x08\x00\x00\x00\x00\x00\x00\x00\x00\xbd");
}

#[test]
fn check_crc_accepts_a_real_capture() {
    let protocol = proto();
    let definition = protocol.get_command_definition("SOC").unwrap();
    protocol.check_crc(SOC_RESPONSE, &definition.definition).unwrap();
}

#[test]
fn check_crc_rejects_a_corrupted_checksum() {
    let protocol = proto();
    let definition = protocol.get_command_definition("SOC").unwrap();
    let corrupted = b"\xa5\x01\x90\x08\x01\x09\x00\x00\x75\xcf\x03\x0a\x98";
    let err = protocol.check_crc(corrupted, &definition.definition).unwrap_err();
    assert!(matches!(err, Error::InvalidCrc { .. }));
}

#[test]
fn check_valid_screens_structure() {
    let protocol = proto();
    let definition = protocol.get_command_definition("SOC").unwrap();

    protocol.check_valid(SOC_RESPONSE, &definition.definition).unwrap();

    let err = protocol
        .check_valid(b"\xa5\x01\x90", &definition.definition)
        .unwrap_err();
    assert!(err.to_string().contains("too short"));

    let bad_start = b"\xa4\x01\x90\x08\x01\x09\x00\x00\x75\xcf\x03\x0a\x99";
    let err = protocol.check_valid(bad_start, &definition.definition).unwrap_err();
    assert!(err.to_string().contains("start byte"));

    let bad_length = b"\xa5\x01\x90\x07\x01\x09\x00\x00\x75\xcf\x03\x0a\x99";
    let err = protocol.check_valid(bad_length, &definition.definition).unwrap_err();
    assert!(err.to_string().contains("length"));
}

#[test]
fn trim_is_a_no_op_for_single_frames() {
    let protocol = proto();
    let definition = protocol.get_command_definition("SOC").unwrap();
    assert_eq!(protocol.trim_response(SOC_RESPONSE, &definition.definition), SOC_RESPONSE);
}

#[test]
fn decode_soc_scales_readings_through_templates() {
    let protocol = proto();
    let resolved = protocol.get_command_definition("SOC").unwrap();
    let result = protocol.decode_response(SOC_RESPONSE, &resolved, None);
    assert!(!result.is_error(), "{:?}", result.error_messages());

    let lines = SimpleFormat::format(&result);
    assert_eq!(lines, vec!["battery_bank_voltage=26.5V", "current=15.9A", "soc=77.8%"]);
}

#[test]
fn alias_soc_is_the_id_command() {
    let protocol = proto();
    let resolved = protocol.get_command_definition("state of charge").unwrap();
    assert_eq!(resolved.definition.code, "SOC");
    assert_eq!(protocol.id_command(), Some("SOC"));
}

#[test]
fn short_response_yields_error_result_not_panic() {
    let protocol = proto();
    let resolved = protocol.get_command_definition("SOC").unwrap();

    let empty = protocol.decode_response(b"", &resolved, None);
    assert!(empty.is_error());
    assert!(empty.readings().is_empty());

    let truncated = protocol.decode_response(b"\xa5\x01\x90\x08", &resolved, None);
    assert!(truncated.is_error());
}

#[test]
fn decode_status_includes_bit_encoded_io_states() {
    let protocol = proto();
    let resolved = protocol.get_command_definition("status").unwrap();
    let response = b"\xa5\x01\x94\x08\x10\x01\x00\x00\x02\x00\x1d\x88\xfa";
    let result = protocol.decode_response(response, &resolved, None);
    assert!(!result.is_error(), "{:?}", result.error_messages());

    let value_of = |wanted: &str| {
        result
            .readings()
            .iter()
            .find(|r| r.description() == wanted)
            .unwrap()
            .processed_value()
            .clone()
    };
    assert_eq!(value_of("number_of_cells"), Value::Int(16));
    assert_eq!(value_of("charger_running"), Value::Bool(false));
    assert_eq!(value_of("states"), Value::String("DI2".into()));
    assert_eq!(value_of("cycles"), Value::Int(29));
}

#[test]
fn decode_mosfet_mode_and_capacity() {
    let protocol = proto();
    let resolved = protocol.get_command_definition("mosfet").unwrap();
    let response = b"\xa5\x01\x93\x08\x02\x01\x01\x97\x00\x04\x2d\xfa\x07";
    let result = protocol.decode_response(response, &resolved, None);
    assert!(!result.is_error(), "{:?}", result.error_messages());

    let value_of = |wanted: &str| {
        result
            .readings()
            .iter()
            .find(|r| r.description() == wanted)
            .unwrap()
            .processed_value()
            .clone()
    };
    assert_eq!(value_of("mode"), Value::String("discharging".into()));
    assert_eq!(value_of("charging_mosfet"), Value::Bool(true));
    assert_eq!(value_of("bms_cycles"), Value::Int(151));
    assert_eq!(value_of("capacity_ah"), Value::Float(273.914));
}

#[test]
fn decode_cell_voltages_multiframe_burst() {
    let protocol = proto();
    let resolved = protocol.get_command_definition("cell_voltages").unwrap();
    let response = resolved.definition.test_responses()[0].clone();
    let result = protocol.decode_response(&response, &resolved, None);
    assert!(!result.is_error(), "{:?}", result.error_messages());

    // sixteen populated cells; zero cells and corrupt frames are dropped
    assert_eq!(result.readings().len(), 16);
    assert_eq!(result.readings()[0].description(), "cell_01_voltage");
    assert_eq!(result.readings()[0].processed_value(), &Value::Float(3.413));
    assert_eq!(result.readings()[15].description(), "cell_16_voltage");
    assert_eq!(result.readings()[15].processed_value(), &Value::Float(3.403));
}
