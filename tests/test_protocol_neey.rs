use powerdev_bridge::error::Error;
use powerdev_bridge::protocols::result::Value;
use powerdev_bridge::protocols::{get_protocol_definition, DeviceProtocol, ProtocolHandler};

fn proto() -> DeviceProtocol {
    get_protocol_definition("neey", None).unwrap()
}

fn float_of(value: &Value) -> f64 {
    match value {
        Value::Float(f) => *f,
        other => panic!("expected a float, got {other:?}"),
    }
}

#[test]
fn heltec_is_an_alias_for_the_same_protocol() {
    let protocol = get_protocol_definition("heltec", None).unwrap();
    assert_eq!(protocol.protocol_id(), "NEEY");
}

#[test]
fn full_command_info_uses_xor_checksum() {
    let full = proto().get_full_command("info").unwrap();
    assert_eq!(
        full,
        b"\xaa\x55\x11\x01\x01\x00\x14\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\xfa\xff"
    );
}

#[test]
fn full_command_cell_info_flips_the_length_endianness() {
    // the device firmware expects this one field big-endian
    let full = proto().get_full_command("cell_info").unwrap();
    assert_eq!(
        full,
        b"\xaa\x55\x11\x01\x02\x00\x00\x14\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\xf9\xff"
    );
}

#[test]
fn check_valid_requires_frame_markers() {
    let protocol = proto();
    let definition = protocol.get_command_definition("info").unwrap();

    let err = protocol
        .check_valid(b"\x54\x00\x00\x00\x00\x00\x00\xff", &definition.definition)
        .unwrap_err();
    assert!(err.to_string().contains("start byte"));

    let err = protocol
        .check_valid(b"\x55\xaa\x11\x01\x01\x00\x64\x00", &definition.definition)
        .unwrap_err();
    assert!(err.to_string().contains("end byte"));
}

#[test]
fn check_crc_rejects_a_corrupted_sum() {
    let protocol = proto();
    let resolved = protocol.get_command_definition("settings").unwrap();
    let mut corrupted = resolved.definition.test_responses()[0].clone();
    let index = corrupted.len() - 2;
    corrupted[index] ^= 0x01;
    let err = protocol.check_crc(&corrupted, &resolved.definition).unwrap_err();
    assert!(matches!(err, Error::InvalidCrc { .. }));
}

#[test]
fn decode_device_info_strips_null_padding() {
    let protocol = proto();
    let resolved = protocol.get_command_definition("info").unwrap();
    let response = resolved.definition.test_responses()[0].clone();
    let result = protocol.decode_response(&response, &resolved, None);
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
    assert_eq!(value_of("model"), Value::String("GW-24S4EB".into()));
    assert_eq!(value_of("hw_version"), Value::String("HW-2.8.0".into()));
    assert_eq!(value_of("sw_version"), Value::String("ZH-1.2.3".into()));
    assert_eq!(value_of("production_date"), Value::String("20220916".into()));
    assert_eq!(value_of("power_on_count"), Value::Int(4));
}

#[test]
fn decode_cell_info_flattens_float_arrays_and_skips_absent_cells() {
    let protocol = proto();
    let resolved = protocol.get_command_definition("cell_info").unwrap();
    let response = resolved.definition.test_responses()[0].clone();
    let result = protocol.decode_response(&response, &resolved, None);
    assert!(!result.is_error(), "{:?}", result.error_messages());

    let voltages: Vec<_> = result
        .readings()
        .iter()
        .filter(|r| r.description().ends_with("_voltage") && r.description().starts_with("cell_"))
        .collect();
    let resistances: Vec<_> = result
        .readings()
        .iter()
        .filter(|r| r.description().ends_with("_resistance"))
        .collect();
    // a 16 cell pack on a 24 channel balancer
    assert_eq!(voltages.len(), 16);
    assert_eq!(resistances.len(), 16);
    assert_eq!(voltages[0].description(), "cell_01_voltage");
    let first = float_of(voltages[0].processed_value());
    assert!((first - 3.298).abs() < 0.001, "cell 1 was {first}");

    let value_of = |wanted: &str| {
        result
            .readings()
            .iter()
            .find(|r| r.description() == wanted)
            .unwrap()
            .processed_value()
            .clone()
    };
    assert_eq!(value_of("operation_status"), Value::String("balancing".into()));
    let average = float_of(&value_of("average_cell_voltage"));
    assert!((average - 3.318).abs() < 0.001, "average was {average}");
    let temperature = float_of(&value_of("temperature_1"));
    assert!((temperature - 30.66).abs() < 0.01, "temperature was {temperature}");
    let balancing = float_of(&value_of("balancing_current"));
    assert!((balancing + 4.039).abs() < 0.001, "balancing was {balancing}");
}

#[test]
fn decode_settings() {
    let protocol = proto();
    let resolved = protocol.get_command_definition("settings").unwrap();
    let response = resolved.definition.test_responses()[0].clone();
    let result = protocol.decode_response(&response, &resolved, None);
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
    assert_eq!(value_of("cell_count"), Value::Int(16));
    assert_eq!(value_of("battery_type"), Value::String("LFP".into()));
    assert_eq!(value_of("buzzer_mode"), Value::String("off".into()));
    assert_eq!(value_of("balancing_enabled"), Value::Bool(true));
    assert_eq!(value_of("nominal_battery_capacity"), Value::Int(280));
    let trigger = float_of(&value_of("balance_trigger_voltage"));
    assert!((trigger - 0.005).abs() < 0.0001, "trigger was {trigger}");
}
