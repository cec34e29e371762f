//! Rendering of command results for the screen.
//!
//! Formatters only use the metadata every reading carries (description,
//! processed value, unit) so they need no protocol-specific knowledge.

use serde_json::json;

use crate::prelude::*;

/// `name=value<unit>` lines, one per reading.
pub struct SimpleFormat;

impl SimpleFormat {
    pub fn format(result: &CommandResult) -> Vec<String> {
        if result.is_error() {
            return result
                .error_messages()
                .iter()
                .map(|message| format!("error={message}"))
                .collect();
        }
        result
            .readings()
            .iter()
            .map(|reading| {
                format!(
                    "{}={}{}",
                    key_name(reading.description()),
                    reading.processed_value(),
                    reading.unit()
                )
            })
            .collect()
    }
}

/// One JSON object per reading, plus the error state.
pub struct JsonFormat;

impl JsonFormat {
    pub fn format(device_name: &str, result: &CommandResult) -> serde_json::Value {
        let readings: Vec<serde_json::Value> = result
            .readings()
            .iter()
            .map(|reading| {
                json!({
                    "data_name": reading.description(),
                    "data_value": reading.processed_value(),
                    "data_unit": reading.unit(),
                    "icon": reading.definition().icon,
                    "device_class": reading.definition().device_class,
                    "state_class": reading.definition().state_class,
                })
            })
            .collect();
        json!({
            "device": device_name,
            "is_error": result.is_error(),
            "errors": result.error_messages(),
            "readings": readings,
        })
    }
}

fn key_name(description: &str) -> String {
    description.trim().to_lowercase().replace(' ', "_")
}
