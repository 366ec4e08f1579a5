//! Signal-set JSON descriptors
//!
//! These structs mirror the signal-set JSON keys one to one. They carry no
//! validation; [`crate::signals::command`] converts them into the immutable
//! command model and rejects anything it cannot use.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level signal-set document
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SignalSetDefinition {
    #[serde(default)]
    pub commands: Vec<CommandDefinition>,

    /// Hex string
    #[serde(rename = "diagnosticLevel", default, skip_serializing_if = "Option::is_none")]
    pub diagnostic_level: Option<String>,
}

impl SignalSetDefinition {
    /// Drop every command's receive-address filter
    pub fn strip_receive_addresses(&mut self) {
        for command in &mut self.commands {
            command.rax = None;
        }
    }
}

/// One diagnostic command descriptor
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommandDefinition {
    /// Request header, 3 hex digits (11-bit) or 4 hex digits (29-bit)
    pub hdr: String,

    /// Receive address filter (hex)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rax: Option<String>,

    /// Extended address (hex)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eax: Option<String>,

    /// Tester address (hex)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tst: Option<String>,

    /// Timeout (hex)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmo: Option<String>,

    /// CAN priority (hex)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pri: Option<String>,

    /// Vehicle protocol strategy (e.g. "iso9141_2")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proto: Option<String>,

    /// Force flow control
    #[serde(default)]
    pub fcm1: bool,

    #[serde(default)]
    pub dbg: bool,

    /// Update frequency in seconds
    pub freq: f64,

    /// Service code ("01", "21", "22") to PID
    pub cmd: BTreeMap<String, ParameterValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterDefinition>,

    #[serde(default)]
    pub signals: Vec<SignalDefinition>,
}

/// PID value, written either as a hex string or a plain integer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Hex(String),
    Number(u64),
}

/// Model-year filter descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct FilterDefinition {
    #[serde(default)]
    pub from: Option<u32>,
    #[serde(default)]
    pub to: Option<u32>,
    #[serde(default)]
    pub years: Option<Vec<u32>>,
}

/// One signal descriptor
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignalDefinition {
    pub id: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default)]
    pub hidden: bool,

    #[serde(rename = "suggestedMetric", default, skip_serializing_if = "Option::is_none")]
    pub suggested_metric: Option<String>,

    pub fmt: FormatDefinition,
}

/// Signal format descriptor
///
/// A format with a `map` is an enumeration; anything else is a scaling, which
/// requires `max` and `unit`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FormatDefinition {
    /// Bit offset into the payload after the PID
    #[serde(default)]
    pub bix: Option<usize>,

    /// Bit length
    pub len: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<BTreeMap<String, EnumerationEntryDefinition>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Multiplier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mul: Option<f64>,

    /// Divisor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub div: Option<f64>,

    /// Offset added after scaling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add: Option<f64>,

    /// Two's complement
    #[serde(default)]
    pub sign: bool,

    /// Byte-swapped window
    #[serde(default)]
    pub blsb: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullmin: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullmax: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub omin: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub omax: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oval: Option<f64>,
}

/// Enumeration map entry, either `{value, description}` or a bare string
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum EnumerationEntryDefinition {
    Entry { value: String, description: String },
    Text(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_definition_deserialization() {
        let json = r#"{
            "hdr": "7E0",
            "rax": "7E8",
            "cmd": {"22": "404C"},
            "freq": 5,
            "filter": {"from": 2018},
            "signals": [
                {"id": "ODO", "path": "Trips", "fmt": {"len": 24, "max": 1677721, "div": 10, "unit": "kilometers"}, "name": "Odometer"},
                {"id": "GEAR", "name": "Gear", "fmt": {"bix": 24, "len": 4, "map": {"1": {"description": "Park", "value": "P"}, "2": "R"}}}
            ]
        }"#;

        let command: CommandDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(command.hdr, "7E0");
        assert_eq!(command.rax.as_deref(), Some("7E8"));
        assert_eq!(command.cmd.get("22"), Some(&ParameterValue::Hex("404C".to_string())));
        assert_eq!(command.freq, 5.0);
        assert_eq!(command.filter.as_ref().and_then(|f| f.from), Some(2018));
        assert!(!command.fcm1);

        let odometer = &command.signals[0];
        assert_eq!(odometer.fmt.len, 24);
        assert_eq!(odometer.fmt.div, Some(10.0));
        assert!(odometer.fmt.map.is_none());

        let gear_map = command.signals[1].fmt.map.as_ref().unwrap();
        assert_eq!(
            gear_map.get("1"),
            Some(&EnumerationEntryDefinition::Entry {
                value: "P".to_string(),
                description: "Park".to_string()
            })
        );
        assert_eq!(
            gear_map.get("2"),
            Some(&EnumerationEntryDefinition::Text("R".to_string()))
        );
    }

    #[test]
    fn test_numeric_parameter_value() {
        let json = r#"{"hdr": "7DF", "cmd": {"01": 13}, "freq": 1, "signals": []}"#;
        let command: CommandDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(command.cmd.get("01"), Some(&ParameterValue::Number(13)));
    }

    #[test]
    fn test_strip_receive_addresses() {
        let json = r#"{
            "diagnosticLevel": "02",
            "commands": [
                {"hdr": "7E0", "rax": "7E8", "cmd": {"01": "0D"}, "freq": 1, "signals": []},
                {"hdr": "7E0", "cmd": {"01": "0C"}, "freq": 1, "signals": []}
            ]
        }"#;
        let mut signal_set: SignalSetDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(signal_set.diagnostic_level.as_deref(), Some("02"));

        signal_set.strip_receive_addresses();
        assert!(signal_set.commands.iter().all(|c| c.rax.is_none()));
    }
}
