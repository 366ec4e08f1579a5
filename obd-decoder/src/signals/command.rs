//! Diagnostic command model
//!
//! Immutable descriptions of the commands in a signal set: which request they
//! are, which ECU answers, and how to decode each signal in the response.
//! Built once from [`SignalSetDefinition`] and never mutated afterwards.

use crate::cantp::CanIdFormat;
use crate::signals::definition::{
    CommandDefinition, EnumerationEntryDefinition, FilterDefinition, FormatDefinition,
    ParameterValue, SignalDefinition, SignalSetDefinition,
};
use crate::signals::format::{Enumeration, EnumerationValue, Scaling, SignalFormat};
use crate::types::{DecoderError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Separates the command identity from its property suffix in a command id
pub const ID_PROPERTY_DIVIDER: &str = "|";

/// Mask applied to a receive address when the header is a 29-bit UDS header
const UDS_29BIT_RECEIVE_MASK: u32 = 0x18DA_F100;

/// Diagnostic service a command belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceType {
    /// OBD-II current data, 1-byte PID
    Service01,
    /// UDS read data by local identifier, 1-byte offset
    Service21,
    /// UDS read data by identifier, 2-byte PID
    Service22,
}

impl ServiceType {
    /// Service key order used when reading a `cmd` object
    const LOOKUP_ORDER: [ServiceType; 3] =
        [ServiceType::Service21, ServiceType::Service22, ServiceType::Service01];

    /// Service id byte
    pub fn id(self) -> u8 {
        match self {
            ServiceType::Service01 => 0x01,
            ServiceType::Service21 => 0x21,
            ServiceType::Service22 => 0x22,
        }
    }

    /// Service code as written in signal-set JSON
    pub fn code(self) -> &'static str {
        match self {
            ServiceType::Service01 => "01",
            ServiceType::Service21 => "21",
            ServiceType::Service22 => "22",
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0x01 => Some(ServiceType::Service01),
            0x21 => Some(ServiceType::Service21),
            0x22 => Some(ServiceType::Service22),
            _ => None,
        }
    }

    /// Number of PID bytes following the service byte in a response
    pub fn pid_len(self) -> usize {
        match self {
            ServiceType::Service22 => 2,
            ServiceType::Service01 | ServiceType::Service21 => 1,
        }
    }
}

/// Service and PID identifying a request/response pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub service: ServiceType,
    pub value: u16,
}

impl Parameter {
    pub fn new(service: ServiceType, value: u16) -> Self {
        Self { service, value }
    }

    /// Request message text, e.g. `010D` or `22404C`
    pub fn as_message(&self) -> String {
        match self.service {
            ServiceType::Service22 => format!("{}{:04X}", self.service.code(), self.value),
            _ => format!("{}{:02X}", self.service.code(), self.value),
        }
    }

    fn from_definition(cmd: &BTreeMap<String, ParameterValue>) -> Result<Self> {
        for service in ServiceType::LOOKUP_ORDER {
            let Some(raw) = cmd.get(service.code()) else {
                continue;
            };

            let value = match raw {
                ParameterValue::Hex(text) => parse_hex("cmd", text)?,
                ParameterValue::Number(number) => u32::try_from(*number).map_err(|_| {
                    DecoderError::InvalidSignalDefinition(format!("PID {} out of range", number))
                })?,
            };

            let limit = if service.pid_len() == 2 { 0xFFFF } else { 0xFF };
            if value > limit {
                return Err(DecoderError::InvalidSignalDefinition(format!(
                    "PID {:X} too wide for service {}",
                    value,
                    service.code()
                )));
            }

            return Ok(Parameter::new(service, value as u16));
        }

        Err(DecoderError::InvalidSignalDefinition(format!(
            "Invalid parameter format: {:?}",
            cmd
        )))
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_message())
    }
}

/// One decodable value in a command response
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub path: Option<String>,
    pub hidden: bool,
    pub suggested_metric: Option<String>,
    pub format: SignalFormat,
}

impl Signal {
    pub fn new(id: impl Into<String>, name: impl Into<String>, format: SignalFormat) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            path: None,
            hidden: false,
            suggested_metric: None,
            format,
        }
    }

    fn from_definition(definition: &SignalDefinition) -> Result<Self> {
        let format = format_from_definition(&definition.id, &definition.fmt)?;
        Ok(Self {
            id: definition.id.clone(),
            name: definition.name.clone(),
            description: definition.description.clone(),
            path: definition.path.clone(),
            hidden: definition.hidden,
            suggested_metric: definition.suggested_metric.clone(),
            format,
        })
    }
}

fn format_from_definition(signal_id: &str, fmt: &FormatDefinition) -> Result<SignalFormat> {
    if fmt.len == 0 || fmt.len > 64 {
        return Err(DecoderError::InvalidSignalDefinition(format!(
            "Signal '{}' has unsupported bit length {}",
            signal_id, fmt.len
        )));
    }
    let bit_offset = fmt.bix.unwrap_or(0);
    if bit_offset.checked_add(fmt.len).is_none() {
        return Err(DecoderError::InvalidSignalDefinition(format!(
            "Signal '{}' bit window at {} overflows",
            signal_id, bit_offset
        )));
    }

    if let Some(map) = &fmt.map {
        let map = map
            .iter()
            .map(|(raw, entry)| {
                let entry = match entry {
                    EnumerationEntryDefinition::Entry { value, description } => EnumerationValue {
                        value: value.clone(),
                        description: description.clone(),
                    },
                    EnumerationEntryDefinition::Text(text) => EnumerationValue {
                        value: text.clone(),
                        description: text.clone(),
                    },
                };
                (raw.clone(), entry)
            })
            .collect();
        return Ok(SignalFormat::Enumeration(
            Enumeration::new(fmt.len, map).with_bit_offset(bit_offset),
        ));
    }

    let max_value = fmt.max.ok_or_else(|| {
        DecoderError::InvalidSignalDefinition(format!("Signal '{}' is missing 'max'", signal_id))
    })?;
    let unit = fmt.unit.clone().ok_or_else(|| {
        DecoderError::InvalidSignalDefinition(format!("Signal '{}' is missing 'unit'", signal_id))
    })?;

    Ok(SignalFormat::Scaling(Scaling {
        bit_offset,
        bit_length: fmt.len,
        bytes_lsb: fmt.blsb,
        signed: fmt.sign,
        min_value: fmt.min.unwrap_or(0.0),
        max_value,
        offset: fmt.add.unwrap_or(0.0),
        scalar: fmt.mul.unwrap_or(1.0),
        divisor: fmt.div.unwrap_or(1.0),
        unit,
        null_min: fmt.nullmin,
        null_max: fmt.nullmax,
        optimal_min: fmt.omin,
        optimal_max: fmt.omax,
        optimal_value: fmt.oval,
    }))
}

/// Model-year applicability of a command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub from_year: Option<u32>,
    pub to_year: Option<u32>,
    pub years: Option<BTreeSet<u32>>,
}

impl Filter {
    /// Whether the command applies to `model_year`
    ///
    /// With both bounds and `from_year >= to_year` the range wraps around:
    /// years at or after `from_year` and years at or before `to_year` match.
    pub fn matches(&self, model_year: Option<u32>) -> bool {
        let Some(year) = model_year else {
            return false;
        };

        let in_range = match (self.from_year, self.to_year) {
            (Some(from), Some(to)) if from < to => (from..=to).contains(&year),
            (Some(from), Some(to)) => year >= from || year <= to,
            (None, Some(to)) => year <= to,
            (Some(from), None) => year >= from,
            (None, None) => false,
        };

        in_range || self.years.as_ref().is_some_and(|years| years.contains(&year))
    }

    /// Compact form used inside command ids, e.g. `2015-2020;2022`
    pub fn to_id_string(&self) -> String {
        let mut parts = Vec::new();

        match (self.from_year, self.to_year) {
            (Some(from), Some(to)) if from < to => parts.push(format!("{}-{}", from, to)),
            (from, to) => {
                if let Some(from) = from {
                    parts.push(format!("{}-", from));
                }
                if let Some(to) = to {
                    parts.push(format!("-{}", to));
                }
            }
        }

        if let Some(years) = &self.years {
            parts.extend(years.iter().map(|year| year.to_string()));
        }

        parts.join(";")
    }
}

impl From<&FilterDefinition> for Filter {
    fn from(definition: &FilterDefinition) -> Self {
        Self {
            from_year: definition.from,
            to_year: definition.to,
            years: definition
                .years
                .as_ref()
                .filter(|years| !years.is_empty())
                .map(|years| years.iter().copied().collect()),
        }
    }
}

/// A diagnostic command and the signals its response carries
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Identity built from header, receive address, parameter and properties
    pub id: String,
    pub parameter: Parameter,
    pub header: u32,
    /// Identifier of the ECU whose responses this command decodes
    pub receive_address: Option<u32>,
    /// Sorted by signal id
    pub signals: Vec<Signal>,
    /// Seconds between requests
    pub update_frequency: f64,
    pub extended_address: Option<u32>,
    pub tester_address: Option<u32>,
    pub timeout: Option<u32>,
    pub force_flow_control: bool,
    pub debug: bool,
    pub filter: Option<Filter>,
    /// Implied by the header width
    pub protocol: Option<CanIdFormat>,
}

impl Command {
    /// Minimal command for the given request, with signals sorted by id
    pub fn new(
        parameter: Parameter,
        header: u32,
        receive_address: Option<u32>,
        mut signals: Vec<Signal>,
    ) -> Self {
        signals.sort_by(|a, b| a.id.cmp(&b.id));

        let mut id = format!("{:X}", header);
        if let Some(address) = receive_address {
            id.push_str(&format!(".{:X}", address));
        }
        id.push('.');
        id.push_str(&parameter.as_message());

        Self {
            id,
            parameter,
            header,
            receive_address,
            signals,
            update_frequency: 1.0,
            extended_address: None,
            tester_address: None,
            timeout: None,
            force_flow_control: false,
            debug: false,
            filter: None,
            protocol: None,
        }
    }

    /// Whether this command decodes responses from `identifier`
    pub fn receives_from(&self, identifier: &str) -> bool {
        // Dump identifiers may be lowercase hex
        self.receive_address
            .is_some_and(|address| format!("{:X}", address).eq_ignore_ascii_case(identifier))
    }

    /// Whether this command applies to `model_year`; unfiltered commands always do
    pub fn applies_to_year(&self, model_year: u32) -> bool {
        self.filter
            .as_ref()
            .map_or(true, |filter| filter.matches(Some(model_year)))
    }

    /// Build a command from its JSON descriptor
    pub fn from_definition(definition: &CommandDefinition) -> Result<Self> {
        let header = parse_hex("hdr", &definition.hdr)?;
        let parameter = Parameter::from_definition(&definition.cmd)?;

        let mut receive_address = definition
            .rax
            .as_deref()
            .map(|rax| parse_hex("rax", rax))
            .transpose()?;
        if definition.hdr.len() == 4 {
            receive_address = receive_address
                .filter(|address| *address != 0)
                .map(|address| UDS_29BIT_RECEIVE_MASK | (address & 0xFF))
                .or(receive_address);
        }

        let extended_address = parse_optional_hex("eax", definition.eax.as_deref())?;
        let tester_address = parse_optional_hex("tst", definition.tst.as_deref())?;
        let timeout = parse_optional_hex("tmo", definition.tmo.as_deref())?;
        let can_priority = parse_optional_hex("pri", definition.pri.as_deref())?;
        let filter = definition.filter.as_ref().map(Filter::from);

        let mut signals = definition
            .signals
            .iter()
            .map(Signal::from_definition)
            .collect::<Result<Vec<_>>>()?;
        signals.sort_by(|a, b| a.id.cmp(&b.id));

        let mut id = definition.hdr.clone();
        if let Some(rax) = definition.rax.as_deref().filter(|rax| !rax.is_empty()) {
            id.push('.');
            id.push_str(rax);
        }
        id.push('.');
        id.push_str(&parameter.as_message());

        let properties = IdProperties {
            timeout,
            extended_address,
            tester_address,
            force_flow_control: definition.fcm1,
            protocol_strategy: definition.proto.as_deref(),
            can_priority,
            filter: filter.as_ref(),
        }
        .to_string();
        if !properties.is_empty() {
            id.push_str(ID_PROPERTY_DIVIDER);
            id.push_str(&properties);
        }

        let protocol = match definition.hdr.len() {
            3 => Some(CanIdFormat::ElevenBit),
            4 => Some(CanIdFormat::TwentyNineBit),
            _ => None,
        };

        Ok(Self {
            id,
            parameter,
            header,
            receive_address,
            signals,
            update_frequency: definition.freq,
            extended_address,
            tester_address,
            timeout,
            force_flow_control: definition.fcm1,
            debug: definition.dbg,
            filter,
            protocol,
        })
    }
}

/// Property suffix of a command id
struct IdProperties<'a> {
    timeout: Option<u32>,
    extended_address: Option<u32>,
    tester_address: Option<u32>,
    force_flow_control: bool,
    protocol_strategy: Option<&'a str>,
    can_priority: Option<u32>,
    filter: Option<&'a Filter>,
}

impl fmt::Display for IdProperties<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nonzero = |value: Option<u32>| value.filter(|v| *v != 0);
        let mut parts = Vec::new();

        if let Some(timeout) = nonzero(self.timeout) {
            parts.push(format!("t={:02X}", timeout));
        }
        if let Some(address) = nonzero(self.extended_address) {
            parts.push(format!("e={:02X}", address));
        }
        if let Some(address) = nonzero(self.tester_address) {
            parts.push(format!("ta={:02X}", address));
        }
        if self.force_flow_control {
            parts.push("fc=1".to_string());
        }
        if self.protocol_strategy == Some("iso9141_2") {
            parts.push("p=9141-2".to_string());
        }
        if let Some(priority) = nonzero(self.can_priority) {
            parts.push(format!("c={:02X}", priority));
        }
        if let Some(filter) = self.filter {
            parts.push(format!("f={}", filter.to_id_string()));
        }

        write!(f, "{}", parts.join(","))
    }
}

/// All commands of one signal set, in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalSet {
    pub commands: Vec<Command>,
    pub diagnostic_level: Option<u32>,
}

impl SignalSet {
    /// Parse a signal-set JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let definition: SignalSetDefinition = serde_json::from_str(json)?;
        Self::from_definition(&definition)
    }

    /// Parse a base signal set whose commands apply to any responding ECU
    ///
    /// Every receive-address filter is dropped before conversion.
    pub fn base_from_json(json: &str) -> Result<Self> {
        let mut definition: SignalSetDefinition = serde_json::from_str(json)?;
        definition.strip_receive_addresses();
        Self::from_definition(&definition)
    }

    pub fn from_definition(definition: &SignalSetDefinition) -> Result<Self> {
        let commands = definition
            .commands
            .iter()
            .map(Command::from_definition)
            .collect::<Result<Vec<_>>>()?;
        let diagnostic_level =
            parse_optional_hex("diagnosticLevel", definition.diagnostic_level.as_deref())?;

        log::debug!("Loaded signal set with {} commands", commands.len());
        Ok(Self {
            commands,
            diagnostic_level,
        })
    }

    pub fn num_signals(&self) -> usize {
        self.commands.iter().map(|command| command.signals.len()).sum()
    }
}

fn parse_hex(field: &str, text: &str) -> Result<u32> {
    u32::from_str_radix(text, 16).map_err(|e| {
        DecoderError::InvalidSignalDefinition(format!(
            "Invalid hex in '{}': {:?} ({})",
            field, text, e
        ))
    })
}

fn parse_optional_hex(field: &str, text: Option<&str>) -> Result<Option<u32>> {
    text.map(|text| parse_hex(field, text)).transpose()
}
