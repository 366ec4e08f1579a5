//! Command registry
//!
//! Indexes commands by service and PID, and matches reassembled response
//! packets back to the commands that describe them.
//!
//! Commands sharing a key are kept in registration order. Lookups scan a
//! bucket from the newest entry backwards, so a vehicle-specific signal set
//! registered after a generic base set overrides it without removing it.

use crate::cantp::Packet;
use crate::signals::command::{Command, Parameter, ServiceType, SignalSet};
use crate::types::ValueMap;
use byteorder::{BigEndian, ByteOrder};
use std::collections::HashMap;

/// Offset added to a service id in a positive response
const POSITIVE_RESPONSE_OFFSET: u8 = 0x40;

/// A command matched to a response packet, with its decoded signals
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResponse<'a> {
    pub command: &'a Command,
    /// Response bytes after the service and PID
    pub data: Vec<u8>,
    /// Decoded values of this command's signals
    pub values: ValueMap,
}

/// Read-only index of commands by (service, PID)
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands_by_parameter: HashMap<Parameter, Vec<Command>>,
}

impl CommandRegistry {
    /// Build a registry; later commands take precedence on key collisions
    pub fn new(commands: impl IntoIterator<Item = Command>) -> Self {
        let mut commands_by_parameter: HashMap<Parameter, Vec<Command>> = HashMap::new();
        for command in commands {
            commands_by_parameter
                .entry(command.parameter)
                .or_default()
                .push(command);
        }

        let registry = Self {
            commands_by_parameter,
        };
        let stats = registry.stats();
        log::debug!(
            "Built command registry: {} commands, {} signals, {} parameters",
            stats.num_commands,
            stats.num_signals,
            stats.num_parameters
        );
        registry
    }

    /// Registry over a base signal set with a vehicle signal set layered on top
    pub fn combined(base: &SignalSet, vehicle: &SignalSet) -> Self {
        Self::new(base.commands.iter().chain(&vehicle.commands).cloned())
    }

    /// Registry holding only the commands that apply to `model_year`
    pub fn for_model_year(base: Option<&SignalSet>, vehicle: &SignalSet, model_year: u32) -> Self {
        let base_commands = base.into_iter().flat_map(|set| set.commands.iter());
        Self::new(
            base_commands
                .chain(&vehicle.commands)
                .filter(|command| command.applies_to_year(model_year))
                .cloned(),
        )
    }

    /// All commands registered for `parameter`, oldest first
    pub fn commands_for(&self, parameter: &Parameter) -> &[Command] {
        self.commands_by_parameter
            .get(parameter)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Identify the commands a response packet answers and decode their signals
    ///
    /// Negative responses, unknown services and unknown PIDs yield no responses.
    pub fn identify(&self, packet: &Packet) -> Vec<CommandResponse<'_>> {
        let Some((&response_code, payload)) = packet.data.split_first() else {
            return Vec::new();
        };
        if response_code < POSITIVE_RESPONSE_OFFSET {
            return Vec::new();
        }

        let Some(service) = ServiceType::from_id(response_code - POSITIVE_RESPONSE_OFFSET) else {
            log::trace!("Unsupported service response 0x{:02X}", response_code);
            return Vec::new();
        };

        let pid_len = service.pid_len();
        if payload.len() < pid_len {
            return Vec::new();
        }
        let (pid_bytes, data) = payload.split_at(pid_len);
        let pid = match service {
            ServiceType::Service22 => BigEndian::read_u16(pid_bytes),
            ServiceType::Service01 | ServiceType::Service21 => pid_bytes[0] as u16,
        };
        let parameter = Parameter::new(service, pid);

        let selected = Self::select(
            self.commands_for(&parameter),
            &packet.identifier,
            service == ServiceType::Service22,
        );
        if selected.is_empty() {
            log::trace!("No command for {} from {}", parameter, packet.identifier);
        }

        selected
            .into_iter()
            .map(|command| {
                log::debug!("Matched command {} for {}", command.id, packet.identifier);
                CommandResponse {
                    command,
                    data: data.to_vec(),
                    values: Self::decode_signals(command, data),
                }
            })
            .collect()
    }

    /// Pick the commands that answer a response from `identifier`
    ///
    /// The newest command whose receive address matches wins outright. Without
    /// one, the newest generic command is used, or every generic command (newest
    /// first) when `fan_out` is set.
    fn select<'a>(bucket: &'a [Command], identifier: &str, fan_out: bool) -> Vec<&'a Command> {
        if let Some(specific) = bucket.iter().rev().find(|c| c.receives_from(identifier)) {
            return vec![specific];
        }

        let generic = bucket
            .iter()
            .rev()
            .filter(|command| command.receive_address.is_none());
        if fan_out {
            generic.collect()
        } else {
            generic.take(1).collect()
        }
    }

    /// Decode every signal of `command`; failing signals are logged and skipped
    fn decode_signals(command: &Command, data: &[u8]) -> ValueMap {
        let mut values = ValueMap::new();
        for signal in &command.signals {
            match signal.format.decode(data) {
                Ok(value) => {
                    values.insert(signal.id.clone(), value);
                }
                Err(e) => log::warn!("Error decoding signal {}: {}", signal.id, e),
            }
        }
        values
    }

    /// Get registry statistics
    pub fn stats(&self) -> RegistryStats {
        let commands = self.commands_by_parameter.values().flatten();
        RegistryStats {
            num_parameters: self.commands_by_parameter.len(),
            num_commands: commands.clone().count(),
            num_signals: commands.map(|command| command.signals.len()).sum(),
        }
    }
}

/// Registry statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    /// Distinct (service, PID) keys
    pub num_parameters: usize,
    pub num_commands: usize,
    pub num_signals: usize,
}
