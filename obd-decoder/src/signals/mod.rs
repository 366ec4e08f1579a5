//! Signal sets and the command registry
//!
//! This module contains the signal-set JSON model, its conversion into
//! commands and signal formats, and the registry that matches response
//! packets to commands.

pub mod command;
pub mod definition;
pub mod format;
pub mod registry;

// Re-export key types for convenience
pub use command::{Command, Filter, Parameter, ServiceType, Signal, SignalSet};
pub use format::{Enumeration, EnumerationValue, Scaling, SignalFormat};
pub use registry::{CommandRegistry, CommandResponse, RegistryStats};
