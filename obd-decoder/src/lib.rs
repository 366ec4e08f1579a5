//! OBD Signal Decoder Library
//!
//! A stateless, reusable library for decoding vehicle diagnostic responses
//! captured as ASCII hex CAN dumps, using signal-set JSON definitions.
//!
//! # Architecture
//!
//! This library is intentionally minimal and focused on decoding:
//! - Parses textual ISO-TP frames and reassembles them into packets
//! - Loads signal sets (commands, signals, scaling and enumeration formats)
//! - Matches response packets to commands by service, PID and responding ECU
//! - Decodes each matched command's signals into a flat value map
//!
//! The library does NOT:
//! - Talk to a live bus or transmit flow control
//! - Locate signal-set files for a vehicle
//! - Validate or format signal-set JSON
//!
//! File handling and output rendering are in the application layer (obd-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use obd_decoder::{Decoder, DecoderConfig, SignalSet, SignalValue};
//!
//! // Load a signal set
//! let json = std::fs::read_to_string("ford-f-150.json").unwrap();
//! let signal_set = SignalSet::from_json(&json).unwrap();
//!
//! // Create a decoder; its registry can be shared across threads
//! let decoder = Decoder::new(&signal_set);
//!
//! // Decode a response dump, one frame per line
//! let config = DecoderConfig::new();
//! let values = decoder.decode("7280662404C23CE1C", &config);
//!
//! for (signal_id, value) in &values {
//!     match value {
//!         SignalValue::Absent => println!("{}: no mapping", signal_id),
//!         value => println!("{}: {}", signal_id, value),
//!     }
//! }
//! ```

// Public modules
pub mod cache;
pub mod cantp;
pub mod config;
pub mod decoder;
pub mod signals;
pub mod types;

// Re-export main types for convenience
pub use cache::RegistryCache;
pub use cantp::{CanIdFormat, Frame, FrameScanner, Packet};
pub use config::DecoderConfig;
pub use decoder::{decode_obd_response, Decoder};
pub use signals::{CommandRegistry, CommandResponse, RegistryStats, SignalSet};
pub use types::{DecoderError, FrameError, FramePart, Result, SignalValue, ValueMap};

// Internal modules (not exposed in public API)
mod bitfield;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: an empty signal set decodes nothing
        let decoder = Decoder::new(&SignalSet::default());
        let stats = decoder.registry_stats();
        assert_eq!(stats.num_commands, 0);
        assert!(decoder.decode("7E803410D32", &DecoderConfig::new()).is_empty());
    }
}
