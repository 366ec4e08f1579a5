//! Main decoder API
//!
//! This module provides the primary interface for the decoder library.
//! The Decoder struct owns a shared command registry and turns ASCII response
//! dumps into signal value maps.

use crate::cache::RegistryCache;
use crate::cantp::{FrameScanner, Packet};
use crate::config::DecoderConfig;
use crate::signals::{CommandRegistry, RegistryStats, SignalSet};
use crate::types::{Result, ValueMap};
use std::sync::Arc;

/// The main decoder struct - entry point for all decoding operations
///
/// Cloning is cheap: clones share the same immutable registry, so one decoder
/// can serve many threads.
#[derive(Debug, Clone)]
pub struct Decoder {
    registry: Arc<CommandRegistry>,
}

impl Decoder {
    /// Create a decoder over every command of a signal set
    ///
    /// # Example
    /// ```no_run
    /// use obd_decoder::{Decoder, DecoderConfig, SignalSet};
    ///
    /// let json = std::fs::read_to_string("ford-f-150.json").unwrap();
    /// let signal_set = SignalSet::from_json(&json).unwrap();
    /// let decoder = Decoder::new(&signal_set);
    ///
    /// let values = decoder.decode("7280662404C23CE1C", &DecoderConfig::new());
    /// println!("{:?}", values.get("F150_ODO"));
    /// ```
    pub fn new(signal_set: &SignalSet) -> Self {
        Self::from_registry(Arc::new(CommandRegistry::new(
            signal_set.commands.iter().cloned(),
        )))
    }

    /// Create a decoder over a base signal set with a vehicle signal set on top
    ///
    /// Vehicle commands take precedence over base commands with the same key.
    pub fn with_base(base: &SignalSet, vehicle: &SignalSet) -> Self {
        Self::from_registry(Arc::new(CommandRegistry::combined(base, vehicle)))
    }

    /// Create a decoder over an already-built registry
    pub fn from_registry(registry: Arc<CommandRegistry>) -> Self {
        Self { registry }
    }

    /// Create a decoder for one model year from the registries `cache` builds
    pub fn for_model_year(cache: &RegistryCache, model_year: u32) -> Result<Self> {
        Ok(Self::from_registry(cache.registry_for(model_year)?))
    }

    /// Create the decoder `config` asks for
    ///
    /// With a model year set, only commands that apply to that year are
    /// used; otherwise every command is.
    pub fn for_config(
        base: Option<&SignalSet>,
        vehicle: &SignalSet,
        config: &DecoderConfig,
    ) -> Self {
        match (config.model_year, base) {
            (Some(model_year), _) => Self::from_registry(Arc::new(
                CommandRegistry::for_model_year(base, vehicle, model_year),
            )),
            (None, Some(base)) => Self::with_base(base, vehicle),
            (None, None) => Self::new(vehicle),
        }
    }

    /// Decode an ASCII hex dump into signal values
    ///
    /// Only the frame layout fields of `config` are read here. Model-year
    /// filtering is fixed when the decoder is built.
    ///
    /// Unparseable lines and undecodable signals are logged and skipped, so the
    /// result may be partial. Later packets overwrite earlier values with the
    /// same signal id.
    pub fn decode(&self, response: &str, config: &DecoderConfig) -> ValueMap {
        let scanner = FrameScanner::from_ascii(
            response,
            config.can_id_format,
            config.extended_addressing,
        );
        self.decode_packets(scanner)
    }

    /// Decode already-reassembled packets into signal values
    pub fn decode_packets(&self, packets: impl IntoIterator<Item = Packet>) -> ValueMap {
        let mut values = ValueMap::new();
        for packet in packets {
            for response in self.registry.identify(&packet) {
                values.extend(response.values);
            }
        }
        values
    }

    /// Registry this decoder matches packets against
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Get statistics about the loaded commands
    pub fn registry_stats(&self) -> RegistryStats {
        self.registry.stats()
    }
}

/// Decode one response dump against a signal set
///
/// Convenience wrapper that builds a throwaway registry. Use [`Decoder`] to
/// decode many dumps against the same signal set.
pub fn decode_obd_response(
    signal_set: &SignalSet,
    response: &str,
    config: &DecoderConfig,
) -> ValueMap {
    Decoder::for_config(None, signal_set, config).decode(response, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignalValue;

    const SIGNAL_SET: &str = r#"{
        "commands": [
            {"hdr": "7E0", "rax": "7E8", "cmd": {"22": "0101"}, "freq": 1,
             "signals": [
                {"id": "FIRST", "name": "First", "fmt": {"bix": 0, "len": 8, "max": 255, "unit": "scalar"}},
                {"id": "LAST", "name": "Last", "fmt": {"bix": 32, "len": 8, "max": 255, "unit": "scalar"}}
             ]},
            {"hdr": "7E0", "cmd": {"01": "0D"}, "freq": 1, "filter": {"from": 2018},
             "signals": [
                {"id": "SPEED", "name": "Speed", "fmt": {"len": 8, "max": 255, "unit": "kilometersPerHour"}}
             ]}
        ]
    }"#;

    fn signal_set() -> SignalSet {
        SignalSet::from_json(SIGNAL_SET).unwrap()
    }

    #[test]
    fn test_decode_multi_frame_response() {
        let decoder = Decoder::new(&signal_set());
        let dump = "7E81008620101AABBCC\n7E821DDEE0000000000\n";

        let values = decoder.decode(dump, &DecoderConfig::new());
        assert_eq!(values.get("FIRST"), Some(&SignalValue::Number(170.0)));
        assert_eq!(values.get("LAST"), Some(&SignalValue::Number(238.0)));
    }

    #[test]
    fn test_decode_merges_packets() {
        let decoder = Decoder::new(&signal_set());
        let dump = "7E8 05 62 0101 01 \n 7E8 03 41 0D 32";

        let values = decoder.decode(dump, &DecoderConfig::new());
        assert_eq!(values.len(), 2);
        assert_eq!(values["FIRST"], SignalValue::Number(1.0));
        assert_eq!(values["SPEED"], SignalValue::Number(50.0));
    }

    #[test]
    fn test_decode_is_idempotent() {
        let decoder = Decoder::new(&signal_set());
        let dump = "7E81008620101AABBCC\n7E821DDEE0000000000\n7E803410D32";
        let config = DecoderConfig::new();

        let first = serde_json::to_string(&decoder.decode(dump, &config)).unwrap();
        let second = serde_json::to_string(&decoder.decode(dump, &config)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_decode_empty_and_garbage() {
        let decoder = Decoder::new(&signal_set());
        assert!(decoder.decode("", &DecoderConfig::new()).is_empty());
        assert!(decoder.decode("not a frame\nZZZ0", &DecoderConfig::new()).is_empty());
    }

    #[test]
    fn test_model_year_filtering() {
        let vehicle = signal_set();
        let dump = "7E803410D32";

        let config = DecoderConfig::new().with_model_year(2010);
        let old = Decoder::for_config(None, &vehicle, &config);
        assert!(old.decode(dump, &config).is_empty());

        let config = DecoderConfig::new().with_model_year(2020);
        let new = Decoder::for_config(None, &vehicle, &config);
        assert_eq!(new.decode(dump, &config)["SPEED"], SignalValue::Number(50.0));
    }

    #[test]
    fn test_decode_model_year_is_fixed_at_construction() {
        let decoder = Decoder::new(&signal_set());
        let values = decoder.decode("7E803410D32", &DecoderConfig::new().with_model_year(2010));
        assert_eq!(values["SPEED"], SignalValue::Number(50.0));
    }

    #[test]
    fn test_for_model_year_uses_cache() {
        let cache = RegistryCache::for_signal_sets(None, signal_set());
        let dump = "7E803410D32";

        let old = Decoder::for_model_year(&cache, 2010).unwrap();
        assert!(old.decode(dump, &DecoderConfig::new()).is_empty());

        let new = Decoder::for_model_year(&cache, 2020).unwrap();
        assert_eq!(
            new.decode(dump, &DecoderConfig::new())["SPEED"],
            SignalValue::Number(50.0)
        );
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_same_year_with_different_vehicles() {
        let speed_set = |signal_id: &str| {
            SignalSet::from_json(&format!(
                r#"{{"commands": [{{"hdr": "7E0", "cmd": {{"01": "0D"}}, "freq": 1,
                    "signals": [{{"id": "{}", "name": "Speed", "fmt": {{"len": 8, "max": 255, "unit": "kilometersPerHour"}}}}]}}]}}"#,
                signal_id
            ))
            .unwrap()
        };
        let first = RegistryCache::for_signal_sets(None, speed_set("A_SPEED"));
        let second = RegistryCache::for_signal_sets(None, speed_set("B_SPEED"));
        let dump = "7E803410D32";

        let values = Decoder::for_model_year(&first, 2020)
            .unwrap()
            .decode(dump, &DecoderConfig::new());
        assert_eq!(values.keys().collect::<Vec<_>>(), vec!["A_SPEED"]);

        let values = Decoder::for_model_year(&second, 2020)
            .unwrap()
            .decode(dump, &DecoderConfig::new());
        assert_eq!(values.keys().collect::<Vec<_>>(), vec!["B_SPEED"]);
        assert_eq!(values["B_SPEED"], SignalValue::Number(50.0));
    }

    #[test]
    fn test_vehicle_overrides_base() {
        let base = SignalSet::base_from_json(
            r#"{"commands": [{"hdr": "7DF", "rax": "7E8", "cmd": {"01": "0D"}, "freq": 1,
                "signals": [{"id": "SPEED", "name": "Speed", "fmt": {"len": 8, "max": 255, "unit": "scalar", "mul": 2}}]}]}"#,
        )
        .unwrap();
        let decoder = Decoder::with_base(&base, &signal_set());

        let values = decoder.decode("7E803410D32", &DecoderConfig::new());
        assert_eq!(values["SPEED"], SignalValue::Number(50.0));
        assert_eq!(decoder.registry_stats().num_commands, 3);
    }

    #[test]
    fn test_decode_obd_response() {
        let values = decode_obd_response(
            &signal_set(),
            "7E803410D32",
            &DecoderConfig::new().with_model_year(2017),
        );
        assert!(values.is_empty());

        let values = decode_obd_response(&signal_set(), "7E803410D32", &DecoderConfig::new());
        assert_eq!(values["SPEED"], SignalValue::Number(50.0));
    }
}
