//! Decoder configuration types
//!
//! This module defines the minimal configuration needed to decode a response
//! dump: how to read frame identifiers and which model year to decode for.

use crate::cantp::CanIdFormat;
use serde::{Deserialize, Serialize};

/// Configuration for one decode call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Width of the frame identifiers in the dump
    #[serde(default)]
    pub can_id_format: CanIdFormat,

    /// Whether each frame carries a 2-digit extended address after the identifier
    #[serde(default)]
    pub extended_addressing: bool,

    /// Optional: only decode commands whose year filter accepts this model year
    #[serde(default)]
    pub model_year: Option<u32>,
}

impl DecoderConfig {
    /// Create a new decoder configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the identifier width
    pub fn with_can_id_format(mut self, can_id_format: CanIdFormat) -> Self {
        self.can_id_format = can_id_format;
        self
    }

    /// Builder method: enable or disable extended addressing
    pub fn with_extended_addressing(mut self, enabled: bool) -> Self {
        self.extended_addressing = enabled;
        self
    }

    /// Builder method: decode for a single model year
    pub fn with_model_year(mut self, model_year: u32) -> Self {
        self.model_year = Some(model_year);
        self
    }
}
