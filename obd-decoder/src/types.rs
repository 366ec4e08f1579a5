//! Core types for the OBD signal decoder library
//!
//! This module defines the error taxonomy and the decoded value types that the
//! decoder hands back to callers. Frame-level and signal-level failures are
//! isolated by the decoder; only signal-set construction errors reach callers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Decoded values keyed by signal id.
///
/// Ordered so that decoding the same input twice renders identically.
pub type ValueMap = BTreeMap<String, SignalValue>;

/// Segment of a textual CAN frame that failed to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramePart {
    Identifier,
    ExtendedAddress,
    Type,
    Size,
    Index,
    Data,
}

impl fmt::Display for FramePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramePart::Identifier => write!(f, "identifier"),
            FramePart::ExtendedAddress => write!(f, "extended address"),
            FramePart::Type => write!(f, "type"),
            FramePart::Size => write!(f, "size"),
            FramePart::Index => write!(f, "index"),
            FramePart::Data => write!(f, "data"),
        }
    }
}

/// A single CAN frame line could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} ({part}) in frame '{line}'")]
pub struct FrameError {
    /// Which segment of the frame was malformed
    pub part: FramePart,
    /// Short description of the failure
    pub message: String,
    /// The offending frame text, whitespace removed
    pub line: String,
}

impl FrameError {
    pub fn new(part: FramePart, message: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            part,
            message: message.into(),
            line: line.into(),
        }
    }
}

/// Errors that can occur during decoding
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("Malformed CAN frame: {0}")]
    Frame(#[from] FrameError),

    #[error("Not enough data: need {needed} bits, have {available}")]
    SignalOutOfRange { needed: usize, available: usize },

    #[error("Invalid signal definition: {0}")]
    InvalidSignalDefinition(String),

    #[error("Failed to parse signal set: {0}")]
    SignalSetParseError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A decoded signal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    /// Physical value produced by a scaling format
    Number(f64),
    /// Mapped value produced by an enumeration format
    Text(String),
    /// Enumeration raw value with no mapping
    Absent,
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValue::Number(v) => write!(f, "{}", v),
            SignalValue::Text(v) => write!(f, "{}", v),
            SignalValue::Absent => write!(f, "-"),
        }
    }
}

impl SignalValue {
    /// Numeric value, if this is a scaled signal
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SignalValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Text value, if this is a mapped enumeration
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SignalValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, SignalValue::Absent)
    }
}

impl From<Option<String>> for SignalValue {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(text) => SignalValue::Text(text),
            None => SignalValue::Absent,
        }
    }
}
