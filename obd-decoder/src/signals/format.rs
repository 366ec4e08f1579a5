//! Signal value formats
//!
//! A signal's format is either a [`Scaling`] (linear numeric decode) or an
//! [`Enumeration`] (lookup table). Both read a bit window of the response
//! payload that follows the service and PID bytes.

use crate::bitfield;
use crate::types::{Result, SignalValue};
use std::collections::BTreeMap;

/// Linear numeric decode of a bit field
///
/// `value = raw * scalar / divisor + offset`, clamped to `[min_value, max_value]`
/// when `max_value > min_value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Scaling {
    pub bit_offset: usize,
    pub bit_length: usize,
    /// Reverse the bytes covering the window before extraction
    pub bytes_lsb: bool,
    /// Interpret the raw value as two's complement
    pub signed: bool,
    pub min_value: f64,
    pub max_value: f64,
    pub offset: f64,
    pub scalar: f64,
    pub divisor: f64,
    pub unit: String,
    pub null_min: Option<f64>,
    pub null_max: Option<f64>,
    pub optimal_min: Option<f64>,
    pub optimal_max: Option<f64>,
    pub optimal_value: Option<f64>,
}

impl Scaling {
    /// Scaling with identity transform over `bit_length` bits at offset 0
    pub fn new(bit_length: usize, max_value: f64, unit: impl Into<String>) -> Self {
        Self {
            bit_offset: 0,
            bit_length,
            bytes_lsb: false,
            signed: false,
            min_value: 0.0,
            max_value,
            offset: 0.0,
            scalar: 1.0,
            divisor: 1.0,
            unit: unit.into(),
            null_min: None,
            null_max: None,
            optimal_min: None,
            optimal_max: None,
            optimal_value: None,
        }
    }

    pub fn with_bit_offset(mut self, bit_offset: usize) -> Self {
        self.bit_offset = bit_offset;
        self
    }

    pub fn with_signed(mut self, signed: bool) -> Self {
        self.signed = signed;
        self
    }

    pub fn with_bytes_lsb(mut self, bytes_lsb: bool) -> Self {
        self.bytes_lsb = bytes_lsb;
        self
    }

    pub fn with_min(mut self, min_value: f64) -> Self {
        self.min_value = min_value;
        self
    }

    pub fn with_transform(mut self, scalar: f64, divisor: f64, offset: f64) -> Self {
        self.scalar = scalar;
        self.divisor = divisor;
        self.offset = offset;
        self
    }

    /// Decode the physical value from payload bytes
    ///
    /// Fails if the bit window extends past the end of `data`.
    pub fn decode(&self, data: &[u8]) -> Result<f64> {
        let raw = bitfield::extract_checked(data, self.bit_offset, self.bit_length, self.bytes_lsb)?;
        let raw = if self.signed {
            bitfield::sign_extend(raw, self.bit_length) as f64
        } else {
            raw as f64
        };

        let value = raw * self.scalar / self.divisor + self.offset;

        if self.max_value > self.min_value {
            Ok(value.clamp(self.min_value, self.max_value))
        } else {
            Ok(value)
        }
    }
}

/// One entry of an enumeration lookup table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerationValue {
    /// Value reported for the signal
    pub value: String,
    pub description: String,
}

/// Lookup-table decode of a bit field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enumeration {
    pub bit_offset: usize,
    pub bit_length: usize,
    /// Raw value, as a decimal string, to mapped value
    pub map: BTreeMap<String, EnumerationValue>,
}

impl Enumeration {
    pub fn new(bit_length: usize, map: BTreeMap<String, EnumerationValue>) -> Self {
        Self {
            bit_offset: 0,
            bit_length,
            map,
        }
    }

    pub fn with_bit_offset(mut self, bit_offset: usize) -> Self {
        self.bit_offset = bit_offset;
        self
    }

    /// Decode the mapped value from payload bytes
    ///
    /// Returns `None` when the raw value has no mapping; the raw number is never
    /// reported in its place. Bits past the end of `data` read as zero.
    pub fn decode(&self, data: &[u8]) -> Option<String> {
        if self.bit_length > 64 {
            return None;
        }
        let raw = bitfield::extract_msb_first(data, self.bit_offset, self.bit_length);
        self.map.get(&raw.to_string()).map(|entry| entry.value.clone())
    }
}

/// Format of a signal: exactly one of scaling or enumeration
#[derive(Debug, Clone, PartialEq)]
pub enum SignalFormat {
    Scaling(Scaling),
    Enumeration(Enumeration),
}

impl SignalFormat {
    /// Decode a signal value from the payload following the PID
    pub fn decode(&self, data: &[u8]) -> Result<SignalValue> {
        match self {
            SignalFormat::Scaling(scaling) => scaling.decode(data).map(SignalValue::Number),
            SignalFormat::Enumeration(enumeration) => Ok(enumeration.decode(data).into()),
        }
    }

    pub fn bit_offset(&self) -> usize {
        match self {
            SignalFormat::Scaling(scaling) => scaling.bit_offset,
            SignalFormat::Enumeration(enumeration) => enumeration.bit_offset,
        }
    }

    pub fn bit_length(&self) -> usize {
        match self {
            SignalFormat::Scaling(scaling) => scaling.bit_length,
            SignalFormat::Enumeration(enumeration) => enumeration.bit_length,
        }
    }
}
