//! Textual CAN frame parsing
//!
//! One line of a hex dump becomes one [`Frame`]:
//!
//! ```text
//! <ID><[EXT_ADDR]><TYPE_NIBBLE><TYPE_HEADER><PAYLOAD_HEX>
//! ```
//!
//! The identifier is 3 hex characters for 11-bit IDs and 8 for 29-bit IDs. The
//! extended address is present only when extended addressing is enabled.

use crate::types::{FrameError, FramePart};
use serde::{Deserialize, Serialize};

/// CAN identifier width used by a dump or a command header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanIdFormat {
    /// Standard 11-bit identifier (3 hex characters)
    #[default]
    ElevenBit,
    /// Extended 29-bit identifier (8 hex characters)
    TwentyNineBit,
}

impl CanIdFormat {
    /// Number of hex characters the identifier occupies in a frame line
    pub fn identifier_len(self) -> usize {
        match self {
            CanIdFormat::ElevenBit => 3,
            CanIdFormat::TwentyNineBit => 8,
        }
    }
}

/// ISO-TP protocol control information type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    /// Complete message in one frame
    Single,
    /// Initial frame of a segmented message
    First,
    /// Continuation of a segmented message
    Consecutive,
    /// Flow control management
    FlowControl,
}

impl FrameType {
    /// Map the frame-type nibble to a frame type
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            0x0 => Some(FrameType::Single),
            0x1 => Some(FrameType::First),
            0x2 => Some(FrameType::Consecutive),
            0x3 => Some(FrameType::FlowControl),
            _ => None,
        }
    }
}

/// Type-specific ISO-TP header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameHeader {
    /// Payload length nibble (0-15)
    Single { size: u8 },
    /// 12-bit total message length (0-4095)
    First { size: u16 },
    /// Sequence index nibble (0-15)
    Consecutive { index: u8 },
    FlowControl,
}

impl FrameHeader {
    pub fn frame_type(&self) -> FrameType {
        match self {
            FrameHeader::Single { .. } => FrameType::Single,
            FrameHeader::First { .. } => FrameType::First,
            FrameHeader::Consecutive { .. } => FrameType::Consecutive,
            FrameHeader::FlowControl => FrameType::FlowControl,
        }
    }
}

/// A single parsed CAN frame carrying ISO-TP transport information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Identifier width this frame was parsed with
    pub id_format: CanIdFormat,
    /// Identifier as written in the dump (e.g. "7E8", "18DAF126")
    pub identifier: String,
    /// Two hex characters of extended receive address, if enabled
    pub extended_address: Option<String>,
    pub header: FrameHeader,
    /// Payload bytes following the header
    pub data: Vec<u8>,
}

impl Frame {
    /// Parse one line of a CAN dump
    ///
    /// All whitespace is removed before parsing, so space-separated hex is accepted.
    pub fn parse(
        line: &str,
        id_format: CanIdFormat,
        extended_addressing: bool,
    ) -> Result<Frame, FrameError> {
        let line: String = line.chars().filter(|c| !c.is_whitespace()).collect();
        let mut cursor = Cursor::new(&line);

        let identifier = cursor
            .take_hex(id_format.identifier_len())
            .ok_or_else(|| cursor.error(FramePart::Identifier, "Malformed CAN identifier"))?
            .to_string();

        let extended_address = if extended_addressing {
            let address = cursor.take_hex(2).ok_or_else(|| {
                cursor.error(FramePart::ExtendedAddress, "Malformed extended receive address")
            })?;
            Some(address.to_string())
        } else {
            None
        };

        let type_nibble = cursor
            .take_number(1)
            .ok_or_else(|| cursor.error(FramePart::Type, "Malformed type"))?;
        let frame_type = FrameType::from_nibble(type_nibble as u8).ok_or_else(|| {
            cursor.error(
                FramePart::Type,
                format!("Invalid data frame type: {:X}", type_nibble),
            )
        })?;

        let header = match frame_type {
            FrameType::Single => {
                let size = cursor
                    .take_number(1)
                    .ok_or_else(|| cursor.error(FramePart::Size, "Malformed size"))?;
                FrameHeader::Single { size: size as u8 }
            }
            FrameType::First => {
                let size = cursor
                    .take_number(3)
                    .ok_or_else(|| cursor.error(FramePart::Size, "Malformed size"))?;
                FrameHeader::First { size: size as u16 }
            }
            FrameType::Consecutive => {
                let index = cursor
                    .take_number(1)
                    .ok_or_else(|| cursor.error(FramePart::Index, "Malformed index"))?;
                FrameHeader::Consecutive { index: index as u8 }
            }
            FrameType::FlowControl => FrameHeader::FlowControl,
        };

        let remaining = cursor.rest();
        let data = if frame_type == FrameType::FlowControl {
            // Flow control content is never used downstream
            hex::decode(remaining).unwrap_or_default()
        } else {
            if remaining.is_empty() {
                return Err(cursor.error(FramePart::Data, "Malformed data"));
            }
            if remaining.len() % 2 != 0 {
                return Err(cursor.error(FramePart::Data, "Malformed data (odd length)"));
            }
            hex::decode(remaining).map_err(|_| cursor.error(FramePart::Data, "Invalid hex data"))?
        };

        Ok(Frame {
            id_format,
            identifier,
            extended_address,
            header,
            data,
        })
    }

    pub fn frame_type(&self) -> FrameType {
        self.header.frame_type()
    }
}

/// Left-to-right reader over a whitespace-free frame line
struct Cursor<'a> {
    line: &'a str,
    index: usize,
}

impl<'a> Cursor<'a> {
    fn new(line: &'a str) -> Self {
        Self { line, index: 0 }
    }

    /// Consume `count` hex digits, returning them as text
    fn take_hex(&mut self, count: usize) -> Option<&'a str> {
        let end = self.index.checked_add(count)?;
        let segment = self.line.get(self.index..end)?;
        if !segment.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        self.index = end;
        Some(segment)
    }

    /// Consume `count` hex digits, returning their numeric value
    fn take_number(&mut self, count: usize) -> Option<u32> {
        let segment = self.take_hex(count)?;
        u32::from_str_radix(segment, 16).ok()
    }

    fn rest(&self) -> &'a str {
        self.line.get(self.index..).unwrap_or_default()
    }

    fn error(&self, part: FramePart, message: impl Into<String>) -> FrameError {
        FrameError::new(part, message, self.line)
    }
}
