//! CAN-TP (ISO-TP) message reconstruction
//!
//! Reassembles complete packets from a static log of frames. This is a batch
//! reassembler: there are no timeouts and no flow control is transmitted.
//! Partial messages left open when the frames run out are dropped.

pub mod frame;

pub use frame::{CanIdFormat, Frame, FrameHeader, FrameType};

use std::collections::HashMap;

/// A complete ISO-TP message reassembled from one or more frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Identifier of the responding node, as written in the dump
    pub identifier: String,
    /// Extended receive address of the completing frame, if any
    pub extended_address: Option<String>,
    /// Complete payload bytes
    pub data: Vec<u8>,
}

/// Bytes collected so far for a segmented message
#[derive(Debug)]
struct PartialPacket {
    data: Vec<u8>,
    size: usize,
}

/// Iterator that reassembles frames into packets
///
/// Partial state is kept per identifier. A new instance is needed to scan the
/// same frames again.
#[derive(Debug)]
pub struct FrameScanner {
    frames: Vec<Frame>,
    position: usize,
    partial_packets: HashMap<String, PartialPacket>,
}

impl FrameScanner {
    /// Create a scanner over already-parsed frames
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            position: 0,
            partial_packets: HashMap::new(),
        }
    }

    /// Create a scanner from an ASCII hex dump, one frame per line
    ///
    /// Blank lines are dropped. Lines that fail to parse are logged and skipped.
    pub fn from_ascii(text: &str, id_format: CanIdFormat, extended_addressing: bool) -> Self {
        let frames = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| match Frame::parse(line, id_format, extended_addressing) {
                Ok(frame) => Some(frame),
                Err(e) => {
                    log::warn!("Skipping CAN frame: {}", e);
                    None
                }
            })
            .collect();

        Self::new(frames)
    }

    /// Frames this scanner was built from
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
}

/// Feed one frame through the reassembly state machine
fn reassemble(partial_packets: &mut HashMap<String, PartialPacket>, frame: &Frame) -> Option<Packet> {
    match frame.header {
        FrameHeader::Single { .. } => Some(Packet {
            identifier: frame.identifier.clone(),
            extended_address: frame.extended_address.clone(),
            data: frame.data.clone(),
        }),
        FrameHeader::First { size } => {
            partial_packets.insert(
                frame.identifier.clone(),
                PartialPacket {
                    data: frame.data.clone(),
                    size: size as usize,
                },
            );
            None
        }
        FrameHeader::Consecutive { .. } => {
            let Some(partial) = partial_packets.get_mut(&frame.identifier) else {
                log::trace!(
                    "Ignoring consecutive frame from {} with no first frame",
                    frame.identifier
                );
                return None;
            };

            partial.data.extend_from_slice(&frame.data);
            if partial.data.len() < partial.size {
                return None;
            }

            let mut partial = partial_packets.remove(&frame.identifier)?;
            partial.data.truncate(partial.size);
            Some(Packet {
                identifier: frame.identifier.clone(),
                extended_address: frame.extended_address.clone(),
                data: partial.data,
            })
        }
        FrameHeader::FlowControl => None,
    }
}

impl Iterator for FrameScanner {
    type Item = Packet;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(frame) = self.frames.get(self.position) {
            self.position += 1;
            if let Some(packet) = reassemble(&mut self.partial_packets, frame) {
                return Some(packet);
            }
        }

        if !self.partial_packets.is_empty() {
            log::debug!(
                "Dropping {} incomplete multi-frame message(s)",
                self.partial_packets.len()
            );
            self.partial_packets.clear();
        }
        None
    }
}
