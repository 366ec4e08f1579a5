//! Bit-field extraction
//!
//! Payloads are read MSB-first: bit 0 is the most significant bit of byte 0,
//! bit 7 its least significant bit, bit 8 the most significant bit of byte 1.

use crate::types::{DecoderError, Result};

/// Extract `length` bits starting at `start_bit`, MSB-first
///
/// Bits past the end of `data` read as zero. Callers that need a range check
/// use [`extract_checked`]. `length` must not exceed 64.
pub(crate) fn extract_msb_first(data: &[u8], start_bit: usize, length: usize) -> u64 {
    let mut result: u64 = 0;

    for i in 0..length {
        let Some(bit_pos) = start_bit.checked_add(i) else {
            break;
        };
        let byte_idx = bit_pos / 8;
        let bit_in_byte = 7 - (bit_pos % 8); // Bit 0 = MSB, bit 7 = LSB

        if let Some(byte) = data.get(byte_idx) {
            let bit_value = (byte >> bit_in_byte) & 0x01;
            result |= (bit_value as u64) << (length - 1 - i);
        }
    }

    result
}

/// Extract `length` bits starting at `start_bit`, failing if the window runs
/// past the end of `data`
///
/// With `swap_bytes` set and a window wider than one byte, the whole bytes
/// covering the window are reversed before extraction.
pub(crate) fn extract_checked(
    data: &[u8],
    start_bit: usize,
    length: usize,
    swap_bytes: bool,
) -> Result<u64> {
    if length > 64 {
        return Err(DecoderError::InvalidSignalDefinition(format!(
            "bit length {} exceeds 64",
            length
        )));
    }

    let available = data.len() * 8;
    let needed = start_bit
        .checked_add(length)
        .ok_or(DecoderError::SignalOutOfRange {
            needed: usize::MAX,
            available,
        })?;
    if needed > available {
        return Err(DecoderError::SignalOutOfRange { needed, available });
    }

    if swap_bytes && length > 8 {
        let swapped = swap_byte_span(data, start_bit, length);
        return Ok(extract_msb_first(&swapped, start_bit, length));
    }

    Ok(extract_msb_first(data, start_bit, length))
}

/// Copy of `data` with the bytes holding the bit window reversed
fn swap_byte_span(data: &[u8], start_bit: usize, length: usize) -> Vec<u8> {
    let mut swapped = data.to_vec();
    let start_byte = start_bit / 8;
    let byte_count = (length + 7) / 8;
    let end_byte = (start_byte + byte_count).min(swapped.len());
    swapped[start_byte..end_byte].reverse();
    swapped
}

/// Sign-extend a value from N bits to 64 bits
///
/// If the value's MSB is 1, fill the upper bits with 1s.
pub(crate) fn sign_extend(value: u64, bit_length: usize) -> i64 {
    if bit_length == 0 || bit_length >= 64 {
        return value as i64;
    }

    let sign_bit = 1u64 << (bit_length - 1);
    if (value & sign_bit) != 0 {
        let mask = !0u64 << bit_length;
        (value | mask) as i64
    } else {
        value as i64
    }
}
