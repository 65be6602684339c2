//! RFC 5050 Self-Delimiting Numeric Values.
//!
//! An SDNV stores an unsigned integer big-endian, 7 bits per byte. Every
//! byte except the last has the MSB set as a continuation flag. Values are
//! always encoded in the fewest bytes possible; a `u64` needs at most 10.

use std::fmt;

/// Maximum encoded length of a `u64` SDNV.
pub const MAX_LEN: usize = 10;

/// SDNV codec error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdnvError {
    /// Input empty, or continuation flags ran past the end of the slice.
    UnexpectedEof,
    /// Encoding does not fit into a `u64`.
    Overflow,
    /// Output buffer too small for the minimal encoding.
    BufferTooSmall { needed: usize, available: usize },
}

impl fmt::Display for SdnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdnvError::UnexpectedEof => write!(f, "Unexpected end of SDNV data"),
            SdnvError::Overflow => write!(f, "SDNV value exceeds u64 range"),
            SdnvError::BufferTooSmall { needed, available } => {
                write!(f, "SDNV buffer too small: need {}, have {}", needed, available)
            }
        }
    }
}

impl std::error::Error for SdnvError {}

/// Decode one SDNV from the start of `data`.
/// Returns `(value, bytes_consumed)`.
pub fn decode(data: &[u8]) -> Result<(u64, usize), SdnvError> {
    if data.is_empty() {
        return Err(SdnvError::UnexpectedEof);
    }

    // Find the terminating byte (MSB clear) first, so oversized or
    // truncated input never produces a partial value.
    let mut len = 0usize;
    loop {
        if len >= MAX_LEN {
            return Err(SdnvError::Overflow);
        }
        if len >= data.len() {
            return Err(SdnvError::UnexpectedEof);
        }
        let b = data[len];
        len += 1;
        if b & 0x80 == 0 {
            break;
        }
    }

    // A 10-byte encoding carries 70 payload bits; only bit 63 may be set
    // in the leading byte, so anything above 0x81 cannot fit a u64.
    if len == MAX_LEN && data[0] > 0x81 {
        return Err(SdnvError::Overflow);
    }

    let mut value: u64 = 0;
    for &b in &data[..len] {
        value = (value << 7) | u64::from(b & 0x7F);
    }

    Ok((value, len))
}

/// Number of bytes the minimal encoding of `value` occupies.
pub fn encoded_len(value: u64) -> usize {
    if value > 0x7FFF_FFFF_FFFF_FFFF {
        10
    } else if value > 0xFF_FFFF_FFFF_FFFF {
        9
    } else if value > 0x1_FFFF_FFFF_FFFF {
        8
    } else if value > 0x3FF_FFFF_FFFF {
        7
    } else if value > 0x7_FFFF_FFFF {
        6
    } else if value > 0xFFF_FFFF {
        5
    } else if value > 0x1F_FFFF {
        4
    } else if value > 0x3FFF {
        3
    } else if value > 0x7F {
        2
    } else {
        1
    }
}

/// Encode `value` into `buf` using the minimal number of bytes.
/// Returns the number of bytes written.
pub fn encode(value: u64, buf: &mut [u8]) -> Result<usize, SdnvError> {
    let len = encoded_len(value);
    if buf.len() < len {
        return Err(SdnvError::BufferTooSmall {
            needed: len,
            available: buf.len(),
        });
    }

    // Last byte gets the low 7 bits with MSB clear, then walk backwards
    // shifting 7 bits per step and setting the continuation flag.
    let mut v = value;
    buf[len - 1] = (v & 0x7F) as u8;
    for i in (0..len - 1).rev() {
        v >>= 7;
        buf[i] = ((v & 0x7F) as u8) | 0x80;
    }

    Ok(len)
}

/// Encode `value` into a freshly allocated vector.
pub fn encode_to_vec(value: u64) -> Vec<u8> {
    let mut buf = [0u8; MAX_LEN];
    // Cannot fail: the scratch buffer covers the largest encoding.
    let len = encode(value, &mut buf).unwrap_or(0);
    buf[..len].to_vec()
}
