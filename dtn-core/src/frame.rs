//! SDNV-delimited frames.
//!
//! The node's forwarding path moves `(destination URI, payload)` pairs.
//! On the wire a frame is:
//!
//! ```text
//! SDNV(uri_len) | uri bytes | SDNV(payload_len) | payload bytes
//! ```
//!
//! Multiple frames may be concatenated; `decode` consumes exactly one and
//! reports how many bytes it used.

use std::fmt;

use crate::sdnv::{self, SdnvError};

/// Upper bound on the destination URI length in a frame. Anything longer
/// is treated as corrupt framing rather than allocated.
pub const MAX_URI_LEN: u64 = 4096;

/// Upper bound on a frame payload.
pub const MAX_PAYLOAD_LEN: u64 = 16 * 1024 * 1024;

/// Frame codec error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Length prefix malformed or out of u64 range.
    Sdnv(SdnvError),
    /// Declared length runs past the end of the input.
    Truncated,
    /// Declared length exceeds the codec limits.
    LengthLimit { declared: u64, limit: u64 },
    /// URI bytes are not valid UTF-8.
    InvalidUri,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Sdnv(e) => write!(f, "Frame length prefix: {}", e),
            FrameError::Truncated => write!(f, "Frame truncated"),
            FrameError::LengthLimit { declared, limit } => {
                write!(f, "Frame length {} exceeds limit {}", declared, limit)
            }
            FrameError::InvalidUri => write!(f, "Frame destination is not valid UTF-8"),
        }
    }
}

impl std::error::Error for FrameError {}

impl From<SdnvError> for FrameError {
    fn from(e: SdnvError) -> Self {
        FrameError::Sdnv(e)
    }
}

/// Encode one frame.
pub fn encode(uri: &str, payload: &[u8]) -> Vec<u8> {
    let uri_bytes = uri.as_bytes();
    let mut out = Vec::with_capacity(uri_bytes.len() + payload.len() + 2 * sdnv::MAX_LEN);
    out.extend_from_slice(&sdnv::encode_to_vec(uri_bytes.len() as u64));
    out.extend_from_slice(uri_bytes);
    out.extend_from_slice(&sdnv::encode_to_vec(payload.len() as u64));
    out.extend_from_slice(payload);
    out
}

/// Decode one frame from the start of `data`.
/// Returns `(destination, payload, bytes_consumed)`.
pub fn decode(data: &[u8]) -> Result<(String, Vec<u8>, usize), FrameError> {
    let mut offset = 0usize;

    let (uri_len, consumed) = sdnv::decode(&data[offset..])?;
    offset += consumed;
    if uri_len > MAX_URI_LEN {
        return Err(FrameError::LengthLimit {
            declared: uri_len,
            limit: MAX_URI_LEN,
        });
    }
    let uri_len = uri_len as usize;
    if data.len() - offset < uri_len {
        return Err(FrameError::Truncated);
    }
    let uri = std::str::from_utf8(&data[offset..offset + uri_len])
        .map_err(|_| FrameError::InvalidUri)?
        .to_string();
    offset += uri_len;

    let (payload_len, consumed) = sdnv::decode(&data[offset..])?;
    offset += consumed;
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(FrameError::LengthLimit {
            declared: payload_len,
            limit: MAX_PAYLOAD_LEN,
        });
    }
    let payload_len = payload_len as usize;
    if data.len() - offset < payload_len {
        return Err(FrameError::Truncated);
    }
    let payload = data[offset..offset + payload_len].to_vec();
    offset += payload_len;

    Ok((uri, payload, offset))
}
