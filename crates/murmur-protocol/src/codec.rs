//! Codec for encoding and decoding murmur frames.
//!
//! This module provides MessagePack-based serialization with length-prefixed framing.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::frames::Frame;

/// Maximum frame size (1 MiB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Length prefix size in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds maximum size.
    #[error("Frame size {0} exceeds maximum {MAX_FRAME_SIZE}")]
    FrameTooLarge(usize),

    /// Not enough data to decode frame.
    #[error("Incomplete frame: need {0} more bytes")]
    Incomplete(usize),

    /// MessagePack encoding error.
    #[error("Encoding error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MessagePack decoding error.
    #[error("Decoding error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Encode a frame to bytes.
///
/// The encoded format is:
/// - 4 bytes: Big-endian length prefix
/// - N bytes: MessagePack-encoded frame
///
/// # Errors
///
/// Returns an error if the frame is too large or encoding fails.
pub fn encode(frame: &Frame) -> Result<Bytes, ProtocolError> {
    let mut buf = BytesMut::new();
    encode_into(frame, &mut buf)?;
    Ok(buf.freeze())
}

/// Append one encoded frame to `buf`.
///
/// The body is serialized in place behind a placeholder prefix, which is
/// patched once the length is known. On error `buf` is left as it was.
///
/// # Errors
///
/// Returns an error if the frame is too large or encoding fails.
pub fn encode_into(frame: &Frame, buf: &mut BytesMut) -> Result<(), ProtocolError> {
    let start = buf.len();
    buf.put_u32(0);

    let written = {
        let mut writer = (&mut *buf).writer();
        rmp_serde::encode::write_named(&mut writer, frame)
    };
    let length = buf.len() - start - LENGTH_PREFIX_SIZE;

    if let Err(e) = written {
        buf.truncate(start);
        return Err(e.into());
    }
    if length > MAX_FRAME_SIZE {
        buf.truncate(start);
        return Err(ProtocolError::FrameTooLarge(length));
    }

    buf[start..start + LENGTH_PREFIX_SIZE].copy_from_slice(&(length as u32).to_be_bytes());
    Ok(())
}

/// Body length announced by the prefix, or `None` while the prefix is partial.
fn announced_length(data: &[u8]) -> Result<Option<usize>, ProtocolError> {
    let Some(mut prefix) = data.get(..LENGTH_PREFIX_SIZE) else {
        return Ok(None);
    };

    let length = prefix.get_u32() as usize;
    if length > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(length));
    }
    Ok(Some(length))
}

/// Decode the frame at the start of `data`. Trailing bytes are ignored.
///
/// # Errors
///
/// Returns an error if the data is incomplete, too large, or invalid.
pub fn decode(data: &[u8]) -> Result<Frame, ProtocolError> {
    let length = announced_length(data)?
        .ok_or_else(|| ProtocolError::Incomplete(LENGTH_PREFIX_SIZE - data.len()))?;

    let total = LENGTH_PREFIX_SIZE + length;
    let body = data
        .get(LENGTH_PREFIX_SIZE..total)
        .ok_or_else(|| ProtocolError::Incomplete(total - data.len()))?;

    Ok(rmp_serde::from_slice(body)?)
}

/// Take the next complete frame off the front of `buf`.
///
/// Returns `Ok(None)` and leaves `buf` untouched while the frame is partial.
///
/// # Errors
///
/// Returns an error if the frame is too large or invalid.
pub fn decode_from(buf: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
    let Some(length) = announced_length(buf)? else {
        return Ok(None);
    };

    let total = LENGTH_PREFIX_SIZE + length;
    if buf.len() < total {
        buf.reserve(total - buf.len());
        return Ok(None);
    }

    let frame = buf.split_to(total);
    Ok(Some(rmp_serde::from_slice(&frame[LENGTH_PREFIX_SIZE..])?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::{PresenceKind, UserInfo};

    #[test]
    fn test_encode_decode_variants() {
        let frames = vec![
            Frame::public("alice", "hi", 1_700_000_000),
            Frame::private("bob", "alice", "psst", 1_700_000_001),
            Frame::presence(PresenceKind::Login, UserInfo::new("carol", 1_700_000_002), 3),
            Frame::heartbeat(),
        ];

        for frame in frames {
            let encoded = encode(&frame).unwrap();
            assert_eq!(decode(&encoded).unwrap(), frame);
        }
    }

    #[test]
    fn test_decode_incomplete() {
        let encoded = encode(&Frame::public("alice", "hello there", 0)).unwrap();

        match decode(&encoded[..5]) {
            Err(ProtocolError::Incomplete(missing)) => assert_eq!(missing, encoded.len() - 5),
            other => panic!("Expected Incomplete error, got {:?}", other),
        }
        match decode(&encoded[..2]) {
            Err(ProtocolError::Incomplete(2)) => {}
            other => panic!("Expected Incomplete(2), got {:?}", other),
        }
    }

    #[test]
    fn test_frame_too_large() {
        let frame = Frame::public("alice", "x".repeat(MAX_FRAME_SIZE + 1), 0);

        match encode(&frame) {
            Err(ProtocolError::FrameTooLarge(_)) => {}
            other => panic!("Expected FrameTooLarge error, got {:?}", other),
        }

        // A refused frame leaves earlier output intact
        let mut buf = BytesMut::new();
        encode_into(&Frame::heartbeat(), &mut buf).unwrap();
        let before = buf.clone();
        assert!(encode_into(&frame, &mut buf).is_err());
        assert_eq!(buf, before);

        let mut header = BytesMut::new();
        header.put_u32((MAX_FRAME_SIZE + 1) as u32);
        assert!(matches!(
            decode_from(&mut header),
            Err(ProtocolError::FrameTooLarge(_))
        ));
    }

    #[test]
    fn test_streaming_decode() {
        let first = Frame::public("alice", "one", 1);
        let second = Frame::heartbeat();

        let mut buf = BytesMut::new();
        encode_into(&first, &mut buf).unwrap();
        encode_into(&second, &mut buf).unwrap();

        // Hold back the last byte so the second frame is partial.
        let tail = buf.split_off(buf.len() - 1);

        assert_eq!(decode_from(&mut buf).unwrap(), Some(first));
        assert_eq!(decode_from(&mut buf).unwrap(), None);

        buf.unsplit(tail);
        assert_eq!(decode_from(&mut buf).unwrap(), Some(second));
        assert!(buf.is_empty());
    }
}
