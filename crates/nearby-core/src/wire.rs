//! Length-prefixed binary frame codec for the radio transport
//!
//! One connection carries exactly one frame, written by the advertising side
//! immediately after accept. The frame is length-prefixed so the receiver can
//! delimit it on a raw stream, and versioned so unrecognized future layouts
//! fail cleanly instead of misparsing.
//!
//! Frame layout (all integers big-endian):
//!
//! ```text
//! u32  body length
//! u8   version tag
//! u8   flags (bit 0: photo present)
//! u16  payment address length, then that many UTF-8 bytes
//! u16  display name length, then that many UTF-8 bytes
//! u32  photo length, then that many bytes     (only when the flag is set)
//! ```

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::record::PeerRecord;
use crate::types::RadioAddress;
use crate::{NearbyError, Result};

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Current frame version tag
pub const WIRE_VERSION: u8 = 1;

/// Upper bound on the frame body, guarding reads from untrusted peers
pub const MAX_FRAME_LEN: usize = 256 * 1024;

const FLAG_PHOTO: u8 = 0b0000_0001;

// ----------------------------------------------------------------------------
// Encoding
// ----------------------------------------------------------------------------

/// Encode a record as a complete frame, length prefix included
pub fn encode_frame(record: &PeerRecord) -> Result<Vec<u8>> {
    let body = encode_body(record)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(NearbyError::malformed_frame("frame exceeds maximum size"));
    }

    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

fn encode_body(record: &PeerRecord) -> Result<Vec<u8>> {
    let address = record.payment_address().as_bytes();
    let name = record.display_name().as_bytes();

    if address.is_empty() {
        return Err(NearbyError::malformed_frame("missing payment address"));
    }
    if address.len() > u16::MAX as usize {
        return Err(NearbyError::malformed_frame("payment address too long"));
    }
    if name.len() > u16::MAX as usize {
        return Err(NearbyError::malformed_frame("display name too long"));
    }

    let mut body = Vec::new();
    body.push(WIRE_VERSION);
    body.push(if record.photo().is_some() {
        FLAG_PHOTO
    } else {
        0
    });
    body.extend_from_slice(&(address.len() as u16).to_be_bytes());
    body.extend_from_slice(address);
    body.extend_from_slice(&(name.len() as u16).to_be_bytes());
    body.extend_from_slice(name);

    if let Some(photo) = record.photo() {
        if photo.len() > u32::MAX as usize {
            return Err(NearbyError::malformed_frame("photo too large"));
        }
        body.extend_from_slice(&(photo.len() as u32).to_be_bytes());
        body.extend_from_slice(photo);
    }

    Ok(body)
}

/// Write one complete frame to a stream
pub async fn write_frame<W>(writer: &mut W, record: &PeerRecord) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(record)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

// ----------------------------------------------------------------------------
// Decoding
// ----------------------------------------------------------------------------

/// Read exactly one frame from a stream, leaving the stream positioned at the
/// next frame or EOF.
///
/// `radio_address` is attached to the decoded record when the frame arrived
/// over radio, for session-local deduplication.
pub async fn read_frame<R>(reader: &mut R, radio_address: Option<RadioAddress>) -> Result<PeerRecord>
where
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await?;

    let body_len = u32::from_be_bytes(len_bytes) as usize;
    if body_len > MAX_FRAME_LEN {
        return Err(NearbyError::malformed_frame("frame exceeds maximum size"));
    }

    let mut body = vec![0u8; body_len];
    reader.read_exact(&mut body).await?;
    decode_body(&body, radio_address)
}

/// Decode a frame body
pub fn decode_body(body: &[u8], radio_address: Option<RadioAddress>) -> Result<PeerRecord> {
    let mut offset = 0;

    let version = take_u8(body, &mut offset, "version tag")?;
    if version != WIRE_VERSION {
        return Err(NearbyError::malformed_frame(format!(
            "unrecognized version tag {version}"
        )));
    }
    let flags = take_u8(body, &mut offset, "flags")?;

    let address_len = take_u16(body, &mut offset, "payment address length")? as usize;
    let address = take_str(body, &mut offset, address_len, "payment address")?;
    if address.is_empty() {
        return Err(NearbyError::malformed_frame("missing payment address"));
    }

    let name_len = take_u16(body, &mut offset, "display name length")? as usize;
    let name = take_str(body, &mut offset, name_len, "display name")?;

    let photo = if flags & FLAG_PHOTO != 0 {
        let photo_len = take_u32(body, &mut offset, "photo length")? as usize;
        Some(take_bytes(body, &mut offset, photo_len, "photo")?.to_vec())
    } else {
        None
    };

    if offset != body.len() {
        return Err(NearbyError::malformed_frame("frame has trailing data"));
    }

    Ok(PeerRecord::inbound(radio_address, address, name, photo))
}

fn take_bytes<'a>(
    body: &'a [u8],
    offset: &mut usize,
    len: usize,
    field: &str,
) -> Result<&'a [u8]> {
    let end = offset
        .checked_add(len)
        .filter(|end| *end <= body.len())
        .ok_or_else(|| NearbyError::malformed_frame(format!("frame too short for {field}")))?;
    let bytes = &body[*offset..end];
    *offset = end;
    Ok(bytes)
}

fn take_u8(body: &[u8], offset: &mut usize, field: &str) -> Result<u8> {
    Ok(take_bytes(body, offset, 1, field)?[0])
}

fn take_u16(body: &[u8], offset: &mut usize, field: &str) -> Result<u16> {
    let bytes = take_bytes(body, offset, 2, field)?;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn take_u32(body: &[u8], offset: &mut usize, field: &str) -> Result<u32> {
    let bytes = take_bytes(body, offset, 4, field)?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn take_str(body: &[u8], offset: &mut usize, len: usize, field: &str) -> Result<String> {
    let bytes = take_bytes(body, offset, len, field)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| NearbyError::malformed_frame(format!("{field} is not valid UTF-8")))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
