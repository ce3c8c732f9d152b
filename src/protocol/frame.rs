//! WebSocket frame codec (RFC 6455 Section 5).
//!
//! Server frames are always written unmasked with FIN=1. Client frames are
//! decoded one at a time; control frames are answered or skipped inside the
//! decode loop and never reach the caller.
//!
//! # Frame Format
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! +-+-+-+-+-------+-+-------------+ - - - - - - - - - - - - - - - +
//! |     Extended payload length continued, if payload len == 127  |
//! + - - - - - - - - - - - - - - - +-------------------------------+
//! |                               |Masking-key, if MASK set to 1  |
//! +-------------------------------+-------------------------------+
//! | Masking-key (continued)       |          Payload Data         |
//! +-------------------------------- - - - - - - - - - - - - - - - +
//! ```
//!
//! # Limitations
//!
//! Every logical message must fit in one frame. Continuation frames and data
//! frames with FIN=0 are rejected as protocol errors.

// ============================================================================
// Imports
// ============================================================================

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::trace;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Largest payload a control frame may carry.
pub const MAX_CONTROL_PAYLOAD: u64 = 125;

/// Default upper bound for inbound payloads (16 MiB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u64 = 16 * 1024 * 1024;

const FIN_BIT: u8 = 0x80;
const RSV_BITS: u8 = 0x70;
const MASK_BIT: u8 = 0x80;

// ============================================================================
// Opcode
// ============================================================================

/// WebSocket frame opcode (4 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Continuation of a fragmented message (unsupported).
    Continuation = 0x0,
    /// UTF-8 text data.
    Text = 0x1,
    /// Binary data.
    Binary = 0x2,
    /// Connection close.
    Close = 0x8,
    /// Ping.
    Ping = 0x9,
    /// Pong.
    Pong = 0xA,
}

impl Opcode {
    /// Returns `true` for Close, Ping and Pong.
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        matches!(self, Self::Close | Self::Ping | Self::Pong)
    }

    /// Parses the low nibble of the first header byte.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] for reserved opcodes.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0x0 => Ok(Self::Continuation),
            0x1 => Ok(Self::Text),
            0x2 => Ok(Self::Binary),
            0x8 => Ok(Self::Close),
            0x9 => Ok(Self::Ping),
            0xA => Ok(Self::Pong),
            other => Err(Error::protocol(format!("reserved opcode 0x{other:X}"))),
        }
    }
}

// ============================================================================
// FrameHeader
// ============================================================================

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Final fragment flag.
    pub fin: bool,
    /// Frame type.
    pub opcode: Opcode,
    /// Masking key, present on every conforming client frame.
    pub mask_key: Option<[u8; 4]>,
    /// Payload length, always read as unsigned.
    pub payload_len: u64,
}

// ============================================================================
// Encoding
// ============================================================================

/// XORs `payload` in place with the 4-byte mask.
///
/// Applying the same mask twice restores the original bytes.
pub fn apply_mask(payload: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// Encodes one unmasked server frame with FIN=1.
#[must_use]
pub fn encode_frame(opcode: Opcode, payload: &[u8]) -> Vec<u8> {
    encode(opcode, payload, None)
}

/// Encodes one text frame as the server sends it.
#[must_use]
pub fn encode_text(text: &str) -> Vec<u8> {
    encode(Opcode::Text, text.as_bytes(), None)
}

/// Encodes one masked frame as a client would send it.
///
/// The server never masks its own frames; this exists for client-side
/// peers, tests and benchmarks.
#[must_use]
pub fn encode_masked_frame(opcode: Opcode, payload: &[u8], mask: [u8; 4]) -> Vec<u8> {
    encode(opcode, payload, Some(mask))
}

fn encode(opcode: Opcode, payload: &[u8], mask: Option<[u8; 4]>) -> Vec<u8> {
    let len = payload.len();
    let extended = if len > 65_535 {
        8
    } else if len > 125 {
        2
    } else {
        0
    };
    let mask_len = if mask.is_some() { 4 } else { 0 };

    let mut out = Vec::with_capacity(2 + extended + mask_len + len);
    out.push(FIN_BIT | opcode as u8);

    let mask_bit = if mask.is_some() { MASK_BIT } else { 0 };
    if len <= 125 {
        out.push(mask_bit | len as u8);
    } else if len <= 65_535 {
        out.push(mask_bit | 126);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(mask_bit | 127);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }

    match mask {
        Some(key) => {
            out.extend_from_slice(&key);
            let start = out.len();
            out.extend_from_slice(payload);
            apply_mask(&mut out[start..], key);
        }
        None => out.extend_from_slice(payload),
    }

    out
}

/// Encodes and writes one server frame, then flushes.
///
/// Callers sharing a writer must hold its lock for the whole call so frames
/// never interleave.
pub async fn write_frame<W>(writer: &mut W, opcode: Opcode, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let bytes = encode_frame(opcode, payload);
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

// ============================================================================
// FrameDecoder
// ============================================================================

/// Reads client frames and yields complete text messages.
#[derive(Debug, Clone, Copy)]
pub struct FrameDecoder {
    max_payload_size: u64,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD_SIZE)
    }
}

impl FrameDecoder {
    /// Creates a decoder rejecting payloads above `max_payload_size` bytes.
    #[inline]
    #[must_use]
    pub const fn new(max_payload_size: u64) -> Self {
        Self { max_payload_size }
    }

    /// Returns the configured payload limit.
    #[inline]
    #[must_use]
    pub const fn max_payload_size(&self) -> u64 {
        self.max_payload_size
    }

    /// Reads frames until a data message arrives.
    ///
    /// Pings are answered with a pong through `pong_writer` (taking its lock
    /// for the duration of the write) and pongs are discarded; neither is
    /// returned. Control frames are handled in a loop, so a ping flood
    /// cannot grow the stack.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(text))` for a text or binary frame
    /// - `Ok(None)` on a close frame or when the stream ends between frames
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the stream ends mid-frame
    /// - [`Error::Protocol`] for unmasked, fragmented or malformed frames
    /// - [`Error::PayloadTooLarge`] if the announced length exceeds the limit
    pub async fn next_message<R, W>(
        &self,
        reader: &mut R,
        pong_writer: &Mutex<W>,
    ) -> Result<Option<String>>
    where
        R: AsyncRead + Unpin + ?Sized,
        W: AsyncWrite + Unpin + ?Sized,
    {
        loop {
            let Some(header) = self.read_header(reader).await? else {
                return Ok(None);
            };

            match header.opcode {
                Opcode::Close => {
                    trace!("Close frame received");
                    return Ok(None);
                }

                Opcode::Ping => {
                    let payload = read_payload(reader, &header).await?;
                    trace!(len = payload.len(), "Ping received");
                    let mut writer = pong_writer.lock().await;
                    write_frame(&mut *writer, Opcode::Pong, &payload).await?;
                }

                Opcode::Pong => {
                    let _ = read_payload(reader, &header).await?;
                    trace!("Pong discarded");
                }

                Opcode::Continuation => {
                    return Err(Error::protocol("continuation frames are not supported"));
                }

                Opcode::Text | Opcode::Binary => {
                    if !header.fin {
                        return Err(Error::protocol("fragmented messages are not supported"));
                    }
                    if header.mask_key.is_none() {
                        return Err(Error::protocol("client frame must be masked"));
                    }

                    let payload = read_payload(reader, &header).await?;
                    let text = if header.opcode == Opcode::Text {
                        String::from_utf8(payload)
                            .map_err(|_| Error::protocol("invalid UTF-8 in text frame"))?
                    } else {
                        String::from_utf8_lossy(&payload).into_owned()
                    };

                    return Ok(Some(text));
                }
            }
        }
    }

    /// Reads one header; `Ok(None)` if the stream ended on a frame boundary.
    async fn read_header<R>(&self, reader: &mut R) -> Result<Option<FrameHeader>>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut first = [0u8; 1];
        if reader.read(&mut first).await? == 0 {
            return Ok(None);
        }
        let first = first[0];
        let second = reader.read_u8().await.map_err(Error::from_read)?;

        if first & RSV_BITS != 0 {
            return Err(Error::protocol("reserved bits set without extension"));
        }

        let fin = first & FIN_BIT != 0;
        let opcode = Opcode::from_u8(first & 0x0F)?;
        let masked = second & MASK_BIT != 0;

        let payload_len = match second & 0x7F {
            126 => u64::from(reader.read_u16().await.map_err(Error::from_read)?),
            127 => reader.read_u64().await.map_err(Error::from_read)?,
            short => u64::from(short),
        };

        if opcode.is_control() {
            if !fin {
                return Err(Error::protocol("control frame cannot be fragmented"));
            }
            if payload_len > MAX_CONTROL_PAYLOAD {
                return Err(Error::protocol(format!(
                    "control frame payload too large: {payload_len} bytes"
                )));
            }
        }

        if payload_len > self.max_payload_size {
            return Err(Error::payload_too_large(payload_len, self.max_payload_size));
        }

        let mask_key = if masked {
            let mut key = [0u8; 4];
            reader
                .read_exact(&mut key)
                .await
                .map_err(Error::from_read)?;
            Some(key)
        } else {
            None
        };

        Ok(Some(FrameHeader {
            fin,
            opcode,
            mask_key,
            payload_len,
        }))
    }
}

/// Reads and unmasks the payload described by `header`.
async fn read_payload<R>(reader: &mut R, header: &FrameHeader) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let len = usize::try_from(header.payload_len)
        .map_err(|_| Error::payload_too_large(header.payload_len, usize::MAX as u64))?;

    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(Error::from_read)?;

    if let Some(key) = header.mask_key {
        apply_mask(&mut payload, key);
    }

    Ok(payload)
}

// ============================================================================
// Tests
// ============================================================================
