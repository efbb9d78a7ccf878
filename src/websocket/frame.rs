use crate::error::{S9Result, S9WebSocketError};
use super::transport::Transport;

// ============================================================================
// Frame codec
// ============================================================================

pub const OPCODE_TEXT: u8 = 0x1;
pub const OPCODE_BINARY: u8 = 0x2;
pub const OPCODE_PING: u8 = 0x9;

const FIN_BIT: u8 = 0x80;
const MASK_BIT: u8 = 0x80;
const OPCODE_MASK: u8 = 0x0F;
const LENGTH_MASK: u8 = 0x7F;
const LENGTH_16: u8 = 126;
const LENGTH_64: u8 = 127;

/// One decoded WebSocket frame. The payload is already unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: u8,
    pub masked: bool,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Payload as text. Invalid UTF-8 is replaced rather than rejected.
    pub fn into_text(self) -> String {
        match String::from_utf8(self.payload) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }
}

/// XORs `payload` in place with `key`, cycling through the key bytes.
#[inline]
pub fn apply_mask(payload: &mut [u8], key: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

/// Encodes a masked, final text frame with a random mask key.
pub fn encode_text_frame(message: &str) -> Vec<u8> {
    encode_frame(OPCODE_TEXT, message.as_bytes(), rand::random())
}

/// Encodes a masked, final frame.
///
/// Payloads of 126 bytes or more use the 16-bit or 64-bit extended length.
pub fn encode_frame(opcode: u8, payload: &[u8], mask_key: [u8; 4]) -> Vec<u8> {
    let len = payload.len();
    let mut frame = Vec::with_capacity(len + 14);
    frame.push(FIN_BIT | (opcode & OPCODE_MASK));

    if len < LENGTH_16 as usize {
        frame.push(MASK_BIT | len as u8);
    } else if len <= u16::MAX as usize {
        frame.push(MASK_BIT | LENGTH_16);
        frame.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        frame.push(MASK_BIT | LENGTH_64);
        frame.extend_from_slice(&(len as u64).to_be_bytes());
    }

    frame.extend_from_slice(&mask_key);
    let start = frame.len();
    frame.extend_from_slice(payload);
    apply_mask(&mut frame[start..], mask_key);
    frame
}

/// Reads one frame with a sequence of exact reads: header, extended length, mask key, payload.
///
/// A declared payload length above `max_frame_size` fails with `FrameIo` before anything
/// is allocated for it.
pub fn read_frame<T: Transport + ?Sized>(transport: &mut T, max_frame_size: usize) -> S9Result<Frame> {
    let mut header = [0u8; 2];
    transport.receive_exact(&mut header)?;

    let fin = header[0] & FIN_BIT != 0;
    let opcode = header[0] & OPCODE_MASK;
    let masked = header[1] & MASK_BIT != 0;

    let len = match header[1] & LENGTH_MASK {
        LENGTH_16 => {
            let mut ext = [0u8; 2];
            transport.receive_exact(&mut ext)?;
            u16::from_be_bytes(ext) as u64
        },
        LENGTH_64 => {
            let mut ext = [0u8; 8];
            transport.receive_exact(&mut ext)?;
            u64::from_be_bytes(ext)
        },
        len => len as u64,
    };

    let mut mask_key = [0u8; 4];
    if masked {
        transport.receive_exact(&mut mask_key)?;
    }

    let len = match usize::try_from(len) {
        Ok(len) if len <= max_frame_size => len,
        _ => {
            return Err(S9WebSocketError::FrameIo(
                format!("Frame payload of {} bytes exceeds limit of {} bytes", len, max_frame_size)
            ));
        }
    };

    let mut payload = vec![0u8; len];
    transport.receive_exact(&mut payload)?;

    if masked {
        apply_mask(&mut payload, mask_key);
    }

    Ok(Frame { fin, opcode, masked, payload })
}
