use crate::commands::CommandCode;
use biogate_core::constants::*;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// XOR of every byte in `data`.
///
/// XOR is order-insensitive, so the checksum cannot detect transposed bytes.
/// Terminals in the field compute exactly this value; it must not be replaced
/// by a stronger check.
///
/// # Examples
///
/// ```
/// use biogate_protocol::checksum;
///
/// assert_eq!(checksum(&[]), 0);
/// assert_eq!(checksum(&[0x0F, 0xF0]), 0xFF);
/// assert_eq!(checksum(&[1, 2, 3]), checksum(&[3, 1, 2]));
/// ```
#[inline]
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, b| acc ^ b)
}

/// Encode one frame.
///
/// Layout: `0x55 0xAA` + command (u32 LE) + comm key (u32 LE) + payload
/// + XOR checksum of (command ‖ comm key ‖ payload) + `0x00 0x00`.
///
/// # Examples
///
/// ```
/// use biogate_protocol::encode;
///
/// let frame = encode(0x0014_0000, &[1, 3], 0);
/// assert_eq!(
///     frame.as_ref(),
///     &[0x55, 0xAA, 0x00, 0x00, 0x14, 0x00, 0, 0, 0, 0, 1, 3, 0x16, 0x00, 0x00]
/// );
/// ```
pub fn encode(command: u32, payload: &[u8], comm_key: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(payload.len() + FRAME_OVERHEAD);
    buf.put_slice(&START_MARKER);
    buf.put_u32_le(command);
    buf.put_u32_le(comm_key);
    buf.put_slice(payload);

    let sum = checksum(&buf[COMMAND_OFFSET..]);
    buf.put_u8(sum);
    buf.put_slice(&END_MARKER);

    buf.freeze()
}

/// Decode one frame occupying the whole of `buffer`.
///
/// Returns `None` when the buffer is shorter than [`MIN_DECODE_LENGTH`] or
/// does not begin with the start marker. A frame whose checksum does not
/// match is still returned, with `success == false`; callers decide what a
/// corrupted response means to them.
///
/// The end marker is not validated: the payload is everything between the
/// communication key and the last three bytes.
///
/// # Examples
///
/// ```
/// use biogate_protocol::{decode, encode};
///
/// let frame = encode(0x0D, &[7, 7, 7], 42);
/// let response = decode(&frame).unwrap();
/// assert_eq!(response.command, 0x0D);
/// assert_eq!(response.comm_key, 42);
/// assert_eq!(response.data.as_ref(), &[7, 7, 7]);
/// assert!(response.success);
///
/// assert!(decode(&[0x55, 0xAA, 0, 0]).is_none());
/// ```
pub fn decode(buffer: &[u8]) -> Option<Response> {
    if buffer.len() < MIN_DECODE_LENGTH || buffer[..2] != START_MARKER {
        return None;
    }

    let command = read_u32_le(buffer, COMMAND_OFFSET);
    let comm_key = read_u32_le(buffer, COMM_KEY_OFFSET);

    let checksum_at = buffer.len() - TRAILER_LENGTH;
    let data = if checksum_at > PAYLOAD_OFFSET {
        Bytes::copy_from_slice(&buffer[PAYLOAD_OFFSET..checksum_at])
    } else {
        Bytes::new()
    };

    let success = checksum(&buffer[COMMAND_OFFSET..checksum_at]) == buffer[checksum_at];

    Some(Response {
        command,
        comm_key,
        data,
        success,
    })
}

/// Command code of the frame starting at the front of `buffer`.
///
/// Returns `None` until the start marker and all four command bytes are
/// present.
pub fn peek_command(buffer: &[u8]) -> Option<u32> {
    if buffer.len() < COMM_KEY_OFFSET || !buffer.starts_with(&START_MARKER) {
        return None;
    }
    Some(read_u32_le(buffer, COMMAND_OFFSET))
}

/// Length of the first checksum-valid frame at the front of `buffer`.
///
/// Frames carry no length field, so every end-marker position is tried,
/// shortest first. Bytes after the returned length belong to whatever
/// follows the frame.
///
/// # Examples
///
/// ```
/// use biogate_protocol::{encode, leading_frame_len};
///
/// let mut stream = encode(0x1000_0001, &[], 0).to_vec();
/// stream.extend_from_slice(&encode(0x0014_0000, &[1, 3], 0));
/// assert_eq!(leading_frame_len(&stream), Some(13));
/// assert_eq!(leading_frame_len(&stream[13..]), Some(15));
/// assert_eq!(leading_frame_len(&stream[..12]), None);
/// ```
pub fn leading_frame_len(buffer: &[u8]) -> Option<usize> {
    if !buffer.starts_with(&START_MARKER) {
        return None;
    }

    (FRAME_OVERHEAD..=buffer.len())
        .filter(|&len| buffer[..len].ends_with(&END_MARKER))
        .find(|&len| decode(&buffer[..len]).is_some_and(|frame| frame.success))
}

fn read_u32_le(buffer: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&buffer[offset..offset + 4]);
    u32::from_le_bytes(word)
}

/// A decoded frame received from the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Raw command code, echoed from the request
    pub command: u32,

    /// Communication key carried by the frame
    pub comm_key: u32,

    /// Payload bytes
    pub data: Bytes,

    /// Whether the received checksum matched the recomputed one
    pub success: bool,
}

impl Response {
    /// The command as a known [`CommandCode`], if it is one.
    pub fn command_code(&self) -> Option<CommandCode> {
        CommandCode::try_from(self.command).ok()
    }

    /// True if this frame answers `command` and passed checksum validation.
    ///
    /// Corrupted frames never match; they are dropped rather than retried.
    pub fn answers(&self, command: CommandCode) -> bool {
        self.success && self.command == command.code()
    }
}

/// An outbound command frame.
///
/// # Examples
///
/// ```
/// use biogate_protocol::{CommandCode, Request};
///
/// let request = Request::new(CommandCode::RelayControl, 0).payload(vec![1, 3]);
/// let bytes = request.encode();
/// assert_eq!(bytes.len(), 15);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub command: CommandCode,
    pub comm_key: u32,
    pub payload: Vec<u8>,
}

impl Request {
    /// Create a request with an empty payload.
    pub fn new(command: CommandCode, comm_key: u32) -> Self {
        Self {
            command,
            comm_key,
            payload: Vec::new(),
        }
    }

    /// Attach a payload.
    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    /// Wire bytes for this request.
    pub fn encode(&self) -> Bytes {
        encode(self.command.code(), &self.payload, self.comm_key)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} byte payload]", self.command, self.payload.len())
    }
}
