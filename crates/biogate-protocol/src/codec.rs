//! Tokio codec for attendance-log downloads.
//!
//! After a `GET_ATTENDANCE_LOG` request the terminal streams raw 8-byte scan
//! records and then closes the exchange with an ordinary response frame that
//! echoes the command. TCP gives no message boundaries, so a single read may
//! hold half a record, several records, or records followed by the frame.
//!
//! [`ScanLogCodec`] implements [`Decoder`] over that stream. At the front of
//! the buffer it decides what comes next:
//!
//! ```text
//! 0x55 0xAA + command of the download   -> End(response) once checksum-valid
//! 0x55 0xAA + other known command       -> skipped as a stray frame
//! anything else, >= 8 bytes             -> Record(..)
//! ```
//!
//! A record can begin with `0x55 0xAA` (a timestamp whose low half is
//! `0xAA55`). Its next four bytes are the rest of the timestamp and the user
//! id, which equal a known command code only for timestamps in January 1970,
//! so such a record is still read as a record.
//!
//! The codec also implements [`Encoder<Request>`] so the same type can frame
//! outbound commands.

use crate::{
    commands::CommandCode,
    frame::{Request, Response, decode, leading_frame_len, peek_command},
    record::ScanLogRecord,
};
use biogate_core::{Error, Result, constants::*};
use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

/// Default maximum buffered bytes while waiting for a terminal frame (64 KB).
const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Item produced by [`ScanLogCodec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogItem {
    /// One decoded scan record.
    Record(ScanLogRecord),

    /// The response frame that terminates the download.
    End(Response),
}

/// Incremental decoder for one attendance-log download.
///
/// # Example
///
/// ```
/// use bytes::BytesMut;
/// use tokio_util::codec::Decoder;
/// use biogate_protocol::{CommandCode, LogItem, ScanLogCodec, encode};
///
/// let mut codec = ScanLogCodec::new(CommandCode::GetAttendanceLog);
/// let mut buffer = BytesMut::new();
/// buffer.extend_from_slice(&[0x10, 0, 0, 0, 41, 0, 0, 0]);
/// buffer.extend_from_slice(&encode(0x0D, &[], 0));
///
/// let first = codec.decode(&mut buffer).unwrap();
/// assert!(matches!(first, Some(LogItem::Record(r)) if r.device_user_id == 41));
///
/// let second = codec.decode(&mut buffer).unwrap();
/// assert!(matches!(second, Some(LogItem::End(_))));
/// assert!(codec.is_finished());
/// ```
#[derive(Debug)]
pub struct ScanLogCodec {
    /// Command whose response ends the download
    expected: CommandCode,

    /// Upper bound for a buffered, incomplete frame
    max_frame_size: usize,

    /// Set once the terminating frame has been seen
    finished: bool,
}

impl ScanLogCodec {
    /// Create a codec that stops at the response to `expected`.
    pub fn new(expected: CommandCode) -> Self {
        Self {
            expected,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            finished: false,
        }
    }

    /// Create a codec with a custom buffer limit.
    pub fn with_max_frame_size(expected: CommandCode, max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            ..Self::new(expected)
        }
    }

    /// Get the current maximum frame size.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Whether the terminating frame has been decoded.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn try_terminal_frame(&mut self, src: &mut BytesMut) -> Result<Option<LogItem>> {
        if let Some(len) = leading_frame_len(src) {
            let frame = src.split_to(len);
            if let Some(response) = decode(&frame)
                && response.answers(self.expected)
            {
                self.finished = true;
                return Ok(Some(LogItem::End(response)));
            }
        }

        self.check_pending(src)?;
        Ok(None)
    }

    fn check_pending(&self, src: &BytesMut) -> Result<()> {
        if src.len() > self.max_frame_size {
            return Err(Error::FrameTooLarge {
                size: src.len(),
                max_size: self.max_frame_size,
            });
        }
        Ok(())
    }
}

impl Decoder for ScanLogCodec {
    type Item = LogItem;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            if self.finished {
                return Ok(None);
            }

            if src.starts_with(&START_MARKER) {
                // Not enough bytes yet to tell a frame from a record.
                let Some(command) = peek_command(src) else {
                    return Ok(None);
                };

                if command == self.expected.code() {
                    return self.try_terminal_frame(src);
                }

                if CommandCode::try_from(command).is_ok() {
                    let Some(len) = leading_frame_len(src) else {
                        self.check_pending(src)?;
                        return Ok(None);
                    };
                    trace!(
                        command = format_args!("{command:#010x}"),
                        "Discarding unrelated frame during log download"
                    );
                    src.advance(len);
                    continue;
                }
            }

            if src.len() < SCAN_RECORD_LENGTH {
                return Ok(None);
            }

            let chunk = src.split_to(SCAN_RECORD_LENGTH);
            let mut bytes = [0u8; SCAN_RECORD_LENGTH];
            bytes.copy_from_slice(&chunk);
            return Ok(Some(LogItem::Record(ScanLogRecord::parse(&bytes))));
        }
    }
}

impl Encoder<Request> for ScanLogCodec {
    type Error = Error;

    fn encode(&mut self, item: Request, dst: &mut BytesMut) -> Result<()> {
        let framed = item.encode();
        if framed.len() > self.max_frame_size {
            return Err(Error::FrameTooLarge {
                size: framed.len(),
                max_size: self.max_frame_size,
            });
        }
        dst.extend_from_slice(&framed);
        Ok(())
    }
}
