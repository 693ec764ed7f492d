//! Wire protocol for the fingerprint access terminal.
//!
//! Pure, I/O-free building blocks:
//!
//! - [`frame`]: frame encoding/decoding with the XOR checksum
//! - [`CommandCode`]: the vendor commands this system issues
//! - [`ScanLogRecord`]: the fixed 8-byte attendance-log record
//! - [`ScanLogCodec`]: incremental decoder for a log download stream

pub mod codec;
pub mod commands;
pub mod frame;
pub mod record;

pub use codec::{LogItem, ScanLogCodec};
pub use commands::CommandCode;
pub use frame::{Request, Response, checksum, decode, encode, leading_frame_len, peek_command};
pub use record::ScanLogRecord;
