//! Command code definitions for the terminal protocol.
//!
//! Command codes occupy bytes 2..6 of every frame as a little-endian `u32`.
//! The terminal echoes the command code of a request in its response, which
//! is how responses are matched to requests.
//!
//! # Commands
//!
//! - `Connect` (0x10000001): open a session, sent right after the TCP connect
//! - `GetUser` (0x00000005): enumerate enrolled users (response layout unknown)
//! - `GetAttendanceLog` (0x0000000D): download the scan log
//! - `RelayControl` (0x00140000): pulse a door relay
//!
//! # Examples
//!
//! ```
//! use biogate_protocol::CommandCode;
//!
//! let cmd = CommandCode::try_from(0x0000_000D).unwrap();
//! assert_eq!(cmd, CommandCode::GetAttendanceLog);
//! assert_eq!(cmd.code(), 0x0D);
//!
//! assert!(CommandCode::try_from(0xDEAD_BEEF).is_err());
//! ```

use biogate_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Commands understood by the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandCode {
    Connect,          // 0x10000001
    GetUser,          // 0x00000005
    GetAttendanceLog, // 0x0000000D
    RelayControl,     // 0x00140000
}

impl CommandCode {
    /// All known commands, in wire-code order.
    pub const ALL: [CommandCode; 4] = [
        CommandCode::GetUser,
        CommandCode::GetAttendanceLog,
        CommandCode::RelayControl,
        CommandCode::Connect,
    ];

    /// Numeric wire code.
    #[inline]
    pub const fn code(self) -> u32 {
        match self {
            CommandCode::Connect => 0x1000_0001,
            CommandCode::GetUser => 0x0000_0005,
            CommandCode::GetAttendanceLog => 0x0000_000D,
            CommandCode::RelayControl => 0x0014_0000,
        }
    }

    /// Human readable command name, used in log output.
    pub fn name(self) -> &'static str {
        match self {
            CommandCode::Connect => "CONNECT",
            CommandCode::GetUser => "GET_USER",
            CommandCode::GetAttendanceLog => "GET_ATTENDANCE_LOG",
            CommandCode::RelayControl => "RELAY_CONTROL",
        }
    }
}

impl TryFrom<u32> for CommandCode {
    type Error = Error;

    fn try_from(code: u32) -> Result<Self> {
        CommandCode::ALL
            .into_iter()
            .find(|cmd| cmd.code() == code)
            .ok_or(Error::UnknownCommand(code))
    }
}

impl From<CommandCode> for u32 {
    fn from(cmd: CommandCode) -> u32 {
        cmd.code()
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:#010x})", self.name(), self.code())
    }
}
