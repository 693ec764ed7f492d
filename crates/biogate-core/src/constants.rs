//! Core constants for the terminal protocol and the polling agent.
//!
//! This module centralizes every wire-level constant and timing default used
//! by the biogate crates, so that the codec, the device link and the agent
//! agree on one set of values.
//!
//! # Frame Structure
//!
//! The fingerprint terminal speaks a small binary protocol. Every frame has
//! the following layout (multi-byte fields little-endian):
//!
//! ```text
//! 0x55 0xAA | command (4B) | comm key (4B) | payload (N) | xor (1B) | 0x00 0x00
//! ^^^^^^^^^                                                          ^^^^^^^^^
//! start marker                                                       end marker
//! ```
//!
//! # Usage
//!
//! ```
//! use biogate_core::constants::*;
//! use std::time::Duration;
//!
//! assert_eq!(START_MARKER, [0x55, 0xAA]);
//! assert_eq!(FRAME_OVERHEAD, 13);
//!
//! let timeout = Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS);
//! assert_eq!(timeout.as_secs(), 3);
//! ```

// ============================================================================
// Frame Layout
// ============================================================================

/// Start marker opening every frame.
pub const START_MARKER: [u8; 2] = [0x55, 0xAA];

/// End marker closing every frame.
pub const END_MARKER: [u8; 2] = [0x00, 0x00];

/// Offset of the little-endian command code.
pub const COMMAND_OFFSET: usize = 2;

/// Offset of the little-endian communication key.
pub const COMM_KEY_OFFSET: usize = 6;

/// Offset of the first payload byte.
pub const PAYLOAD_OFFSET: usize = 10;

/// Bytes following the payload: checksum (1) + end marker (2).
pub const TRAILER_LENGTH: usize = 3;

/// Total bytes a frame adds around its payload.
///
/// Start marker (2) + command (4) + comm key (4) + checksum (1) + end marker (2).
///
/// # Examples
///
/// ```
/// use biogate_core::constants::FRAME_OVERHEAD;
///
/// let payload = [1u8, 3];
/// assert_eq!(payload.len() + FRAME_OVERHEAD, 15);
/// ```
pub const FRAME_OVERHEAD: usize = 13;

/// Shortest buffer the decoder inspects.
///
/// A well-formed frame with an empty payload is [`FRAME_OVERHEAD`] bytes long.
/// Twelve-byte buffers are still decoded; their payload is empty and the
/// checksum byte overlaps the communication key, so they normally fail
/// checksum validation.
pub const MIN_DECODE_LENGTH: usize = 12;

// ============================================================================
// Scan Log Records
// ============================================================================

/// Size of one attendance-log record on the wire.
///
/// Layout: timestamp (u32 LE, unix seconds) + device user id (u16 LE)
/// + status (u8) + verify mode (u8).
pub const SCAN_RECORD_LENGTH: usize = 8;

// ============================================================================
// Relay
// ============================================================================

/// Relay addressed by unlock commands.
pub const DEFAULT_RELAY_NUMBER: u8 = 1;

/// Pulse length used by manual diagnostics (seconds).
pub const DEFAULT_PULSE_SECONDS: u8 = 1;

// ============================================================================
// Timeout Configuration
// ============================================================================

/// Time allowed for the TCP connection to come up (milliseconds).
///
/// # Value: 3000ms (3 seconds)
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3000;

/// Socket idle timeout (milliseconds).
///
/// A connection that neither receives nor sends for this long is torn down.
///
/// # Value: 5000ms (5 seconds)
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 5000;

/// Time allowed for an attendance-log download to finish (milliseconds).
pub const DEFAULT_LOG_FETCH_TIMEOUT_MS: u64 = 5000;

/// Time allowed for the terminal to acknowledge a relay command (milliseconds).
pub const DEFAULT_RELAY_ACK_TIMEOUT_MS: u64 = 2000;

/// Interval between two poll cycles (milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

// ============================================================================
// Device Settings
// ============================================================================

/// TCP port the terminal listens on unless configured otherwise.
pub const DEFAULT_DEVICE_PORT: u16 = 4370;

/// Communication key used when none is configured.
pub const DEFAULT_COMM_KEY: u32 = 0;

/// Door unlock duration in seconds when none is configured.
pub const DEFAULT_UNLOCK_SECONDS: u8 = 3;

/// Relay wiring when none is configured (normally open).
pub const DEFAULT_RELAY_TYPE: &str = "NO";

/// Settings key holding the terminal address.
pub const SETTING_IP: &str = "biometricIp";

/// Settings key holding the terminal TCP port.
pub const SETTING_PORT: &str = "biometricPort";

/// Settings key holding the communication key.
pub const SETTING_COMM_KEY: &str = "biometricCommKey";

/// Settings key holding the unlock duration.
pub const SETTING_UNLOCK_SECONDS: &str = "biometricUnlockSeconds";

/// Settings key holding the relay wiring.
pub const SETTING_RELAY_TYPE: &str = "biometricRelayType";

// ============================================================================
// Attendance
// ============================================================================

/// `marked_via` value written for terminal check-ins.
pub const MARKED_VIA_BIOMETRIC: &str = "biometric";

/// `marked_via` value used when a record does not say how it was taken.
pub const MARKED_VIA_MANUAL: &str = "manual";
