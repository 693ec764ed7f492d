use biogate_core::constants::SCAN_RECORD_LENGTH;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One fingerprint presentation read from the terminal's attendance log.
///
/// Wire layout (8 bytes, little-endian):
///
/// ```text
/// | timestamp u32 (unix s) | user id u16 | status u8 | verify mode u8 |
/// ```
///
/// Records are transient: the poller hands them to the scan processor and
/// drops them. Timestamps have one-second resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanLogRecord {
    pub timestamp: DateTime<Utc>,
    pub device_user_id: u16,
    /// 0 = check-in, 1 = check-out (if the terminal supports it)
    pub status: u8,
    /// 0 = fingerprint; other values are vendor specific
    pub verify_mode: u8,
}

impl ScanLogRecord {
    /// Parse one record from exactly [`SCAN_RECORD_LENGTH`] bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use biogate_protocol::ScanLogRecord;
    ///
    /// let bytes = [0x00, 0xE1, 0xF5, 0x65, 0x29, 0x00, 0x00, 0x00];
    /// let record = ScanLogRecord::parse(&bytes);
    /// assert_eq!(record.device_user_id, 41);
    /// assert_eq!(record.timestamp.timestamp(), 0x65F5_E100);
    /// ```
    pub fn parse(bytes: &[u8; SCAN_RECORD_LENGTH]) -> Self {
        let secs = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        Self {
            timestamp: DateTime::from_timestamp(i64::from(secs), 0)
                .unwrap_or(DateTime::UNIX_EPOCH),
            device_user_id: u16::from_le_bytes([bytes[4], bytes[5]]),
            status: bytes[6],
            verify_mode: bytes[7],
        }
    }

    /// Wire bytes for this record. Timestamps outside the `u32` range saturate.
    pub fn to_bytes(&self) -> [u8; SCAN_RECORD_LENGTH] {
        let secs = u32::try_from(self.timestamp.timestamp().max(0)).unwrap_or(u32::MAX);
        let mut out = [0u8; SCAN_RECORD_LENGTH];
        out[..4].copy_from_slice(&secs.to_le_bytes());
        out[4..6].copy_from_slice(&self.device_user_id.to_le_bytes());
        out[6] = self.status;
        out[7] = self.verify_mode;
        out
    }

    /// Device user id as the text stored in a member's biometric id.
    pub fn user_id(&self) -> String {
        self.device_user_id.to_string()
    }
}

impl fmt::Display for ScanLogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "user {} at {} (status {}, mode {})",
            self.device_user_id,
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.status,
            self.verify_mode
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fields() {
        let bytes = [0x10, 0x00, 0x00, 0x00, 0x34, 0x12, 0x01, 0x02];
        let record = ScanLogRecord::parse(&bytes);

        assert_eq!(record.timestamp.timestamp(), 16);
        assert_eq!(record.device_user_id, 0x1234);
        assert_eq!(record.status, 1);
        assert_eq!(record.verify_mode, 2);
        assert_eq!(record.user_id(), "4660");
    }

    #[test]
    fn test_to_bytes_matches_parse() {
        let bytes = [0x80, 0x51, 0x01, 0x66, 0x29, 0x00, 0x00, 0x00];
        assert_eq!(ScanLogRecord::parse(&bytes).to_bytes(), bytes);
    }

    #[test]
    fn test_max_timestamp() {
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0];
        let record = ScanLogRecord::parse(&bytes);
        assert_eq!(record.timestamp.timestamp(), i64::from(u32::MAX));
    }
}
