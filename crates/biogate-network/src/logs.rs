use crate::error::LinkError;
use crate::link::{DeviceLink, Exchange};
use biogate_core::DeviceSettings;
use biogate_protocol::{CommandCode, LogItem, Request, ScanLogCodec, ScanLogRecord};
use tokio_util::codec::Decoder;
use tracing::{debug, trace, warn};

impl DeviceLink {
    /// Download the terminal's attendance log.
    ///
    /// Records are decoded as they stream in until the terminal's response
    /// frame arrives. If the fetch deadline passes first, the records decoded
    /// so far are returned. Without a connection, or when the session fails
    /// mid-download, the result is empty.
    ///
    /// The terminal returns its whole log on every call; filtering out
    /// records that were already handled is the caller's job.
    pub async fn fetch_scan_logs(&self, settings: &DeviceSettings) -> Vec<ScanLogRecord> {
        let request = Request::new(CommandCode::GetAttendanceLog, settings.comm_key);
        let mut codec = ScanLogCodec::new(CommandCode::GetAttendanceLog);
        let mut records = Vec::new();

        let outcome = self
            .exchange(&request, self.config().log_fetch_timeout, |buffer| {
                while let Some(item) = codec.decode(buffer)? {
                    match item {
                        LogItem::Record(record) => records.push(record),
                        LogItem::End(_) => return Ok(true),
                    }
                }
                Ok(false)
            })
            .await;

        match outcome {
            Ok(Exchange::Completed) => {
                debug!(device = %settings, count = records.len(), "Attendance log downloaded");
                records
            }
            Ok(Exchange::TimedOut) => {
                debug!(
                    device = %settings,
                    count = records.len(),
                    "No end of log before deadline, keeping partial download"
                );
                records
            }
            Err(LinkError::NotConnected) => {
                trace!("Skipping attendance log fetch, not connected");
                Vec::new()
            }
            Err(e) => {
                warn!(
                    device = %settings,
                    error = %e,
                    discarded = records.len(),
                    "Attendance log download failed"
                );
                Vec::new()
            }
        }
    }
}
