//! Door relay control.

use crate::error::LinkError;
use crate::link::{DeviceLink, Exchange, millis};
use biogate_core::{
    DeviceSettings,
    constants::{DEFAULT_RELAY_NUMBER, END_MARKER, FRAME_OVERHEAD, START_MARKER},
};
use biogate_protocol::{CommandCode, Request, decode, leading_frame_len, peek_command};
use bytes::{Buf, BytesMut};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Pulses the terminal's door relay over the shared [`DeviceLink`].
#[derive(Clone)]
pub struct RelayController {
    link: Arc<DeviceLink>,
}

impl RelayController {
    pub fn new(link: Arc<DeviceLink>) -> Self {
        Self { link }
    }

    /// Energize relay 1 for `seconds`.
    ///
    /// Waits for the terminal's `RELAY_CONTROL` response and returns whether
    /// its checksum was valid. Returns `false` on timeout or without a
    /// connection.
    pub async fn unlock(&self, settings: &DeviceSettings, seconds: u8) -> bool {
        let request = Request::new(CommandCode::RelayControl, settings.comm_key)
            .payload(vec![DEFAULT_RELAY_NUMBER, seconds]);
        let mut acknowledged = false;

        let outcome = self
            .link
            .exchange(&request, self.link.config().relay_ack_timeout, |buffer| {
                Ok(match take_relay_response(buffer) {
                    Some(valid) => {
                        acknowledged = valid;
                        true
                    }
                    None => false,
                })
            })
            .await;

        match outcome {
            Ok(Exchange::Completed) if acknowledged => {
                info!(device = %settings, seconds, "Relay pulsed");
                true
            }
            Ok(Exchange::Completed) => {
                warn!(device = %settings, "Relay response failed checksum validation");
                false
            }
            Ok(Exchange::TimedOut) => {
                warn!(
                    device = %settings,
                    timeout_ms = millis(self.link.config().relay_ack_timeout),
                    "No relay acknowledgment"
                );
                false
            }
            Err(LinkError::NotConnected) => {
                warn!(device = %settings, "Relay unlock skipped, not connected");
                false
            }
            Err(e) => {
                warn!(device = %settings, error = %e, "Relay unlock failed");
                false
            }
        }
    }
}

/// Look for the `RELAY_CONTROL` response in `buffer`.
///
/// Returns the response's checksum flag once a frame echoing the command is
/// complete. Leading noise and frames for other commands (a late CONNECT
/// reply, typically) are consumed frame by frame, so a response sharing a
/// read with them is still found.
fn take_relay_response(buffer: &mut BytesMut) -> Option<bool> {
    let relay = CommandCode::RelayControl.code();

    loop {
        match find_marker(buffer) {
            Some(0) => {}
            Some(offset) => buffer.advance(offset),
            None => {
                // Keep a trailing 0x55 that may start the next frame.
                let keep = usize::from(buffer.last() == Some(&START_MARKER[0]));
                buffer.advance(buffer.len() - keep);
                return None;
            }
        }

        let command = peek_command(buffer)?;

        if command == relay {
            if let Some(len) = leading_frame_len(buffer) {
                buffer.advance(len);
                return Some(true);
            }
            if buffer.len() >= FRAME_OVERHEAD && buffer.ends_with(&END_MARKER) {
                let valid = decode(buffer).is_some_and(|response| response.success);
                buffer.clear();
                return Some(valid);
            }
            return None;
        }

        if let Some(len) = leading_frame_len(buffer) {
            debug!(
                command = format_args!("{command:#010x}"),
                "Ignoring unrelated frame while waiting for relay"
            );
            buffer.advance(len);
            continue;
        }

        // Incomplete or corrupted stray frame: jump to a relay frame behind
        // it if one has arrived, otherwise wait.
        let next = (1..buffer.len())
            .filter(|&at| buffer[at..].starts_with(&START_MARKER))
            .find(|&at| peek_command(&buffer[at..]) == Some(relay))?;
        buffer.advance(next);
    }
}

fn find_marker(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(START_MARKER.len())
        .position(|w| w == START_MARKER)
}
