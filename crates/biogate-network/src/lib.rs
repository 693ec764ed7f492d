//! Network layer for the fingerprint terminal.
//!
//! The terminal is a TCP server speaking the frame protocol from
//! `biogate-protocol`. This crate owns the one connection to it and the two
//! exchanges run over that connection:
//!
//! - **DeviceLink**: connect/teardown lifecycle, serialized request/response
//! - **fetch_scan_logs**: attendance-log download ([`DeviceLink::fetch_scan_logs`])
//! - **RelayController**: door relay pulse with acknowledgment
//!
//! Failures never surface as errors here: connect resolves `false`, a fetch
//! resolves to an empty (or partial) list, an unlock resolves `false`.
//!
//! # Example
//!
//! ```no_run
//! use biogate_core::DeviceSettings;
//! use biogate_network::{DeviceLink, LinkConfig, RelayController};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let link = Arc::new(DeviceLink::new(LinkConfig::default()));
//! let relay = RelayController::new(Arc::clone(&link));
//! let settings = DeviceSettings::new("192.168.1.201");
//!
//! if link.connect(&settings).await {
//!     relay.unlock(&settings, 3).await;
//! }
//! # }
//! ```

mod error;
mod link;
mod logs;
mod relay;

pub use error::{LinkError, Result};
pub use link::{DeviceLink, LinkConfig, LinkState};
pub use relay::RelayController;
