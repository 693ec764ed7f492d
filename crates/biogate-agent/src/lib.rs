//! Biometric gate agent.
//!
//! Ties the fingerprint terminal to the membership database:
//!
//! - [`policy`]: the grant/deny decision for a member
//! - [`ScanProcessor`]: scan → member lookup → policy → check-in → door pulse
//! - [`LogPoller`]: periodic log download with a dedup cursor
//! - [`SingleFlight`]: skip-if-busy guard used by the poll loop
//! - [`BiometricService`]: start/stop polling, connection test, manual pulse
//!
//! Nothing here is allowed to take the hosting process down. Device failures
//! resolve to `false` or empty results, and a failed poll cycle is logged and
//! forgotten.

pub mod config;
pub mod error;
pub mod poller;
pub mod policy;
pub mod processor;
pub mod relay;
pub mod scheduler;
pub mod service;

pub use config::AgentConfig;
pub use error::{AgentError, Result};
pub use poller::{LogPoller, PollOutcome, PollerStats};
pub use policy::{PolicyChecks, decide};
pub use processor::{ScanOutcome, ScanProcessor};
pub use relay::DoorRelay;
pub use scheduler::{FlightGuard, SingleFlight};
pub use service::BiometricService;
