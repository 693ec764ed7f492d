//! From a scanned device user id to an open (or closed) door.

use crate::error::Result;
use crate::policy::PolicyChecks;
use crate::relay::DoorRelay;
use biogate_core::DeviceSettings;
use biogate_storage::models::NewAttendance;
use biogate_storage::MembershipRepository;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// No member is linked to the device user id.
    UnknownUser,

    /// The member exists but the access policy refused entry.
    Denied { member_id: String },

    /// Entry granted and a check-in written.
    Granted {
        member_id: String,
        attendance_id: String,
        /// Whether the terminal acknowledged the relay pulse
        relay_pulsed: bool,
    },
}

impl ScanOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }
}

/// Resolves a scan to a member, applies the access policy and, on a grant,
/// records the check-in and pulses the door relay.
pub struct ScanProcessor<R, D> {
    repo: Arc<R>,
    relay: Arc<D>,
}

impl<R, D> Clone for ScanProcessor<R, D> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            relay: Arc::clone(&self.relay),
        }
    }
}

impl<R, D> ScanProcessor<R, D>
where
    R: MembershipRepository,
    D: DoorRelay,
{
    pub fn new(repo: Arc<R>, relay: Arc<D>) -> Self {
        Self { repo, relay }
    }

    /// Handle one scan at the current time.
    ///
    /// Unknown users and denials are not errors. An error means the member
    /// list could not be read or the check-in could not be written; in the
    /// latter case the door stays shut.
    pub async fn handle_scan(
        &self,
        device_user_id: &str,
        settings: &DeviceSettings,
    ) -> Result<ScanOutcome> {
        self.handle_scan_at(device_user_id, settings, Utc::now()).await
    }

    pub async fn handle_scan_at(
        &self,
        device_user_id: &str,
        settings: &DeviceSettings,
        now: DateTime<Utc>,
    ) -> Result<ScanOutcome> {
        let members = self.repo.list_members().await?;

        let Some(member) = members
            .iter()
            .find(|member| member.matches_device_user(device_user_id))
        else {
            info!(user_id = device_user_id, "Scan from unlinked device user");
            return Ok(ScanOutcome::UnknownUser);
        };

        let checks = PolicyChecks::evaluate(member, now);
        if !checks.grant() {
            warn!(
                user_id = device_user_id,
                member_id = %member.id,
                status_ok = checks.status_ok,
                start_ok = checks.start_ok,
                end_ok = checks.end_ok,
                payment_ok = checks.payment_ok,
                "Access denied"
            );
            return Ok(ScanOutcome::Denied {
                member_id: member.id.clone(),
            });
        }

        let attendance = self
            .repo
            .create_attendance(&NewAttendance::biometric(&member.id, now))
            .await?;
        debug!(attendance_id = %attendance.id, member_id = %member.id, "Check-in recorded");

        let relay_pulsed = self.relay.unlock(settings, settings.unlock_seconds).await;
        info!(
            user_id = device_user_id,
            member_id = %member.id,
            name = %member.name,
            relay_pulsed,
            "Access granted"
        );

        Ok(ScanOutcome::Granted {
            member_id: member.id.clone(),
            attendance_id: attendance.id,
            relay_pulsed,
        })
    }
}
