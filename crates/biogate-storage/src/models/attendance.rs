use biogate_core::constants::{MARKED_VIA_BIOMETRIC, MARKED_VIA_MANUAL};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One check-in row from the `attendance` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Attendance {
    /// UUID v4, assigned on insert
    pub id: String,

    pub member_id: String,

    pub check_in_time: DateTime<Utc>,

    pub check_out_time: Option<DateTime<Utc>>,

    pub latitude: Option<f64>,

    pub longitude: Option<f64>,

    /// How the check-in was recorded (`biometric`, `manual`, ...)
    pub marked_via: String,
}

/// Fields for inserting an attendance row.
///
/// A missing check-in time means "now"; a missing `marked_via` means manual.
///
/// ```
/// use biogate_storage::models::NewAttendance;
/// use chrono::Utc;
///
/// let now = Utc::now();
/// let record = NewAttendance::biometric("member_001", now);
/// assert_eq!(record.check_in_time, Some(now));
/// assert_eq!(record.marked_via.as_deref(), Some("biometric"));
/// assert!(record.check_out_time.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewAttendance {
    pub member_id: String,
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub marked_via: Option<String>,
}

impl NewAttendance {
    pub fn new(member_id: impl Into<String>) -> Self {
        Self {
            member_id: member_id.into(),
            ..Default::default()
        }
    }

    /// A fingerprint check-in: no check-out, no location.
    pub fn biometric(member_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            member_id: member_id.into(),
            check_in_time: Some(at),
            marked_via: Some(MARKED_VIA_BIOMETRIC.to_string()),
            ..Default::default()
        }
    }

    pub(crate) fn marked_via_or_default(&self) -> &str {
        self.marked_via.as_deref().unwrap_or(MARKED_VIA_MANUAL)
    }
}
