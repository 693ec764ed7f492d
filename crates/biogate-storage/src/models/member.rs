use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TemporalValidity;

/// Status value that allows entry.
pub const STATUS_ACTIVE: &str = "active";

/// A gym member as stored in the `members` table.
///
/// Only the fields the gate needs are modelled: identity, validity window,
/// status and payment state, plus the device user id enrolled on the
/// fingerprint terminal.
///
/// # Examples
///
/// ```
/// use biogate_storage::models::{Member, TemporalValidity};
/// use chrono::Utc;
///
/// let member = Member {
///     id: "member_001".to_string(),
///     name: "Asha Rao".to_string(),
///     email: None,
///     phone: None,
///     plan_name: Some("Monthly".to_string()),
///     start_date: None,
///     expiry_date: None,
///     status: "active".to_string(),
///     payment_status: Some("paid".to_string()),
///     biometric_id: Some("41".to_string()),
///     created_at: Utc::now(),
/// };
///
/// assert!(member.is_valid());
/// assert!(member.matches_device_user("41"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Member {
    pub id: String,

    pub name: String,

    pub email: Option<String>,

    pub phone: Option<String>,

    pub plan_name: Option<String>,

    /// Membership start; absent means "no lower bound"
    pub start_date: Option<DateTime<Utc>>,

    /// Membership end; absent means "no upper bound"
    pub expiry_date: Option<DateTime<Utc>>,

    /// `active`, `frozen`, `expired`, ...
    pub status: String,

    /// `paid`, `pending`, `overdue`, ...
    pub payment_status: Option<String>,

    /// Device user id on the fingerprint terminal, as decimal text
    pub biometric_id: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Member {
    /// Exact text match against a scanned device user id.
    pub fn matches_device_user(&self, device_user_id: &str) -> bool {
        self.biometric_id.as_deref() == Some(device_user_id)
    }
}

impl TemporalValidity for Member {
    fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }

    fn validity_start(&self) -> Option<DateTime<Utc>> {
        self.start_date
    }

    fn validity_end(&self) -> Option<DateTime<Utc>> {
        self.expiry_date
    }
}

/// Fields for inserting a member. The id is generated on insert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewMember {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub plan_name: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub status: String,
    pub payment_status: Option<String>,
    pub biometric_id: Option<String>,
}

impl NewMember {
    /// An active member with no validity window and no payment state.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: STATUS_ACTIVE.to_string(),
            ..Default::default()
        }
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn payment_status(mut self, payment_status: impl Into<String>) -> Self {
        self.payment_status = Some(payment_status.into());
        self
    }

    pub fn validity(
        mut self,
        start_date: Option<DateTime<Utc>>,
        expiry_date: Option<DateTime<Utc>>,
    ) -> Self {
        self.start_date = start_date;
        self.expiry_date = expiry_date;
        self
    }

    pub fn biometric_id(mut self, biometric_id: impl Into<String>) -> Self {
        self.biometric_id = Some(biometric_id.into());
        self
    }
}
