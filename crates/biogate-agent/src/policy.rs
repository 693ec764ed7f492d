//! Access decision for a scanned member.
//!
//! Entry is granted only when all four checks pass:
//!
//! - status is exactly `active`
//! - membership has started (no start date, or start <= now)
//! - membership has not expired (no expiry date, or expiry >= now)
//! - payment status is neither `overdue` nor `pending`
//!
//! There are no partial grants.

use biogate_storage::models::{Member, TemporalValidity};
use chrono::{DateTime, Utc};

/// Payment states that block entry. Anything else, including no payment
/// status at all, is accepted.
pub const BLOCKING_PAYMENT_STATUSES: [&str; 2] = ["overdue", "pending"];

/// Outcome of each individual check, kept for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyChecks {
    pub status_ok: bool,
    pub start_ok: bool,
    pub end_ok: bool,
    pub payment_ok: bool,
}

impl PolicyChecks {
    pub fn evaluate(member: &Member, now: DateTime<Utc>) -> Self {
        Self {
            status_ok: member.is_active(),
            start_ok: member.has_started(now),
            end_ok: member.has_not_expired(now),
            payment_ok: member
                .payment_status
                .as_deref()
                .is_none_or(|status| !BLOCKING_PAYMENT_STATUSES.contains(&status)),
        }
    }

    pub fn grant(&self) -> bool {
        self.status_ok && self.start_ok && self.end_ok && self.payment_ok
    }
}

/// Grant or deny `member` at `now`.
pub fn decide(member: &Member, now: DateTime<Utc>) -> bool {
    PolicyChecks::evaluate(member, now).grant()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rstest::rstest;

    fn member() -> Member {
        Member {
            id: "member_041".to_string(),
            name: "Test Member".to_string(),
            email: None,
            phone: None,
            plan_name: None,
            start_date: None,
            expiry_date: None,
            status: "active".to_string(),
            payment_status: Some("paid".to_string()),
            biometric_id: Some("41".to_string()),
            created_at: Utc::now(),
        }
    }

    #[rstest]
    fn test_truth_table(
        #[values(true, false)] status_ok: bool,
        #[values(true, false)] start_ok: bool,
        #[values(true, false)] end_ok: bool,
        #[values(true, false)] payment_ok: bool,
    ) {
        let now = Utc::now();
        let mut m = member();
        m.status = if status_ok { "active" } else { "frozen" }.to_string();
        m.start_date = Some(if start_ok {
            now - Duration::days(1)
        } else {
            now + Duration::days(1)
        });
        m.expiry_date = Some(if end_ok {
            now + Duration::days(1)
        } else {
            now - Duration::days(1)
        });
        m.payment_status = Some(if payment_ok { "paid" } else { "overdue" }.to_string());

        let checks = PolicyChecks::evaluate(&m, now);
        assert_eq!(
            checks,
            PolicyChecks {
                status_ok,
                start_ok,
                end_ok,
                payment_ok
            }
        );
        assert_eq!(
            decide(&m, now),
            status_ok && start_ok && end_ok && payment_ok
        );
    }

    #[test]
    fn test_absent_dates_and_payment_grant() {
        let mut m = member();
        m.payment_status = None;
        assert!(decide(&m, Utc::now()));
    }

    #[test]
    fn test_window_bounds_inclusive() {
        let now = Utc::now();
        let mut m = member();
        m.start_date = Some(now);
        m.expiry_date = Some(now);
        assert!(decide(&m, now));
    }

    #[rstest]
    #[case("paid", true)]
    #[case("partial", true)]
    #[case("", true)]
    #[case("pending", false)]
    #[case("overdue", false)]
    #[case("Overdue", true)]
    fn test_payment_status(#[case] status: &str, #[case] granted: bool) {
        let mut m = member();
        m.payment_status = Some(status.to_string());
        assert_eq!(decide(&m, Utc::now()), granted);
    }

    #[rstest]
    #[case("active", true)]
    #[case("frozen", false)]
    #[case("expired", false)]
    #[case("ACTIVE", false)]
    fn test_status(#[case] status: &str, #[case] granted: bool) {
        let mut m = member();
        m.status = status.to_string();
        assert_eq!(decide(&m, Utc::now()), granted);
    }
}
