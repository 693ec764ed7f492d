//! Activation status plus an optional validity window.
//!
//! Implementors supply the three accessors; the window checks come for free.
//! Both bounds are inclusive: an entity is usable at exactly its start and
//! exactly its end instant.
//!
//! ```
//! use biogate_storage::models::TemporalValidity;
//! use chrono::{DateTime, Duration, Utc};
//!
//! struct Pass {
//!     active: bool,
//!     until: Option<DateTime<Utc>>,
//! }
//!
//! impl TemporalValidity for Pass {
//!     fn is_active(&self) -> bool {
//!         self.active
//!     }
//!
//!     fn validity_start(&self) -> Option<DateTime<Utc>> {
//!         None
//!     }
//!
//!     fn validity_end(&self) -> Option<DateTime<Utc>> {
//!         self.until
//!     }
//! }
//!
//! let now = Utc::now();
//! let pass = Pass { active: true, until: Some(now) };
//! assert!(pass.is_valid_at(now));
//! assert!(!pass.is_valid_at(now + Duration::seconds(1)));
//! ```

use chrono::{DateTime, Utc};

pub trait TemporalValidity {
    /// Inactive entities are invalid regardless of dates.
    fn is_active(&self) -> bool;

    fn validity_start(&self) -> Option<DateTime<Utc>>;

    fn validity_end(&self) -> Option<DateTime<Utc>>;

    /// No start date, or the start is not after `now`.
    fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.validity_start().is_none_or(|start| start <= now)
    }

    /// No end date, or the end is not before `now`.
    fn has_not_expired(&self, now: DateTime<Utc>) -> bool {
        self.validity_end().is_none_or(|end| end >= now)
    }

    fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.has_started(now) && self.has_not_expired(now)
    }

    fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}
