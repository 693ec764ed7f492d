pub mod attendance;
pub mod member;
pub mod temporal_validity;

pub use attendance::{Attendance, NewAttendance};
pub use member::{Member, NewMember};
pub use temporal_validity::TemporalValidity;
