pub mod membership;

pub use membership::{MembershipRepository, SqliteMembershipRepository};
