//! SQLite persistence for the biometric gate.
//!
//! The gate needs three things from storage: the member list (to resolve a
//! scanned device user id), a place to write check-ins, and the key/value
//! settings that hold the terminal address and relay parameters.
//!
//! - [`Database`] - connection pool with embedded migrations
//! - [`MembershipRepository`] - data access trait, mockable in tests
//! - [`SqliteMembershipRepository`] - the SQLite implementation
//!
//! # Example
//!
//! ```no_run
//! use biogate_storage::{Database, DatabaseConfig, MembershipRepository, SqliteMembershipRepository};
//! use biogate_storage::models::NewMember;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("biogate.db")).await?;
//! let repo = SqliteMembershipRepository::new(db.pool().clone());
//!
//! let member = repo.create_member(&NewMember::new("Asha Rao")).await?;
//! repo.link_biometric(&member.id, "41").await?;
//!
//! let settings = repo.get_settings().await?;
//! println!("{} settings", settings.len());
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod models;
pub mod repositories;

pub use connection::{Database, DatabaseConfig};
pub use error::{StorageError, StorageResult};
pub use models::{Attendance, Member, NewAttendance, NewMember, TemporalValidity};
pub use repositories::{MembershipRepository, SqliteMembershipRepository};
