//! Data models for event entities.
//!
//! This module contains the data structures exchanged with the event
//! service:
//!
//! - `Team`, `RatingEntry`: Teams and their leaderboard positions
//! - `Transaction`: Point grant history
//! - `Notification`, `Severity`: Team and broadcast messages
//! - Event types: `Achievement`, `Task`, `Stats`, `EventInfo`, `Admin`

pub mod event;
pub mod notification;
pub mod rating;
pub mod team;
pub mod transaction;

pub use event::{Achievement, Admin, EventInfo, Stats, Task};
pub use notification::{Notification, Severity};
pub use rating::{gap_to_next, rank_teams, RatingEntry};
pub use team::Team;
pub use transaction::{PointGrant, Transaction};
