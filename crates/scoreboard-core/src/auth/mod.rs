//! Authentication state for team members and administrators.
//!
//! This module provides:
//! - `Session`: the signed-in team (with player name) or admin
//! - `SessionStore`: persistence in the `session` storage namespace
//! - `CredentialStore`: admin passwords in the OS keychain via keyring
//!
//! At most one session kind is active; saving one clears the other.

pub mod credentials;
pub mod session;

pub use credentials::CredentialStore;
pub use session::{Session, SessionStore, DEFAULT_MODERATOR};
