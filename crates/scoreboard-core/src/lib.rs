//! Core library for the scoreboard client.
//!
//! Everything a front end needs to run against the event service: the data
//! access layer with its TTL cache and demo fallback, sessions, configuration,
//! periodic background refresh and the `App` controller tying them together.

pub mod api;
pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod demo;
pub mod lifecycle;
pub mod models;
pub mod notifications;
pub mod prefs;
pub mod utils;

pub use api::{ApiError, DataAccess};
pub use app::{AdminDashboard, App, TeamDashboard};
pub use config::Config;
