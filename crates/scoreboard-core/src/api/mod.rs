//! Data access layer for the event service.
//!
//! This module provides `DataAccess`, the single entry point handlers use to
//! run an action against the event service. Each request is served from the
//! TTL cache, the configured `DataSource`, or the demo fallback:
//!
//! - `LiveSource`: HTTP client for the remote script endpoint
//! - `DemoSource` (see `crate::demo`): in-memory seed dataset
//!
//! The remote endpoint takes an `action` query parameter plus action-specific
//! parameters and answers with a JSON object carrying a `success` flag.

pub mod access;
pub mod client;
pub mod error;
pub mod request;
pub mod response;
pub mod source;

pub use access::{CachePolicy, DataAccess};
pub use client::LiveSource;
pub use error::ApiError;
pub use request::{Action, ApiRequest, Method, Params};
pub use response::ApiResponse;
pub use source::DataSource;
