//! Utility functions for display formatting.

pub mod format;

pub use format::{format_delta, format_timestamp, pad_display, truncate_string};
