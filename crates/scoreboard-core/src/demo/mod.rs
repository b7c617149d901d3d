//! Offline demo data.
//!
//! `DemoSource` answers every action from an in-memory seed dataset with the
//! same response shapes as the live service. Writes (point grants, marking
//! notifications read) mutate the dataset, so later reads observe them.

pub mod seed;
pub mod source;

pub use seed::{DemoDataset, DEMO_ADMIN_PASSWORD, DEMO_ADMIN_USERNAME};
pub use source::DemoSource;
