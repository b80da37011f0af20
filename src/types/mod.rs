//! Shared types for the datastore bootstrap

mod error;

pub use error::{DatastoreError, Result};
