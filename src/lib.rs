//! Mongo Datastore - connection bootstrap for MongoDB
//!
//! Establishes one shared MongoDB connection from configuration and hands
//! out per-database datastore handles, under a single enable/disable
//! lifecycle.
//!
//! ## Components
//!
//! - **Config**: CLI/env configuration resolved into an immutable snapshot
//! - **Credential**: username/password pair validation
//! - **Strategy**: URI, replica-set seed list or single host/port
//! - **Connect**: builds and verifies the shared client
//! - **Registry**: lazily populated, single-publication datastore cache
//! - **Lifecycle**: `Disabled → Starting → Running → Stopped`

pub mod config;
pub mod db;
pub mod lifecycle;
pub mod types;

pub use config::{Args, ConfigSnapshot, PluginState};
pub use db::{Datastore, DatastoreRegistry};
pub use lifecycle::{MongoStore, Phase, StoreController};
pub use types::{DatastoreError, Result};
