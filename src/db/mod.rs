//! MongoDB connection bootstrap
//!
//! Leaves first: credential resolution, strategy selection, the connection
//! factory, datastore handles and the registry that caches them.

pub mod connect;
pub mod credential;
pub mod datastore;
pub mod registry;
pub mod strategy;

pub use connect::{resolve_seeds, Connector, DnsResolver, HostResolver, MongoConnector};
pub use credential::{CredentialResolver, MongoCredential, LEGACY_MECHANISM};
pub use datastore::{Datastore, IntoIndexes, ModelRegistration};
pub use registry::DatastoreRegistry;
pub use strategy::{ConnectionStrategy, SeedAddress, DEFAULT_PORT};
