//! Datastore registry: maps database names to datastore handles
//!
//! The default datastore is created once at startup and returned without a
//! lookup. Any other name is created on first demand and published into the
//! map only if no handle exists for it yet, so every caller observes the same
//! handle for a name even when several threads race to create it.
//!
//! ## Thread Safety
//!
//! Uses DashMap; publication goes through `entry().or_insert()`, which checks
//! and inserts under the shard lock.

use std::sync::Arc;

use dashmap::DashMap;
use mongodb::Client;
use tracing::debug;

use crate::config::non_blank;
use crate::db::datastore::Datastore;

/// Registry of datastores sharing one client
pub struct DatastoreRegistry {
    client: Client,
    /// Datastore for the configured database
    default: Arc<Datastore>,
    /// database name → datastore, filled on demand
    named: DashMap<String, Arc<Datastore>>,
}

impl DatastoreRegistry {
    /// Create an empty registry whose default datastore targets `default_db`
    pub fn new(client: Client, default_db: &str) -> Self {
        let default = Arc::new(Datastore::new(&client, default_db));
        debug!("Datastore [{}] created", default_db);
        Self {
            client,
            default,
            named: DashMap::new(),
        }
    }

    /// Datastore for `name`, or the default datastore when `name` is blank
    pub fn get(&self, name: Option<&str>) -> Arc<Datastore> {
        let Some(name) = non_blank(name) else {
            return self.default.clone();
        };

        if let Some(existing) = self.named.get(name) {
            return existing.value().clone();
        }

        let (published, won) = self.publish(name);
        if won {
            debug!("Datastore [{}] created", name);
        } else {
            debug!("Datastore [{}] already published, discarding candidate", name);
        }
        published
    }

    /// Build a candidate and insert it unless `name` is already taken.
    /// Returns the published datastore and whether it is the new candidate.
    fn publish(&self, name: &str) -> (Arc<Datastore>, bool) {
        let candidate = Arc::new(Datastore::new(&self.client, name));
        let published = self
            .named
            .entry(name.to_string())
            .or_insert(candidate.clone())
            .value()
            .clone();
        let won = Arc::ptr_eq(&published, &candidate);
        (published, won)
    }

    /// The default datastore
    pub fn default_datastore(&self) -> &Arc<Datastore> {
        &self.default
    }

    /// The shared client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Number of named datastores published so far
    pub fn len(&self) -> usize {
        self.named.len()
    }

    pub fn is_empty(&self) -> bool {
        self.named.is_empty()
    }

    /// Names of the datastores published so far
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.named.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Drop every named datastore
    pub fn clear(&self) {
        self.named.clear();
    }
}
