//! Datastore handles
//!
//! A [`Datastore`] is a named view over the shared client, bound to one
//! database. Many datastores share one client; none of them owns it.
//!
//! Models are registered explicitly with [`ModelRegistration`] rather than
//! discovered at runtime. Index pattern adapted from doorway's `db/mongo.rs`.

use bson::Document;
use mongodb::{
    gridfs::GridFsBucket,
    options::{GridFsBucketOptions, IndexOptions},
    Client, Collection, Database, IndexModel,
};
use tracing::debug;

use crate::types::{DatastoreError, Result};

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// A collection whose indexes are materialised at startup
#[derive(Debug, Clone)]
pub struct ModelRegistration {
    collection: String,
    indexes: Vec<(Document, Option<IndexOptions>)>,
}

impl ModelRegistration {
    /// Register schema `T` stored in `collection`
    pub fn of<T: IntoIndexes>(collection: impl Into<String>) -> Self {
        Self::new(collection, T::into_indices())
    }

    pub fn new(
        collection: impl Into<String>,
        indexes: Vec<(Document, Option<IndexOptions>)>,
    ) -> Self {
        Self {
            collection: collection.into(),
            indexes,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn index_count(&self) -> usize {
        self.indexes.len()
    }
}

/// Handle to one database over the shared client
#[derive(Debug, Clone)]
pub struct Datastore {
    name: String,
    database: Database,
}

impl Datastore {
    /// Bind `name` to the shared client. No I/O happens here.
    pub fn new(client: &Client, name: &str) -> Self {
        Self {
            name: name.to_string(),
            database: client.database(name),
        }
    }

    /// Database name this datastore is bound to
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the raw MongoDB database
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Get a typed collection
    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.database.collection::<T>(name)
    }

    /// GridFS bucket for binary uploads
    pub fn uploads(&self, bucket: &str) -> GridFsBucket {
        let options = GridFsBucketOptions::builder()
            .bucket_name(bucket.to_string())
            .build();
        self.database.gridfs_bucket(options)
    }

    /// Create the indexes declared by a registered model
    pub async fn ensure_indexes(&self, model: &ModelRegistration) -> Result<()> {
        if model.indexes.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = model
            .indexes
            .iter()
            .cloned()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.database
            .collection::<Document>(&model.collection)
            .create_indexes(indices)
            .await
            .map_err(|e| {
                DatastoreError::Database(format!(
                    "Failed to create indexes on {}.{}: {}",
                    self.name, model.collection, e
                ))
            })?;

        debug!(
            collection = %model.collection,
            count = model.indexes.len(),
            "Indexes ensured"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use mongodb::options::ClientOptions;

    struct Session;

    impl IntoIndexes for Session {
        fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
            vec![
                (
                    doc! { "token": 1 },
                    Some(IndexOptions::builder().unique(true).build()),
                ),
                (doc! { "expires_at": 1 }, None),
            ]
        }
    }

    #[test]
    fn test_model_registration_from_schema() {
        let model = ModelRegistration::of::<Session>("sessions");
        assert_eq!(model.collection(), "sessions");
        assert_eq!(model.index_count(), 2);
    }

    #[tokio::test]
    async fn test_datastore_binds_database_name() {
        let client = Client::with_options(ClientOptions::default()).unwrap();
        let datastore = Datastore::new(&client, "reports");

        assert_eq!(datastore.name(), "reports");
        assert_eq!(datastore.database().name(), "reports");
        assert_eq!(datastore.collection::<Document>("events").name(), "events");
    }

    #[tokio::test]
    async fn test_no_indexes_is_noop() {
        let client = Client::with_options(ClientOptions::default()).unwrap();
        let datastore = Datastore::new(&client, "reports");

        datastore
            .ensure_indexes(&ModelRegistration::new("events", Vec::new()))
            .await
            .unwrap();
    }
}
