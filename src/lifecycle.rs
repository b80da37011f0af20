//! Datastore lifecycle
//!
//! [`StoreController`] owns the enabled flag, the shared client and the
//! datastore registry. It moves through `Disabled → Starting → Running →
//! Stopped`; a controller whose flag says "disabled" never leaves `Disabled`.
//!
//! Startup is one pass with no partial state: configuration, credential,
//! strategy, connect, default datastore, model indexes. Any failure aborts
//! it and the controller never reaches `Running`.

use std::fmt;
use std::sync::Arc;

use mongodb::{gridfs::GridFsBucket, Client, Database};
use tracing::{debug, error, info, warn};

use crate::config::{Args, ConfigSnapshot, PluginState};
use crate::db::{
    strategy, Connector, CredentialResolver, Datastore, DatastoreRegistry, ModelRegistration,
    MongoConnector,
};
use crate::types::{DatastoreError, Result};

/// Observable lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disabled,
    Starting,
    Running,
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disabled => "disabled",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// State of a running datastore subsystem
pub struct MongoStore {
    registry: DatastoreRegistry,
    uploads_collection: String,
}

impl MongoStore {
    /// Datastore for `name`; the default datastore when `name` is blank
    pub fn datastore(&self, name: Option<&str>) -> Arc<Datastore> {
        self.registry.get(name)
    }

    pub fn default_datastore(&self) -> Arc<Datastore> {
        self.registry.default_datastore().clone()
    }

    /// The shared client
    pub fn client(&self) -> &Client {
        self.registry.client()
    }

    /// Raw database behind the default datastore
    pub fn database(&self) -> &Database {
        self.registry.default_datastore().database()
    }

    /// GridFS bucket for uploads in the default database
    pub fn uploads(&self) -> GridFsBucket {
        self.registry
            .default_datastore()
            .uploads(&self.uploads_collection)
    }

    pub fn uploads_collection(&self) -> &str {
        &self.uploads_collection
    }

    pub fn registry(&self) -> &DatastoreRegistry {
        &self.registry
    }

    async fn close(&self) {
        self.registry.clear();
        self.registry.client().clone().shutdown().await;
    }
}

enum Lifecycle {
    Disabled,
    Starting,
    Running(Arc<MongoStore>),
    Stopped,
}

/// Owns the datastore subsystem from enable-check to shutdown
pub struct StoreController {
    args: Args,
    plugin: PluginState,
    state: Lifecycle,
    /// None = driver connector built from configuration at start
    connector: Option<Arc<dyn Connector>>,
    models: Vec<ModelRegistration>,
}

impl StoreController {
    /// Create a controller, resolving the enabled flag once
    pub fn new(args: Args) -> Self {
        let plugin = args.plugin_state();
        warn!("Datastore plugin is {}", plugin);
        Self {
            args,
            plugin,
            state: Lifecycle::Disabled,
            connector: None,
            models: Vec::new(),
        }
    }

    /// Use a custom connector instead of the MongoDB driver
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Models whose indexes are created on the default datastore at start
    pub fn with_models(mut self, models: Vec<ModelRegistration>) -> Self {
        self.models = models;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.plugin.is_enabled()
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            Lifecycle::Disabled => Phase::Disabled,
            Lifecycle::Starting => Phase::Starting,
            Lifecycle::Running(_) => Phase::Running,
            Lifecycle::Stopped => Phase::Stopped,
        }
    }

    /// Connect and create the default datastore.
    ///
    /// A no-op when the plugin is disabled. On failure the controller ends
    /// up `Stopped` and the error is returned to the caller.
    pub async fn start(&mut self) -> Result<()> {
        if !self.is_enabled() {
            debug!("Datastore plugin disabled, skipping start");
            return Ok(());
        }
        if !matches!(self.state, Lifecycle::Disabled) {
            return Err(DatastoreError::Lifecycle(format!(
                "cannot start datastore while {}",
                self.phase()
            )));
        }

        self.state = Lifecycle::Starting;
        match self.bootstrap().await {
            Ok(store) => {
                info!(
                    db = %store.default_datastore().name(),
                    uploads = %store.uploads_collection(),
                    "Datastore started"
                );
                self.state = Lifecycle::Running(Arc::new(store));
                Ok(())
            }
            Err(e) => {
                error!("Problem connecting MongoDB: {}", e);
                self.state = Lifecycle::Stopped;
                Err(e)
            }
        }
    }

    async fn bootstrap(&self) -> Result<MongoStore> {
        let config = ConfigSnapshot::from_args(&self.args)?;

        let credential = CredentialResolver::from_config(&config)?
            .resolve(config.username(), config.password())?;
        let strategy = strategy::select(&config)?;

        let connector = match &self.connector {
            Some(connector) => connector.clone(),
            None => Arc::new(
                MongoConnector::new(config.db_name.clone())
                    .with_timeout(config.connect_timeout)
                    .with_app_name(config.app_name.clone()),
            ),
        };
        let client = connector.connect(&strategy, credential.as_ref()).await?;

        let registry = DatastoreRegistry::new(client, &config.db_name);
        for model in &self.models {
            debug!("Ensuring indexes for collection {}", model.collection());
            if let Err(e) = registry.default_datastore().ensure_indexes(model).await {
                registry.client().clone().shutdown().await;
                return Err(e);
            }
        }

        Ok(MongoStore {
            registry,
            uploads_collection: config.uploads_collection,
        })
    }

    /// Release every datastore and close the client. Only acts when running.
    pub async fn stop(&mut self) {
        if !matches!(self.state, Lifecycle::Running(_)) {
            debug!(phase = %self.phase(), "Datastore not running, nothing to stop");
            return;
        }

        if let Lifecycle::Running(store) = std::mem::replace(&mut self.state, Lifecycle::Stopped) {
            store.close().await;
            info!("Datastore stopped");
        }
    }

    /// The running store, shareable with the rest of the process
    pub fn store(&self) -> Result<Arc<MongoStore>> {
        match &self.state {
            Lifecycle::Running(store) => Ok(store.clone()),
            _ => Err(DatastoreError::NotRunning),
        }
    }

    /// Datastore for `name`; the default datastore when `name` is blank
    pub fn datastore(&self, name: Option<&str>) -> Result<Arc<Datastore>> {
        self.store().map(|s| s.datastore(name))
    }

    pub fn default_datastore(&self) -> Result<Arc<Datastore>> {
        self.store().map(|s| s.default_datastore())
    }

    pub fn client(&self) -> Result<Client> {
        self.store().map(|s| s.client().clone())
    }

    pub fn database(&self) -> Result<Database> {
        self.store().map(|s| s.database().clone())
    }

    pub fn uploads(&self) -> Result<GridFsBucket> {
        self.store().map(|s| s.uploads())
    }
}
