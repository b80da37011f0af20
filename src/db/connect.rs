//! Connection factory
//!
//! Turns a selected [`ConnectionStrategy`] and optional credential into the
//! single live `mongodb::Client` shared by every datastore. Seed hosts are
//! resolved here, one at a time; unresolvable seeds are logged and skipped.
//! There is no retry: a failed connect fails startup.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bson::doc;
use mongodb::options::{ClientOptions, ServerAddress};
use mongodb::Client;
use tracing::{debug, error, info};

use crate::config::{redact_uri, ConfigKey};
use crate::db::credential::MongoCredential;
use crate::db::strategy::{ConnectionStrategy, SeedAddress};
use crate::types::{DatastoreError, Result};

/// Resolves seed hosts before they are handed to the driver
#[async_trait::async_trait]
pub trait HostResolver: Send + Sync {
    /// Resolve one address, returning the first socket address found
    async fn resolve(&self, address: &SeedAddress) -> io::Result<SocketAddr>;
}

/// System DNS resolution via tokio
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsResolver;

#[async_trait::async_trait]
impl HostResolver for DnsResolver {
    async fn resolve(&self, address: &SeedAddress) -> io::Result<SocketAddr> {
        tokio::net::lookup_host((address.host.as_str(), address.port))
            .await?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no addresses found for {}", address),
                )
            })
    }
}

/// Resolve every seed, dropping the ones that fail.
///
/// Fails only when no seed resolves at all.
pub async fn resolve_seeds(
    resolver: &dyn HostResolver,
    seeds: &[SeedAddress],
    key: ConfigKey,
) -> Result<Vec<SeedAddress>> {
    let mut resolved = Vec::with_capacity(seeds.len());

    for seed in seeds {
        match resolver.resolve(seed).await {
            Ok(addr) => {
                debug!(seed = %seed, resolved = %addr, "Resolved seed");
                resolved.push(seed.clone());
            }
            Err(e) => {
                error!(seed = %seed, "Error creating mongo connection to {}: {}", seed, e);
            }
        }
    }

    if resolved.is_empty() {
        return Err(DatastoreError::config(
            key,
            "Cannot connect to mongodb: no replica can be connected",
        ));
    }

    Ok(resolved)
}

/// Produces the shared client (allows mocking in tests)
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Establish the connection for `strategy`
    async fn connect(
        &self,
        strategy: &ConnectionStrategy,
        credential: Option<&MongoCredential>,
    ) -> Result<Client>;
}

/// Connector backed by the MongoDB driver
#[derive(Clone)]
pub struct MongoConnector {
    resolver: Arc<dyn HostResolver>,
    /// Database pinged to verify the connection
    db_name: String,
    timeout: Option<Duration>,
    app_name: Option<String>,
}

impl MongoConnector {
    pub fn new(db_name: impl Into<String>) -> Self {
        Self {
            resolver: Arc::new(DnsResolver),
            db_name: db_name.into(),
            timeout: None,
            app_name: None,
        }
    }

    /// Use a custom host resolver for seed lists
    pub fn with_resolver(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Server selection and connect timeout, unless the URI sets its own
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_app_name(mut self, app_name: Option<String>) -> Self {
        self.app_name = app_name;
        self
    }

    /// Build driver options for a strategy without connecting
    pub async fn client_options(
        &self,
        strategy: &ConnectionStrategy,
        credential: Option<&MongoCredential>,
    ) -> Result<ClientOptions> {
        let mut options = match strategy {
            ConnectionStrategy::Uri(uri) => ClientOptions::parse(uri.as_str()).await.map_err(|e| {
                DatastoreError::Connectivity(format!(
                    "Cannot connect to mongodb: invalid {} '{}': {}",
                    ConfigKey::MongoUri,
                    uri,
                    e
                ))
            })?,
            ConnectionStrategy::Seeds { addresses, key } => {
                let resolved = resolve_seeds(self.resolver.as_ref(), addresses, *key).await?;
                let mut options = ClientOptions::default();
                options.hosts = resolved.iter().map(server_address).collect();
                options.credential = credential.map(MongoCredential::to_driver);
                options
            }
            ConnectionStrategy::Single(address) => {
                info!("HOST: {} port: {}", address.host, address.port);
                let mut options = ClientOptions::default();
                options.hosts = vec![server_address(address)];
                options.credential = credential.map(MongoCredential::to_driver);
                options
            }
        };

        if let Some(timeout) = self.timeout {
            options.server_selection_timeout.get_or_insert(timeout);
            options.connect_timeout.get_or_insert(timeout);
        }
        if options.app_name.is_none() {
            options.app_name = self.app_name.clone();
        }

        Ok(options)
    }
}

#[async_trait::async_trait]
impl Connector for MongoConnector {
    async fn connect(
        &self,
        strategy: &ConnectionStrategy,
        credential: Option<&MongoCredential>,
    ) -> Result<Client> {
        let options = self.client_options(strategy, credential).await?;
        let hosts: Vec<String> = options.hosts.iter().map(|h| h.to_string()).collect();
        info!(
            strategy = strategy.kind(),
            authenticated = options.credential.is_some(),
            "Connecting to MongoDB at {}",
            hosts.join(",")
        );

        let client = Client::with_options(options).map_err(|e| {
            DatastoreError::Connectivity(format!("Failed to create MongoDB client: {}", e))
        })?;

        client
            .database(&self.db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| {
                let target = match strategy {
                    ConnectionStrategy::Uri(uri) => redact_uri(uri),
                    _ => hosts.join(","),
                };
                DatastoreError::Connectivity(format!(
                    "Cannot connect to mongodb at {}: {}",
                    target, e
                ))
            })?;

        info!("Connected to MongoDB database '{}'", self.db_name);
        Ok(client)
    }
}

fn server_address(address: &SeedAddress) -> ServerAddress {
    ServerAddress::Tcp {
        host: address.host.clone(),
        port: Some(address.port),
    }
}
