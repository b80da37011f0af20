//! Configuration for the datastore bootstrap
//!
//! CLI arguments and environment variable handling using clap, resolved into
//! an immutable [`ConfigSnapshot`] that the rest of the crate consumes.
//! Pattern adapted from doorway's `Args`.

use clap::Parser;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::{DatastoreError, Result};

/// Namespace shared by every datastore configuration key
pub const KEY_PREFIX: &str = "datastore";

/// Collection used for binary uploads when none is configured
pub const DEFAULT_UPLOADS_COLLECTION: &str = "uploads";

/// Plugin flag value that switches the whole subsystem off
pub const DISABLED_FLAG: &str = "disabled";

/// Logical configuration keys, as reported in configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfigKey {
    MongoUri,
    Seeds,
    DevSeeds,
    Host,
    Port,
    DbName,
    Username,
    Password,
    Uploads,
    AuthMechanism,
}

impl ConfigKey {
    /// Key name without the namespace prefix
    pub fn key(&self) -> &'static str {
        match self {
            Self::MongoUri => "mongoURI",
            Self::Seeds => "seeds",
            Self::DevSeeds => "dev.seeds",
            Self::Host => "host",
            Self::Port => "port",
            Self::DbName => "dbName",
            Self::Username => "username",
            Self::Password => "password",
            Self::Uploads => "uploads",
            Self::AuthMechanism => "authMechanism",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", KEY_PREFIX, self.key())
    }
}

/// Mongo datastore bootstrap
#[derive(Parser, Debug, Clone)]
#[command(name = "mongo-datastore")]
#[command(about = "Connect to MongoDB and serve per-database datastore handles")]
pub struct Args {
    /// Plugin switch; the value "disabled" turns the datastore off
    #[arg(long, env = "DATASTORE_PLUGIN")]
    pub plugin: Option<String>,

    /// Enable development mode (seed list is read from DATASTORE_DEV_SEEDS)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Full MongoDB connection URI; takes precedence over seeds and host/port
    #[arg(long, env = "DATASTORE_MONGO_URI")]
    pub mongo_uri: Option<String>,

    /// Replica-set seed list, e.g. "db1:27017,db2:27018" (production)
    #[arg(long, env = "DATASTORE_SEEDS")]
    pub seeds: Option<String>,

    /// Replica-set seed list used in development mode
    #[arg(long, env = "DATASTORE_DEV_SEEDS")]
    pub dev_seeds: Option<String>,

    /// Single MongoDB host
    #[arg(long, env = "DATASTORE_HOST")]
    pub host: Option<String>,

    /// Port of the single MongoDB host
    #[arg(long, env = "DATASTORE_PORT")]
    pub port: Option<String>,

    /// Default database name (required)
    #[arg(long, env = "DATASTORE_DB_NAME")]
    pub db_name: Option<String>,

    /// Username for authenticated connections
    #[arg(long, env = "DATASTORE_USERNAME")]
    pub username: Option<String>,

    /// Password for authenticated connections
    #[arg(long, env = "DATASTORE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Collection (GridFS bucket) used for binary uploads
    #[arg(long, env = "DATASTORE_UPLOADS")]
    pub uploads: Option<String>,

    /// Override the credential mechanism (e.g. "SCRAM-SHA-256")
    #[arg(long, env = "DATASTORE_AUTH_MECHANISM")]
    pub auth_mechanism: Option<String>,

    /// Server selection and connect timeout in milliseconds (0 = driver default)
    #[arg(long, env = "DATASTORE_CONNECT_TIMEOUT_MS", default_value = "3000")]
    pub connect_timeout_ms: u64,

    /// Application name reported to the server
    #[arg(long, env = "DATASTORE_APP_NAME")]
    pub app_name: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Resolve the enabled flag
    pub fn plugin_state(&self) -> PluginState {
        PluginState::from_flag(self.plugin.as_deref())
    }

    /// Seed list for the current mode, with the key it was read from
    pub fn seeds_for_mode(&self) -> (ConfigKey, Option<&str>) {
        if self.dev_mode {
            (ConfigKey::DevSeeds, self.dev_seeds.as_deref())
        } else {
            (ConfigKey::Seeds, self.seeds.as_deref())
        }
    }
}

/// Whether the datastore subsystem is switched on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Enabled,
    Disabled,
}

impl PluginState {
    /// Only the exact value "disabled" switches the subsystem off
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some(DISABLED_FLAG) => Self::Disabled,
            _ => Self::Enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled)
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => f.write_str("enabled"),
            Self::Disabled => f.write_str("disabled"),
        }
    }
}

/// Returns the value only if it contains something other than whitespace
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Resolved, immutable configuration for one startup
#[derive(Clone, Serialize)]
pub struct ConfigSnapshot {
    #[serde(serialize_with = "serialize_redacted_uri")]
    pub uri: Option<String>,
    pub seeds: Option<String>,
    /// Key the seed list was read from (production or development)
    pub seeds_key: ConfigKey,
    pub host: Option<String>,
    pub port: Option<String>,
    pub db_name: String,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub uploads_collection: String,
    pub auth_mechanism: Option<String>,
    pub connect_timeout: Option<Duration>,
    pub app_name: Option<String>,
}

impl ConfigSnapshot {
    /// Snapshot targeting `db_name` with nothing else configured
    pub fn new(db_name: impl Into<String>) -> Self {
        Self {
            uri: None,
            seeds: None,
            seeds_key: ConfigKey::Seeds,
            host: None,
            port: None,
            db_name: db_name.into(),
            username: None,
            password: None,
            uploads_collection: DEFAULT_UPLOADS_COLLECTION.to_string(),
            auth_mechanism: None,
            connect_timeout: None,
            app_name: None,
        }
    }

    /// Resolve a snapshot from parsed arguments
    pub fn from_args(args: &Args) -> Result<Self> {
        let db_name = non_blank(args.db_name.as_deref())
            .ok_or_else(|| {
                DatastoreError::config(ConfigKey::DbName, "Missing datastore configuration")
            })?
            .to_string();

        let (seeds_key, seeds) = args.seeds_for_mode();

        let uploads_collection = match non_blank(args.uploads.as_deref()) {
            Some(name) => name.to_string(),
            None => {
                warn!(
                    key = %ConfigKey::Uploads,
                    default = DEFAULT_UPLOADS_COLLECTION,
                    "Missing datastore configuration key, using default"
                );
                DEFAULT_UPLOADS_COLLECTION.to_string()
            }
        };

        let snapshot = Self {
            uri: args.mongo_uri.clone(),
            seeds: seeds.map(str::to_string),
            seeds_key,
            host: args.host.clone(),
            port: args.port.clone(),
            db_name,
            username: args.username.clone(),
            password: args.password.clone(),
            uploads_collection,
            auth_mechanism: args.auth_mechanism.clone(),
            connect_timeout: (args.connect_timeout_ms > 0)
                .then(|| Duration::from_millis(args.connect_timeout_ms)),
            app_name: args.app_name.clone(),
        };

        match serde_json::to_string(&snapshot) {
            Ok(json) => debug!("Datastore configuration: {}", json),
            Err(e) => debug!("Datastore configuration could not be rendered: {}", e),
        }

        Ok(snapshot)
    }

    pub fn uri(&self) -> Option<&str> {
        non_blank(self.uri.as_deref())
    }

    pub fn seeds(&self) -> Option<&str> {
        non_blank(self.seeds.as_deref())
    }

    pub fn username(&self) -> Option<&str> {
        non_blank(self.username.as_deref())
    }

    pub fn password(&self) -> Option<&str> {
        non_blank(self.password.as_deref())
    }
}

impl fmt::Debug for ConfigSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigSnapshot")
            .field("uri", &self.uri.as_deref().map(redact_uri))
            .field("seeds", &self.seeds)
            .field("seeds_key", &self.seeds_key)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db_name", &self.db_name)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("uploads_collection", &self.uploads_collection)
            .field("auth_mechanism", &self.auth_mechanism)
            .field("connect_timeout", &self.connect_timeout)
            .field("app_name", &self.app_name)
            .finish()
    }
}

/// Mask the password embedded in a connection URI, if any
pub fn redact_uri(uri: &str) -> String {
    let Some((scheme, rest)) = uri.split_once("://") else {
        return uri.to_string();
    };
    // userinfo may carry an unencoded '/', so only the query bounds the search
    let query_start = rest.find('?').unwrap_or(rest.len());
    let Some(at) = rest[..query_start].rfind('@') else {
        return uri.to_string();
    };
    match rest[..at].split_once(':') {
        Some((user, _)) => format!("{}://{}:***@{}", scheme, user, &rest[at + 1..]),
        None => uri.to_string(),
    }
}

fn serialize_redacted_uri<S>(uri: &Option<String>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match uri {
        Some(uri) => serializer.serialize_some(&redact_uri(uri)),
        None => serializer.serialize_none(),
    }
}
