//! Connection strategy selection
//!
//! Picks exactly one way to reach the cluster from whichever configuration
//! fields are populated, in priority order: full URI, then replica-set seed
//! list, then a single host/port. Selection never touches the network;
//! host resolution belongs to the connect step.

use std::fmt;

use tracing::{debug, warn};

use crate::config::{non_blank, ConfigKey, ConfigSnapshot};
use crate::types::{DatastoreError, Result};

/// Port assumed for seed entries that do not name one
pub const DEFAULT_PORT: u16 = 27017;

/// A `host:port` pair naming one cluster member
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeedAddress {
    pub host: String,
    pub port: u16,
}

impl SeedAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for SeedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// How the connection to the cluster is established
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStrategy {
    /// Full connection URI; hosts, credentials and options come from the URI
    Uri(String),
    /// Replica-set seed list, read from the given key
    Seeds {
        addresses: Vec<SeedAddress>,
        key: ConfigKey,
    },
    /// One host and port
    Single(SeedAddress),
}

impl ConnectionStrategy {
    /// Short label for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Uri(_) => "uri",
            Self::Seeds { .. } => "seeds",
            Self::Single(_) => "host",
        }
    }
}

/// Choose the connection strategy for a configuration snapshot.
///
/// Several populated sources are not an error; the highest priority wins.
pub fn select(config: &ConfigSnapshot) -> Result<ConnectionStrategy> {
    if let Some(uri) = config.uri() {
        if config.seeds().is_some() || non_blank(config.host.as_deref()).is_some() {
            debug!("Connection URI configured, ignoring seeds and host/port");
        }
        return Ok(ConnectionStrategy::Uri(uri.to_string()));
    }

    if let Some(seeds) = config.seeds() {
        let addresses = parse_seeds(seeds, config.seeds_key)?;
        return Ok(ConnectionStrategy::Seeds {
            addresses,
            key: config.seeds_key,
        });
    }

    let host = non_blank(config.host.as_deref()).ok_or_else(|| {
        DatastoreError::config(
            ConfigKey::Host,
            "Cannot connect to mongodb: no mongoURI, seeds or host configured",
        )
    })?;
    let port = config.port.as_deref().unwrap_or_default();
    let port = parse_port(port).ok_or_else(|| {
        DatastoreError::config(
            ConfigKey::Port,
            format!(
                "Cannot connect to mongodb: error creating mongo connection (invalid port '{}')",
                port
            ),
        )
    })?;

    Ok(ConnectionStrategy::Single(SeedAddress::new(host, port)))
}

/// Split a seed list on runs of `;`, `,` or whitespace into addresses.
///
/// Entries without a port use [`DEFAULT_PORT`]. An entry with an unparsable
/// port is a configuration error; an entry without a host is skipped.
/// Entries split on the first `:`, so IPv6 literals (`[::1]:27017`) are not
/// supported; use a hostname or a connection URI instead.
pub fn parse_seeds(seeds: &str, key: ConfigKey) -> Result<Vec<SeedAddress>> {
    let mut addresses = Vec::new();

    for token in seeds
        .split(|c: char| c == ';' || c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        let (host, port) = match token.split_once(':') {
            Some((host, port)) => {
                let port = parse_port(port).ok_or_else(|| {
                    DatastoreError::config(
                        key,
                        format!("Invalid port in seed '{}'", token),
                    )
                })?;
                (host, port)
            }
            None => (token, DEFAULT_PORT),
        };

        if host.is_empty() {
            warn!(seed = %token, "Skipping seed without a host");
            continue;
        }

        addresses.push(SeedAddress::new(host, port));
    }

    if addresses.is_empty() {
        return Err(DatastoreError::config(
            key,
            "Cannot connect to mongodb: no replica can be connected",
        ));
    }

    Ok(addresses)
}

fn parse_port(port: &str) -> Option<u16> {
    port.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConfigSnapshot {
        ConfigSnapshot::new("app")
    }

    #[test]
    fn test_uri_wins_over_everything() {
        let mut config = config();
        config.uri = Some("mongodb://db.example.com/app".to_string());
        config.seeds = Some("a.example.com".to_string());
        config.host = Some("localhost".to_string());
        config.port = Some("27017".to_string());

        assert_eq!(
            select(&config).unwrap(),
            ConnectionStrategy::Uri("mongodb://db.example.com/app".to_string())
        );
    }

    #[test]
    fn test_seeds_win_over_host() {
        let mut config = config();
        config.uri = Some("   ".to_string());
        config.seeds = Some("a.example.com".to_string());
        config.host = Some("localhost".to_string());
        config.port = Some("27017".to_string());

        assert_eq!(select(&config).unwrap().kind(), "seeds");
    }

    #[test]
    fn test_seed_scenario() {
        let mut config = config();
        config.seeds = Some("a.example.com, b.example.com:27018".to_string());

        let strategy = select(&config).unwrap();
        assert_eq!(
            strategy,
            ConnectionStrategy::Seeds {
                addresses: vec![
                    SeedAddress::new("a.example.com", 27017),
                    SeedAddress::new("b.example.com", 27018),
                ],
                key: ConfigKey::Seeds,
            }
        );
    }

    #[test]
    fn test_seed_delimiters() {
        let addresses =
            parse_seeds(";a;;b,\tc  d:1\n,e:2;", ConfigKey::Seeds).unwrap();
        let rendered: Vec<String> = addresses.iter().map(|a| a.to_string()).collect();
        assert_eq!(
            rendered,
            vec!["a:27017", "b:27017", "c:27017", "d:1", "e:2"]
        );
    }

    #[test]
    fn test_seed_without_port_uses_default() {
        for seeds in ["x", "x;y", "x,y", "x y", "x \t ;, y"] {
            let addresses = parse_seeds(seeds, ConfigKey::Seeds).unwrap();
            assert!(addresses.iter().all(|a| a.port == DEFAULT_PORT), "{}", seeds);
        }
    }

    #[test]
    fn test_seed_bad_port_is_fatal() {
        let err = parse_seeds("a:27017,b:nope", ConfigKey::DevSeeds).unwrap_err();
        assert_eq!(err.config_key(), Some(ConfigKey::DevSeeds));
    }

    #[test]
    fn test_seed_without_host_skipped() {
        let addresses = parse_seeds(":27018, a", ConfigKey::Seeds).unwrap();
        assert_eq!(addresses, vec![SeedAddress::new("a", 27017)]);
    }

    #[test]
    fn test_seed_list_without_entries() {
        let err = parse_seeds(" ;, :1 ", ConfigKey::Seeds).unwrap_err();
        assert!(err.to_string().contains("no replica can be connected"));
    }

    #[test]
    fn test_host_and_port() {
        let mut config = config();
        config.host = Some("db.example.com".to_string());
        config.port = Some("27019".to_string());

        assert_eq!(
            select(&config).unwrap(),
            ConnectionStrategy::Single(SeedAddress::new("db.example.com", 27019))
        );
    }

    #[test]
    fn test_host_with_bad_port_is_fatal() {
        let mut config = config();
        config.host = Some("db.example.com".to_string());

        config.port = Some("twenty".to_string());
        assert_eq!(
            select(&config).unwrap_err().config_key(),
            Some(ConfigKey::Port)
        );

        config.port = None;
        assert_eq!(
            select(&config).unwrap_err().config_key(),
            Some(ConfigKey::Port)
        );

        config.port = Some("70000".to_string());
        assert!(select(&config).unwrap_err().is_configuration());
    }

    #[test]
    fn test_nothing_configured() {
        assert_eq!(
            select(&config()).unwrap_err().config_key(),
            Some(ConfigKey::Host)
        );
    }

    #[test]
    fn test_ipv6_literal_seed_rejected() {
        let err = parse_seeds("[::1]:27017", ConfigKey::Seeds).unwrap_err();
        assert_eq!(err.config_key(), Some(ConfigKey::Seeds));
        assert!(err.to_string().contains("[::1]:27017"));
    }
}
