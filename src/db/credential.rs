//! Credential resolution
//!
//! Username and password come as a pair: both blank means an anonymous
//! connection, both present yields a credential bound to the target
//! database, and anything in between aborts startup.

use std::fmt;
use std::str::FromStr;

use mongodb::options::{AuthMechanism, Credential};
use tracing::debug;
use zeroize::Zeroizing;

use crate::config::{non_blank, ConfigKey, ConfigSnapshot};
use crate::types::{DatastoreError, Result};

/// Mechanism used unless overridden: legacy MONGODB-CR challenge-response.
pub const LEGACY_MECHANISM: AuthMechanism = AuthMechanism::MongoDbCr;

/// Username/password credential for one database
pub struct MongoCredential {
    username: String,
    /// Wiped from memory when the credential is dropped
    password: Zeroizing<String>,
    /// Database the user is defined in
    source: String,
    mechanism: AuthMechanism,
}

impl MongoCredential {
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn mechanism(&self) -> &AuthMechanism {
        &self.mechanism
    }

    /// Convert into the driver's credential type
    pub fn to_driver(&self) -> Credential {
        Credential::builder()
            .username(self.username.clone())
            .password(self.password.as_str().to_string())
            .source(self.source.clone())
            .mechanism(self.mechanism.clone())
            .build()
    }
}

impl fmt::Debug for MongoCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoCredential")
            .field("username", &self.username)
            .field("password", &"***")
            .field("source", &self.source)
            .field("mechanism", &self.mechanism)
            .finish()
    }
}

/// Validates the username/password pair and builds the optional credential
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    db_name: String,
    mechanism: AuthMechanism,
}

impl CredentialResolver {
    /// Resolver binding credentials to `db_name` with the legacy mechanism
    pub fn new(db_name: impl Into<String>) -> Self {
        Self {
            db_name: db_name.into(),
            mechanism: LEGACY_MECHANISM,
        }
    }

    /// Resolver for a snapshot, honouring a configured mechanism override
    pub fn from_config(config: &ConfigSnapshot) -> Result<Self> {
        let resolver = Self::new(config.db_name.clone());
        match non_blank(config.auth_mechanism.as_deref()) {
            Some(name) => {
                let mechanism = AuthMechanism::from_str(name).map_err(|e| {
                    DatastoreError::config(
                        ConfigKey::AuthMechanism,
                        format!("Unknown auth mechanism '{}': {}", name, e),
                    )
                })?;
                Ok(resolver.with_mechanism(mechanism))
            }
            None => Ok(resolver),
        }
    }

    pub fn with_mechanism(mut self, mechanism: AuthMechanism) -> Self {
        self.mechanism = mechanism;
        self
    }

    /// Resolve the optional credential from a username/password pair
    pub fn resolve(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Option<MongoCredential>> {
        match (non_blank(username), non_blank(password)) {
            (None, None) => Ok(None),
            (Some(username), Some(password)) => {
                debug!(
                    username = %username,
                    source = %self.db_name,
                    mechanism = ?self.mechanism,
                    "Resolved datastore credential"
                );
                Ok(Some(MongoCredential {
                    username: username.to_string(),
                    password: Zeroizing::new(password.to_string()),
                    source: self.db_name.clone(),
                    mechanism: self.mechanism.clone(),
                }))
            }
            (Some(_), None) => Err(DatastoreError::config(
                ConfigKey::Password,
                "Missing username or password",
            )),
            (None, Some(_)) => Err(DatastoreError::config(
                ConfigKey::Username,
                "Missing username or password",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_blank_is_anonymous() {
        let resolver = CredentialResolver::new("app");
        assert!(resolver.resolve(None, None).unwrap().is_none());
        assert!(resolver.resolve(Some(""), Some("  ")).unwrap().is_none());
    }

    #[test]
    fn test_half_present_is_configuration_error() {
        let resolver = CredentialResolver::new("app");

        let err = resolver.resolve(Some("u"), Some("")).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("Missing username or password"));

        let err = resolver.resolve(None, Some("secret")).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_credential_bound_to_database() {
        let credential = CredentialResolver::new("app")
            .resolve(Some("u"), Some("secret"))
            .unwrap()
            .unwrap();

        assert_eq!(credential.username(), "u");
        assert_eq!(credential.source(), "app");
        assert_eq!(credential.mechanism(), &AuthMechanism::MongoDbCr);

        let driver = credential.to_driver();
        assert_eq!(driver.username.as_deref(), Some("u"));
        assert_eq!(driver.password.as_deref(), Some("secret"));
        assert_eq!(driver.source.as_deref(), Some("app"));
        assert_eq!(driver.mechanism, Some(AuthMechanism::MongoDbCr));
    }

    #[test]
    fn test_mechanism_override() {
        let mut config = ConfigSnapshot::new("app");
        config.auth_mechanism = Some("SCRAM-SHA-256".to_string());

        let credential = CredentialResolver::from_config(&config)
            .unwrap()
            .resolve(Some("u"), Some("secret"))
            .unwrap()
            .unwrap();
        assert_eq!(credential.mechanism(), &AuthMechanism::ScramSha256);
    }

    #[test]
    fn test_unknown_mechanism_rejected() {
        let mut config = ConfigSnapshot::new("app");
        config.auth_mechanism = Some("NOT-A-MECHANISM".to_string());

        let err = CredentialResolver::from_config(&config).unwrap_err();
        assert_eq!(err.config_key(), Some(ConfigKey::AuthMechanism));
    }

    #[test]
    fn test_debug_redacts_password() {
        let credential = CredentialResolver::new("app")
            .resolve(Some("u"), Some("hunter2"))
            .unwrap()
            .unwrap();
        assert!(!format!("{:?}", credential).contains("hunter2"));
    }
}
