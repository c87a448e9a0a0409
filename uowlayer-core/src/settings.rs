//! Connection settings for the document store.
//!
//! [`DatabaseSettings`] is a plain value object. It is read from a
//! configuration source (a section of a host configuration file, usually
//! named `DatabaseSettings`) and handed to a backend's client builder.
//! Validation is lazy: nothing is checked when the settings are loaded, the
//! client builder calls [`DatabaseSettings::validate`] on first build.
//!
//! Both `snake_case` keys and the `camelCase` spellings used by older host
//! configurations are accepted. The `config` crate folds keys to lowercase
//! before deserialization, so every camelCase alias has a lowercase twin.
//!
//! # Example
//!
//! ```ignore
//! use uowlayer::settings::DatabaseSettings;
//!
//! let settings = DatabaseSettings::load("appsettings.json")?;
//! settings.validate()?;
//! ```

use config::{Config, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{UnitOfWorkError, UnitOfWorkResult};

/// Name of the configuration section settings are read from by default.
pub const DEFAULT_SECTION: &str = "DatabaseSettings";

/// Default server port.
pub const DEFAULT_PORT: u16 = 27017;

/// Credentials used to authenticate against the store.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CredentialSettings {
    /// User name. Authentication is configured only when this is non-empty.
    #[serde(alias = "userName", alias = "username")]
    pub login: String,
    /// Password. Never serialized back out.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Authentication mechanism name (`SCRAM-SHA-256`, `MONGODB-X509`, ...).
    /// The driver negotiates one when absent.
    pub mechanism: Option<String>,
}

impl fmt::Debug for CredentialSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSettings")
            .field("login", &self.login)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("mechanism", &self.mechanism)
            .finish()
    }
}

/// Settings used to build a client and bind the database.
///
/// A present `connection_string` takes absolute precedence over every other
/// connection field. `database_name` is always required.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseSettings {
    #[serde(alias = "connectionString", alias = "connectionstring")]
    pub connection_string: Option<String>,
    #[serde(alias = "applicationName", alias = "applicationname")]
    pub application_name: Option<String>,
    #[serde(alias = "databaseName", alias = "databasename")]
    pub database_name: String,
    #[serde(alias = "mongoDbHosts", alias = "mongodbhosts")]
    pub hosts: Vec<String>,
    #[serde(
        alias = "replicaSetName",
        alias = "replicasetname",
        alias = "mongoDbReplicaSetName",
        alias = "mongodbreplicasetname"
    )]
    pub replica_set_name: Option<String>,
    #[serde(alias = "mongoDbPort", alias = "mongodbport")]
    pub port: u16,
    /// Log every command sent to the server at `debug` level.
    #[serde(
        alias = "verboseLogging",
        alias = "verboselogging",
        alias = "mongoDbVerboseLogging",
        alias = "mongodbverboselogging"
    )]
    pub verbose_logging: bool,
    #[serde(alias = "directConnection", alias = "directconnection")]
    pub direct_connection: bool,
    pub credential: Option<CredentialSettings>,
    #[serde(alias = "useTls", alias = "usetls")]
    pub use_tls: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            connection_string: None,
            application_name: None,
            database_name: String::new(),
            hosts: Vec::new(),
            replica_set_name: None,
            port: DEFAULT_PORT,
            verbose_logging: false,
            direct_connection: false,
            credential: None,
            use_tls: false,
        }
    }
}

impl DatabaseSettings {
    /// Creates settings for the given database name with every other field defaulted.
    pub fn new(database_name: impl Into<String>) -> Self {
        Self {
            database_name: database_name.into(),
            ..Self::default()
        }
    }

    /// Sets the connection string, which overrides every other connection field.
    pub fn with_connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = Some(connection_string.into());
        self
    }

    /// Adds a host to the server list.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.hosts.push(host.into());
        self
    }

    /// Sets the port shared by every host.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the replica-set name.
    pub fn with_replica_set(mut self, replica_set_name: impl Into<String>) -> Self {
        self.replica_set_name = Some(replica_set_name.into());
        self
    }

    /// Sets the application name reported to the server.
    pub fn with_application_name(mut self, application_name: impl Into<String>) -> Self {
        self.application_name = Some(application_name.into());
        self
    }

    /// Sets the login credential.
    pub fn with_credential(mut self, login: impl Into<String>, password: impl Into<String>) -> Self {
        self.credential = Some(CredentialSettings {
            login: login.into(),
            password: Some(password.into()),
            mechanism: None,
        });
        self
    }

    /// Enables or disables command logging.
    pub fn with_verbose_logging(mut self, verbose_logging: bool) -> Self {
        self.verbose_logging = verbose_logging;
        self
    }

    /// Enables or disables direct connection to a single host.
    pub fn with_direct_connection(mut self, direct_connection: bool) -> Self {
        self.direct_connection = direct_connection;
        self
    }

    /// Enables or disables TLS.
    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// Returns the connection string when one is configured and non-blank.
    pub fn effective_connection_string(&self) -> Option<&str> {
        self.connection_string
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Checks that the settings are sufficient to build a client.
    ///
    /// # Errors
    ///
    /// Returns [`UnitOfWorkError::Configuration`] when the database name is
    /// missing, or, without a connection string, when the host list is empty,
    /// contains a blank entry, or the port is zero.
    pub fn validate(&self) -> UnitOfWorkResult<()> {
        if self.database_name.trim().is_empty() {
            return Err(UnitOfWorkError::Configuration(
                "database name is required".to_string(),
            ));
        }

        if self.effective_connection_string().is_some() {
            return Ok(());
        }

        if self.hosts.is_empty() {
            return Err(UnitOfWorkError::Configuration(
                "at least one host is required when no connection string is set".to_string(),
            ));
        }

        if let Some(position) = self.hosts.iter().position(|host| host.trim().is_empty()) {
            return Err(UnitOfWorkError::Configuration(format!(
                "host at position {} is blank",
                position
            )));
        }

        if self.port == 0 {
            return Err(UnitOfWorkError::Configuration("port must be non-zero".to_string()));
        }

        Ok(())
    }

    /// Reads settings from `section` of an already built configuration.
    ///
    /// # Errors
    ///
    /// Returns [`UnitOfWorkError::Configuration`] when the section is missing
    /// or cannot be deserialized.
    pub fn from_config(config: &Config, section: &str) -> UnitOfWorkResult<Self> {
        Ok(config.get::<DatabaseSettings>(section)?)
    }

    /// Reads settings from the [`DEFAULT_SECTION`] of a configuration file.
    /// The file format (JSON, TOML, YAML) follows the file extension.
    ///
    /// # Errors
    ///
    /// Returns [`UnitOfWorkError::Configuration`] when the file cannot be read
    /// or the section is missing or malformed.
    pub fn load(path: impl AsRef<Path>) -> UnitOfWorkResult<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?;

        Self::from_config(&config, DEFAULT_SECTION)
    }
}
