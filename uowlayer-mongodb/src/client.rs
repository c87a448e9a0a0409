//! Building the driver client and binding the database from settings.
//!
//! The client is built lazily, once, on first use, and shared by every
//! repository and session created through the same [`DatabaseBuilder`].

use mongodb::{
    Client, Database,
    event::{EventHandler, command::CommandEvent},
    options::{AuthMechanism, ClientOptions, Credential, ServerAddress, Tls, TlsOptions},
    sync,
};
use std::{fmt, str::FromStr, sync::Arc};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use uowlayer_core::{
    error::{UnitOfWorkError, UnitOfWorkResult},
    naming::{CollectionNameSelector, DefaultCollectionNameSelector},
    settings::DatabaseSettings,
};

use crate::error::driver_error;

/// Lazily builds the client described by [`DatabaseSettings`].
///
/// # Example
///
/// ```ignore
/// use uowlayer::settings::DatabaseSettings;
/// use uowlayer_mongodb::DatabaseBuilder;
///
/// let builder = DatabaseBuilder::new(
///     DatabaseSettings::new("shop").with_host("localhost").with_replica_set("rs0"),
/// );
/// let database = builder.database().await?;
/// ```
pub struct DatabaseBuilder {
    settings: DatabaseSettings,
    selector: Arc<dyn CollectionNameSelector>,
    client: OnceCell<Client>,
    blocking_client: OnceCell<sync::Client>,
}

impl fmt::Debug for DatabaseBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseBuilder")
            .field("settings", &self.settings)
            .field("selector", &self.selector)
            .field("connected", &self.client.initialized())
            .finish()
    }
}

impl DatabaseBuilder {
    pub fn new(settings: DatabaseSettings) -> Self {
        Self::with_selector(settings, Arc::new(DefaultCollectionNameSelector))
    }

    /// Creates a builder resolving collection names with `selector`.
    pub fn with_selector(settings: DatabaseSettings, selector: Arc<dyn CollectionNameSelector>) -> Self {
        Self {
            settings,
            selector,
            client: OnceCell::new(),
            blocking_client: OnceCell::new(),
        }
    }

    pub fn settings(&self) -> &DatabaseSettings {
        &self.settings
    }

    pub fn collection_name_selector(&self) -> &Arc<dyn CollectionNameSelector> {
        &self.selector
    }

    /// Returns the shared client, building it on first call.
    ///
    /// # Errors
    ///
    /// Returns [`UnitOfWorkError::Configuration`] when the settings are
    /// invalid, or the driver's error when the client cannot be created.
    pub async fn client(&self) -> UnitOfWorkResult<&Client> {
        self.client
            .get_or_try_init(|| async {
                self.settings.validate()?;

                let client = match self.settings.effective_connection_string() {
                    Some(uri) => Client::with_uri_str(uri).await.map_err(driver_error)?,
                    None => Client::with_options(assemble_options(&self.settings)?).map_err(driver_error)?,
                };
                info!(database = %self.settings.database_name, "client created");

                Ok::<_, UnitOfWorkError>(client)
            })
            .await
    }

    /// Returns the shared blocking client, building it on first call.
    ///
    /// Used by the blocking readiness probe. Must not be called from within
    /// an async runtime worker.
    pub fn blocking_client(&self) -> UnitOfWorkResult<&sync::Client> {
        if let Some(client) = self.blocking_client.get() {
            return Ok(client);
        }

        self.settings.validate()?;
        let client = match self.settings.effective_connection_string() {
            Some(uri) => sync::Client::with_uri_str(uri).map_err(driver_error)?,
            None => sync::Client::with_options(assemble_options(&self.settings)?).map_err(driver_error)?,
        };
        info!(database = %self.settings.database_name, "blocking client created");

        // A concurrent caller may have won the race; its client is kept.
        let _ = self.blocking_client.set(client);
        self.blocking_client
            .get()
            .ok_or_else(|| UnitOfWorkError::Backend("blocking client unavailable".to_string()))
    }

    /// Returns a handle to the configured database.
    pub async fn database(&self) -> UnitOfWorkResult<Database> {
        Ok(self.client().await?.database(&self.settings.database_name))
    }
}

/// Assembles driver options from discrete settings fields.
///
/// Every host is paired with the configured port. Authentication is set
/// only when a non-empty login is present.
pub(crate) fn assemble_options(settings: &DatabaseSettings) -> UnitOfWorkResult<ClientOptions> {
    let mut options = ClientOptions::default();

    options.hosts = settings
        .hosts
        .iter()
        .map(|host| ServerAddress::Tcp {
            host: host.trim().to_string(),
            port: Some(settings.port),
        })
        .collect();
    options.app_name = settings.application_name.clone();
    options.repl_set_name = settings.replica_set_name.clone();
    if settings.direct_connection {
        options.direct_connection = Some(true);
    }
    if settings.use_tls {
        options.tls = Some(Tls::Enabled(TlsOptions::default()));
    }

    if let Some(credential_settings) = settings
        .credential
        .as_ref()
        .filter(|credential| !credential.login.trim().is_empty())
    {
        let mut credential = Credential::default();
        credential.username = Some(credential_settings.login.clone());
        credential.password = credential_settings.password.clone();
        credential.mechanism = credential_settings
            .mechanism
            .as_deref()
            .map(|mechanism| {
                AuthMechanism::from_str(mechanism).map_err(|error| {
                    UnitOfWorkError::Configuration(format!(
                        "unknown authentication mechanism {}: {}",
                        mechanism, error
                    ))
                })
            })
            .transpose()?;
        options.credential = Some(credential);
    }

    if settings.verbose_logging {
        options.command_event_handler = Some(EventHandler::callback(log_command));
    }

    Ok(options)
}

fn log_command(event: CommandEvent) {
    if let CommandEvent::Started(started) = event {
        debug!(
            command = %started.command_name,
            database = %started.db,
            body = %started.command,
            "command started"
        );
    }
}
