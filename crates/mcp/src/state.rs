use crate::config::Config;
use crate::data::DataStore;
use crate::error::Error;
use crate::store::CredentialStore;
use mcp_axum::auth::oauth::ResourceServerConfig;
use std::sync::Arc;

/// Handles shared by every request. Stores are passed in explicitly so
/// tests can inject in-memory implementations.
pub struct AppState<C, D> {
    pub credentials: C,
    pub data: D,
    pub config: Arc<Config>,
}

impl<C: Clone, D: Clone> Clone for AppState<C, D> {
    fn clone(&self) -> Self {
        Self {
            credentials: self.credentials.clone(),
            data: self.data.clone(),
            config: self.config.clone(),
        }
    }
}

impl<C, D> AppState<C, D>
where
    C: CredentialStore,
    D: DataStore,
{
    pub fn new(credentials: C, data: D, config: Config) -> Self {
        Self {
            credentials,
            data,
            config: Arc::new(config),
        }
    }

    pub fn resource_server(&self) -> ResourceServerConfig {
        ResourceServerConfig {
            resource_metadata_url: self.config.resource_metadata_url(),
            default_scope: None,
        }
    }

    /// Run a store call under the configured timeout.
    pub async fn bounded<T, E>(&self, call: impl Future<Output = Result<T, E>>) -> Result<T, Error>
    where
        E: Into<Error>,
    {
        match tokio::time::timeout(self.config.store_timeout(), call).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(Error::Upstream("data store timed out".into())),
        }
    }
}
