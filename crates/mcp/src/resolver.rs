//! Resolves presented bearer credentials to principals.
//!
//! Plugged into [`TokenAuth`](mcp_axum::auth::TokenAuth), which picks the
//! credential from the request. A credential that does not resolve fails
//! with [`Error::Unauthorized`]; store failures keep their own error so the
//! caller is not asked to re-authenticate during an outage.

use crate::data::{DataStore, Role};
use crate::error::Error;
use crate::secret;
use crate::state::AppState;
use crate::store::CredentialStore;
use chrono::Utc;
use mcp_axum::auth::{CredentialSource, TokenAuth, Validator};

/// The authenticated caller of a tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub credential_id: String,
}

impl Principal {
    /// The caller's role, read fresh from the profile on every check.
    /// Users without a profile are members.
    pub async fn role<C, D>(&self, state: &AppState<C, D>) -> Result<Role, Error>
    where
        C: CredentialStore,
        D: DataStore,
    {
        let profile = state.bounded(state.data.profile(&self.user_id)).await?;
        Ok(profile.map(|p| p.role).unwrap_or_default())
    }
}

pub struct CredentialResolver<C, D> {
    state: AppState<C, D>,
}

impl<C: Clone, D: Clone> Clone for CredentialResolver<C, D> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<C, D> CredentialResolver<C, D>
where
    C: CredentialStore,
    D: DataStore,
{
    pub fn new(state: AppState<C, D>) -> Self {
        Self { state }
    }

    /// Bearer header, then `x-api-key`, then the `token` query parameter.
    pub fn into_auth(self) -> TokenAuth<Self> {
        TokenAuth::new(self)
            .source(CredentialSource::Bearer)
            .source(CredentialSource::header("x-api-key"))
            .source(CredentialSource::query("token"))
    }

    fn touch(&self, credential_id: String) {
        let store = self.state.credentials.clone();
        let timeout = self.state.config.store_timeout();
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, store.touch_token(&credential_id, Utc::now())).await
            {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::warn!(%credential_id, error = %err, "failed to record credential use")
                }
                Err(_) => tracing::warn!(%credential_id, "recording credential use timed out"),
            }
        });
    }
}

impl<C, D> Validator for CredentialResolver<C, D>
where
    C: CredentialStore,
    D: DataStore,
{
    type Claims = Principal;
    type Error = Error;

    async fn validate(&self, credential: &str) -> Result<Principal, Error> {
        let token_hash = secret::hash_secret(credential);
        let token = self
            .state
            .bounded(self.state.credentials.active_token(&token_hash))
            .await?
            .ok_or(Error::Unauthorized)?;

        self.touch(token.id.clone());
        Ok(Principal {
            user_id: token.user_id,
            credential_id: token.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::data::{MemoryDataStore, Role};
    use crate::error::Error;
    use crate::resolver::CredentialResolver;
    use crate::secret::hash_secret;
    use crate::state::AppState;
    use crate::store::{CredentialStore, MemoryCredentialStore, TokenRecord};
    use chrono::Utc;
    use mcp_axum::auth::Validator;
    use std::time::Duration;

    async fn state_with_token() -> (AppState<MemoryCredentialStore, MemoryDataStore>, String) {
        let state = AppState::new(
            MemoryCredentialStore::new(),
            MemoryDataStore::new(),
            Config::default(),
        );
        let token = TokenRecord::new("ada", "Personal MCP token", hash_secret("meetmcp_raw"));
        let id = token.id.clone();
        state.credentials.insert_token(token, None).await.unwrap();
        (state, id)
    }

    #[tokio::test]
    async fn resolves_and_records_use() {
        let (state, id) = state_with_token().await;
        let resolver = CredentialResolver::new(state.clone());

        let principal = resolver.validate("meetmcp_raw").await.unwrap();
        assert_eq!(principal.user_id, "ada");
        assert_eq!(principal.role(&state).await.unwrap(), Role::Member);

        for _ in 0..50 {
            let token = state.credentials.token(&id).await.unwrap().unwrap();
            if token.last_used_at.is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("last_used_at was never recorded");
    }

    #[tokio::test]
    async fn revoked_credential_never_resolves() {
        let (state, id) = state_with_token().await;
        state.credentials.revoke_token(&id, Utc::now()).await.unwrap();
        let resolver = CredentialResolver::new(state);
        assert_eq!(
            resolver.validate("meetmcp_raw").await.unwrap_err(),
            Error::Unauthorized
        );
    }

    #[tokio::test]
    async fn store_failure_is_not_unauthorized() {
        let (state, _) = state_with_token().await;
        state.credentials.set_outage(Some("connection refused")).await;
        let resolver = CredentialResolver::new(state);
        assert_eq!(
            resolver.validate("meetmcp_raw").await.unwrap_err(),
            Error::Upstream("connection refused".into())
        );
    }

    #[tokio::test]
    async fn unknown_credential_does_not_resolve() {
        let (state, _) = state_with_token().await;
        let resolver = CredentialResolver::new(state);
        assert!(resolver.validate("meetmcp_other").await.is_err());
    }
}
