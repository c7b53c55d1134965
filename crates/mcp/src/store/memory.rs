//! In-process [`CredentialStore`] backed by a single `RwLock`.
//!
//! Conditional writes take the write lock for both the check and the
//! update, which makes them atomic with respect to each other.

use crate::store::{AuthorizationCode, ClientRecord, CredentialStore, StoreError, TokenRecord};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    clients: HashMap<String, ClientRecord>,
    /// Keyed by code hash.
    codes: HashMap<String, AuthorizationCode>,
    /// Keyed by token id.
    tokens: HashMap<String, TokenRecord>,
    /// When set, every operation fails with this backend message.
    outage: Option<String>,
}

impl Tables {
    fn available(&self) -> Result<(), StoreError> {
        match &self.outage {
            Some(message) => Err(StoreError::Backend(message.clone())),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    inner: Arc<RwLock<Tables>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following operation fail with `message`, or recover.
    pub async fn set_outage(&self, message: Option<&str>) {
        self.inner.write().await.outage = message.map(str::to_string);
    }
}

impl CredentialStore for MemoryCredentialStore {
    async fn insert_client(&self, client: ClientRecord) -> Result<(), StoreError> {
        let mut tables = self.inner.write().await;
        tables.available()?;
        if tables.clients.contains_key(&client.client_id) {
            return Err(StoreError::Conflict("oauth_clients.client_id".into()));
        }
        tables.clients.insert(client.client_id.clone(), client);
        Ok(())
    }

    async fn client(&self, client_id: &str) -> Result<Option<ClientRecord>, StoreError> {
        let tables = self.inner.read().await;
        tables.available()?;
        Ok(tables.clients.get(client_id).cloned())
    }

    async fn insert_code(&self, code: AuthorizationCode) -> Result<(), StoreError> {
        let mut tables = self.inner.write().await;
        tables.available()?;
        if tables.codes.contains_key(&code.code_hash) {
            return Err(StoreError::Conflict("oauth_codes.code_hash".into()));
        }
        tables.codes.insert(code.code_hash.clone(), code);
        Ok(())
    }

    async fn code(
        &self,
        code_hash: &str,
        client_id: &str,
    ) -> Result<Option<AuthorizationCode>, StoreError> {
        let tables = self.inner.read().await;
        tables.available()?;
        Ok(tables
            .codes
            .get(code_hash)
            .filter(|code| code.client_id == client_id)
            .cloned())
    }

    async fn consume_code(&self, code_hash: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut tables = self.inner.write().await;
        tables.available()?;
        match tables.codes.get_mut(code_hash) {
            Some(code) if code.used_at.is_none() && !code.is_expired(now) => {
                code.used_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_token(
        &self,
        token: TokenRecord,
        active_limit: Option<usize>,
    ) -> Result<(), StoreError> {
        let mut tables = self.inner.write().await;
        tables.available()?;
        if tables
            .tokens
            .values()
            .any(|existing| existing.token_hash == token.token_hash)
        {
            return Err(StoreError::Conflict("mcp_tokens.token_hash".into()));
        }
        if let Some(limit) = active_limit {
            let active = tables
                .tokens
                .values()
                .filter(|existing| existing.user_id == token.user_id && existing.is_active())
                .count();
            if active >= limit {
                return Err(StoreError::TokenLimit(limit));
            }
        }
        tables.tokens.insert(token.id.clone(), token);
        Ok(())
    }

    async fn active_token(&self, token_hash: &str) -> Result<Option<TokenRecord>, StoreError> {
        let tables = self.inner.read().await;
        tables.available()?;
        Ok(tables
            .tokens
            .values()
            .find(|token| token.token_hash == token_hash && token.is_active())
            .cloned())
    }

    async fn token(&self, id: &str) -> Result<Option<TokenRecord>, StoreError> {
        let tables = self.inner.read().await;
        tables.available()?;
        Ok(tables.tokens.get(id).cloned())
    }

    async fn touch_token(&self, id: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut tables = self.inner.write().await;
        tables.available()?;
        if let Some(token) = tables.tokens.get_mut(id).filter(|token| token.is_active()) {
            token.last_used_at = Some(now);
        }
        Ok(())
    }

    async fn rotate_token(&self, id: &str, token_hash: String) -> Result<bool, StoreError> {
        let mut tables = self.inner.write().await;
        tables.available()?;
        if tables
            .tokens
            .values()
            .any(|existing| existing.id != id && existing.token_hash == token_hash)
        {
            return Err(StoreError::Conflict("mcp_tokens.token_hash".into()));
        }
        match tables.tokens.get_mut(id) {
            Some(token) if token.is_active() => {
                token.token_hash = token_hash;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_token(&self, id: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut tables = self.inner.write().await;
        tables.available()?;
        match tables.tokens.get_mut(id) {
            Some(token) if token.is_active() => {
                token.revoked_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn user_tokens(&self, user_id: &str) -> Result<Vec<TokenRecord>, StoreError> {
        let tables = self.inner.read().await;
        tables.available()?;
        let mut tokens: Vec<_> = tables
            .tokens
            .values()
            .filter(|token| token.user_id == user_id)
            .cloned()
            .collect();
        tokens.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tokens)
    }
}
