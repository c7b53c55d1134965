//! Credential store: hashed client secrets, authorization codes, and bearer
//! tokens.
//!
//! The store is the only shared mutable resource of the server. Every write
//! to a code or token row is conditional on its current state, so two
//! concurrent requests can never both consume the same code or resurrect a
//! revoked token.

mod memory;

pub use memory::MemoryCredentialStore;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors from the credential store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend failed; the message is passed through to callers.
    #[error("{0}")]
    Backend(String),
    /// A unique key already exists.
    #[error("duplicate key: {0}")]
    Conflict(String),
    /// The owner already holds the maximum number of active tokens.
    #[error("You already have {0} active MCP tokens. Revoke one before creating another.")]
    TokenLimit(usize),
}

/// A dynamically registered OAuth client.
#[derive(Clone, Debug)]
pub struct ClientRecord {
    pub client_id: String,
    pub client_secret_hash: String,
    pub display_name: String,
    pub redirect_uris: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ClientRecord {
    /// Exact, byte-for-byte membership in the registered redirect URIs.
    pub fn allows_redirect(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|uri| uri == redirect_uri)
    }
}

/// A single-use authorization code, stored by hash.
#[derive(Clone, Debug)]
pub struct AuthorizationCode {
    pub code_hash: String,
    pub client_id: String,
    pub user_id: String,
    pub redirect_uri: String,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub resource: Option<String>,
    /// The credential provisioned when this code was issued.
    pub credential_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl AuthorizationCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A bearer credential, stored by hash.
#[derive(Clone, Debug)]
pub struct TokenRecord {
    pub id: String,
    pub token_hash: String,
    pub user_id: String,
    pub label: String,
    pub oauth_client_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl TokenRecord {
    pub fn new(user_id: &str, label: impl Into<String>, token_hash: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            token_hash,
            user_id: user_id.to_string(),
            label: label.into(),
            oauth_client_id: None,
            created_at: Utc::now(),
            last_used_at: None,
            revoked_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }
}

/// Persistence for hashed credentials.
///
/// Implementations must make the conditional writes
/// ([`consume_code`](CredentialStore::consume_code),
/// [`rotate_token`](CredentialStore::rotate_token),
/// [`revoke_token`](CredentialStore::revoke_token) and the capped
/// [`insert_token`](CredentialStore::insert_token)) atomic with respect to
/// the state they check.
pub trait CredentialStore: Clone + Send + Sync + 'static {
    fn insert_client(
        &self,
        client: ClientRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn client(
        &self,
        client_id: &str,
    ) -> impl Future<Output = Result<Option<ClientRecord>, StoreError>> + Send;

    fn insert_code(
        &self,
        code: AuthorizationCode,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Look up a code by hash, scoped to the client it was issued to.
    fn code(
        &self,
        code_hash: &str,
        client_id: &str,
    ) -> impl Future<Output = Result<Option<AuthorizationCode>, StoreError>> + Send;

    /// Set `used_at` if the code is still unused and unexpired.
    ///
    /// Returns `false` when another request consumed it first.
    fn consume_code(
        &self,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Insert a token. With `active_limit`, fail with
    /// [`StoreError::TokenLimit`] if the owner already holds that many
    /// unrevoked tokens.
    fn insert_token(
        &self,
        token: TokenRecord,
        active_limit: Option<usize>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// The unrevoked token with this hash.
    fn active_token(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = Result<Option<TokenRecord>, StoreError>> + Send;

    fn token(&self, id: &str) -> impl Future<Output = Result<Option<TokenRecord>, StoreError>> + Send;

    fn touch_token(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Replace the hash of an unrevoked token. Returns `false` if the token
    /// is missing or revoked.
    fn rotate_token(
        &self,
        id: &str,
        token_hash: String,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Set `revoked_at` if unset. Returns `false` if it was already revoked
    /// or does not exist.
    fn revoke_token(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// All tokens of a user, newest first.
    fn user_tokens(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<TokenRecord>, StoreError>> + Send;
}
