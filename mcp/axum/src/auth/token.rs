//! Token authentication over an ordered list of credential sources.
//!
//! A credential may arrive as a bearer token, in a dedicated header such as
//! `x-api-key`, or as a query parameter. [`TokenAuth`] checks its sources in
//! the order they were added and validates the *first* credential present;
//! later sources are never consulted once an earlier one yielded a value,
//! even if validation of that value fails.
//!
//! ```rust,ignore
//! use mcp_axum::auth::{AuthLayer, CredentialSource, TokenAuth};
//!
//! let auth = TokenAuth::new(KeyStore)
//!     .source(CredentialSource::Bearer)
//!     .source(CredentialSource::header("x-api-key"))
//!     .source(CredentialSource::query("token"));
//!
//! let app = axum::Router::new()
//!     .route("/rpc", axum::routing::post(rpc))
//!     .layer(AuthLayer::new(auth).optional());
//! ```

use crate::auth::{Authenticator, Validator, parse_bearer};
use axum::extract::Query;
use std::collections::HashMap;
use thiserror::Error;

/// Why [`TokenAuth`] produced no claims.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum TokenError<E> {
    /// No source carried a credential.
    #[error("missing credential (expected one of: {0})")]
    Missing(String),
    /// The validator rejected the credential or failed to check it.
    #[error("{0}")]
    Invalid(E),
}

/// Where a credential can be read from.
#[derive(Clone, Debug)]
pub enum CredentialSource {
    /// `Authorization: Bearer <token>`.
    Bearer,
    /// The raw value of a named header.
    Header(http::HeaderName),
    /// A query string parameter.
    Query(String),
}

impl CredentialSource {
    pub fn header<H>(header: H) -> Self
    where
        H: TryInto<http::HeaderName>,
        H::Error: std::fmt::Debug,
    {
        Self::Header(header.try_into().expect("valid header name"))
    }

    pub fn query(name: impl Into<String>) -> Self {
        Self::Query(name.into())
    }

    /// Read the credential from the request, if this source carries one.
    pub fn extract(&self, parts: &http::request::Parts) -> Option<String> {
        let value = match self {
            Self::Bearer => parts
                .headers
                .get(http::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_bearer)
                .map(str::to_string),
            Self::Header(name) => parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string()),
            Self::Query(name) => Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(mut params)| params.remove(name))
                .map(|v| v.trim().to_string()),
        };
        value.filter(|v| !v.is_empty())
    }

    fn describe(&self) -> String {
        match self {
            Self::Bearer => "Authorization: Bearer".into(),
            Self::Header(name) => format!("{name} header"),
            Self::Query(name) => format!("{name} query parameter"),
        }
    }
}

/// Token authenticator.
///
/// Extracts the first available credential and passes it to the inner
/// [`Validator`].
#[derive(Clone)]
pub struct TokenAuth<V> {
    sources: Vec<CredentialSource>,
    validator: V,
}

impl<V> TokenAuth<V> {
    /// An authenticator with no sources; add them with [`TokenAuth::source`].
    pub fn new(validator: V) -> Self {
        Self {
            sources: Vec::new(),
            validator,
        }
    }

    /// An authenticator reading only `Authorization: Bearer`.
    pub fn bearer(validator: V) -> Self {
        Self::new(validator).source(CredentialSource::Bearer)
    }

    /// Append a source with lower precedence than those already added.
    pub fn source(mut self, source: CredentialSource) -> Self {
        self.sources.push(source);
        self
    }

    /// The first credential present in the request.
    pub fn credential(&self, parts: &http::request::Parts) -> Option<String> {
        self.sources.iter().find_map(|source| source.extract(parts))
    }
}

impl<V> Authenticator for TokenAuth<V>
where
    V: Validator,
{
    type Claims = V::Claims;
    type Error = TokenError<V::Error>;

    async fn authenticate(
        &self,
        parts: &http::request::Parts,
    ) -> Result<Self::Claims, Self::Error> {
        let Some(credential) = self.credential(parts) else {
            let expected = self
                .sources
                .iter()
                .map(CredentialSource::describe)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(TokenError::Missing(expected));
        };

        self.validator
            .validate(&credential)
            .await
            .map_err(TokenError::Invalid)
    }
}
