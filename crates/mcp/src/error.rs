//! The error taxonomy shared by every endpoint.
//!
//! Handlers return [`Error`]; the HTTP surface decides the wire format:
//! OAuth endpoints answer `{error, error_description}` through
//! [`OAuthError`], the JSON-RPC endpoint answers `{code, message}` through
//! [`RpcError`], and the personal token endpoints answer `{error}`.

use crate::data::DataError;
use crate::rpc::RpcError;
use crate::store::StoreError;
use axum::{Json, response::IntoResponse};
use http::StatusCode;
use mcp_axum::auth::oauth::{OAuthError, OAuthErrorCode};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    InvalidClient(String),
    #[error("{0}")]
    InvalidGrant(String),
    #[error("authentication required")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    /// A downstream store failed; the message is its own.
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Server(String),
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TokenLimit(_) => Self::InvalidRequest(err.to_string()),
            StoreError::Backend(message) => Self::Upstream(message),
            StoreError::Conflict(_) => Self::Server(err.to_string()),
        }
    }
}

impl From<DataError> for Error {
    fn from(err: DataError) -> Self {
        match err {
            DataError::NotFound(_) => Self::NotFound(err.to_string()),
            DataError::Backend(message) => Self::Upstream(message),
        }
    }
}

impl From<Error> for OAuthError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidRequest(d) => OAuthError::invalid_request(d),
            Error::InvalidClient(d) => OAuthError::invalid_client(d),
            Error::InvalidGrant(d) => OAuthError::invalid_grant(d),
            Error::Unauthorized => OAuthError::new(OAuthErrorCode::AccessDenied)
                .with_description("authentication required")
                .with_status(StatusCode::UNAUTHORIZED),
            Error::Forbidden(d) => OAuthError::new(OAuthErrorCode::AccessDenied).with_description(d),
            Error::NotFound(d) => OAuthError::invalid_request(d).with_status(StatusCode::NOT_FOUND),
            Error::Upstream(d) | Error::Server(d) => OAuthError::server_error(d),
        }
    }
}

impl From<Error> for RpcError {
    fn from(err: Error) -> Self {
        let code = match err {
            Error::InvalidRequest(_) => RpcError::INVALID_PARAMS,
            Error::Unauthorized | Error::InvalidClient(_) | Error::InvalidGrant(_) => {
                RpcError::UNAUTHORIZED
            }
            Error::Forbidden(_) => RpcError::FORBIDDEN,
            Error::NotFound(_) => RpcError::NOT_FOUND,
            Error::Upstream(_) => RpcError::UPSTREAM,
            Error::Server(_) => RpcError::INTERNAL_ERROR,
        };
        RpcError::new(code, err.to_string())
    }
}

impl Error {
    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidGrant(_) | Self::Upstream(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::InvalidClient(_) | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `{"error": message}`, used by the first-party token management API.
impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}
