//! OAuth 2.1 error responses and bearer challenges.
//!
//! Provides helpers for building `WWW-Authenticate` headers as required by
//! [RFC 6750 §3](https://datatracker.ietf.org/doc/html/rfc6750#section-3) and
//! the [MCP Authorization specification](https://modelcontextprotocol.io/specification/draft/basic/authorization),
//! and the `{error, error_description}` body used by authorization and token
//! endpoints ([RFC 6749 §5.2](https://datatracker.ietf.org/doc/html/rfc6749#section-5.2)).

use axum::{Json, response::IntoResponse};
use http::{HeaderValue, StatusCode};
use serde::Serialize;
use thiserror::Error;

/// Configuration for an MCP server acting as an OAuth 2.1 resource server.
///
/// Used to generate RFC 6750 `WWW-Authenticate` headers in 401
/// responses.
#[derive(Clone, Debug)]
pub struct ResourceServerConfig {
    /// URL to the Protected Resource Metadata document (RFC 9728).
    ///
    /// Included as `resource_metadata="..."` in `WWW-Authenticate` headers.
    pub resource_metadata_url: String,
    /// Default scopes to include in 401 `WWW-Authenticate` challenges.
    pub default_scope: Option<String>,
}

/// Build a `WWW-Authenticate` header value for a 401 Unauthorized response.
///
/// Format: `Bearer resource_metadata="<url>"[, scope="<scopes>"]`
///
/// Per [RFC 9728 §5.1](https://datatracker.ietf.org/doc/html/rfc9728#name-www-authenticate-response)
/// and MCP authorization.
pub fn www_authenticate_401(config: &ResourceServerConfig) -> HeaderValue {
    let mut value = format!(
        "Bearer resource_metadata=\"{}\"",
        config.resource_metadata_url,
    );
    if let Some(ref scope) = config.default_scope {
        value.push_str(&format!(", scope=\"{scope}\""));
    }
    // Safe: we control the format and it's valid ASCII.
    HeaderValue::from_str(&value).expect("valid WWW-Authenticate header")
}

/// Standard OAuth error codes used by this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthErrorCode {
    InvalidRequest,
    InvalidClient,
    InvalidGrant,
    AccessDenied,
    ServerError,
}

impl OAuthErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::AccessDenied => "access_denied",
            Self::ServerError => "server_error",
        }
    }

    /// The status an endpoint answers with unless told otherwise.
    fn default_status(self) -> StatusCode {
        match self {
            Self::InvalidClient => StatusCode::UNAUTHORIZED,
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl std::fmt::Display for OAuthErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An OAuth error response.
///
/// Serialises as `{"error": "...", "error_description": "..."}`.
#[derive(Clone, Debug, Error)]
#[error("{code}: {}", .description.as_deref().unwrap_or("no description"))]
pub struct OAuthError {
    pub code: OAuthErrorCode,
    pub description: Option<String>,
    pub status: StatusCode,
}

#[derive(Serialize)]
struct OAuthErrorBody<'a> {
    error: OAuthErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_description: Option<&'a str>,
}

impl OAuthError {
    pub fn new(code: OAuthErrorCode) -> Self {
        Self {
            code,
            description: None,
            status: code.default_status(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::InvalidRequest).with_description(description)
    }

    pub fn invalid_client(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::InvalidClient).with_description(description)
    }

    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::InvalidGrant).with_description(description)
    }

    pub fn server_error(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::ServerError).with_description(description)
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> axum::response::Response {
        let body = OAuthErrorBody {
            error: self.code,
            error_description: self.description.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use crate::auth::oauth::{OAuthError, ResourceServerConfig, www_authenticate_401};
    use axum::response::IntoResponse;
    use http::StatusCode;

    #[test]
    fn challenge_includes_scope() {
        let config = ResourceServerConfig {
            resource_metadata_url: "https://x.example/.well-known/oauth-protected-resource".into(),
            default_scope: Some("mcp".into()),
        };
        assert_eq!(
            www_authenticate_401(&config),
            "Bearer resource_metadata=\"https://x.example/.well-known/oauth-protected-resource\", scope=\"mcp\""
        );
    }

    #[test]
    fn default_statuses() {
        assert_eq!(OAuthError::invalid_client("x").status, StatusCode::UNAUTHORIZED);
        assert_eq!(OAuthError::invalid_grant("x").status, StatusCode::BAD_REQUEST);
        assert_eq!(
            OAuthError::invalid_client("x").with_status(StatusCode::BAD_REQUEST).status,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn body_shape() {
        let response = OAuthError::invalid_grant("Code expired").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "invalid_grant");
        assert_eq!(body["error_description"], "Code expired");
    }
}
