//! OAuth 2.0 discovery documents.
//!
//! - Protected Resource Metadata ([RFC 9728](https://datatracker.ietf.org/doc/html/rfc9728)),
//!   which MCP servers MUST serve to indicate their authorization servers.
//! - Authorization Server Metadata ([RFC 8414](https://datatracker.ietf.org/doc/html/rfc8414)),
//!   served by servers that also act as their own authorization server.
//!
//! ```rust,ignore
//! use mcp_axum::auth::oauth::{ProtectedResourceMetadata, metadata_router};
//!
//! let metadata = ProtectedResourceMetadata {
//!     resource: "https://mcp.example.com/rpc".into(),
//!     authorization_servers: vec!["https://mcp.example.com".into()],
//!     scopes_supported: Some(vec!["mcp".into()]),
//!     token_types_supported: Some(vec!["Bearer".into()]),
//!     bearer_methods_supported: Some(vec!["header".into()]),
//!     resource_documentation: None,
//! };
//!
//! let app = axum::Router::new()
//!     .route("/rpc", axum::routing::post(rpc))
//!     .merge(metadata_router(metadata, None));
//! ```

use axum::{Json, response::IntoResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Path of the protected resource metadata document.
pub const PROTECTED_RESOURCE_PATH: &str = "/.well-known/oauth-protected-resource";

/// Path of the authorization server metadata document.
pub const AUTHORIZATION_SERVER_PATH: &str = "/.well-known/oauth-authorization-server";

/// OAuth 2.0 Protected Resource Metadata ([RFC 9728](https://datatracker.ietf.org/doc/html/rfc9728)).
///
/// MCP servers MUST include the `authorization_servers` field containing at
/// least one authorization server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    /// The resource identifier: canonical URI of this MCP server.
    pub resource: String,

    /// Authorization server(s) that can issue tokens for this resource.
    ///
    /// MUST contain at least one entry.
    pub authorization_servers: Vec<String>,

    /// Scopes supported by this resource.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    /// Token types accepted (e.g., `["Bearer"]`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_types_supported: Option<Vec<String>>,

    /// Bearer token methods supported (e.g., `["header"]`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer_methods_supported: Option<Vec<String>>,

    /// URL of the resource documentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_documentation: Option<String>,
}

/// OAuth 2.0 Authorization Server Metadata ([RFC 8414](https://datatracker.ietf.org/doc/html/rfc8414)).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_endpoint: Option<String>,
    pub response_types_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,
}

/// Create an axum [`Router`](axum::Router) that serves the discovery
/// documents.
///
/// The protected resource metadata is served at
/// `/.well-known/oauth-protected-resource`; when `authorization_server` is
/// given, its metadata is served at `/.well-known/oauth-authorization-server`.
/// Both are served as `application/json`.
pub fn metadata_router(
    resource: ProtectedResourceMetadata,
    authorization_server: Option<AuthorizationServerMetadata>,
) -> axum::Router {
    let resource = Arc::new(resource);
    let router = axum::Router::new().route(
        PROTECTED_RESOURCE_PATH,
        axum::routing::get(move || {
            let resource = resource.clone();
            async move { Json(resource.as_ref().clone()).into_response() }
        }),
    );

    match authorization_server {
        Some(metadata) => {
            let metadata = Arc::new(metadata);
            router.route(
                AUTHORIZATION_SERVER_PATH,
                axum::routing::get(move || {
                    let metadata = metadata.clone();
                    async move { Json(metadata.as_ref().clone()).into_response() }
                }),
            )
        }
        None => router,
    }
}
