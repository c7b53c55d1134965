//! OAuth 2.1 support for MCP servers.
//!
//! Implements the server-side requirements of the
//! [MCP Authorization specification](https://modelcontextprotocol.io/specification/draft/basic/authorization):
//!
//! - **Discovery documents**: serve `/.well-known/oauth-protected-resource`
//!   ([RFC 9728](https://datatracker.ietf.org/doc/html/rfc9728)) and, for
//!   servers acting as their own authorization server,
//!   `/.well-known/oauth-authorization-server`
//!   ([RFC 8414](https://datatracker.ietf.org/doc/html/rfc8414)).
//!
//! - **Error responses**: 401 responses with proper `WWW-Authenticate`
//!   headers per [RFC 6750](https://datatracker.ietf.org/doc/html/rfc6750),
//!   and `{error, error_description}` bodies for the authorization and token
//!   endpoints.

mod error;
mod metadata;

pub use error::{OAuthError, OAuthErrorCode, ResourceServerConfig, www_authenticate_401};
pub use metadata::{
    AUTHORIZATION_SERVER_PATH, AuthorizationServerMetadata, PROTECTED_RESOURCE_PATH,
    ProtectedResourceMetadata, metadata_router,
};
