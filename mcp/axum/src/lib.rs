//! # mcp-axum
//!
//! Extensions for serving MCP endpoints behind OAuth with
//! [axum](https://docs.rs/axum).
//!
//! ## Auth Middleware
//!
//! Provides a pluggable [`Authenticator`](auth::Authenticator) trait and
//! tower middleware for validating requests before they reach the MCP
//! handler.
//!
//! ```rust,ignore
//! use mcp_axum::auth::{AuthLayer, CredentialSource, TokenAuth};
//!
//! let auth = TokenAuth::new(MyValidator)
//!     .source(CredentialSource::Bearer)
//!     .source(CredentialSource::header("x-api-key"));
//!
//! let app = axum::Router::new()
//!     .route("/rpc", axum::routing::post(rpc))
//!     .layer(AuthLayer::new(auth).optional());
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

pub use axum;

pub mod auth;
