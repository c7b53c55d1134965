//! Authentication middleware for MCP servers.
//!
//! Provides a tower middleware that validates incoming requests using a
//! user-defined [`Authenticator`] trait. On success, the authenticated
//! claims are inserted into HTTP extensions and become accessible in
//! handlers via `Extension(claims): Extension<Claims>`.
//!
//! The layer runs in one of two modes:
//!
//! - **strict** (the default): failures are answered with `401` before the
//!   inner service runs. When configured with a
//!   [`ResourceServerConfig`](oauth::ResourceServerConfig), the response
//!   carries a `WWW-Authenticate` challenge.
//! - **optional**: the request always reaches the inner service, with a
//!   `Result<Claims, Error>` extension carrying the outcome. Use this when
//!   the handler itself decides the consequence, e.g. a JSON-RPC endpoint
//!   whose handshake methods are public and which must tell a missing
//!   credential apart from a failing credential store.
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_axum::auth::{AuthLayer, TokenAuth, Validator};
//! use mcp_axum::auth::oauth::ResourceServerConfig;
//!
//! #[derive(Clone)]
//! struct MyValidator;
//!
//! impl Validator for MyValidator {
//!     type Claims = String;
//!     type Error = String;
//!
//!     async fn validate(&self, token: &str) -> Result<String, String> {
//!         // validate token...
//!         Ok("user1".into())
//!     }
//! }
//!
//! let rs_config = ResourceServerConfig {
//!     resource_metadata_url:
//!         "https://mcp.example.com/.well-known/oauth-protected-resource".into(),
//!     default_scope: Some("mcp".into()),
//! };
//!
//! let app = axum::Router::new()
//!     .route("/tokens", axum::routing::get(list))
//!     .layer(AuthLayer::new(TokenAuth::bearer(MyValidator)).with_resource_server(rs_config));
//! ```

mod bearer;
mod token;

pub mod oauth;

pub use bearer::parse_bearer;
pub use token::{CredentialSource, TokenAuth, TokenError};

use futures::future::BoxFuture;
use http::{Request, Response, StatusCode};
use oauth::{ResourceServerConfig, www_authenticate_401};
use std::task::{Context, Poll};

/// Trait for validating incoming requests.
///
/// Implement this with your auth logic (token lookup, session cookie, etc.).
/// On success, `Claims` is inserted into `http::Extensions`.
pub trait Authenticator: Clone + Send + Sync + 'static {
    /// The claims type produced on successful authentication.
    type Claims: Clone + Send + Sync + 'static;

    /// The error type returned on authentication failure.
    type Error: std::fmt::Display + Clone + Send + Sync + 'static;

    /// Validate the request and return claims, or an error.
    fn authenticate(
        &self,
        parts: &http::request::Parts,
    ) -> impl Future<Output = Result<Self::Claims, Self::Error>> + Send;
}

/// Trait for validating a credential string (e.g., a Bearer token).
///
/// Users implement this to provide their validation logic, then wrap it
/// in [`TokenAuth`] which handles credential extraction from the request.
pub trait Validator: Clone + Send + Sync + 'static {
    /// The claims type produced on successful validation.
    type Claims: Clone + Send + Sync + 'static;

    /// The error type returned on validation failure.
    type Error: std::fmt::Display + Clone + Send + Sync + 'static;

    /// Validate the credential string and return claims, or an error.
    fn validate(
        &self,
        credential: &str,
    ) -> impl Future<Output = Result<Self::Claims, Self::Error>> + Send;
}

/// Tower [`Layer`](tower::Layer) that applies [`AuthService`].
#[derive(Clone)]
pub struct AuthLayer<A> {
    authenticator: A,
    resource_server: Option<ResourceServerConfig>,
    optional: bool,
}

impl<A> AuthLayer<A> {
    pub fn new(authenticator: A) -> Self {
        Self {
            authenticator,
            resource_server: None,
            optional: false,
        }
    }

    /// Configure OAuth resource server metadata for standard error
    /// responses.
    ///
    /// When set, strict-mode 401 responses include a `WWW-Authenticate`
    /// header with `resource_metadata` and `scope` parameters.
    pub fn with_resource_server(mut self, config: ResourceServerConfig) -> Self {
        self.resource_server = Some(config);
        self
    }

    /// Forward unauthenticated requests instead of rejecting them.
    ///
    /// The inner service sees a `Result<Claims, Error>` extension instead
    /// of `Claims`.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

impl<A, S> tower::Layer<S> for AuthLayer<A>
where
    A: Clone,
{
    type Service = AuthService<A, S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            authenticator: self.authenticator.clone(),
            resource_server: self.resource_server.clone(),
            optional: self.optional,
            inner,
        }
    }
}

/// Tower service that authenticates requests before forwarding them.
#[derive(Clone)]
pub struct AuthService<A, S> {
    authenticator: A,
    resource_server: Option<ResourceServerConfig>,
    optional: bool,
    inner: S,
}

impl<A, S, B> tower::Service<Request<B>> for AuthService<A, S>
where
    A: Authenticator,
    S: tower::Service<Request<B>, Response = Response<axum::body::Body>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Send,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let authenticator = self.authenticator.clone();
        let resource_server = self.resource_server.clone();
        let optional = self.optional;
        let mut inner = self.inner.clone();
        // swap to ensure poll_ready state is preserved
        std::mem::swap(&mut self.inner, &mut inner);

        Box::pin(async move {
            let (parts, body) = req.into_parts();

            let outcome = authenticator.authenticate(&parts).await;
            if optional {
                if let Err(ref err) = outcome {
                    tracing::debug!(error = %err, "forwarding unauthenticated request");
                }
                let mut req = Request::from_parts(parts, body);
                req.extensions_mut().insert(outcome);
                return inner.call(req).await;
            }

            match outcome {
                Ok(claims) => {
                    let mut req = Request::from_parts(parts, body);
                    req.extensions_mut().insert(claims);
                    inner.call(req).await
                }
                Err(err) => {
                    let mut builder = Response::builder().status(StatusCode::UNAUTHORIZED);
                    if let Some(ref config) = resource_server {
                        builder = builder
                            .header(http::header::WWW_AUTHENTICATE, www_authenticate_401(config));
                    }
                    let response = builder
                        .body(axum::body::Body::from(err.to_string()))
                        .expect("valid response");
                    Ok(response)
                }
            }
        })
    }
}
