//! # meetup-mcp
//!
//! OAuth 2.0 authorization server and JSON-RPC tool gateway for a community
//! meetup app. Third-party agents register as clients, obtain a bearer
//! credential through the authorization code grant with PKCE, and call the
//! tool catalog at `/rpc`.
//!
//! ```rust,ignore
//! use meetup_mcp::{AppState, Config, data::MemoryDataStore, router, store::MemoryCredentialStore};
//!
//! let state = AppState::new(MemoryCredentialStore::new(), MemoryDataStore::new(), Config::default());
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//! axum::serve(listener, router(state)).await?;
//! ```
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `POST /register` | dynamic client registration |
//! | `GET, POST /authorize` | consent and code issuance |
//! | `POST /token` | code exchange |
//! | `GET, POST /rpc` | endpoint description, JSON-RPC calls |
//! | `GET, POST /tokens`, `DELETE /tokens/{id}` | personal credentials |
//! | `GET /.well-known/oauth-*` | discovery documents |
//! | `GET /health` | liveness and endpoint map |

pub mod authorize;
pub mod config;
pub mod data;
pub mod error;
pub mod personal;
pub mod registry;
pub mod resolver;
pub mod rpc;
pub mod secret;
pub mod session;
pub mod state;
pub mod store;
pub mod token;
pub mod tools;

pub use config::Config;
pub use error::Error;
pub use state::AppState;

use authorize::SCOPE;
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::Utc;
use data::DataStore;
use mcp_axum::auth::AuthLayer;
use mcp_axum::auth::oauth::{
    AuthorizationServerMetadata, ProtectedResourceMetadata, metadata_router,
};
use resolver::CredentialResolver;
use serde_json::{Value, json};
use store::CredentialStore;

fn protected_resource(config: &Config) -> ProtectedResourceMetadata {
    ProtectedResourceMetadata {
        resource: config.url("/rpc"),
        authorization_servers: vec![config.url("")],
        scopes_supported: Some(vec![SCOPE.into()]),
        token_types_supported: Some(vec!["Bearer".into()]),
        bearer_methods_supported: Some(vec!["header".into()]),
        resource_documentation: Some(config.url("/tokens")),
    }
}

fn authorization_server(config: &Config) -> AuthorizationServerMetadata {
    AuthorizationServerMetadata {
        issuer: config.url(""),
        authorization_endpoint: config.url("/authorize"),
        token_endpoint: config.url("/token"),
        registration_endpoint: Some(config.url("/register")),
        response_types_supported: vec!["code".into()],
        grant_types_supported: vec!["authorization_code".into()],
        token_endpoint_auth_methods_supported: vec!["client_secret_post".into()],
        code_challenge_methods_supported: vec!["S256".into(), "plain".into()],
        scopes_supported: Some(vec![SCOPE.into()]),
    }
}

async fn health<C, D>(State(state): State<AppState<C, D>>) -> Json<Value>
where
    C: CredentialStore,
    D: DataStore,
{
    let config = &state.config;
    Json(json!({
        "status": "ok",
        "app_url": config.url(""),
        "mcp_endpoint": config.url("/rpc"),
        "oauth_authorize": config.url("/authorize"),
        "oauth_token": config.url("/token"),
        "oauth_register": config.url("/register"),
        "time": Utc::now(),
    }))
}

/// The complete application.
pub fn router<C, D>(state: AppState<C, D>) -> Router
where
    C: CredentialStore,
    D: DataStore,
{
    let rpc_auth = AuthLayer::new(CredentialResolver::new(state.clone()).into_auth()).optional();
    let metadata = metadata_router(
        protected_resource(&state.config),
        Some(authorization_server(&state.config)),
    );

    Router::new()
        .route("/health", get(health::<C, D>))
        .route("/register", post(registry::register::<C, D>))
        .route(
            "/authorize",
            get(authorize::authorize::<C, D>).post(authorize::decide::<C, D>),
        )
        .route("/token", post(token::token::<C, D>))
        .route(
            "/rpc",
            get(rpc::info::<C, D>)
                .post(rpc::handle::<C, D>)
                .layer(rpc_auth),
        )
        .merge(personal::routes(&state))
        .with_state(state)
        .merge(metadata)
}
