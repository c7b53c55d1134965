//! First-party management of a user's own MCP credentials.
//!
//! Signed-in users can list their credentials, mint personal ones (at most
//! [`ACTIVE_TOKEN_LIMIT`] unrevoked at a time) and revoke any of theirs,
//! including those issued to OAuth clients.

use crate::data::DataStore;
use crate::error::Error;
use crate::secret;
use crate::session::{SessionAuth, SessionUser};
use crate::state::AppState;
use crate::store::{CredentialStore, TokenRecord};
use axum::{
    Extension, Json, Router,
    body::Bytes,
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get},
};
use chrono::{DateTime, Utc};
use http::StatusCode;
use mcp_axum::auth::AuthLayer;
use serde::{Deserialize, Serialize};

pub const ACTIVE_TOKEN_LIMIT: usize = 5;
const MAX_LABEL_CHARS: usize = 80;
const DEFAULT_LABEL: &str = "Personal MCP token";

/// A credential as shown to its owner. The hash never leaves the store.
#[derive(Debug, Serialize)]
pub struct TokenView {
    pub id: String,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl From<TokenRecord> for TokenView {
    fn from(token: TokenRecord) -> Self {
        Self {
            id: token.id,
            label: token.label,
            created_at: token.created_at,
            last_used_at: token.last_used_at,
            revoked_at: token.revoked_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct CreateToken {
    label: Option<String>,
}

fn normalize_label(label: Option<&str>) -> String {
    let label: String = label
        .unwrap_or_default()
        .trim()
        .chars()
        .take(MAX_LABEL_CHARS)
        .collect();
    if label.is_empty() {
        DEFAULT_LABEL.to_string()
    } else {
        label
    }
}

async fn list<C, D>(
    State(state): State<AppState<C, D>>,
    Extension(user): Extension<SessionUser>,
) -> Result<impl IntoResponse, Error>
where
    C: CredentialStore,
    D: DataStore,
{
    let tokens = state
        .bounded(state.credentials.user_tokens(&user.user_id))
        .await?;
    let tokens: Vec<TokenView> = tokens.into_iter().map(Into::into).collect();
    Ok(Json(serde_json::json!({ "tokens": tokens })))
}

async fn create<C, D>(
    State(state): State<AppState<C, D>>,
    Extension(user): Extension<SessionUser>,
    body: Bytes,
) -> Result<impl IntoResponse, Error>
where
    C: CredentialStore,
    D: DataStore,
{
    let request: CreateToken = serde_json::from_slice(&body).unwrap_or_default();
    let raw = secret::generate_token();
    let token = TokenRecord::new(
        &user.user_id,
        normalize_label(request.label.as_deref()),
        secret::hash_secret(&raw),
    );
    state
        .bounded(
            state
                .credentials
                .insert_token(token.clone(), Some(ACTIVE_TOKEN_LIMIT)),
        )
        .await?;

    tracing::info!(user_id = %user.user_id, token_id = %token.id, "personal credential created");
    let record = TokenView::from(token);
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "token": raw, "record": record })),
    ))
}

async fn revoke<C, D>(
    State(state): State<AppState<C, D>>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Error>
where
    C: CredentialStore,
    D: DataStore,
{
    let token = state.bounded(state.credentials.token(&id)).await?;
    match token {
        Some(token) if token.user_id == user.user_id => {
            if token.is_active() {
                state
                    .bounded(state.credentials.revoke_token(&id, Utc::now()))
                    .await?;
                tracing::info!(user_id = %user.user_id, token_id = %id, "credential revoked");
            }
            Ok(Json(serde_json::json!({ "ok": true })))
        }
        _ => Err(Error::NotFound("Token not found".into())),
    }
}

/// `/tokens` routes, behind session authentication.
pub fn routes<C, D>(state: &AppState<C, D>) -> Router<AppState<C, D>>
where
    C: CredentialStore,
    D: DataStore,
{
    Router::new()
        .route("/tokens", get(list::<C, D>).post(create::<C, D>))
        .route("/tokens/{id}", delete(revoke::<C, D>))
        .layer(AuthLayer::new(SessionAuth::new(state.clone())))
}
