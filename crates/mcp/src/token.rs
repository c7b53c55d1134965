//! The token endpoint: authorization code exchange.
//!
//! Accepts `application/x-www-form-urlencoded` or JSON bodies. Each code can
//! be exchanged once; of two concurrent exchanges of the same code, exactly
//! one succeeds and the other receives `invalid_grant`.

use crate::authorize::SCOPE;
use crate::data::DataStore;
use crate::error::Error;
use crate::secret::{self, ChallengeMethod};
use crate::state::AppState;
use crate::store::CredentialStore;
use axum::{
    Form, Json,
    extract::{FromRequest, Request, State},
};
use chrono::Utc;
use http::header::CONTENT_TYPE;
use mcp_axum::auth::oauth::OAuthError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub resource: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub scope: &'static str,
}

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Exchange an authorization code for a bearer credential.
pub async fn exchange<C, D>(
    state: &AppState<C, D>,
    request: TokenRequest,
) -> Result<TokenResponse, Error>
where
    C: CredentialStore,
    D: DataStore,
{
    let (Some("authorization_code"), Some(code), Some(client_id), Some(client_secret), Some(redirect_uri)) = (
        request.grant_type.as_deref(),
        required(&request.code),
        required(&request.client_id),
        required(&request.client_secret),
        required(&request.redirect_uri),
    ) else {
        return Err(Error::InvalidRequest(
            "grant_type=authorization_code, code, client_id, client_secret, and redirect_uri are required"
                .into(),
        ));
    };

    let credentials = &state.credentials;
    let client = state.bounded(credentials.client(client_id)).await?;
    match client {
        Some(client) if client.client_secret_hash == secret::hash_secret(client_secret) => {}
        _ => return Err(Error::InvalidClient("Invalid client credentials".into())),
    }

    let code_hash = secret::hash_secret(code);
    let now = Utc::now();
    let record = state
        .bounded(credentials.code(&code_hash, client_id))
        .await?
        .ok_or_else(|| Error::InvalidGrant("Unknown code".into()))?;
    if record.used_at.is_some() {
        return Err(Error::InvalidGrant("Code already used".into()));
    }
    if record.is_expired(now) {
        return Err(Error::InvalidGrant("Code expired".into()));
    }
    if record.redirect_uri != redirect_uri {
        return Err(Error::InvalidGrant("redirect_uri mismatch".into()));
    }
    if let (Some(bound), Some(requested)) = (&record.resource, required(&request.resource)) {
        if bound != requested {
            return Err(Error::InvalidGrant("resource mismatch".into()));
        }
    }

    if let Some(challenge) = &record.code_challenge {
        let Some(verifier) = required(&request.code_verifier) else {
            return Err(Error::InvalidRequest("code_verifier is required".into()));
        };
        let method = record.code_challenge_method.as_deref().unwrap_or("plain");
        let method = ChallengeMethod::parse(method)
            .ok_or_else(|| Error::InvalidRequest("Unsupported code_challenge_method".into()))?;
        if !method.verify(verifier, challenge) {
            return Err(Error::InvalidGrant("code_verifier mismatch".into()));
        }
    }

    if !state.bounded(credentials.consume_code(&code_hash, now)).await? {
        tracing::warn!(%client_id, "lost race to consume authorization code");
        return Err(Error::InvalidGrant("Code already used".into()));
    }

    let Some(credential_id) = record.credential_id.as_deref() else {
        return Err(Error::Server("Token not found".into()));
    };
    let access_token = secret::generate_token();
    let rotated = state
        .bounded(credentials.rotate_token(credential_id, secret::hash_secret(&access_token)))
        .await?;
    if !rotated {
        tracing::error!(%client_id, %credential_id, "provisioned credential is missing or revoked");
        return Err(Error::Server("Token not found".into()));
    }

    tracing::info!(%client_id, user_id = %record.user_id, "authorization code exchanged");
    Ok(TokenResponse {
        access_token,
        token_type: "Bearer",
        scope: SCOPE,
    })
}

fn is_json(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().starts_with("application/json"))
}

/// `POST /token`
pub async fn token<C, D>(
    State(state): State<AppState<C, D>>,
    request: Request,
) -> Result<Json<TokenResponse>, OAuthError>
where
    C: CredentialStore,
    D: DataStore,
{
    // Unreadable bodies fall through to the missing-parameter error.
    let params = if is_json(&request) {
        Json::<TokenRequest>::from_request(request, &())
            .await
            .map(|Json(params)| params)
            .unwrap_or_default()
    } else {
        Form::<TokenRequest>::from_request(request, &())
            .await
            .map(|Form(params)| params)
            .unwrap_or_default()
    };
    Ok(Json(exchange(&state, params).await?))
}
