//! Dynamic client registration ([RFC 7591](https://datatracker.ietf.org/doc/html/rfc7591)).
//!
//! Clients are created once and never updated or deleted. The plaintext
//! secret appears only in the registration response.

use crate::data::DataStore;
use crate::error::Error;
use crate::secret;
use crate::state::AppState;
use crate::store::{ClientRecord, CredentialStore};
use axum::{Json, body::Bytes, extract::State, response::IntoResponse};
use chrono::Utc;
use http::StatusCode;
use mcp_axum::auth::oauth::OAuthError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub client_name: Option<String>,
    pub redirect_uris: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct Registration {
    pub client_id: String,
    pub client_secret: String,
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub client_id_issued_at: i64,
    pub token_endpoint_auth_method: &'static str,
    pub grant_types: [&'static str; 1],
    pub response_types: [&'static str; 1],
}

/// Validate and persist a new client.
pub async fn register_client<C: CredentialStore>(
    store: &C,
    request: RegisterRequest,
) -> Result<Registration, Error> {
    let client_name = request
        .client_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    let redirect_uris = request.redirect_uris.unwrap_or_default();
    let Some(client_name) = client_name.filter(|_| !redirect_uris.is_empty()) else {
        return Err(Error::InvalidRequest(
            "client_name and redirect_uris[] are required".into(),
        ));
    };
    if let Some(bad) = redirect_uris.iter().find(|uri| url::Url::parse(uri).is_err()) {
        return Err(Error::InvalidRequest(format!(
            "redirect_uri is not an absolute URL: {bad}"
        )));
    }

    let client_id = secret::generate_client_id();
    let client_secret = secret::generate_client_secret();
    let created_at = Utc::now();
    store
        .insert_client(ClientRecord {
            client_id: client_id.clone(),
            client_secret_hash: secret::hash_secret(&client_secret),
            display_name: client_name.clone(),
            redirect_uris: redirect_uris.clone(),
            created_at,
        })
        .await?;

    tracing::info!(%client_id, %client_name, "registered oauth client");
    Ok(Registration {
        client_id,
        client_secret,
        client_name,
        redirect_uris,
        client_id_issued_at: created_at.timestamp(),
        token_endpoint_auth_method: "client_secret_post",
        grant_types: ["authorization_code"],
        response_types: ["code"],
    })
}

/// `POST /register`
pub async fn register<C, D>(
    State(state): State<AppState<C, D>>,
    body: Bytes,
) -> Result<impl IntoResponse, OAuthError>
where
    C: CredentialStore,
    D: DataStore,
{
    // An unreadable body is treated like an empty one.
    let request: RegisterRequest = serde_json::from_slice(&body).unwrap_or_default();
    let registration = register_client(&state.credentials, request).await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::registry::{RegisterRequest, register_client};
    use crate::secret::hash_secret;
    use crate::store::{CredentialStore, MemoryCredentialStore};

    fn request(name: Option<&str>, uris: &[&str]) -> RegisterRequest {
        RegisterRequest {
            client_name: name.map(Into::into),
            redirect_uris: Some(uris.iter().map(|u| u.to_string()).collect()),
        }
    }

    #[tokio::test]
    async fn stores_only_secret_hash() {
        let store = MemoryCredentialStore::new();
        let registration = register_client(
            &store,
            request(Some("Agent"), &["https://agent.example/callback"]),
        )
        .await
        .unwrap();

        let client = store.client(&registration.client_id).await.unwrap().unwrap();
        assert_eq!(client.client_secret_hash, hash_secret(&registration.client_secret));
        assert_ne!(client.client_secret_hash, registration.client_secret);
        assert_eq!(registration.token_endpoint_auth_method, "client_secret_post");
    }

    #[tokio::test]
    async fn empty_redirect_uris_are_rejected() {
        let store = MemoryCredentialStore::new();
        let err = register_client(&store, request(Some("Agent"), &[])).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn missing_name_is_rejected() {
        let store = MemoryCredentialStore::new();
        let err = register_client(&store, request(None, &["https://a.example/cb"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn relative_redirect_is_rejected() {
        let store = MemoryCredentialStore::new();
        let err = register_client(&store, request(Some("Agent"), &["/callback"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }
}
