//! The authorization endpoint.
//!
//! `GET /authorize` validates the request, sends anonymous users to sign in
//! and shows signed-in users a consent page. The consent form posts back to
//! `POST /authorize`, which re-validates everything before issuing a code or
//! redirecting with `access_denied`.
//!
//! Validation failures are answered directly and never redirect: until the
//! client and redirect URI are known good, the redirect target is untrusted.

use crate::data::DataStore;
use crate::error::Error;
use crate::secret::{self, ChallengeMethod};
use crate::session::current_user;
use crate::state::AppState;
use crate::store::{AuthorizationCode, ClientRecord, CredentialStore, TokenRecord};
use axum::{
    Form,
    extract::{Query, RawQuery, State},
    response::{Html, IntoResponse, Response},
};
use chrono::Utc;
use http::{HeaderMap, StatusCode, header};
use mcp_axum::auth::oauth::{OAuthError, OAuthErrorCode};
use serde::Deserialize;

/// Scope granted to every issued credential.
pub const SCOPE: &str = "mcp";

/// Parameters shared by the authorization request and the consent form.
#[derive(Debug, Default, Deserialize)]
pub struct AuthorizeRequest {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub response_type: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub resource: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConsentForm {
    #[serde(flatten)]
    pub request: AuthorizeRequest,
    pub action: Option<String>,
}

/// A request that passed validation against a registered client.
#[derive(Debug)]
pub struct Validated {
    pub client: ClientRecord,
    pub redirect_uri: String,
    pub state: Option<String>,
    pub challenge: Option<(String, ChallengeMethod)>,
    pub resource: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl AuthorizeRequest {
    /// Check the PKCE parameters and the client binding.
    pub async fn validate<C: CredentialStore>(&self, store: &C) -> Result<Validated, Error> {
        let (Some(client_id), Some(redirect_uri)) =
            (non_empty(&self.client_id), non_empty(&self.redirect_uri))
        else {
            return Err(Error::InvalidRequest(
                "client_id, redirect_uri, and response_type=code are required".into(),
            ));
        };

        let method = self.code_challenge_method.as_deref();
        let challenge = match (non_empty(&self.code_challenge), method) {
            (None, Some(_)) => {
                return Err(Error::InvalidRequest(
                    "code_challenge_method requires code_challenge".into(),
                ));
            }
            (None, None) => None,
            // RFC 7636 §4.3: an omitted method means plain.
            (Some(challenge), None) => Some((challenge.to_string(), ChallengeMethod::Plain)),
            (Some(challenge), Some(method)) => {
                let method = ChallengeMethod::parse(method).ok_or_else(|| {
                    Error::InvalidRequest("Unsupported code_challenge_method".into())
                })?;
                Some((challenge.to_string(), method))
            }
        };

        let client = store
            .client(client_id)
            .await?
            .ok_or_else(|| Error::InvalidClient("Unknown client_id".into()))?;
        if !client.allows_redirect(redirect_uri) {
            return Err(Error::InvalidRequest("redirect_uri not registered".into()));
        }

        Ok(Validated {
            client,
            redirect_uri: redirect_uri.to_string(),
            state: self.state.clone(),
            challenge,
            resource: non_empty(&self.resource).map(str::to_string),
        })
    }
}

/// Errors from this endpoint are all answered with 400, including an unknown
/// client.
fn rejection(err: Error) -> OAuthError {
    let err = OAuthError::from(err);
    match err.code {
        OAuthErrorCode::InvalidClient => err.with_status(StatusCode::BAD_REQUEST),
        _ => err,
    }
}

fn found(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// `redirect_uri` with extra query parameters appended.
fn redirect_with(redirect_uri: &str, params: &[(&str, &str)]) -> Result<String, Error> {
    let mut url = url::Url::parse(redirect_uri)
        .map_err(|e| Error::Server(format!("registered redirect_uri is invalid: {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in params {
            query.append_pair(key, value);
        }
    }
    Ok(url.to_string())
}

/// `GET /authorize`
pub async fn authorize<C, D>(
    State(state): State<AppState<C, D>>,
    headers: HeaderMap,
    RawQuery(raw_query): RawQuery,
    Query(request): Query<AuthorizeRequest>,
) -> Result<Response, OAuthError>
where
    C: CredentialStore,
    D: DataStore,
{
    if request.response_type.as_deref() != Some("code") {
        return Err(rejection(Error::InvalidRequest(
            "client_id, redirect_uri, and response_type=code are required".into(),
        )));
    }
    let validated = request.validate(&state.credentials).await.map_err(rejection)?;

    let user = current_user(&state, &headers).await?;
    let Some(user) = user else {
        let next = match raw_query {
            Some(query) => format!("/authorize?{query}"),
            None => "/authorize".to_string(),
        };
        let login_page = state.config.url(&state.config.login_path);
        let login = redirect_with(&login_page, &[("next", next.as_str())])?;
        tracing::debug!(client_id = %validated.client.client_id, "authorization needs login");
        return Ok(found(login));
    };

    tracing::debug!(
        client_id = %validated.client.client_id,
        user_id = %user.user_id,
        "rendering consent page"
    );
    Ok(Html(consent_page(&validated)).into_response())
}

/// `POST /authorize`
pub async fn decide<C, D>(
    State(state): State<AppState<C, D>>,
    headers: HeaderMap,
    Form(form): Form<ConsentForm>,
) -> Result<Response, OAuthError>
where
    C: CredentialStore,
    D: DataStore,
{
    let Some(user) = current_user(&state, &headers).await?
    else {
        return Ok(Error::Unauthorized.into_response());
    };
    let validated = form.request.validate(&state.credentials).await.map_err(rejection)?;
    let client_id = validated.client.client_id.as_str();

    match form.action.as_deref() {
        Some("deny") => {
            tracing::info!(%client_id, user_id = %user.user_id, "authorization denied");
            let mut params = vec![("error", "access_denied")];
            if let Some(s) = validated.state.as_deref() {
                params.push(("state", s));
            }
            Ok(found(redirect_with(&validated.redirect_uri, &params)?))
        }
        Some("approve") => {
            let code = issue_code(&state, &validated, &user.user_id).await?;
            tracing::info!(%client_id, user_id = %user.user_id, "authorization code issued");
            let mut params = vec![("code", code.as_str())];
            if let Some(s) = validated.state.as_deref() {
                params.push(("state", s));
            }
            Ok(found(redirect_with(&validated.redirect_uri, &params)?))
        }
        _ => Err(rejection(Error::InvalidRequest(
            "action must be approve or deny".into(),
        ))),
    }
}

/// Persist a code for `(user, client)` and provision the credential it is
/// bound to. Returns the plaintext code.
///
/// The code is written first, so a failed write never leaves behind a
/// credential that no code refers to.
async fn issue_code<C, D>(
    state: &AppState<C, D>,
    validated: &Validated,
    user_id: &str,
) -> Result<String, Error>
where
    C: CredentialStore,
    D: DataStore,
{
    let client_id = &validated.client.client_id;

    // The secret is discarded; the exchange rotates this row to a fresh one.
    let mut token = TokenRecord::new(
        user_id,
        format!("OAuth: {client_id}"),
        secret::hash_secret(&secret::generate_token()),
    );
    token.oauth_client_id = Some(client_id.clone());

    let code = secret::generate_code();
    let now = Utc::now();
    let (code_challenge, code_challenge_method) = match &validated.challenge {
        Some((challenge, method)) => (Some(challenge.clone()), Some(method.as_str().to_string())),
        None => (None, None),
    };
    state
        .bounded(state.credentials.insert_code(AuthorizationCode {
            code_hash: secret::hash_secret(&code),
            client_id: client_id.clone(),
            user_id: user_id.to_string(),
            redirect_uri: validated.redirect_uri.clone(),
            code_challenge,
            code_challenge_method,
            resource: validated.resource.clone(),
            credential_id: Some(token.id.clone()),
            created_at: now,
            expires_at: now + state.config.code_ttl(),
            used_at: None,
        }))
        .await?;
    state.bounded(state.credentials.insert_token(token, None)).await?;
    Ok(code)
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn hidden(name: &str, value: Option<&str>) -> String {
    match value {
        Some(value) => format!(
            r#"<input type="hidden" name="{name}" value="{}">"#,
            escape_html(value)
        ),
        None => String::new(),
    }
}

fn consent_page(validated: &Validated) -> String {
    let client_name = escape_html(&validated.client.display_name);
    let redirect = escape_html(&validated.redirect_uri);
    let (challenge, method) = match &validated.challenge {
        Some((challenge, method)) => (Some(challenge.as_str()), Some(method.as_str())),
        None => (None, None),
    };
    let fields = [
        hidden("client_id", Some(&validated.client.client_id)),
        hidden("redirect_uri", Some(&validated.redirect_uri)),
        hidden("state", validated.state.as_deref()),
        hidden("code_challenge", challenge),
        hidden("code_challenge_method", method),
        hidden("resource", validated.resource.as_deref()),
    ]
    .concat();

    format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Authorize {client_name}</title></head>
<body>
<h1>Authorize {client_name}</h1>
<p><strong>{client_name}</strong> is requesting access to your meetup account with scope <code>{SCOPE}</code>.</p>
<p>You will be returned to <code>{redirect}</code>.</p>
<form method="post" action="/authorize">
{fields}
<button type="submit" name="action" value="approve">Approve</button>
<button type="submit" name="action" value="deny">Deny</button>
</form>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use crate::authorize::{AuthorizeRequest, escape_html, issue_code, redirect_with};
    use crate::config::Config;
    use crate::data::MemoryDataStore;
    use crate::error::Error;
    use crate::secret::{ChallengeMethod, hash_secret};
    use crate::state::AppState;
    use crate::store::{
        AuthorizationCode, ClientRecord, CredentialStore, MemoryCredentialStore, StoreError,
        TokenRecord,
    };
    use chrono::{DateTime, Utc};

    /// The in-memory store, except that writing a code fails.
    #[derive(Clone)]
    struct RejectsCodes(MemoryCredentialStore);

    impl CredentialStore for RejectsCodes {
        async fn insert_client(&self, client: ClientRecord) -> Result<(), StoreError> {
            self.0.insert_client(client).await
        }

        async fn client(&self, client_id: &str) -> Result<Option<ClientRecord>, StoreError> {
            self.0.client(client_id).await
        }

        async fn insert_code(&self, _: AuthorizationCode) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }

        async fn code(
            &self,
            code_hash: &str,
            client_id: &str,
        ) -> Result<Option<AuthorizationCode>, StoreError> {
            self.0.code(code_hash, client_id).await
        }

        async fn consume_code(&self, code_hash: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
            self.0.consume_code(code_hash, now).await
        }

        async fn insert_token(
            &self,
            token: TokenRecord,
            active_limit: Option<usize>,
        ) -> Result<(), StoreError> {
            self.0.insert_token(token, active_limit).await
        }

        async fn active_token(&self, token_hash: &str) -> Result<Option<TokenRecord>, StoreError> {
            self.0.active_token(token_hash).await
        }

        async fn token(&self, id: &str) -> Result<Option<TokenRecord>, StoreError> {
            self.0.token(id).await
        }

        async fn touch_token(&self, id: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
            self.0.touch_token(id, now).await
        }

        async fn rotate_token(&self, id: &str, token_hash: String) -> Result<bool, StoreError> {
            self.0.rotate_token(id, token_hash).await
        }

        async fn revoke_token(&self, id: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
            self.0.revoke_token(id, now).await
        }

        async fn user_tokens(&self, user_id: &str) -> Result<Vec<TokenRecord>, StoreError> {
            self.0.user_tokens(user_id).await
        }
    }

    async fn store() -> MemoryCredentialStore {
        let store = MemoryCredentialStore::new();
        store
            .insert_client(ClientRecord {
                client_id: "meet_client".into(),
                client_secret_hash: "hash".into(),
                display_name: "Agent".into(),
                redirect_uris: vec!["https://agent.example/cb".into()],
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        store
    }

    fn request() -> AuthorizeRequest {
        AuthorizeRequest {
            client_id: Some("meet_client".into()),
            redirect_uri: Some("https://agent.example/cb".into()),
            response_type: Some("code".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn redirect_must_match_exactly() {
        let store = store().await;
        let mut req = request();
        req.redirect_uri = Some("https://agent.example/cb/".into());
        let err = req.validate(&store).await.unwrap_err();
        assert_eq!(err, Error::InvalidRequest("redirect_uri not registered".into()));
    }

    #[tokio::test]
    async fn unknown_client_is_invalid_client() {
        let store = store().await;
        let mut req = request();
        req.client_id = Some("meet_other".into());
        assert!(matches!(req.validate(&store).await, Err(Error::InvalidClient(_))));
    }

    #[tokio::test]
    async fn method_without_challenge_is_rejected() {
        let store = store().await;
        let mut req = request();
        req.code_challenge_method = Some("S256".into());
        assert!(matches!(req.validate(&store).await, Err(Error::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn unsupported_method_is_rejected() {
        let store = store().await;
        let mut req = request();
        req.code_challenge = Some("abc".into());
        req.code_challenge_method = Some("S512".into());
        assert!(matches!(req.validate(&store).await, Err(Error::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn challenge_defaults_to_plain() {
        let store = store().await;
        let mut req = request();
        req.code_challenge = Some("abc".into());
        let validated = req.validate(&store).await.unwrap();
        assert_eq!(
            validated.challenge,
            Some(("abc".to_string(), ChallengeMethod::Plain))
        );
    }

    #[tokio::test]
    async fn issued_code_is_bound_to_provisioned_credential() {
        let store = store().await;
        let state = AppState::new(store.clone(), MemoryDataStore::new(), Config::default());
        let validated = request().validate(&store).await.unwrap();

        let code = issue_code(&state, &validated, "ada").await.unwrap();
        let record = store.code(&hash_secret(&code), "meet_client").await.unwrap().unwrap();
        let tokens = store.user_tokens("ada").await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(record.credential_id.as_deref(), Some(tokens[0].id.as_str()));
        assert_eq!(tokens[0].label, "OAuth: meet_client");
    }

    #[tokio::test]
    async fn failed_code_write_provisions_nothing() {
        let store = RejectsCodes(store().await);
        let state = AppState::new(store.clone(), MemoryDataStore::new(), Config::default());
        let validated = request().validate(&store).await.unwrap();

        assert_eq!(
            issue_code(&state, &validated, "ada").await.unwrap_err(),
            Error::Upstream("connection refused".into())
        );
        assert!(store.0.user_tokens("ada").await.unwrap().is_empty());
    }

    #[test]
    fn redirect_keeps_existing_query() {
        let url = redirect_with("https://agent.example/cb?x=1", &[("code", "a b"), ("state", "s")])
            .unwrap();
        assert_eq!(url, "https://agent.example/cb?x=1&code=a+b&state=s");
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }
}
