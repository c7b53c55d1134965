//! Browser session authentication for first-party pages.
//!
//! The community app owns sign-in; this server only reads its session
//! cookie and asks the data store who it belongs to.

use crate::data::DataStore;
use crate::error::Error;
use crate::state::AppState;
use crate::store::CredentialStore;
use http::HeaderMap;
use mcp_axum::auth::Authenticator;

/// The signed-in resource owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionUser {
    pub user_id: String,
}

/// Value of the cookie `name` in a `Cookie` header.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(http::header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

/// Resolve the configured session cookie, if any, to a user.
pub async fn current_user<C, D>(
    state: &AppState<C, D>,
    headers: &HeaderMap,
) -> Result<Option<SessionUser>, Error>
where
    C: CredentialStore,
    D: DataStore,
{
    let Some(session) = cookie_value(headers, &state.config.session_cookie) else {
        return Ok(None);
    };
    let user_id = state.bounded(state.data.resolve_session(session)).await?;
    Ok(user_id.map(|user_id| SessionUser { user_id }))
}

/// [`Authenticator`] for routes only a signed-in user may reach.
pub struct SessionAuth<C, D> {
    state: AppState<C, D>,
}

impl<C: Clone, D: Clone> Clone for SessionAuth<C, D> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<C, D> SessionAuth<C, D> {
    pub fn new(state: AppState<C, D>) -> Self {
        Self { state }
    }
}

impl<C, D> Authenticator for SessionAuth<C, D>
where
    C: CredentialStore,
    D: DataStore,
{
    type Claims = SessionUser;
    type Error = Error;

    async fn authenticate(&self, parts: &http::request::Parts) -> Result<SessionUser, Error> {
        current_user(&self.state, &parts.headers)
            .await?
            .ok_or(Error::Unauthorized)
    }
}
