//! The JSON-RPC endpoint at `/rpc`.
//!
//! `initialize` and `notifications/initialized` are public; every other
//! method needs a principal resolved by the optional auth layer in front of
//! this handler. Protocol-level errors are returned with HTTP 200, except
//! for missing or unknown credentials, which answer 401 with a
//! `WWW-Authenticate` challenge pointing at the protected resource
//! metadata. A credential store failure is not a missing credential: it
//! answers `-32010` with the store's message.

mod protocol;

pub use protocol::{
    Envelope, Method, PROTOCOL_VERSIONS, RpcError, SERVER_NAME, SESSION_HEADER, negotiate,
    server_info,
};

use crate::data::DataStore;
use crate::error::Error;
use crate::resolver::Principal;
use crate::state::AppState;
use crate::store::CredentialStore;
use crate::tools::{self, ToolName};
use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
};
use http::{HeaderMap, HeaderValue, StatusCode, header};
use mcp_axum::auth::TokenError;
use mcp_axum::auth::oauth::www_authenticate_401;
use protocol::{failure, success};
use serde_json::{Value, json};

fn reply(body: Value) -> Response {
    Json(body).into_response()
}

fn session_id(headers: &HeaderMap) -> HeaderValue {
    headers
        .get(SESSION_HEADER)
        .cloned()
        .or_else(|| HeaderValue::from_str(&uuid::Uuid::new_v4().to_string()).ok())
        .unwrap_or_else(|| HeaderValue::from_static("session"))
}

fn challenge<C, D>(state: &AppState<C, D>, id: Value) -> Response
where
    C: CredentialStore,
    D: DataStore,
{
    let err = RpcError::new(
        RpcError::UNAUTHORIZED,
        "Unauthorized. Provide a valid MCP bearer token.",
    );
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, www_authenticate_401(&state.resource_server()))],
        Json(failure(id, &err)),
    )
        .into_response()
}

/// `POST /rpc`
pub async fn handle<C, D>(
    State(state): State<AppState<C, D>>,
    Extension(auth): Extension<Result<Principal, TokenError<Error>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    C: CredentialStore,
    D: DataStore,
{
    let envelope = match Envelope::parse(&body) {
        Ok(envelope) => envelope,
        Err((id, err)) => return reply(failure(id, &err)),
    };
    let Envelope { id, method, params } = envelope;
    let known = Method::parse(&method);

    match known {
        Some(Method::Initialize) => {
            let requested = params.get("protocolVersion").and_then(Value::as_str);
            let result = json!({
                "protocolVersion": negotiate(requested),
                "serverInfo": server_info(),
                "capabilities": { "tools": { "list": true, "call": true } },
            });
            let mut response = reply(success(id, result));
            response
                .headers_mut()
                .insert(SESSION_HEADER, session_id(&headers));
            return response;
        }
        Some(Method::Initialized) => return StatusCode::ACCEPTED.into_response(),
        _ => {}
    }

    let principal = match auth {
        Ok(principal) => principal,
        Err(TokenError::Invalid(err)) if err != Error::Unauthorized => {
            tracing::warn!(error = %err, "credential lookup failed");
            return reply(failure(id, &RpcError::from(err)));
        }
        Err(_) => return challenge(&state, id),
    };

    match known {
        Some(Method::ListTools) => reply(success(id, json!({ "tools": tools::catalog() }))),
        Some(Method::CallTool) => match call_tool(&state, &principal, params).await {
            Ok(result) => reply(success(id, result)),
            Err(err) => {
                tracing::warn!(user_id = %principal.user_id, code = err.code, error = %err.message, "tool call failed");
                reply(failure(id, &err))
            }
        },
        _ => {
            tracing::debug!(%method, "unknown rpc method");
            reply(failure(id, &RpcError::method_not_found("Method not found")))
        }
    }
}

async fn call_tool<C, D>(
    state: &AppState<C, D>,
    principal: &Principal,
    mut params: Value,
) -> Result<Value, RpcError>
where
    C: CredentialStore,
    D: DataStore,
{
    let name = match params.get("name").and_then(Value::as_str) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => return Err(RpcError::invalid_params("Missing tool name")),
    };
    let tool = ToolName::parse(&name)
        .ok_or_else(|| RpcError::method_not_found(format!("Unknown tool: {name}")))?;
    let arguments = params
        .get_mut("arguments")
        .map(Value::take)
        .unwrap_or(Value::Null);

    tracing::debug!(user_id = %principal.user_id, tool = tool.as_str(), "calling tool");
    tools::call(state, principal, tool, arguments).await
}

/// `GET /rpc`: a human-readable description of the endpoint.
pub async fn info<C, D>(State(state): State<AppState<C, D>>) -> Json<Value>
where
    C: CredentialStore,
    D: DataStore,
{
    let config = &state.config;
    let names: Vec<&str> = tools::catalog().iter().map(|tool| tool.name).collect();
    Json(json!({
        "server": server_info(),
        "endpoint": config.url("/rpc"),
        "transport": "JSON-RPC over HTTP POST",
        "protocol_versions": PROTOCOL_VERSIONS,
        "auth": "Authorization: Bearer <access_token> OR x-api-key header OR ?token=<access_token>",
        "oauth": {
            "authorization_endpoint": config.url("/authorize"),
            "token_endpoint": config.url("/token"),
            "registration_endpoint": config.url("/register"),
        },
        "tools": names,
    }))
}
