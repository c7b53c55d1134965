//! End-to-end flows through the assembled router.

use axum::Router;
use axum::body::{Body, Bytes, to_bytes};
use http::{HeaderMap, Request, StatusCode, header};
use meetup_mcp::data::{MemoryDataStore, Role};
use meetup_mcp::rpc::{PROTOCOL_VERSIONS, SESSION_HEADER};
use meetup_mcp::secret::ChallengeMethod;
use meetup_mcp::store::MemoryCredentialStore;
use meetup_mcp::{AppState, Config, router};
use serde_json::{Value, json};
use tower::ServiceExt;
use url::form_urlencoded;

const REDIRECT: &str = "https://agent.example/callback";
const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

struct Harness {
    app: Router,
    credentials: MemoryCredentialStore,
    data: MemoryDataStore,
    cookie: String,
}

async fn harness() -> Harness {
    let data = MemoryDataStore::new();
    let user = data
        .insert_profile("Ada Lovelace", "ada@example.com", Role::Member)
        .await;
    let session = data.create_session(&user).await;
    let config = Config::default();
    let cookie = format!("{}={session}", config.session_cookie);
    let credentials = MemoryCredentialStore::new();
    let state = AppState::new(credentials.clone(), data.clone(), config);
    Harness {
        app: router(state),
        credentials,
        data,
        cookie,
    }
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    fn location(&self) -> url::Url {
        let location = self.headers.get(header::LOCATION).unwrap().to_str().unwrap();
        url::Url::parse(location).unwrap()
    }
}

async fn send(app: &Router, request: Request<Body>) -> Reply {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    Reply {
        status,
        headers,
        body,
    }
}

fn form(pairs: &[(&str, &str)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

fn query_param(url: &url::Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn post_json(uri: &str) -> http::request::Builder {
    Request::post(uri).header(header::CONTENT_TYPE, "application/json")
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    post_json(uri)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn rpc(method: &str, params: Value, bearer: Option<&str>) -> Request<Body> {
    let mut builder = post_json("/rpc");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = json!({ "jsonrpc": "2.0", "id": 7, "method": method, "params": params });
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn register(app: &Router) -> (String, String) {
    let reply = send(
        app,
        json_request(
            "/register",
            json!({ "client_name": "Agent", "redirect_uris": [REDIRECT] }),
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let body = reply.json();
    (
        body["client_id"].as_str().unwrap().to_string(),
        body["client_secret"].as_str().unwrap().to_string(),
    )
}

fn consent(client_id: &str, challenge: &str, action: &str) -> String {
    form(&[
        ("client_id", client_id),
        ("redirect_uri", REDIRECT),
        ("state", "xyz"),
        ("code_challenge", challenge),
        ("code_challenge_method", "S256"),
        ("action", action),
    ])
}

async fn approve(h: &Harness, client_id: &str) -> String {
    let challenge = ChallengeMethod::S256.challenge(VERIFIER);
    let request = Request::post("/authorize")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::COOKIE, &h.cookie)
        .body(Body::from(consent(client_id, &challenge, "approve")))
        .unwrap();
    let reply = send(&h.app, request).await;
    assert_eq!(reply.status, StatusCode::FOUND);
    let location = reply.location();
    assert!(location.as_str().starts_with(REDIRECT));
    assert_eq!(query_param(&location, "state").as_deref(), Some("xyz"));
    query_param(&location, "code").unwrap()
}

fn exchange_request(client_id: &str, client_secret: &str, code: &str) -> Request<Body> {
    Request::post("/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("redirect_uri", REDIRECT),
            ("code_verifier", VERIFIER),
        ])))
        .unwrap()
}

/// Register, consent and exchange; returns the access token.
async fn access_token(h: &Harness) -> String {
    let (client_id, client_secret) = register(&h.app).await;
    let code = approve(h, &client_id).await;
    let reply = send(&h.app, exchange_request(&client_id, &client_secret, &code)).await;
    assert_eq!(reply.status, StatusCode::OK);
    reply.json()["access_token"].as_str().unwrap().to_string()
}

fn tool_text(reply: &Reply) -> Value {
    let body = reply.json();
    let text = body["result"]["content"][0]["text"].as_str().unwrap();
    serde_json::from_str(text).unwrap()
}

#[tokio::test]
async fn authorization_code_flow_reaches_tools() {
    let h = harness().await;
    let (client_id, client_secret) = register(&h.app).await;
    let challenge = ChallengeMethod::S256.challenge(VERIFIER);
    let query = form(&[
        ("response_type", "code"),
        ("client_id", client_id.as_str()),
        ("redirect_uri", REDIRECT),
        ("state", "xyz"),
        ("code_challenge", challenge.as_str()),
        ("code_challenge_method", "S256"),
    ]);
    let uri = format!("/authorize?{query}");

    // Anonymous users are sent to sign in and brought back afterwards.
    let reply = send(&h.app, Request::get(&uri).body(Body::empty()).unwrap()).await;
    assert_eq!(reply.status, StatusCode::FOUND);
    let login = reply.location();
    assert_eq!(login.path(), "/auth/login");
    assert_eq!(query_param(&login, "next").as_deref(), Some(uri.as_str()));

    let request = Request::get(&uri)
        .header(header::COOKIE, &h.cookie)
        .body(Body::empty())
        .unwrap();
    let reply = send(&h.app, request).await;
    assert_eq!(reply.status, StatusCode::OK);
    let page = String::from_utf8(reply.body.to_vec()).unwrap();
    assert!(page.contains("Authorize Agent"));
    assert!(page.contains(r#"value="approve""#));

    let code = approve(&h, &client_id).await;
    let reply = send(&h.app, exchange_request(&client_id, &client_secret, &code)).await;
    assert_eq!(reply.status, StatusCode::OK);
    let grant = reply.json();
    assert_eq!(grant["token_type"], "Bearer");
    assert_eq!(grant["scope"], "mcp");
    let token = grant["access_token"].as_str().unwrap();
    assert!(token.starts_with("meetmcp_"));

    let mut initialize = rpc("initialize", json!({ "protocolVersion": "2025-03-26" }), None);
    initialize
        .headers_mut()
        .insert(SESSION_HEADER, "session-1".parse().unwrap());
    let reply = send(&h.app, initialize).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.headers[SESSION_HEADER], "session-1");
    let body = reply.json();
    assert_eq!(body["id"], 7);
    assert_eq!(body["result"]["protocolVersion"], "2025-03-26");
    assert_eq!(body["result"]["serverInfo"]["name"], "meetup-mcp");

    let reply = send(&h.app, rpc("notifications/initialized", json!({}), None)).await;
    assert_eq!(reply.status, StatusCode::ACCEPTED);

    let reply = send(&h.app, rpc("tools/list", json!({}), Some(token))).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["result"]["tools"].as_array().unwrap().len(), 15);

    let call = json!({ "name": "get_my_profile", "arguments": {} });
    let reply = send(&h.app, rpc("tools/call", call, Some(token))).await;
    let profile = tool_text(&reply);
    assert_eq!(profile["profile"]["email"], "ada@example.com");
    assert_eq!(profile["profile"]["role"], "member");
}

#[tokio::test]
async fn unknown_protocol_version_gets_latest() {
    let h = harness().await;
    let reply = send(&h.app, rpc("initialize", json!({ "protocolVersion": "1999-01-01" }), None)).await;
    assert_eq!(reply.json()["result"]["protocolVersion"], PROTOCOL_VERSIONS[0]);
    assert!(reply.headers.contains_key(SESSION_HEADER));
}

#[tokio::test]
async fn tool_calls_without_credentials_are_challenged() {
    let h = harness().await;
    let reply = send(&h.app, rpc("tools/list", json!({}), None)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    let challenge = reply.headers[header::WWW_AUTHENTICATE].to_str().unwrap();
    assert!(challenge.starts_with("Bearer"));
    assert!(challenge.contains("/.well-known/oauth-protected-resource"));
    let body = reply.json();
    assert_eq!(body["error"]["code"], -32001);
    assert_eq!(body["id"], 7);

    let reply = send(&h.app, rpc("tools/list", json!({}), Some("meetmcp_bogus"))).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_methods_and_tools_are_not_found() {
    let h = harness().await;
    let token = access_token(&h).await;

    let reply = send(&h.app, rpc("resources/list", json!({}), Some(&token))).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["error"]["code"], -32601);

    let call = json!({ "name": "launch_rockets" });
    let reply = send(&h.app, rpc("tools/call", call, Some(&token))).await;
    let body = reply.json();
    assert_eq!(body["error"]["code"], -32601);
    assert_eq!(body["error"]["message"], "Unknown tool: launch_rockets");

    let reply = send(&h.app, rpc("tools/call", json!({}), Some(&token))).await;
    assert_eq!(reply.json()["error"]["code"], -32602);

    let call = json!({ "name": "create_event", "arguments": {} });
    let reply = send(&h.app, rpc("tools/call", call, Some(&token))).await;
    assert_eq!(reply.json()["error"]["code"], -32003);
}

#[tokio::test]
async fn malformed_envelope_is_rejected() {
    let h = harness().await;
    let request = post_json("/rpc")
        .body(Body::from("{not json"))
        .unwrap();
    let reply = send(&h.app, request).await;
    let body = reply.json();
    assert_eq!(body["error"]["code"], -32600);
    assert!(body["id"].is_null());
}

#[tokio::test]
async fn denial_redirects_with_access_denied() {
    let h = harness().await;
    let (client_id, _) = register(&h.app).await;
    let request = Request::post("/authorize")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::COOKIE, &h.cookie)
        .body(Body::from(consent(&client_id, "challenge", "deny")))
        .unwrap();
    let reply = send(&h.app, request).await;
    assert_eq!(reply.status, StatusCode::FOUND);
    let location = reply.location();
    assert_eq!(query_param(&location, "error").as_deref(), Some("access_denied"));
    assert_eq!(query_param(&location, "state").as_deref(), Some("xyz"));
    assert_eq!(query_param(&location, "code"), None);
}

#[tokio::test]
async fn consent_requires_a_session() {
    let h = harness().await;
    let (client_id, _) = register(&h.app).await;
    let request = Request::post("/authorize")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(consent(&client_id, "challenge", "approve")))
        .unwrap();
    let reply = send(&h.app, request).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert!(!reply.headers.contains_key(header::LOCATION));
}

#[tokio::test]
async fn unregistered_redirect_is_never_followed() {
    let h = harness().await;
    let (client_id, _) = register(&h.app).await;
    let query = form(&[
        ("response_type", "code"),
        ("client_id", client_id.as_str()),
        ("redirect_uri", "https://evil.example/steal"),
    ]);
    let request = Request::get(format!("/authorize?{query}"))
        .header(header::COOKIE, &h.cookie)
        .body(Body::empty())
        .unwrap();
    let reply = send(&h.app, request).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(!reply.headers.contains_key(header::LOCATION));
    assert_eq!(reply.json()["error"], "invalid_request");

    let query = form(&[
        ("response_type", "code"),
        ("client_id", "meet_unknown"),
        ("redirect_uri", REDIRECT),
    ]);
    let request = Request::get(format!("/authorize?{query}"))
        .body(Body::empty())
        .unwrap();
    let reply = send(&h.app, request).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["error"], "invalid_client");
}

#[tokio::test]
async fn registration_requires_redirect_uris() {
    let h = harness().await;
    let reply = send(
        &h.app,
        json_request("/register", json!({ "client_name": "Agent", "redirect_uris": [] })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["error"], "invalid_request");
}

#[tokio::test]
async fn concurrent_exchanges_yield_one_token() {
    let h = harness().await;
    let (client_id, client_secret) = register(&h.app).await;
    let code = approve(&h, &client_id).await;

    let (first, second) = tokio::join!(
        send(&h.app, exchange_request(&client_id, &client_secret, &code)),
        send(&h.app, exchange_request(&client_id, &client_secret, &code)),
    );
    let mut statuses = [first.status, second.status];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::BAD_REQUEST]);
    let loser = if first.status == StatusCode::OK { second } else { first };
    assert_eq!(loser.json()["error"], "invalid_grant");
}

#[tokio::test]
async fn wrong_verifier_is_rejected() {
    let h = harness().await;
    let (client_id, client_secret) = register(&h.app).await;
    let code = approve(&h, &client_id).await;
    let request = Request::post("/token")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "grant_type": "authorization_code",
                "code": code,
                "client_id": client_id,
                "client_secret": client_secret,
                "redirect_uri": REDIRECT,
                "code_verifier": "not-the-verifier",
            })
            .to_string(),
        ))
        .unwrap();
    let reply = send(&h.app, request).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    let body = reply.json();
    assert_eq!(body["error"], "invalid_grant");
    assert_eq!(body["error_description"], "code_verifier mismatch");
}

#[tokio::test]
async fn revoked_credentials_stop_working() {
    let h = harness().await;
    let token = access_token(&h).await;

    let request = Request::get("/tokens")
        .header(header::COOKIE, &h.cookie)
        .body(Body::empty())
        .unwrap();
    let reply = send(&h.app, request).await;
    assert_eq!(reply.status, StatusCode::OK);
    let tokens = reply.json()["tokens"].as_array().unwrap().clone();
    assert_eq!(tokens.len(), 1);
    assert!(tokens[0]["label"].as_str().unwrap().starts_with("OAuth: meet_"));
    assert!(tokens[0].get("token_hash").is_none());
    let id = tokens[0]["id"].as_str().unwrap().to_string();

    let request = Request::delete(format!("/tokens/{id}"))
        .header(header::COOKIE, &h.cookie)
        .body(Body::empty())
        .unwrap();
    let reply = send(&h.app, request).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["ok"], true);

    let reply = send(&h.app, rpc("tools/list", json!({}), Some(&token))).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn credential_store_outage_is_not_a_challenge() {
    let h = harness().await;
    let token = access_token(&h).await;
    h.credentials.set_outage(Some("connection refused")).await;

    let reply = send(&h.app, rpc("tools/list", json!({}), Some(&token))).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.headers.get(header::WWW_AUTHENTICATE).is_none());
    let body = reply.json();
    assert_eq!(body["id"], 7);
    assert_eq!(body["error"]["code"], -32010);
    assert_eq!(body["error"]["message"], "connection refused");

    h.credentials.set_outage(None).await;
    let reply = send(&h.app, rpc("tools/list", json!({}), Some(&token))).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.json()["result"]["tools"].is_array());
}

#[tokio::test]
async fn others_cannot_revoke_a_credential() {
    let h = harness().await;
    access_token(&h).await;
    let request = Request::get("/tokens")
        .header(header::COOKIE, &h.cookie)
        .body(Body::empty())
        .unwrap();
    let id = send(&h.app, request).await.json()["tokens"][0]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let mallory = h
        .data
        .insert_profile("Mallory", "mallory@example.com", Role::Member)
        .await;
    let session = h.data.create_session(&mallory).await;
    let request = Request::delete(format!("/tokens/{id}"))
        .header(header::COOKIE, format!("meetup_session={session}"))
        .body(Body::empty())
        .unwrap();
    let reply = send(&h.app, request).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.json()["error"], "Token not found");
}

#[tokio::test]
async fn personal_tokens_are_capped_and_accepted_from_every_source() {
    let h = harness().await;
    let mut raw = Vec::new();
    for n in 0..5 {
        let request = post_json("/tokens")
            .header(header::COOKIE, &h.cookie)
            .body(Body::from(json!({ "label": format!("laptop {n}") }).to_string()))
            .unwrap();
        let reply = send(&h.app, request).await;
        assert_eq!(reply.status, StatusCode::CREATED);
        let body = reply.json();
        assert_eq!(body["record"]["label"], format!("laptop {n}"));
        raw.push(body["token"].as_str().unwrap().to_string());
    }

    let request = post_json("/tokens")
        .header(header::COOKIE, &h.cookie)
        .body(Body::empty())
        .unwrap();
    let reply = send(&h.app, request).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.json()["error"].as_str().unwrap().contains("5 active MCP tokens"));

    let body = json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" }).to_string();
    let request = post_json("/rpc")
        .header("x-api-key", &raw[0])
        .body(Body::from(body.clone()))
        .unwrap();
    assert_eq!(send(&h.app, request).await.status, StatusCode::OK);

    let request = post_json(&format!("/rpc?token={}", raw[1]))
        .body(Body::from(body))
        .unwrap();
    assert_eq!(send(&h.app, request).await.status, StatusCode::OK);
}

#[tokio::test]
async fn token_management_requires_a_session() {
    let h = harness().await;
    let reply = send(&h.app, Request::get("/tokens").body(Body::empty()).unwrap()).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn discovery_documents_describe_the_server() {
    let h = harness().await;
    let request = Request::get("/.well-known/oauth-protected-resource")
        .body(Body::empty())
        .unwrap();
    let reply = send(&h.app, request).await;
    assert_eq!(reply.status, StatusCode::OK);
    let resource = reply.json();
    assert_eq!(resource["resource"], "http://localhost:8000/rpc");
    assert_eq!(resource["authorization_servers"][0], "http://localhost:8000");

    let request = Request::get("/.well-known/oauth-authorization-server")
        .body(Body::empty())
        .unwrap();
    let metadata = send(&h.app, request).await.json();
    assert_eq!(metadata["token_endpoint"], "http://localhost:8000/token");
    assert_eq!(metadata["registration_endpoint"], "http://localhost:8000/register");
    let methods = metadata["code_challenge_methods_supported"].as_array().unwrap();
    assert!(methods.iter().any(|m| m == "S256"));

    let health = send(&h.app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(health.json()["status"], "ok");
}
