use clap::Parser;
use mcp_axum::auth::oauth::PROTECTED_RESOURCE_PATH;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_BIND: &str = "127.0.0.1:8000";
const DEFAULT_PUBLIC_URL: &str = "http://localhost:8000";
const DEFAULT_LOGIN_PATH: &str = "/auth/login";
const DEFAULT_SESSION_COOKIE: &str = "meetup_session";
const DEFAULT_CODE_TTL_SECS: u64 = 600;
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 5;

/// Meetup MCP server: OAuth authorization server and JSON-RPC tool gateway.
#[derive(Parser, Debug, Clone)]
#[command(name = "meetup-mcp", version, about)]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "MEETUP_BIND", default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    /// Externally visible base URL, used in discovery documents and
    /// `WWW-Authenticate` challenges.
    #[arg(long, env = "MEETUP_PUBLIC_URL", default_value = DEFAULT_PUBLIC_URL)]
    pub public_url: String,

    /// Where unauthenticated users are sent to sign in.
    #[arg(long, env = "MEETUP_LOGIN_PATH", default_value = DEFAULT_LOGIN_PATH)]
    pub login_path: String,

    /// Name of the browser session cookie.
    #[arg(long, env = "MEETUP_SESSION_COOKIE", default_value = DEFAULT_SESSION_COOKIE)]
    pub session_cookie: String,

    /// Authorization code lifetime in seconds.
    #[arg(long, env = "MEETUP_CODE_TTL", default_value_t = DEFAULT_CODE_TTL_SECS)]
    pub code_ttl_secs: u64,

    /// Timeout for each data store call in seconds.
    #[arg(long, env = "MEETUP_STORE_TIMEOUT", default_value_t = DEFAULT_STORE_TIMEOUT_SECS)]
    pub store_timeout_secs: u64,

    /// Seed an in-memory demo organizer with a browser session and print it.
    #[arg(long)]
    pub seed_demo: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            public_url: DEFAULT_PUBLIC_URL.into(),
            login_path: DEFAULT_LOGIN_PATH.into(),
            session_cookie: DEFAULT_SESSION_COOKIE.into(),
            code_ttl_secs: DEFAULT_CODE_TTL_SECS,
            store_timeout_secs: DEFAULT_STORE_TIMEOUT_SECS,
            seed_demo: false,
        }
    }
}

impl Config {
    /// Absolute URL of a path on this server.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.public_url.trim_end_matches('/'))
    }

    pub fn resource_metadata_url(&self) -> String {
        self.url(PROTECTED_RESOURCE_PATH)
    }

    pub fn code_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.code_ttl_secs as i64)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }
}
