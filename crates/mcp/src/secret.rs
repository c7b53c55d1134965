//! Secret generation, hashing, and PKCE.
//!
//! Every secret handed out by this server (client secrets, authorization
//! codes, bearer tokens) is random, URL-safe, and only ever stored as a
//! SHA-256 hex digest.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

const CLIENT_ID_PREFIX: &str = "meet_";
const CLIENT_SECRET_PREFIX: &str = "meets_";
const TOKEN_PREFIX: &str = "meetmcp_";

fn random_b64(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn generate_client_id() -> String {
    format!("{CLIENT_ID_PREFIX}{}", random_b64(16))
}

pub fn generate_client_secret() -> String {
    format!("{CLIENT_SECRET_PREFIX}{}", random_b64(32))
}

pub fn generate_code() -> String {
    random_b64(32)
}

pub fn generate_token() -> String {
    format!("{TOKEN_PREFIX}{}", random_b64(24))
}

/// SHA-256 hex digest used for every secret at rest.
pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// PKCE transformation applied to a `code_verifier`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChallengeMethod {
    S256,
    Plain,
}

impl ChallengeMethod {
    pub fn parse(method: &str) -> Option<Self> {
        match method {
            "S256" => Some(Self::S256),
            "plain" => Some(Self::Plain),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::S256 => "S256",
            Self::Plain => "plain",
        }
    }

    /// The challenge a client must have sent for `verifier`.
    pub fn challenge(self, verifier: &str) -> String {
        match self {
            Self::S256 => URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes())),
            Self::Plain => verifier.to_string(),
        }
    }

    pub fn verify(self, verifier: &str, challenge: &str) -> bool {
        self.challenge(verifier) == challenge
    }
}
