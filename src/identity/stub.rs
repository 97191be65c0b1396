//! Locally minted identity tokens for runs without a metadata server

use super::{IdToken, IdTokenSource};
use crate::error::{Error, Result};
use jsonwebtoken::{EncodingKey, Header};
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

const STUB_ISSUER: &str = "leaky-mesh-stub";
const STUB_LIFETIME_SECS: u64 = 3600;

#[derive(Serialize)]
struct StubClaims<'a> {
    iss: &'a str,
    aud: &'a str,
    sub: &'a str,
    email: String,
    iat: u64,
    exp: u64,
}

/// Signs HS256 tokens naming `identity` as subject and email
pub struct StubTokenSource {
    identity: String,
    key: EncodingKey,
}

impl StubTokenSource {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            key: EncodingKey::from_secret(b"leaky-mesh-local"),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }
}

#[async_trait::async_trait]
impl IdTokenSource for StubTokenSource {
    async fn mint(&self, audience: &str) -> Result<IdToken> {
        let iat = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let claims = StubClaims {
            iss: STUB_ISSUER,
            aud: audience,
            sub: &self.identity,
            email: format!("{}@leaky-mesh.local", self.identity),
            iat,
            exp: iat + STUB_LIFETIME_SECS,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &self.key)
            .map(IdToken::new)
            .map_err(|e| Error::TokenSource(format!("could not sign stub token: {}", e)))
    }
}
