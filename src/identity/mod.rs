//! Service identity tokens
//!
//! An `IdToken` is an opaque bearer string. The same type carries a
//! service's own minted identity and any token borrowed from another
//! service; nothing in the mesh tells them apart, which is exactly the
//! weakness the attack endpoints exploit.

pub mod metadata;
pub mod stub;

pub use metadata::MetadataTokenSource;
pub use stub::StubTokenSource;

use crate::error::Result;
use http::HeaderMap;
use jsonwebtoken::{DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// Opaque bearer token
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdToken(String);

impl IdToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The empty token: outbound calls mint the caller's own identity instead
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for IdToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdToken({} bytes)", self.0.len())
    }
}

impl From<String> for IdToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

/// Platform facility that mints identity tokens for a target audience
#[async_trait::async_trait]
pub trait IdTokenSource: Send + Sync {
    /// Mint a token proving the caller's identity to `audience`
    async fn mint(&self, audience: &str) -> Result<IdToken>;
}

/// Claims the mesh reads from identity tokens, without verifying them
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub aud: Option<String>,
}

/// Extract the bearer token from an `Authorization` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(http::header::AUTHORIZATION)?.to_str().ok()?;
    let scheme = value.get(..7)?;
    if !scheme.eq_ignore_ascii_case("bearer ") {
        return None;
    }
    Some(&value[7..])
}

/// Decode the payload of a JWT-shaped token without checking its signature
pub fn unverified_claims(token: &str) -> Option<TokenClaims> {
    let header = jsonwebtoken::decode_header(token).ok()?;
    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .map(|data| data.claims)
}

/// Best-effort description of who is calling, for request logs.
///
/// Prefers the token's `email` claim, then `sub`, then the forwarded-for
/// header, then the peer address.
pub fn identify_caller(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    if let Some(claims) = bearer_token(headers).and_then(unverified_claims) {
        if let Some(email) = claims.email.filter(|e| !e.is_empty()) {
            return email;
        }
        if let Some(sub) = claims.sub.filter(|s| !s.is_empty()) {
            return sub;
        }
    }

    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }

    remote
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
