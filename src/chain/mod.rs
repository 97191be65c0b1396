//! Token chaining through leak endpoints
//!
//! A route `[s0, s1, ..., sk]` reaches a target by asking `s0` for a token
//! valid at `s1`'s leak endpoint, presenting that to `s1` for a token valid
//! at `s2`'s, and so on until `sk` hands back a token for the target.

use crate::client::AuthClient;
use crate::error::{Error, Result};
use crate::identity::IdToken;
use reqwest::StatusCode;

/// Path every mesh service serves its token leak on
pub const LEAK_TOKEN_PATH: &str = "/leaks/id-token";

/// Leak endpoint of the service at `base_url`
pub fn leak_endpoint(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), LEAK_TOKEN_PATH)
}

/// Full leak request URL asking `service` for a token valid at `target`
pub fn leak_url(service: &str, target: &str) -> Result<url::Url> {
    let mut url = url::Url::parse(&leak_endpoint(service))?;
    url.query_pairs_mut().append_pair("url", target);
    Ok(url)
}

#[derive(Clone)]
pub struct ChainResolver {
    client: AuthClient,
}

impl ChainResolver {
    pub fn new(client: AuthClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &AuthClient {
        &self.client
    }

    /// Ask `service` to mint a token for `target`, presenting `bearer`.
    ///
    /// An empty bearer makes the caller authenticate as itself.
    pub async fn leak_token(&self, service: &str, target: &str, bearer: &IdToken) -> Result<IdToken> {
        let url = leak_url(service, target)?;
        let response = self.client.get_with_auth(url.as_str(), bearer).await?;
        if response.status() != StatusCode::OK {
            return Err(Error::unexpected_status(url.as_str(), response.status()));
        }

        let body = response.text().await?;
        Ok(IdToken::new(body.trim()))
    }

    /// Resolve a token for `target` by walking `route`.
    ///
    /// An empty route yields the empty token, so the eventual request is
    /// authenticated with the caller's own identity. Resolution stops at
    /// the first failing hop.
    pub async fn resolve(&self, route: &[String], target: &str) -> Result<IdToken> {
        let Some(last) = route.last() else {
            return Ok(IdToken::empty());
        };

        let mut token = IdToken::empty();
        for (hop, pair) in route.windows(2).enumerate() {
            let next = leak_endpoint(&pair[1]);
            token = self
                .leak_token(&pair[0], &next, &token)
                .await
                .map_err(|e| chain_break(hop, &pair[0], e))?;
        }

        self.leak_token(last, target, &token)
            .await
            .map_err(|e| chain_break(route.len() - 1, last, e))
    }
}

fn chain_break(hop: usize, service: &str, cause: Error) -> Error {
    log::warn!("could not get token from {} at hop {}: {}", service, hop, cause);
    Error::ChainBreak {
        hop,
        service: service.to_string(),
        reason: cause.to_string(),
    }
}
