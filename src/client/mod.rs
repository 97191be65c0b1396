//! Authenticated outbound HTTP
//!
//! Every call between mesh services goes through `AuthClient`. A caller
//! either presents a token it already holds or, with an empty token,
//! gets a fresh one minted for the full request URL.

use crate::error::Result;
use crate::identity::{IdToken, IdTokenSource};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Response};
use serde::Serialize;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    tokens: Arc<dyn IdTokenSource>,
}

impl AuthClient {
    /// Calls are awaited without a timeout; a hanging peer stalls the caller
    pub fn new(tokens: Arc<dyn IdTokenSource>) -> Self {
        Self::with_http_client(reqwest::Client::new(), tokens)
    }

    pub fn with_http_client(http: reqwest::Client, tokens: Arc<dyn IdTokenSource>) -> Self {
        Self { http, tokens }
    }

    pub fn token_source(&self) -> &Arc<dyn IdTokenSource> {
        &self.tokens
    }

    /// Issue `method url` with `Authorization: Bearer <token>`.
    ///
    /// An empty `token` is replaced by one minted for `url` itself,
    /// query string included. Any status is returned to the caller.
    pub async fn do_authenticated(
        &self,
        method: Method,
        url: &str,
        body: Option<(Vec<u8>, &str)>,
        token: &IdToken,
    ) -> Result<Response> {
        let token = if token.is_empty() {
            self.tokens.mint(url).await?
        } else {
            token.clone()
        };

        let mut request = self
            .http
            .request(method.clone(), url)
            .header(AUTHORIZATION, format!("Bearer {}", token.as_str()));
        if let Some((bytes, content_type)) = body {
            request = request.header(CONTENT_TYPE, content_type).body(bytes);
        }

        let response = request.send().await?;
        log::debug!("{} {} -> {}", method, url, response.status());
        Ok(response)
    }

    pub async fn get_with_auth(&self, url: &str, token: &IdToken) -> Result<Response> {
        self.do_authenticated(Method::GET, url, None, token).await
    }

    pub async fn head_with_auth(&self, url: &str, token: &IdToken) -> Result<Response> {
        self.do_authenticated(Method::HEAD, url, None, token).await
    }

    pub async fn post_json_with_auth<T: Serialize + ?Sized>(
        &self,
        url: &str,
        payload: &T,
        token: &IdToken,
    ) -> Result<Response> {
        let bytes = serde_json::to_vec(payload)?;
        self.do_authenticated(Method::POST, url, Some((bytes, "application/json")), token)
            .await
    }
}
