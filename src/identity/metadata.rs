//! Identity tokens from the platform metadata server (or its local emulator)

use super::{IdToken, IdTokenSource};
use crate::error::{Error, Result};

const METADATA_HOST: &str = "http://metadata.google.internal";
const IDENTITY_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/identity";

/// Mints tokens by asking the metadata server for an identity token
pub struct MetadataTokenSource {
    client: reqwest::Client,
    base_url: String,
    key: Option<String>,
}

impl MetadataTokenSource {
    /// The real metadata server reachable from cloud workloads
    pub fn cloud() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: METADATA_HOST.to_string(),
            key: None,
        }
    }

    /// A local metadata emulator listening on `port`, guarded by `key`
    pub fn emulator(port: u16, key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("http://localhost:{}", port),
            key,
        }
    }

    fn identity_url(&self, audience: &str) -> Result<url::Url> {
        let mut url = url::Url::parse(&format!("{}{}", self.base_url, IDENTITY_PATH))?;
        url.query_pairs_mut()
            .append_pair("audience", audience)
            .append_pair("format", "full");
        Ok(url)
    }
}

#[async_trait::async_trait]
impl IdTokenSource for MetadataTokenSource {
    async fn mint(&self, audience: &str) -> Result<IdToken> {
        let url = self.identity_url(audience)?;
        let mut request = self.client.get(url).header("Metadata-Flavor", "Google");
        if let Some(key) = &self.key {
            request = request.header("Metadata-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::TokenSource(format!("metadata server unreachable: {}", e)))?;
        if !response.status().is_success() {
            return Err(Error::TokenSource(format!(
                "metadata server answered {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        Ok(IdToken::new(body.trim()))
    }
}
