//! Launching attacks by global id and scoring them

use super::{AttackCatalog, AttackDescriptor, AttackResult, AttackSummary, CatalogCache};
use crate::chain::ChainResolver;
use crate::error::{Error, Result};
use crate::topology::Topology;
use reqwest::StatusCode;
use std::sync::Arc;

pub struct AttackDispatcher {
    cache: Arc<CatalogCache>,
    topology: Arc<Topology>,
    resolver: ChainResolver,
}

impl AttackDispatcher {
    pub fn new(cache: Arc<CatalogCache>, topology: Arc<Topology>, resolver: ChainResolver) -> Self {
        Self {
            cache,
            topology,
            resolver,
        }
    }

    pub fn cache(&self) -> &Arc<CatalogCache> {
        &self.cache
    }

    /// The catalog as currently cached
    pub fn list_attacks(&self) -> Arc<AttackCatalog> {
        self.cache.get()
    }

    /// Run a single attack and return its own result
    pub async fn launch(&self, id: u32) -> Result<AttackResult> {
        let catalog = self.cache.get();
        let descriptor = catalog.get(&id).ok_or(Error::UnknownAttack(id))?;
        self.invoke(descriptor).await
    }

    /// Run a single attack; only an unknown id is an error
    pub async fn launch_one(&self, id: u32) -> Result<AttackSummary> {
        match self.launch(id).await {
            Err(e @ Error::UnknownAttack(_)) => Err(e),
            outcome => Ok(AttackSummary::from_outcomes([(id, outcome)])),
        }
    }

    /// Run every cataloged attack, one after another
    pub async fn launch_all(&self) -> AttackSummary {
        let catalog = self.cache.get();
        let mut outcomes = Vec::with_capacity(catalog.len());
        for (id, descriptor) in catalog.iter() {
            outcomes.push((*id, self.invoke(descriptor).await));
        }

        let summary = AttackSummary::from_outcomes(outcomes);
        log::info!(
            "launched {} attacks, score {}, {} failed",
            summary.attack_results.len(),
            summary.score,
            summary.failures.len()
        );
        summary
    }

    async fn invoke(&self, descriptor: &AttackDescriptor) -> Result<AttackResult> {
        let route = self.topology.route_for(&descriptor.component).ok_or_else(|| {
            Error::Topology(format!("{} is not in the topology", descriptor.component))
        })?;
        let token = self.resolver.resolve(route, &descriptor.url).await?;

        log::info!("launching attack {} at {}", descriptor.number, descriptor.url);
        let response = self
            .resolver
            .client()
            .get_with_auth(&descriptor.url, &token)
            .await?;
        if response.status() != StatusCode::OK {
            return Err(Error::unexpected_status(&descriptor.url, response.status()));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| Error::Upstream {
            url: descriptor.url.clone(),
            reason: format!("error parsing attack response from {}: {}", descriptor.component, e),
        })
    }
}
