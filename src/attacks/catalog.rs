//! Attack discovery and the TTL catalog cache

use super::{parse_attack_listing, AttackCatalog, AttackDescriptor};
use crate::chain::ChainResolver;
use crate::error::{Error, Result};
use crate::identity::IdToken;
use crate::topology::{ServiceIdentity, Topology};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryFailure {
    pub service: String,
    pub error: String,
}

/// Result of one discovery pass over the topology
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub catalog: AttackCatalog,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<DiscoveryFailure>,
}

impl DiscoveryReport {
    /// Build a catalog from per-service outcomes; failed services contribute nothing
    pub fn from_outcomes(
        outcomes: impl IntoIterator<Item = (String, Result<Vec<AttackDescriptor>>)>,
    ) -> Self {
        let mut report = Self::default();
        for (service, outcome) in outcomes {
            match outcome {
                Ok(descriptors) => {
                    for descriptor in descriptors {
                        if let Some(previous) = report.catalog.insert(descriptor.number, descriptor) {
                            log::warn!(
                                "attack {} of {} was shadowed",
                                previous.number,
                                previous.component
                            );
                        }
                    }
                }
                Err(e) => {
                    log::error!("could not fetch attack list from {}: {}", service, e);
                    report.failures.push(DiscoveryFailure {
                        service,
                        error: e.to_string(),
                    });
                }
            }
        }
        report
    }
}

/// One full discovery pass
#[async_trait::async_trait]
pub trait AttackDiscovery: Send + Sync {
    async fn discover(&self) -> DiscoveryReport;
}

/// Discovers attacks by chaining tokens to every service in the topology
pub struct MeshDiscovery {
    topology: Arc<Topology>,
    resolver: ChainResolver,
}

impl MeshDiscovery {
    pub fn new(topology: Arc<Topology>, resolver: ChainResolver) -> Self {
        Self { topology, resolver }
    }

    async fn list_service(&self, service: &ServiceIdentity) -> Result<Vec<AttackDescriptor>> {
        let target = format!("{}/attacks", service.base_url);
        let token: IdToken = self.resolver.resolve(&service.route, &target).await?;

        let response = self.resolver.client().get_with_auth(&target, &token).await?;
        if response.status() != StatusCode::OK {
            return Err(Error::unexpected_status(target, response.status()));
        }
        let body = response.text().await?;

        parse_attack_listing(&body)?
            .into_iter()
            .map(|local| {
                Ok(AttackDescriptor {
                    component: service.name.clone(),
                    number: self.topology.global_id(service, local)?,
                    local,
                    url: format!("{}/attacks/{}", service.base_url, local),
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl AttackDiscovery for MeshDiscovery {
    async fn discover(&self) -> DiscoveryReport {
        let mut outcomes = Vec::with_capacity(self.topology.services().len());
        for service in self.topology.services() {
            outcomes.push((service.name.clone(), self.list_service(service).await));
        }
        DiscoveryReport::from_outcomes(outcomes)
    }
}

/// Catalog rebuilt from discovery at most once per TTL.
///
/// Readers load the published catalog without locking. The staleness
/// check and the rebuild share one async mutex, so concurrent stale
/// callers wait for a single rebuild instead of starting their own.
pub struct CatalogCache {
    discovery: Arc<dyn AttackDiscovery>,
    ttl: Duration,
    catalog: ArcSwap<AttackCatalog>,
    failures: ArcSwap<Vec<DiscoveryFailure>>,
    refreshed_at: Mutex<Option<Instant>>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl CatalogCache {
    pub fn new(discovery: Arc<dyn AttackDiscovery>, ttl: Duration) -> Self {
        Self {
            discovery,
            ttl,
            catalog: ArcSwap::from_pointee(AttackCatalog::new()),
            failures: ArcSwap::from_pointee(Vec::new()),
            refreshed_at: Mutex::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Current catalog, possibly stale
    pub fn get(&self) -> Arc<AttackCatalog> {
        self.catalog.load_full()
    }

    /// Services that failed during the last rebuild
    pub fn last_failures(&self) -> Arc<Vec<DiscoveryFailure>> {
        self.failures.load_full()
    }

    pub fn last_refreshed_at(&self) -> Option<Instant> {
        *self.refreshed_at.lock()
    }

    pub fn is_stale(&self) -> bool {
        match *self.refreshed_at.lock() {
            None => true,
            Some(at) => at.elapsed() >= self.ttl,
        }
    }

    /// Rebuild if the catalog is older than the TTL, then return it
    pub async fn refresh_if_stale(&self) -> Arc<AttackCatalog> {
        let _guard = self.refresh_lock.lock().await;
        if self.is_stale() {
            self.rebuild().await;
        }
        self.get()
    }

    /// Rebuild regardless of age
    pub async fn refresh(&self) -> Arc<AttackCatalog> {
        let _guard = self.refresh_lock.lock().await;
        self.rebuild().await;
        self.get()
    }

    async fn rebuild(&self) {
        let started = Instant::now();
        let report = self.discovery.discover().await;
        log::info!(
            "attack catalog rebuilt: {} attacks, {} services failed, {}ms",
            report.catalog.len(),
            report.failures.len(),
            started.elapsed().as_millis()
        );

        self.catalog.store(Arc::new(report.catalog));
        self.failures.store(Arc::new(report.failures));
        *self.refreshed_at.lock() = Some(Instant::now());
    }
}
