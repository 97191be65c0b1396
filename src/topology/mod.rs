//! Topology registry
//!
//! The intruder's static view of the mesh: every attackable service, the
//! offset its local attack numbers are shifted by, and the route of
//! services whose leaked tokens reach it.

use crate::config::{MeshConfig, Peer};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIdentity {
    pub name: String,
    pub base_url: String,
    pub offset: u32,
    /// Base URLs to chain through, first hop first
    #[serde(default)]
    pub route: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TopologyFile {
    #[serde(default = "default_attack_span")]
    attack_span: u32,
    #[serde(default)]
    services: Vec<ServiceIdentity>,
}

fn default_attack_span() -> u32 {
    crate::config::DEFAULT_ATTACK_SPAN
}

/// Validated, immutable set of services
#[derive(Debug, Clone)]
pub struct Topology {
    services: Vec<ServiceIdentity>,
    attack_span: u32,
}

impl Topology {
    pub fn new(services: Vec<ServiceIdentity>, attack_span: u32) -> Result<Self> {
        let topology = Self {
            services: services
                .into_iter()
                .map(|mut s| {
                    s.base_url = s.base_url.trim_end_matches('/').to_string();
                    s.route = s
                        .route
                        .into_iter()
                        .map(|r| r.trim_end_matches('/').to_string())
                        .collect();
                    s
                })
                .collect(),
            attack_span,
        };
        topology.validate()?;
        Ok(topology)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: TopologyFile = toml::from_str(contents)
            .map_err(|e| Error::Config(format!("Failed to parse topology: {}", e)))?;
        Self::new(file.services, file.attack_span)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read topology file: {}", e)))?;
        Self::from_toml_str(&contents)
    }

    /// The standard five-service mesh built from configured peer URLs.
    ///
    /// Services whose own URL or any route URL is missing are left out.
    pub fn from_config(config: &MeshConfig) -> Result<Self> {
        let layout: [(Peer, &[Peer]); 5] = [
            (Peer::Website, &[]),
            (Peer::Order, &[Peer::Website]),
            (Peer::Payment, &[Peer::Website]),
            (Peer::Number, &[Peer::Website, Peer::Order]),
            (Peer::Print, &[Peer::Website, Peer::Order]),
        ];

        let mut services = Vec::new();
        for (slot, (peer, route)) in layout.iter().enumerate() {
            let Some(base_url) = config.peer(*peer) else {
                log::warn!("{} not set, leaving {} out of the topology", peer.env_var(), peer.service_name());
                continue;
            };
            let route: Option<Vec<String>> = route
                .iter()
                .map(|hop| config.peer(*hop).map(str::to_string))
                .collect();
            let Some(route) = route else {
                log::warn!("route to {} is incomplete, leaving it out of the topology", peer.service_name());
                continue;
            };

            let offset = (slot as u32).checked_mul(config.attack_span).ok_or_else(|| {
                Error::Config(format!("ATTACK_SPAN {} too large", config.attack_span))
            })?;
            services.push(ServiceIdentity {
                name: peer.service_name().to_string(),
                base_url: base_url.to_string(),
                offset,
                route,
            });
        }

        Self::new(services, config.attack_span)
    }

    pub fn services(&self) -> &[ServiceIdentity] {
        &self.services
    }

    pub fn attack_span(&self) -> u32 {
        self.attack_span
    }

    pub fn get(&self, name: &str) -> Option<&ServiceIdentity> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn route_for(&self, name: &str) -> Option<&[String]> {
        self.get(name).map(|s| s.route.as_slice())
    }

    /// Global attack id for `local` on `service`
    pub fn global_id(&self, service: &ServiceIdentity, local: u32) -> Result<u32> {
        if local >= self.attack_span {
            return Err(Error::MalformedInput(format!(
                "attack {} of {} is outside [0, {})",
                local, service.name, self.attack_span
            )));
        }
        Ok(service.offset + local)
    }

    fn validate(&self) -> Result<()> {
        if self.attack_span == 0 {
            return Err(Error::Topology("attack span must be > 0".to_string()));
        }

        let mut names = HashSet::new();
        let mut by_url: HashMap<&str, &ServiceIdentity> = HashMap::new();
        for service in &self.services {
            if service.name.is_empty() {
                return Err(Error::Topology("service with empty name".to_string()));
            }
            url::Url::parse(&service.base_url).map_err(|e| {
                Error::Topology(format!("{} has invalid URL {}: {}", service.name, service.base_url, e))
            })?;
            if !names.insert(service.name.as_str()) {
                return Err(Error::Topology(format!("duplicate service name {}", service.name)));
            }
            if by_url.insert(service.base_url.as_str(), service).is_some() {
                return Err(Error::Topology(format!("duplicate base URL {}", service.base_url)));
            }
            service.offset.checked_add(self.attack_span).ok_or_else(|| {
                Error::Topology(format!("offset of {} overflows", service.name))
            })?;
        }

        let mut offsets: Vec<(u32, &str)> = self
            .services
            .iter()
            .map(|s| (s.offset, s.name.as_str()))
            .collect();
        offsets.sort_unstable();
        for pair in offsets.windows(2) {
            if pair[1].0 - pair[0].0 < self.attack_span {
                return Err(Error::Topology(format!(
                    "offsets of {} ({}) and {} ({}) are closer than {}",
                    pair[0].1, pair[0].0, pair[1].1, pair[1].0, self.attack_span
                )));
            }
        }

        for service in &self.services {
            let mut seen = HashSet::new();
            for hop in &service.route {
                if hop == &service.base_url {
                    return Err(Error::Topology(format!("{} routes through itself", service.name)));
                }
                if !by_url.contains_key(hop.as_str()) {
                    return Err(Error::Topology(format!(
                        "{} routes through unregistered {}",
                        service.name, hop
                    )));
                }
                if !seen.insert(hop.as_str()) {
                    return Err(Error::Topology(format!(
                        "{} routes through {} twice",
                        service.name, hop
                    )));
                }
            }
        }

        self.check_acyclic(&by_url)
    }

    /// Depth-first search over "routes through" edges
    fn check_acyclic(&self, by_url: &HashMap<&str, &ServiceIdentity>) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            service: &'a ServiceIdentity,
            by_url: &HashMap<&str, &'a ServiceIdentity>,
            marks: &mut HashMap<&'a str, Mark>,
        ) -> Result<()> {
            match marks.get(service.base_url.as_str()) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    return Err(Error::Topology(format!(
                        "route cycle through {}",
                        service.name
                    )))
                }
                None => {}
            }

            marks.insert(service.base_url.as_str(), Mark::Visiting);
            for hop in &service.route {
                if let Some(&next) = by_url.get(hop.as_str()) {
                    visit(next, by_url, marks)?;
                }
            }
            marks.insert(service.base_url.as_str(), Mark::Done);
            Ok(())
        }

        let mut marks = HashMap::new();
        for service in &self.services {
            visit(service, by_url, &mut marks)?;
        }
        Ok(())
    }
}
