//! Process configuration for mesh services
//!
//! Everything comes from the environment:
//! - `PORT` for the listening port
//! - `WEBSITE_SERVICE`, `ORDER_SERVICE`, `PAYMENT_SERVICE`, `NUMBER_SERVICE`,
//!   `PRINT_SERVICE` for peer base URLs
//! - `LOCAL_ENVIRONMENT`, `LOCAL_METADATA_PORT`, `LOCAL_METADATA_KEY` to pick
//!   the identity token source
//! - `CATALOG_TTL_SECS`, `ATTACK_SPAN` for the intruder

use crate::error::{Error, Result};
use crate::identity::{IdTokenSource, MetadataTokenSource, StubTokenSource};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_CATALOG_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_ATTACK_SPAN: u32 = 100;

/// Which service a process plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Website,
    Order,
    Payment,
    Number,
    Print,
    Intruder,
}

impl Role {
    /// Identity the role authenticates as
    pub fn service_name(&self) -> &'static str {
        match self {
            Role::Website => "website-service",
            Role::Order => "order-service",
            Role::Payment => "payment-service",
            Role::Number => "number-service",
            Role::Print => "print-service",
            Role::Intruder => "intruder-service",
        }
    }

    /// Peers the role cannot start without
    pub fn required_peers(&self) -> &'static [Peer] {
        match self {
            Role::Website => &[Peer::Order, Peer::Payment],
            Role::Order => &[Peer::Number],
            Role::Payment => &[Peer::Order, Peer::Number],
            Role::Print => &[Peer::Number],
            Role::Intruder => &[Peer::Website],
            Role::Number => &[],
        }
    }
}

/// A service other processes may reach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Peer {
    Website,
    Order,
    Payment,
    Number,
    Print,
}

impl Peer {
    pub const ALL: [Peer; 5] = [
        Peer::Website,
        Peer::Order,
        Peer::Payment,
        Peer::Number,
        Peer::Print,
    ];

    pub fn env_var(&self) -> &'static str {
        match self {
            Peer::Website => "WEBSITE_SERVICE",
            Peer::Order => "ORDER_SERVICE",
            Peer::Payment => "PAYMENT_SERVICE",
            Peer::Number => "NUMBER_SERVICE",
            Peer::Print => "PRINT_SERVICE",
        }
    }

    pub fn service_name(&self) -> &'static str {
        match self {
            Peer::Website => "website-service",
            Peer::Order => "order-service",
            Peer::Payment => "payment-service",
            Peer::Number => "number-service",
            Peer::Print => "print-service",
        }
    }
}

/// Where identity tokens come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenMode {
    /// Platform metadata server
    Cloud,
    /// Metadata emulator on localhost
    Emulator { port: u16, key: Option<String> },
    /// Locally signed tokens, no metadata at all
    Stub,
}

#[derive(Debug, Clone)]
pub struct MeshConfig {
    pub port: u16,
    pub peers: HashMap<Peer, String>,
    pub token_mode: TokenMode,
    pub catalog_ttl: Duration,
    pub attack_span: u32,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            peers: HashMap::new(),
            token_mode: TokenMode::Stub,
            catalog_ttl: DEFAULT_CATALOG_TTL,
            attack_span: DEFAULT_ATTACK_SPAN,
        }
    }
}

impl MeshConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from any key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(val) = get("PORT") {
            config.port = val
                .parse()
                .map_err(|_| Error::Config(format!("Invalid PORT: {}", val)))?;
        }

        for peer in Peer::ALL {
            if let Some(url) = get(peer.env_var()) {
                config
                    .peers
                    .insert(peer, url.trim_end_matches('/').to_string());
            }
        }

        let local = get("LOCAL_ENVIRONMENT").is_some();
        config.token_mode = match (local, get("LOCAL_METADATA_PORT")) {
            (false, _) => TokenMode::Cloud,
            (true, Some(port)) => TokenMode::Emulator {
                port: port
                    .parse()
                    .map_err(|_| Error::Config(format!("Invalid LOCAL_METADATA_PORT: {}", port)))?,
                key: get("LOCAL_METADATA_KEY"),
            },
            (true, None) => TokenMode::Stub,
        };

        if let Some(val) = get("CATALOG_TTL_SECS") {
            let secs: u64 = val
                .parse()
                .map_err(|_| Error::Config(format!("Invalid CATALOG_TTL_SECS: {}", val)))?;
            config.catalog_ttl = Duration::from_secs(secs);
        }

        if let Some(val) = get("ATTACK_SPAN") {
            config.attack_span = val
                .parse()
                .map_err(|_| Error::Config(format!("Invalid ATTACK_SPAN: {}", val)))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.attack_span == 0 {
            return Err(Error::Config("ATTACK_SPAN must be > 0".to_string()));
        }

        for (peer, url) in &self.peers {
            url::Url::parse(url).map_err(|e| {
                Error::Config(format!("{} is not a valid URL ({}): {}", peer.env_var(), url, e))
            })?;
        }

        Ok(())
    }

    pub fn peer(&self, peer: Peer) -> Option<&str> {
        self.peers.get(&peer).map(String::as_str)
    }

    /// Peer URL, or a configuration error naming the missing variable
    pub fn require(&self, peer: Peer) -> Result<&str> {
        self.peer(peer)
            .ok_or_else(|| Error::Config(format!("{} not set", peer.env_var())))
    }

    /// Fail unless every peer `role` depends on is configured
    pub fn check_required(&self, role: Role) -> Result<()> {
        for peer in role.required_peers() {
            self.require(*peer)?;
        }
        Ok(())
    }

    /// Token source for a process authenticating as `identity`
    pub fn token_source(&self, identity: &str) -> Arc<dyn IdTokenSource> {
        match &self.token_mode {
            TokenMode::Cloud => Arc::new(MetadataTokenSource::cloud()),
            TokenMode::Emulator { port, key } => {
                Arc::new(MetadataTokenSource::emulator(*port, key.clone()))
            }
            TokenMode::Stub => Arc::new(StubTokenSource::new(identity)),
        }
    }
}
