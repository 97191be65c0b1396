//! Attack results, catalogs and summaries

pub mod catalog;
pub mod dispatch;

pub use catalog::{AttackDiscovery, CatalogCache, DiscoveryFailure, DiscoveryReport, MeshDiscovery};
pub use dispatch::AttackDispatcher;

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Something an attack managed to exfiltrate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loot {
    pub key: String,
    pub data: String,
}

/// Outcome reported by an attack endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackResult {
    pub points: u32,
    pub explanation: String,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "null_as_empty"
    )]
    pub loot: Vec<Loot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<Loot>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Loot>>::deserialize(deserializer)?.unwrap_or_default())
}

impl AttackResult {
    pub fn new(explanation: impl Into<String>) -> Self {
        Self {
            explanation: explanation.into(),
            ..Default::default()
        }
    }

    pub fn succeed(mut self, points: u32) -> Self {
        self.points = points;
        self
    }

    /// Zero points, with `message` (or a generic note) in the log
    pub fn fail(mut self, message: Option<&str>) -> Self {
        self.points = 0;
        self.log = Some(message.unwrap_or("attack failed").to_string());
        self
    }

    pub fn with_loot(mut self, key: impl Into<String>, data: impl Into<String>) -> Self {
        self.loot.push(Loot {
            key: key.into(),
            data: data.into(),
        });
        self
    }

    /// Failing result standing in for an attack that could not be run
    pub fn dispatch_failure(id: u32, error: &Error) -> Self {
        Self::new(format!("error on attack {}: {}", id, error))
    }
}

/// Where a global attack id points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackDescriptor {
    /// Owning service name
    pub component: String,
    /// Global id
    pub number: u32,
    /// Id local to the owning service
    pub local: u32,
    pub url: String,
}

/// Global id to descriptor, ordered so equal catalogs serialize identically
pub type AttackCatalog = BTreeMap<u32, AttackDescriptor>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchFailure {
    pub id: u32,
    pub error: String,
}

/// Aggregated outcome of one dispatch request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackSummary {
    pub score: u64,
    pub attack_results: Vec<AttackResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<LaunchFailure>,
}

impl AttackSummary {
    /// Fold launch outcomes into a summary; failures score zero
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = (u32, Result<AttackResult>)>) -> Self {
        let mut summary = Self::default();
        for (id, outcome) in outcomes {
            let result = match outcome {
                Ok(result) => result,
                Err(e) => {
                    log::warn!("attack {} could not be launched: {}", id, e);
                    summary.failures.push(LaunchFailure {
                        id,
                        error: e.to_string(),
                    });
                    AttackResult::dispatch_failure(id, &e)
                }
            };
            summary.score += u64::from(result.points);
            summary.attack_results.push(result);
        }
        summary
    }
}

/// Parse a service's `GET /attacks` body: comma separated local ids
pub fn parse_attack_listing(body: &str) -> Result<Vec<u32>> {
    let body = body.trim();
    if body.is_empty() {
        return Ok(Vec::new());
    }

    body.split(',')
        .map(|entry| {
            let entry = entry.trim();
            entry
                .parse::<u32>()
                .map_err(|_| Error::MalformedInput(format!("not an attack number: {:?}", entry)))
        })
        .collect()
}

/// Format local ids the way `parse_attack_listing` reads them
pub fn format_attack_listing(locals: &[u32]) -> String {
    locals
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
