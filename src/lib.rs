//! Leaky Mesh - a deliberately vulnerable service mesh
//!
//! Five business services trust any bearer token minted for them, and each
//! one will mint a token for any audience on request. The intruder role
//! exploits this by chaining leaked tokens through the mesh:
//! - identity: bearer tokens and where they come from
//! - client: authenticated outbound calls
//! - chain: resolving a token through a route of leaking services
//! - topology: which services exist and how to reach them
//! - attacks: discovery, the catalog cache, dispatch and scoring
//! - services: the HTTP roles themselves

pub mod attacks;
pub mod chain;
pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod services;
pub mod store;
pub mod topology;

pub use attacks::{
    AttackCatalog, AttackDescriptor, AttackDispatcher, AttackResult, AttackSummary, CatalogCache,
};
pub use chain::ChainResolver;
pub use client::AuthClient;
pub use config::{MeshConfig, Role};
pub use error::{Error, ErrorKind, Result};
pub use identity::{IdToken, IdTokenSource};
pub use topology::{ServiceIdentity, Topology};
