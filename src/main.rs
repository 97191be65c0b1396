use clap::Parser;
use leaky_mesh::attacks::{AttackDiscovery, MeshDiscovery};
use leaky_mesh::chain::ChainResolver;
use leaky_mesh::client::AuthClient;
use leaky_mesh::config::{MeshConfig, Role};
use leaky_mesh::services::{self, IntruderState, MeshState};
use leaky_mesh::topology::Topology;
use leaky_mesh::Result;
use std::sync::Arc;

mod app_config;

use app_config::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = MeshConfig::from_env()?;
    let topology = cli
        .command
        .topology_path()
        .map(|path| Topology::load(path))
        .transpose()?;

    match cli.command {
        Commands::Serve { role, port, .. } => {
            if let Some(port) = port {
                config.port = port;
            }
            let port = config.port;
            let config = Arc::new(config);
            let tokens = config.token_source(role.service_name());

            log::info!("starting {} on port {}", role.service_name(), port);
            let app = services::build_router(role, config, tokens, topology)?;
            services::serve(app, port).await
        }

        Commands::Discover { .. } => {
            let topology = topology_or_default(&config, topology)?;
            let tokens = config.token_source(Role::Intruder.service_name());
            let resolver = ChainResolver::new(AuthClient::new(tokens));

            let report = MeshDiscovery::new(Arc::new(topology), resolver).discover().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }

        Commands::Launch { id, .. } => {
            let topology = topology_or_default(&config, topology)?;
            let config = Arc::new(config);
            let tokens = config.token_source(Role::Intruder.service_name());
            let intruder = IntruderState::new(
                MeshState::new(Role::Intruder, config, tokens),
                Arc::new(topology),
            );

            intruder.cache().refresh().await;
            for failure in intruder.cache().last_failures().iter() {
                log::warn!("{} left out: {}", failure.service, failure.error);
            }

            let summary = match id {
                Some(id) => intruder.dispatcher.launch_one(id).await?,
                None => intruder.dispatcher.launch_all().await,
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
    }
}

fn topology_or_default(config: &MeshConfig, topology: Option<Topology>) -> Result<Topology> {
    match topology {
        Some(topology) => Ok(topology),
        None => Topology::from_config(config),
    }
}
