//! Command-line interface definitions

use clap::{Parser, Subcommand};
use leaky_mesh::config::Role;
use std::path::PathBuf;

/// Command-line interface for the mesh binary
#[derive(Parser)]
#[command(name = "leaky-mesh")]
#[command(about = "Deliberately vulnerable service mesh for token-chaining exercises")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one mesh role as an HTTP server
    Serve {
        #[arg(long, value_enum)]
        role: Role,

        /// Overrides PORT
        #[arg(long)]
        port: Option<u16>,

        /// Topology file for the intruder, instead of the configured peers
        #[arg(long)]
        topology: Option<PathBuf>,
    },

    /// Run one discovery pass and print the catalog
    Discover {
        #[arg(long)]
        topology: Option<PathBuf>,
    },

    /// Discover, then launch one attack or all of them
    Launch {
        /// Global attack id; all attacks when omitted
        id: Option<u32>,

        #[arg(long)]
        topology: Option<PathBuf>,
    },
}

impl Commands {
    pub fn topology_path(&self) -> Option<&PathBuf> {
        match self {
            Commands::Serve { topology, .. }
            | Commands::Discover { topology }
            | Commands::Launch { topology, .. } => topology.as_ref(),
        }
    }
}
