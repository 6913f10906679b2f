//! fvpn - Fortinet VPN CLI tool
//!
//! A command-line tool for managing Fortinet VPN connections with
//! openfortivpn: multi-gateway failover, keyring credential storage and
//! live traffic statistics.

use clap::{Parser, Subcommand};
use fvpn_core::{error::FvpnError, init_logging};

mod cli;

#[derive(Parser)]
#[command(name = "fvpn")]
#[command(about = "Fortinet VPN CLI with gateway failover and secure credential storage")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update a connection profile
    Setup,
    /// Connect using a profile (Ctrl-C disconnects)
    Connect {
        /// Profile name
        profile: String,
    },
    /// List configured profiles
    Profiles,
    /// Remove a profile and its stored password
    Remove {
        /// Profile name
        profile: String,
    },
    /// Import existing openfortivpn config files as profiles
    Import,
    /// Record a gateway certificate fingerprint as trusted
    Trust {
        /// Profile name
        profile: String,
        /// sha256 fingerprint reported by a failed connect
        fingerprint: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(2);
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Setup => cli::setup::run_setup(),
        Commands::Connect { profile } => cli::connect::run_connect(&profile).await,
        Commands::Profiles => cli::profiles::run_list(),
        Commands::Remove { profile } => cli::profiles::run_remove(&profile),
        Commands::Import => cli::import::run_import(),
        Commands::Trust {
            profile,
            fingerprint,
        } => cli::trust::run_trust(&profile, &fingerprint),
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {}", e);
            let exit_code = match e {
                // Configuration and credential setup issues
                FvpnError::Config(_)
                | FvpnError::Keyring(_)
                | FvpnError::Toml(_)
                | FvpnError::TomlSerialize(_) => 2,
                // Runtime connection failures
                FvpnError::Connect(_) | FvpnError::Staging(_) | FvpnError::Io(_) => 1,
            };
            std::process::exit(exit_code);
        }
    }
}
