//! Connect command implementation
//!
//! Drives a full connection sequence in the foreground: resolve the
//! profile, assemble credentials, hand the gateway list to the failover
//! sequencer and render its event stream until the session ends.
//! Ctrl-C requests a clean disconnect.

use crate::cli::prompt_input;
use colored::Colorize;
use fvpn_core::{
    auth::keyring,
    config::ProfileStore,
    error::{FvpnError, KeyringError},
    types::Credentials,
    vpn::{
        format_bytes, ConnectionManager, ConnectionState, FailoverPolicy, OpenfortivpnLauncher,
        SysfsStats, VpnEvent,
    },
};
use std::io::{self, Write};
use std::sync::Arc;
use tracing::info;

/// Run the connect command
pub async fn run_connect(profile_name: &str) -> Result<(), FvpnError> {
    let store = ProfileStore::load()?;
    let profile = store.find(profile_name)?.clone();
    profile.validate().map_err(|message| {
        FvpnError::Config(fvpn_core::error::ConfigError::ValidationError { message })
    })?;

    println!(
        "Connecting profile '{}' ({} gateway{})",
        profile.name,
        profile.gateways.len(),
        if profile.gateways.len() == 1 { "" } else { "s" }
    );

    // Keyring first, interactive fallback when no password is stored
    let password = match keyring::retrieve_password(&profile.name) {
        Ok(password) => password,
        Err(FvpnError::Keyring(KeyringError::PasswordNotFound)) => {
            println!("No stored password for '{}'.", profile.name);
            prompt_input("Password: ")?
        }
        Err(e) => return Err(e),
    };

    let otp = if profile.otp_enabled {
        let token = prompt_input("One-time password: ")?;
        if token.is_empty() {
            None
        } else {
            Some(token)
        }
    } else {
        None
    };

    let credentials = Credentials::new(&profile.username, password)
        .with_otp(otp)
        .with_trusted_cert(profile.trusted_cert.clone());

    let (manager, mut events) = ConnectionManager::new(
        Arc::new(OpenfortivpnLauncher::default()),
        Arc::new(SysfsStats),
        FailoverPolicy::default(),
    );

    info!(profile = %profile.name, "starting connection sequence");
    manager.connect(profile.gateways.clone(), credentials);

    let mut outcome: Result<(), FvpnError> = Ok(());
    let mut disconnect_requested = false;
    let mut traffic_line_active = false;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if signal.is_ok() && !disconnect_requested {
                    disconnect_requested = true;
                    if traffic_line_active {
                        println!();
                        traffic_line_active = false;
                    }
                    println!("Disconnecting...");
                    manager.disconnect();
                }
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                let done = render_event(
                    &event,
                    &profile.name,
                    &mut outcome,
                    &mut traffic_line_active,
                );
                if done {
                    // Drain anything emitted before the final transition,
                    // certificate prompts in particular
                    while let Ok(event) = events.try_recv() {
                        render_event(&event, &profile.name, &mut outcome, &mut traffic_line_active);
                    }
                    break;
                }
            }
        }
    }

    manager.shutdown().await;
    outcome
}

/// Render one sequencer event; returns true when the sequence is over
fn render_event(
    event: &VpnEvent,
    profile_name: &str,
    outcome: &mut Result<(), FvpnError>,
    traffic_line_active: &mut bool,
) -> bool {
    // Traffic samples redraw in place; anything else gets its own line
    if *traffic_line_active && !matches!(event, VpnEvent::Traffic(_)) {
        println!();
        *traffic_line_active = false;
    }

    match event {
        VpnEvent::StateChanged(state) => {
            let label = match state {
                ConnectionState::Disconnected => "disconnected".red(),
                ConnectionState::Connecting => "connecting".yellow(),
                ConnectionState::Failover => "failover".yellow(),
                ConnectionState::Connected => "connected".green(),
            };
            println!("State: {}", label);
            matches!(state, ConnectionState::Disconnected)
        }
        VpnEvent::LogLine(line) => {
            println!("{}", line.dimmed());
            false
        }
        VpnEvent::SessionEstablished(session) => {
            if let Some(interface) = &session.interface {
                println!("Interface: {}", interface.bold());
            }
            if let Some(local) = session.local_ip {
                println!("Local IP:  {}", local);
            }
            if let Some(remote) = session.remote_ip {
                println!("Remote IP: {}", remote);
            }
            false
        }
        VpnEvent::Traffic(sample) => {
            print!(
                "\r{} {:>8}  {} {:>8}",
                "↓".green(),
                format_bytes(sample.rx_bytes),
                "↑".cyan(),
                format_bytes(sample.tx_bytes)
            );
            let _ = io::stdout().flush();
            *traffic_line_active = true;
            false
        }
        VpnEvent::CertificateTrustRequired(fingerprint) => {
            println!("{}", "Gateway certificate is not trusted.".red().bold());
            println!("Fingerprint: {}", fingerprint);
            println!("If you trust this gateway, record the fingerprint and reconnect:");
            println!("  fvpn trust {} {}", profile_name, fingerprint);
            false
        }
        VpnEvent::ConnectionFailed(error) => {
            *outcome = Err(FvpnError::Connect(error.clone()));
            false
        }
    }
}
