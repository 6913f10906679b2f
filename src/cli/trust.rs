//! Trust command implementation
//!
//! Records a gateway certificate fingerprint on a profile after the user
//! has decided to trust it. Connect reports the fingerprint when a
//! gateway presents an untrusted certificate.

use fvpn_core::{
    config::ProfileStore,
    error::{ConfigError, FvpnError},
};

/// Run the trust command
pub fn run_trust(profile_name: &str, fingerprint: &str) -> Result<(), FvpnError> {
    let fingerprint = fingerprint.trim().to_lowercase();

    if fingerprint.len() != 64 || !fingerprint.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(FvpnError::Config(ConfigError::ValidationError {
            message: "Fingerprint must be a 64-character sha256 hex digest".to_string(),
        }));
    }

    let mut store = ProfileStore::load()?;
    store.set_trusted_cert(profile_name, fingerprint.clone())?;
    store.save()?;

    println!("Recorded trusted certificate for '{}'.", profile_name);
    println!("  {}", fingerprint);
    println!("Reconnect with: fvpn connect {}", profile_name);
    Ok(())
}
