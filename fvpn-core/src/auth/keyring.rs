//! Keyring operations for secure credential storage
//!
//! Uses the system keyring (Secret Service on Linux) to store and
//! retrieve VPN passwords, keyed by profile name. The orchestrator never
//! persists secrets itself beyond the transient staged artifact.

use crate::error::{FvpnError, KeyringError};
use keyring::Entry;

/// Keyring service name for profile passwords
pub const KEYRING_SERVICE: &str = "fvpn-vpn-password";

/// Store a profile's VPN password in the system keyring
pub fn store_password(profile: &str, password: &str) -> Result<(), FvpnError> {
    let entry = Entry::new(KEYRING_SERVICE, profile)
        .map_err(|_| FvpnError::Keyring(KeyringError::ServiceUnavailable))?;

    entry
        .set_password(password)
        .map_err(|_| FvpnError::Keyring(KeyringError::StoreFailed))?;

    Ok(())
}

/// Retrieve a profile's VPN password from the system keyring
///
/// Callers should wrap the value in [`crate::types::Credentials`]
/// promptly; it is the only place the plaintext travels.
pub fn retrieve_password(profile: &str) -> Result<String, FvpnError> {
    let entry = Entry::new(KEYRING_SERVICE, profile)
        .map_err(|_| FvpnError::Keyring(KeyringError::ServiceUnavailable))?;

    entry
        .get_password()
        .map_err(|_| FvpnError::Keyring(KeyringError::PasswordNotFound))
}

/// Check whether a password is stored for the given profile
pub fn has_password(profile: &str) -> Result<bool, FvpnError> {
    let entry = Entry::new(KEYRING_SERVICE, profile)
        .map_err(|_| FvpnError::Keyring(KeyringError::ServiceUnavailable))?;

    Ok(entry.get_password().is_ok())
}

/// Delete a profile's password from the keyring
pub fn delete_password(profile: &str) -> Result<(), FvpnError> {
    let entry = Entry::new(KEYRING_SERVICE, profile)
        .map_err(|_| FvpnError::Keyring(KeyringError::ServiceUnavailable))?;

    // Missing entries are fine, deletion is idempotent
    let _ = entry.delete_credential();
    Ok(())
}
