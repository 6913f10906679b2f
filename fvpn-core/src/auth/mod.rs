//! Credential storage collaborators
//!
//! VPN passwords live in the system keyring, never in the profile file.

pub mod keyring;
