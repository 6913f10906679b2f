//! Legacy openfortivpn config import
//!
//! Detects hand-written openfortivpn `key = value` config files in their
//! usual locations and converts them to profiles. Passwords found in
//! legacy files are reported so the caller can move them to the keyring.

use crate::config::Profile;
use crate::types::GatewayTarget;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Locations openfortivpn reads configs from
pub fn legacy_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(home) = std::env::var("HOME") {
        paths.push(PathBuf::from(home).join(".openfortivpn").join("config"));
    }
    paths.push(PathBuf::from("/etc/openfortivpn/config"));
    paths
}

/// A parsed legacy config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyConfig {
    pub path: PathBuf,
    pub entries: HashMap<String, String>,
}

impl LegacyConfig {
    /// True if the file carries a plaintext password
    pub fn has_password(&self) -> bool {
        self.entries
            .get("password")
            .map(|p| !p.is_empty())
            .unwrap_or(false)
    }

    /// Convert to a profile, if the file carries enough to connect with
    pub fn to_profile(&self, name: &str) -> Option<Profile> {
        let host = self.entries.get("host")?.clone();
        let port = self
            .entries
            .get("port")
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(443);
        let username = self.entries.get("username")?.clone();

        Some(Profile {
            name: name.to_string(),
            username,
            gateways: vec![GatewayTarget::new(host, port)],
            trusted_cert: self
                .entries
                .get("trusted-cert")
                .filter(|c| !c.is_empty())
                .cloned(),
            otp_enabled: false,
        })
    }
}

/// Parse an openfortivpn config file (`key = value`, `#` comments)
pub fn parse_config(path: &Path) -> std::io::Result<LegacyConfig> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = HashMap::new();

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            entries.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    Ok(LegacyConfig {
        path: path.to_path_buf(),
        entries,
    })
}

/// Scan the usual locations for readable legacy configs
pub fn detect_legacy_configs() -> Vec<LegacyConfig> {
    let mut found = Vec::new();
    for path in legacy_config_paths() {
        if !path.exists() {
            continue;
        }
        match parse_config(&path) {
            Ok(config) => found.push(config),
            Err(e) => warn!("Error parsing {:?}: {}", path, e),
        }
    }
    found
}
