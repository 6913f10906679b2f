//! Profile configuration
//!
//! Handles loading and saving connection profiles from a TOML file in the
//! user's configuration directory. Profiles carry the ordered gateway
//! list that defines failover priority; passwords are stored separately
//! in the keyring.

use crate::error::{ConfigError, FvpnError};
use crate::types::GatewayTarget;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod legacy;

/// Default profiles file name
const PROFILES_FILE_NAME: &str = "profiles.toml";

/// One named connection profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile name, also the keyring lookup key
    pub name: String,

    /// Username for VPN authentication
    pub username: String,

    /// Ordered gateway list; order defines failover priority
    pub gateways: Vec<GatewayTarget>,

    /// Trusted gateway certificate fingerprint (sha256, 64 hex chars)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trusted_cert: Option<String>,

    /// Whether connecting prompts for a one-time token
    #[serde(default)]
    pub otp_enabled: bool,
}

impl Profile {
    /// Validate the profile
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("Profile name cannot be empty".to_string());
        }
        if self.username.is_empty() {
            return Err("Username cannot be empty".to_string());
        }
        if self.gateways.is_empty() {
            return Err("Profile needs at least one gateway".to_string());
        }
        for gw in &self.gateways {
            if gw.host.is_empty() {
                return Err("Gateway host cannot be empty".to_string());
            }
            if !gw
                .host
                .chars()
                .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
            {
                return Err(format!("Gateway host contains invalid characters: {}", gw.host));
            }
            if gw.port == 0 {
                return Err("Gateway port cannot be zero".to_string());
            }
        }
        if let Some(cert) = self.trusted_cert.as_deref() {
            if cert.len() != 64 || !cert.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err("Trusted cert must be a 64-character sha256 fingerprint".to_string());
            }
        }
        Ok(())
    }
}

/// On-disk profile collection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileStore {
    #[serde(default, rename = "profile")]
    pub profiles: Vec<Profile>,
}

impl ProfileStore {
    /// Load the profile store from the default location
    ///
    /// A missing file is an empty store, not an error.
    pub fn load() -> Result<Self, FvpnError> {
        Self::load_from_path(&get_profiles_path()?)
    }

    /// Load the profile store from a specific TOML file
    pub fn load_from_path(path: &Path) -> Result<Self, FvpnError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(FvpnError::Config(ConfigError::IoError {
                    message: format!("Failed to read profile file: {}", e),
                }))
            }
        };

        let store: ProfileStore = toml::from_str(&contents).map_err(|_| {
            FvpnError::Config(ConfigError::LoadFailed {
                path: path.to_string_lossy().to_string(),
            })
        })?;
        Ok(store)
    }

    /// Save the profile store to the default location
    pub fn save(&self) -> Result<(), FvpnError> {
        self.save_to_path(&get_profiles_path()?)
    }

    /// Save the profile store to a specific TOML file
    pub fn save_to_path(&self, path: &Path) -> Result<(), FvpnError> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                FvpnError::Config(ConfigError::IoError {
                    message: format!("Failed to create config directory: {}", e),
                })
            })?;
        }

        std::fs::write(path, contents).map_err(|e| {
            FvpnError::Config(ConfigError::IoError {
                message: format!("Failed to write profile file: {}", e),
            })
        })?;

        Ok(())
    }

    /// Look up a profile by name
    pub fn find(&self, name: &str) -> Result<&Profile, FvpnError> {
        self.profiles
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| {
                FvpnError::Config(ConfigError::ProfileNotFound {
                    name: name.to_string(),
                })
            })
    }

    /// Insert or replace a profile by name
    pub fn upsert(&mut self, profile: Profile) {
        match self.profiles.iter_mut().find(|p| p.name == profile.name) {
            Some(existing) => *existing = profile,
            None => self.profiles.push(profile),
        }
    }

    /// Remove a profile by name; true if one was removed
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.profiles.len();
        self.profiles.retain(|p| p.name != name);
        self.profiles.len() != before
    }

    /// Record a user-accepted certificate fingerprint on a profile
    pub fn set_trusted_cert(&mut self, name: &str, cert: String) -> Result<(), FvpnError> {
        let profile = self
            .profiles
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| {
                FvpnError::Config(ConfigError::ProfileNotFound {
                    name: name.to_string(),
                })
            })?;
        profile.trusted_cert = Some(cert);
        Ok(())
    }
}

/// Get the default configuration directory
///
/// Returns ~/.config/fvpn on Linux, or FVPN_CONFIG_DIR environment
/// variable if set. When running under sudo the real user's home is used
/// so the elevated process reads the same profiles.
pub fn get_config_dir() -> Result<PathBuf, FvpnError> {
    // Allow tests to override config directory via environment variable
    if let Ok(config_dir) = std::env::var("FVPN_CONFIG_DIR") {
        return Ok(PathBuf::from(config_dir));
    }

    let home = if let Ok(sudo_user) = std::env::var("SUDO_USER") {
        std::env::var("SUDO_HOME")
            .or_else(|_: std::env::VarError| {
                Ok::<String, std::env::VarError>(format!("/home/{}", sudo_user))
            })
            .map_err(|_| {
                FvpnError::Config(ConfigError::IoError {
                    message: format!("Failed to determine home directory for user: {}", sudo_user),
                })
            })?
    } else {
        std::env::var("HOME").map_err(|_| {
            FvpnError::Config(ConfigError::IoError {
                message: "HOME environment variable not set".to_string(),
            })
        })?
    };

    Ok(PathBuf::from(home).join(".config").join("fvpn"))
}

/// Get the default profiles file path
pub fn get_profiles_path() -> Result<PathBuf, FvpnError> {
    Ok(get_config_dir()?.join(PROFILES_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_profile() -> Profile {
        Profile {
            name: "office".to_string(),
            username: "alice".to_string(),
            gateways: vec![
                GatewayTarget::new("vpn1.example.com", 443),
                GatewayTarget::new("vpn2.example.com", 10443),
            ],
            trusted_cert: None,
            otp_enabled: false,
        }
    }

    #[test]
    fn test_roundtrip_profiles() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("profiles.toml");

        let mut store = ProfileStore::default();
        store.upsert(sample_profile());
        store.save_to_path(&path).unwrap();

        let loaded = ProfileStore::load_from_path(&path).unwrap();
        assert_eq!(loaded.profiles, store.profiles);
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::load_from_path(&dir.path().join("nope.toml")).unwrap();
        assert!(store.profiles.is_empty());
    }

    #[test]
    fn test_upsert_replaces_by_name() {
        let mut store = ProfileStore::default();
        store.upsert(sample_profile());
        let mut updated = sample_profile();
        updated.username = "bob".to_string();
        store.upsert(updated);
        assert_eq!(store.profiles.len(), 1);
        assert_eq!(store.profiles[0].username, "bob");
    }

    #[test]
    fn test_set_trusted_cert() {
        let mut store = ProfileStore::default();
        store.upsert(sample_profile());
        let cert = "ab".repeat(32);
        store.set_trusted_cert("office", cert.clone()).unwrap();
        assert_eq!(store.profiles[0].trusted_cert.as_deref(), Some(cert.as_str()));
        assert!(store.set_trusted_cert("nope", cert).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_profiles() {
        let mut p = sample_profile();
        p.gateways.clear();
        assert!(p.validate().is_err());

        let mut p = sample_profile();
        p.gateways[0].port = 0;
        assert!(p.validate().is_err());

        let mut p = sample_profile();
        p.trusted_cert = Some("not-a-fingerprint".to_string());
        assert!(p.validate().is_err());

        assert!(sample_profile().validate().is_ok());
    }
}
