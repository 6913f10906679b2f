//! Type definitions and wrappers for secure data handling
//!
//! Gateway targets, per-sequence session data, traffic counters, and the
//! secrecy-wrapped credential bundle consumed by credential staging.

use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// One reachable VPN endpoint the client may attempt
///
/// Order within a profile's gateway list defines failover priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayTarget {
    /// Gateway hostname or IP address
    pub host: String,

    /// Gateway port (openfortivpn default: 443)
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    443
}

impl GatewayTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl std::fmt::Display for GatewayTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Credential bundle for one connection sequence
///
/// The password and OTP are wrapped with the secrecy crate so they are
/// never exposed in logs or debug output. They leave memory only through
/// the staged config artifact.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub username: String,
    password: Secret<String>,
    otp: Option<Secret<String>>,
    /// Expected gateway certificate fingerprint (sha256, 64 hex chars)
    pub trusted_cert: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: String) -> Self {
        Self {
            username: username.into(),
            password: Secret::new(password),
            otp: None,
            trusted_cert: None,
        }
    }

    pub fn with_otp(mut self, otp: Option<String>) -> Self {
        self.otp = otp.map(Secret::new);
        self
    }

    pub fn with_trusted_cert(mut self, cert: Option<String>) -> Self {
        self.trusted_cert = cert;
        self
    }

    /// Expose the password value (use with caution!)
    ///
    /// Only called when rendering the staged config artifact.
    pub fn expose_password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Expose the OTP value, if one was provided
    pub fn expose_otp(&self) -> Option<&str> {
        self.otp.as_ref().map(|s| s.expose_secret().as_ref())
    }
}

/// Session parameters announced by the VPN client while connecting
///
/// Accumulates across failover retries within one connection sequence and
/// is reset only by a new top-level connect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    /// Tunnel interface name (e.g. "ppp0")
    pub interface: Option<String>,

    /// Local tunnel address
    pub local_ip: Option<IpAddr>,

    /// Remote tunnel address
    pub remote_ip: Option<IpAddr>,
}

impl SessionInfo {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Cumulative interface byte counters, sampled while connected
///
/// Raw counters, not deltas; consumers compute rates externally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficSample {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_display() {
        let gw = GatewayTarget::new("vpn.example.com", 443);
        assert_eq!(gw.to_string(), "vpn.example.com:443");
    }

    #[test]
    fn test_credentials_debug_does_not_leak_password() {
        let creds = Credentials::new("user", "hunter2".to_string()).with_otp(Some("123456".into()));
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("123456"));
    }

    #[test]
    fn test_session_info_reset() {
        let mut info = SessionInfo {
            interface: Some("ppp0".into()),
            local_ip: "10.0.0.2".parse().ok(),
            remote_ip: "192.0.2.1".parse().ok(),
        };
        info.reset();
        assert_eq!(info, SessionInfo::default());
    }
}
