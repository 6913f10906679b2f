//! Pattern-based parser for openfortivpn output
//!
//! Extracts structured ProcessEvents from the client's combined
//! stdout/stderr using regex patterns. Classification is best-effort
//! against an opaque external tool: unmatched lines are never errors.

use crate::vpn::ProcessEvent;
use regex::Regex;
use std::net::IpAddr;

/// Literal phrase openfortivpn prints once the tunnel is operational
const TUNNEL_UP_MARKER: &str = "Tunnel is up and running";

/// Parser for openfortivpn output lines
pub struct OutputParser {
    /// Pattern for "Using interface ppp0"
    interface_pattern: Regex,
    /// Pattern for pppd's "local  IP address 10.0.0.2" (two spaces)
    local_ip_pattern: Regex,
    /// Pattern for pppd's "remote IP address 192.0.2.1"
    remote_ip_pattern: Regex,
    /// Pattern for the certificate hint "trusted-cert = <sha256>"
    cert_pattern: Regex,
}

impl OutputParser {
    /// Create a new OutputParser with compiled regex patterns
    pub fn new() -> Self {
        Self {
            interface_pattern: Regex::new(r"Using interface (ppp\d+|tun\d+)")
                .expect("Failed to compile interface pattern"),
            local_ip_pattern: Regex::new(r"local  IP address ([\d\.]+)")
                .expect("Failed to compile local IP pattern"),
            remote_ip_pattern: Regex::new(r"remote IP address ([\d\.]+)")
                .expect("Failed to compile remote IP pattern"),
            cert_pattern: Regex::new(r"trusted-cert\s*=\s*([a-f0-9]{64})")
                .expect("Failed to compile trusted-cert pattern"),
        }
    }

    /// Classify a single output line
    ///
    /// Returns at most one structured event; the supervisor forwards the
    /// raw line as a LogLine separately.
    pub fn parse_line(&self, line: &str) -> Option<ProcessEvent> {
        // The cert hint is printed inside an ERROR line, check it first
        if let Some(captures) = self.cert_pattern.captures(line) {
            return Some(ProcessEvent::UntrustedCertificate(
                captures.get(1)?.as_str().to_string(),
            ));
        }

        if let Some(captures) = self.interface_pattern.captures(line) {
            return Some(ProcessEvent::InterfaceAttached(
                captures.get(1)?.as_str().to_string(),
            ));
        }

        if let Some(captures) = self.local_ip_pattern.captures(line) {
            if let Ok(ip) = captures.get(1)?.as_str().parse::<IpAddr>() {
                return Some(ProcessEvent::LocalAddressAssigned(ip));
            }
        }

        if let Some(captures) = self.remote_ip_pattern.captures(line) {
            if let Ok(ip) = captures.get(1)?.as_str().parse::<IpAddr>() {
                return Some(ProcessEvent::RemoteAddressAssigned(ip));
            }
        }

        if line.contains(TUNNEL_UP_MARKER) {
            return Some(ProcessEvent::TunnelUp);
        }

        None
    }
}

impl Default for OutputParser {
    fn default() -> Self {
        Self::new()
    }
}
