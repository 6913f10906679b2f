//! Event types for the connection lifecycle
//!
//! Structured events parsed from openfortivpn output, plus the
//! caller-facing event stream emitted by the failover sequencer.

use crate::error::ConnectError;
use crate::types::{SessionInfo, TrafficSample};
use std::net::IpAddr;

/// Events derived from one supervised openfortivpn process
///
/// Delivered in emission order; `Finished` is always last, after the
/// output stream has been fully drained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// The client announced its tunnel interface ("Using interface ppp0")
    InterfaceAttached(String),

    /// Local tunnel address assigned by pppd
    LocalAddressAssigned(IpAddr),

    /// Remote tunnel address assigned by pppd
    RemoteAddressAssigned(IpAddr),

    /// The tunnel is operational
    TunnelUp,

    /// The gateway presented a certificate the client does not trust;
    /// carries the sha256 fingerprint from the "trusted-cert" hint.
    UntrustedCertificate(String),

    /// Raw output line, forwarded verbatim regardless of classification
    LogLine(String),

    /// The process ended; delivered exactly once per launch
    Finished(ExitOutcome),
}

/// How a supervised process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Process exited on its own with this code (0 = clean shutdown)
    Exited(i32),

    /// Process group was killed by the supervisor on request
    Killed,
}

/// Connection states reported to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected
    #[default]
    Disconnected,

    /// An attempt against the current gateway is in flight
    Connecting,

    /// The current gateway failed; advancing to the next one
    Failover,

    /// Tunnel is up and running
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Failover => write!(f, "failover"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// Caller-facing event stream from the sequencer
///
/// All events are value snapshots; the sequencer alone owns the mutable
/// session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VpnEvent {
    /// The connection state machine transitioned
    StateChanged(ConnectionState),

    /// Raw client output, for observability
    LogLine(String),

    /// Session parameters accumulated up to the moment the tunnel came up
    SessionEstablished(SessionInfo),

    /// Periodic cumulative traffic counters while connected
    Traffic(TrafficSample),

    /// The gateway's certificate needs an explicit user trust decision;
    /// the sequence is suspended, not failed over.
    CertificateTrustRequired(String),

    /// The sequence ended with a terminal failure
    ConnectionFailed(ConnectError),
}
