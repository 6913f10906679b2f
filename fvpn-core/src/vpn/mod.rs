//! VPN connection orchestration
//!
//! Drives the external openfortivpn client: credential staging, process
//! supervision with structured output events, gateway failover, and
//! traffic statistics while connected.

pub mod event;
pub mod output_parser;
pub mod sequencer;
pub mod staging;
pub mod stats;
pub mod supervisor;

// Public re-exports
pub use event::{ConnectionState, ExitOutcome, ProcessEvent, VpnEvent};
pub use output_parser::OutputParser;
pub use sequencer::{ConnectionManager, FailoverPolicy};
pub use staging::StagedConfig;
pub use stats::{format_bytes, CounterKind, NetStats, SysfsStats};
pub use supervisor::{OpenfortivpnLauncher, SupervisorHandle, VpnLauncher};
