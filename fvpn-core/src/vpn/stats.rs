//! Interface traffic statistics sampling
//!
//! Polls cumulative byte counters for the tunnel interface while a
//! connection is up. Counter reads go through the NetStats trait so the
//! host's network-statistics interface stays swappable in tests.

use crate::types::TrafficSample;
use crate::vpn::VpnEvent;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Which cumulative counter to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterKind {
    Rx,
    Tx,
}

/// Host network-statistics collaborator
///
/// Returns None on any read failure; interfaces may flap transiently
/// during teardown and a missed sample is not an error.
pub trait NetStats: Send + Sync {
    fn read_counter(&self, interface: &str, kind: CounterKind) -> Option<u64>;
}

/// Reads counters from /sys/class/net/<iface>/statistics
#[derive(Debug, Default)]
pub struct SysfsStats;

impl NetStats for SysfsStats {
    fn read_counter(&self, interface: &str, kind: CounterKind) -> Option<u64> {
        let file = match kind {
            CounterKind::Rx => "rx_bytes",
            CounterKind::Tx => "tx_bytes",
        };
        let path: PathBuf = ["/sys/class/net", interface, "statistics", file]
            .iter()
            .collect();
        let raw = std::fs::read_to_string(path).ok()?;
        raw.trim().parse::<u64>().ok()
    }
}

/// Background sampler for one attached interface
///
/// Emits raw cumulative TrafficSamples on a fixed interval until the
/// returned task is aborted by the sequencer on detach.
pub fn spawn_poller(
    interface: String,
    reader: Arc<dyn NetStats>,
    interval: Duration,
    events: mpsc::UnboundedSender<VpnEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // Consume first immediate tick
        loop {
            ticker.tick().await;
            let rx = reader.read_counter(&interface, CounterKind::Rx);
            let tx = reader.read_counter(&interface, CounterKind::Tx);
            match (rx, tx) {
                (Some(rx_bytes), Some(tx_bytes)) => {
                    let sample = TrafficSample { rx_bytes, tx_bytes };
                    if events.send(VpnEvent::Traffic(sample)).is_err() {
                        break;
                    }
                }
                _ => {
                    // Interface gone or unreadable, skip this sample
                    debug!("Skipping traffic sample for {}", interface);
                }
            }
        }
    })
}

const UNITS: [&str; 5] = ["B", "K", "M", "G", "T"];

/// Scale a byte count for display: 512 -> "512B", 1024 -> "1.0K"
///
/// Divides by 1024 while the value is at least 1024, capping at the
/// largest defined unit.
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{}B", bytes)
    } else {
        format!("{:.1}{}", value, UNITS[unit])
    }
}
