//! Integration tests for the failover sequencer
//!
//! Drives the connection state machine with a scripted launcher instead
//! of a real openfortivpn process, and a fake counter reader instead of
//! sysfs.

use fvpn_core::error::{ConnectError, LaunchError};
use fvpn_core::types::{Credentials, GatewayTarget, TrafficSample};
use fvpn_core::vpn::{
    ConnectionManager, ConnectionState, CounterKind, ExitOutcome, FailoverPolicy, NetStats,
    OutputParser, ProcessEvent, SupervisorHandle, VpnEvent, VpnLauncher,
};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;

const CERT_HASH: &str = "18b3ca13afe20180d70f1efbb949b9dcafb793d0aae246518b6ef909646f23b8";

/// How one scripted attempt ends
enum FakeOutcome {
    /// Emit all lines, then exit with this code
    Exit(i32),
    /// Emit all lines, then block until the sequencer requests stop
    AwaitStop,
}

struct FakeAttempt {
    lines: Vec<&'static str>,
    outcome: FakeOutcome,
}

/// Scripted launcher: each launch consumes the next attempt script and
/// replays its lines through the real output parser.
struct FakeLauncher {
    attempts: Mutex<VecDeque<FakeAttempt>>,
    launches: AtomicUsize,
}

impl FakeLauncher {
    fn new(attempts: Vec<FakeAttempt>) -> Arc<Self> {
        Arc::new(Self {
            attempts: Mutex::new(attempts.into()),
            launches: AtomicUsize::new(0),
        })
    }

    fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

impl VpnLauncher for FakeLauncher {
    fn launch(&self, config: &Path) -> Result<SupervisorHandle, LaunchError> {
        assert!(config.exists(), "staged config must exist at launch time");

        let attempt = self
            .attempts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LaunchError::SpawnFailed {
                reason: "no scripted attempt left".to_string(),
            })?;
        self.launches.fetch_add(1, Ordering::SeqCst);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (stop_tx, mut stop_rx) = mpsc::channel(1);
        tokio::spawn(async move {
            let parser = OutputParser::new();
            for line in attempt.lines {
                let parsed = parser.parse_line(line);
                let _ = events_tx.send(ProcessEvent::LogLine(line.to_string()));
                if let Some(event) = parsed {
                    let _ = events_tx.send(event);
                }
            }
            let outcome = match attempt.outcome {
                FakeOutcome::Exit(code) => ExitOutcome::Exited(code),
                FakeOutcome::AwaitStop => {
                    let _ = stop_rx.recv().await;
                    ExitOutcome::Killed
                }
            };
            let _ = events_tx.send(ProcessEvent::Finished(outcome));
        });

        Ok(SupervisorHandle::new(events_rx, stop_tx))
    }
}

/// Fixed counters for one known interface, absent for everything else
struct FakeStats;

impl NetStats for FakeStats {
    fn read_counter(&self, interface: &str, kind: CounterKind) -> Option<u64> {
        if interface != "ppp0" {
            return None;
        }
        Some(match kind {
            CounterKind::Rx => 1024,
            CounterKind::Tx => 512,
        })
    }
}

struct Harness {
    manager: ConnectionManager,
    events: mpsc::UnboundedReceiver<VpnEvent>,
    launcher: Arc<FakeLauncher>,
    staging: TempDir,
}

fn harness(attempts: Vec<FakeAttempt>, backoff_ms: u64) -> Harness {
    let staging = TempDir::new().unwrap();
    let launcher = FakeLauncher::new(attempts);
    let policy = FailoverPolicy {
        backoff_ms,
        poll_interval_ms: 1000,
        staging_dir: Some(staging.path().to_path_buf()),
    };
    let (manager, events) =
        ConnectionManager::new(launcher.clone(), Arc::new(FakeStats), policy);
    Harness {
        manager,
        events,
        launcher,
        staging,
    }
}

fn targets(n: usize) -> Vec<GatewayTarget> {
    (0..n)
        .map(|i| GatewayTarget::new(format!("gw{}.example.com", i), 443))
        .collect()
}

fn credentials() -> Credentials {
    Credentials::new("alice", "pw".to_string())
}

impl Harness {
    /// Receive events until the predicate matches, returning everything seen
    async fn collect_until<F>(&mut self, mut done: F) -> Vec<VpnEvent>
    where
        F: FnMut(&VpnEvent) -> bool,
    {
        let mut seen = Vec::new();
        loop {
            let event = timeout(Duration::from_secs(30), self.events.recv())
                .await
                .expect("timed out waiting for event")
                .expect("event channel closed");
            let finished = done(&event);
            seen.push(event);
            if finished {
                return seen;
            }
        }
    }

    fn assert_staging_empty(&self) {
        let leftover: Vec<_> = std::fs::read_dir(self.staging.path())
            .unwrap()
            .collect();
        assert!(leftover.is_empty(), "staged artifacts left behind: {:?}", leftover);
    }
}

fn states(events: &[VpnEvent]) -> Vec<ConnectionState> {
    events
        .iter()
        .filter_map(|e| match e {
            VpnEvent::StateChanged(s) => Some(*s),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn exhausting_all_gateways_fails_once_per_attempt() {
    let mut h = harness(
        vec![
            FakeAttempt { lines: vec![], outcome: FakeOutcome::Exit(1) },
            FakeAttempt { lines: vec![], outcome: FakeOutcome::Exit(2) },
        ],
        1000,
    );

    h.manager.connect(targets(2), credentials());
    let events = h
        .collect_until(|e| matches!(e, VpnEvent::ConnectionFailed(_)))
        .await;

    assert_eq!(
        states(&events),
        vec![
            ConnectionState::Connecting,
            ConnectionState::Failover,
            ConnectionState::Connecting,
            ConnectionState::Disconnected,
        ]
    );
    assert!(matches!(
        events.last(),
        Some(VpnEvent::ConnectionFailed(ConnectError::QueueExhausted { attempts: 2 }))
    ));
    assert_eq!(h.launcher.launches(), 2);
    h.assert_staging_empty();
    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failover_then_success_keeps_session_from_winning_attempt() {
    let mut h = harness(
        vec![
            FakeAttempt { lines: vec![], outcome: FakeOutcome::Exit(1) },
            FakeAttempt {
                lines: vec![
                    "INFO:   Using interface ppp0",
                    "local  IP address 10.0.0.2",
                    "remote IP address 192.0.2.1",
                    "INFO:   Tunnel is up and running.",
                ],
                outcome: FakeOutcome::AwaitStop,
            },
        ],
        1000,
    );

    h.manager.connect(targets(2), credentials());
    let events = h
        .collect_until(|e| matches!(e, VpnEvent::SessionEstablished(_)))
        .await;

    assert_eq!(
        states(&events),
        vec![
            ConnectionState::Connecting,
            ConnectionState::Failover,
            ConnectionState::Connecting,
            ConnectionState::Connected,
        ]
    );
    let session = match events.last().unwrap() {
        VpnEvent::SessionEstablished(s) => s.clone(),
        other => panic!("expected session, got {:?}", other),
    };
    assert_eq!(session.interface.as_deref(), Some("ppp0"));
    assert_eq!(session.local_ip, "10.0.0.2".parse().ok());
    assert_eq!(session.remote_ip, "192.0.2.1".parse().ok());

    // The poller samples the attached interface with raw counters
    let events = h
        .collect_until(|e| matches!(e, VpnEvent::Traffic(s) if s.rx_bytes > 0))
        .await;
    assert!(events.iter().any(|e| matches!(
        e,
        VpnEvent::Traffic(TrafficSample { rx_bytes: 1024, tx_bytes: 512 })
    )));

    h.manager.disconnect();
    let events = h
        .collect_until(|e| matches!(e, VpnEvent::StateChanged(ConnectionState::Disconnected)))
        .await;
    assert!(!events
        .iter()
        .any(|e| matches!(e, VpnEvent::StateChanged(ConnectionState::Failover))));
    h.assert_staging_empty();
    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn tunnel_up_without_interface_does_not_start_poller() {
    let mut h = harness(
        vec![FakeAttempt {
            lines: vec!["INFO:   Tunnel is up and running."],
            outcome: FakeOutcome::AwaitStop,
        }],
        1000,
    );

    h.manager.connect(targets(1), credentials());
    h.collect_until(|e| matches!(e, VpnEvent::SessionEstablished(_)))
        .await;

    // Give a wrongly-attached poller several sampling intervals to show up
    tokio::time::sleep(Duration::from_secs(5)).await;

    h.manager.disconnect();
    let events = h
        .collect_until(|e| matches!(e, VpnEvent::StateChanged(ConnectionState::Disconnected)))
        .await;
    assert!(!events.iter().any(|e| matches!(e, VpnEvent::Traffic(_))));
    h.manager.shutdown().await;
}

#[tokio::test]
async fn disconnect_while_connecting_never_fails_over() {
    let mut h = harness(
        vec![FakeAttempt { lines: vec![], outcome: FakeOutcome::AwaitStop }],
        60_000,
    );

    h.manager.connect(targets(2), credentials());
    h.collect_until(|e| matches!(e, VpnEvent::StateChanged(ConnectionState::Connecting)))
        .await;

    h.manager.disconnect();
    let events = h
        .collect_until(|e| matches!(e, VpnEvent::StateChanged(ConnectionState::Disconnected)))
        .await;

    assert!(!events
        .iter()
        .any(|e| matches!(e, VpnEvent::StateChanged(ConnectionState::Failover))));
    assert!(!events.iter().any(|e| matches!(e, VpnEvent::ConnectionFailed(_))));
    assert_eq!(h.launcher.launches(), 1);
    h.assert_staging_empty();
    h.manager.shutdown().await;
}

#[tokio::test]
async fn disconnect_during_backoff_cancels_next_attempt() {
    let mut h = harness(
        vec![FakeAttempt { lines: vec![], outcome: FakeOutcome::Exit(1) }],
        60_000,
    );

    h.manager.connect(targets(2), credentials());
    h.collect_until(|e| matches!(e, VpnEvent::StateChanged(ConnectionState::Failover)))
        .await;

    h.manager.disconnect();
    let events = h
        .collect_until(|e| matches!(e, VpnEvent::StateChanged(ConnectionState::Disconnected)))
        .await;

    assert!(!events.iter().any(|e| matches!(e, VpnEvent::ConnectionFailed(_))));
    assert_eq!(h.launcher.launches(), 1);
    h.assert_staging_empty();
    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn untrusted_certificate_suspends_without_advancing_queue() {
    let mut h = harness(
        vec![FakeAttempt {
            lines: vec![
                "ERROR:      trusted-cert = 18b3ca13afe20180d70f1efbb949b9dcafb793d0aae246518b6ef909646f23b8",
            ],
            outcome: FakeOutcome::Exit(1),
        }],
        1000,
    );

    h.manager.connect(targets(2), credentials());
    let events = h
        .collect_until(|e| matches!(e, VpnEvent::CertificateTrustRequired(_)))
        .await;
    assert!(matches!(
        events.last(),
        Some(VpnEvent::CertificateTrustRequired(hash)) if hash == CERT_HASH
    ));

    // The non-zero exit from the same attempt must not trigger failover
    tokio::time::sleep(Duration::from_secs(5)).await;
    h.manager.disconnect(); // no-op, already disconnected
    assert_eq!(h.launcher.launches(), 1);
    h.assert_staging_empty();

    let remaining = h.collect_remaining().await;
    assert!(!remaining
        .iter()
        .any(|e| matches!(e, VpnEvent::StateChanged(ConnectionState::Failover))));
    assert!(!remaining.iter().any(|e| matches!(e, VpnEvent::ConnectionFailed(_))));
    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn clean_exit_disconnects_without_failover() {
    let mut h = harness(
        vec![FakeAttempt {
            lines: vec![
                "INFO:   Using interface ppp0",
                "INFO:   Tunnel is up and running.",
            ],
            outcome: FakeOutcome::Exit(0),
        }],
        1000,
    );

    h.manager.connect(targets(2), credentials());
    let events = h
        .collect_until(|e| matches!(e, VpnEvent::StateChanged(ConnectionState::Disconnected)))
        .await;

    assert!(events
        .iter()
        .any(|e| matches!(e, VpnEvent::StateChanged(ConnectionState::Connected))));
    assert!(!events
        .iter()
        .any(|e| matches!(e, VpnEvent::StateChanged(ConnectionState::Failover))));
    assert!(!events.iter().any(|e| matches!(e, VpnEvent::ConnectionFailed(_))));
    assert_eq!(h.launcher.launches(), 1);
    h.assert_staging_empty();
    h.manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn launch_failure_is_terminal_and_disposes_artifact() {
    // No scripted attempts: the very first launch fails
    let mut h = harness(vec![], 1000);

    h.manager.connect(targets(2), credentials());
    let events = h
        .collect_until(|e| matches!(e, VpnEvent::ConnectionFailed(_)))
        .await;

    assert!(matches!(
        events.last(),
        Some(VpnEvent::ConnectionFailed(ConnectError::Launch(_)))
    ));
    assert_eq!(
        states(&events),
        vec![ConnectionState::Connecting, ConnectionState::Disconnected]
    );
    h.assert_staging_empty();
    h.manager.shutdown().await;
}

impl Harness {
    /// Drain whatever is already queued without waiting for more
    async fn collect_remaining(&mut self) -> Vec<VpnEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            seen.push(event);
        }
        seen
    }
}
