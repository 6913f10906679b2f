//! Failover sequencer and connection state machine
//!
//! Owns the ordered gateway queue for one connection sequence and decides
//! retry vs. abort based on supervisor events. All events are serialized
//! into a single event-loop task so state transitions never race.

use crate::error::ConnectError;
use crate::types::{Credentials, GatewayTarget, SessionInfo, TrafficSample};
use crate::vpn::staging::StagedConfig;
use crate::vpn::stats::{self, NetStats};
use crate::vpn::supervisor::{SupervisorHandle, VpnLauncher};
use crate::vpn::{ConnectionState, ExitOutcome, ProcessEvent, VpnEvent};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Tunable failover behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverPolicy {
    /// Delay before retrying against the next gateway, in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Traffic sampling interval while connected, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Where staged config artifacts are written; system temp dir if unset
    #[serde(skip)]
    pub staging_dir: Option<PathBuf>,
}

fn default_backoff_ms() -> u64 {
    1000
}
fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for FailoverPolicy {
    fn default() -> Self {
        Self {
            backoff_ms: default_backoff_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            staging_dir: None,
        }
    }
}

enum Command {
    Connect {
        targets: Vec<GatewayTarget>,
        credentials: Credentials,
    },
    Disconnect,
    Shutdown,
}

/// Handle to the connection orchestrator
///
/// Commands are serialized into the driver task; progress is observed
/// through the VpnEvent receiver returned by [`ConnectionManager::new`].
pub struct ConnectionManager {
    cmd_tx: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Spawn the driver task and return the manager plus its event stream
    pub fn new(
        launcher: Arc<dyn VpnLauncher>,
        stats_reader: Arc<dyn NetStats>,
        policy: FailoverPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<VpnEvent>) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let driver = Driver::new(launcher, stats_reader, policy, out_tx);
        let task = tokio::spawn(driver.run(cmd_rx));
        (
            Self {
                cmd_tx,
                task: Some(task),
            },
            out_rx,
        )
    }

    /// Begin a connection sequence over the ordered gateway list
    ///
    /// Only honored from the Disconnected state; an in-flight sequence is
    /// never replaced implicitly.
    pub fn connect(&self, targets: Vec<GatewayTarget>, credentials: Credentials) {
        let _ = self.cmd_tx.send(Command::Connect {
            targets,
            credentials,
        });
    }

    /// Tear down the current sequence, wherever it is
    ///
    /// Safe to call in any state; never triggers failover advancement.
    pub fn disconnect(&self) {
        let _ = self.cmd_tx.send(Command::Disconnect);
    }

    /// Stop the driver task, tearing down any live attempt first
    pub async fn shutdown(mut self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

struct ActiveAttempt {
    handle: SupervisorHandle,
    staged: Option<StagedConfig>,
}

struct Driver {
    launcher: Arc<dyn VpnLauncher>,
    stats_reader: Arc<dyn NetStats>,
    out: mpsc::UnboundedSender<VpnEvent>,
    backoff: Duration,
    poll_interval: Duration,
    staging_dir: PathBuf,

    state: ConnectionState,
    queue: Vec<GatewayTarget>,
    current_index: usize,
    /// Global attempt ordinal, feeds staged artifact naming
    attempt_counter: usize,
    credentials: Option<Credentials>,
    session: SessionInfo,
    user_disconnected: bool,
    cert_pending: bool,
    active: Option<ActiveAttempt>,
    backoff_until: Option<Instant>,
    stats_task: Option<JoinHandle<()>>,
}

impl Driver {
    fn new(
        launcher: Arc<dyn VpnLauncher>,
        stats_reader: Arc<dyn NetStats>,
        policy: FailoverPolicy,
        out: mpsc::UnboundedSender<VpnEvent>,
    ) -> Self {
        Self {
            launcher,
            stats_reader,
            out,
            backoff: Duration::from_millis(policy.backoff_ms),
            poll_interval: Duration::from_millis(policy.poll_interval_ms),
            staging_dir: policy.staging_dir.unwrap_or_else(std::env::temp_dir),
            state: ConnectionState::Disconnected,
            queue: Vec::new(),
            current_index: 0,
            attempt_counter: 0,
            credentials: None,
            session: SessionInfo::default(),
            user_disconnected: false,
            cert_pending: false,
            active: None,
            backoff_until: None,
            stats_task: None,
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                cmd = commands.recv() => {
                    match cmd {
                        Some(Command::Connect { targets, credentials }) => {
                            self.handle_connect(targets, credentials);
                        }
                        Some(Command::Disconnect) => self.handle_disconnect(),
                        Some(Command::Shutdown) | None => {
                            self.teardown();
                            break;
                        }
                    }
                }
                event = next_attempt_event(&mut self.active) => {
                    match event {
                        Some(event) => self.handle_process_event(event),
                        // Channel closed without a finish event; drop the
                        // attempt rather than wait forever
                        None => self.active = None,
                    }
                }
                _ = wait_until(self.backoff_until) => {
                    self.backoff_until = None;
                    self.start_attempt();
                }
            }
        }
    }

    fn handle_connect(&mut self, targets: Vec<GatewayTarget>, credentials: Credentials) {
        if self.state != ConnectionState::Disconnected || self.active.is_some() {
            warn!("Ignoring connect request while {}", self.state);
            return;
        }
        self.queue = targets;
        self.current_index = 0;
        self.credentials = Some(credentials);
        self.user_disconnected = false;
        self.cert_pending = false;
        self.backoff_until = None;
        self.session.reset();
        self.start_attempt();
    }

    fn handle_disconnect(&mut self) {
        if self.state == ConnectionState::Disconnected && self.active.is_none() {
            return;
        }
        self.user_disconnected = true;
        self.backoff_until = None;
        self.detach_stats();
        match &self.active {
            Some(attempt) => {
                // Disconnected is emitted once the finish event arrives,
                // short-circuited by the user flag
                attempt.handle.stop();
            }
            // Mid-backoff: no live process, transition directly
            None => self.set_state(ConnectionState::Disconnected),
        }
    }

    fn start_attempt(&mut self) {
        if self.current_index >= self.queue.len() {
            let attempts = self.queue.len();
            self.fail(ConnectError::QueueExhausted { attempts });
            return;
        }
        let target = self.queue[self.current_index].clone();
        self.set_state(ConnectionState::Connecting);
        info!(
            "Attempting gateway #{} of {}: {}",
            self.current_index + 1,
            self.queue.len(),
            target
        );

        let credentials = match self.credentials.as_ref() {
            Some(c) => c,
            None => {
                self.fail(ConnectError::Staging {
                    reason: "no credentials for sequence".to_string(),
                });
                return;
            }
        };
        let staged = match StagedConfig::stage(
            &self.staging_dir,
            &target,
            credentials,
            self.attempt_counter,
        ) {
            Ok(staged) => staged,
            Err(e) => {
                self.fail(ConnectError::Staging {
                    reason: e.to_string(),
                });
                return;
            }
        };
        self.attempt_counter += 1;

        match self.launcher.launch(staged.path()) {
            Ok(handle) => {
                self.active = Some(ActiveAttempt {
                    handle,
                    staged: Some(staged),
                });
            }
            Err(e) => {
                // A launch failure is not a gateway rejection: surface it
                // immediately, without advancing the queue
                staged.dispose();
                self.fail(ConnectError::Launch(e));
            }
        }
    }

    fn handle_process_event(&mut self, event: ProcessEvent) {
        match event {
            ProcessEvent::LogLine(line) => {
                let _ = self.out.send(VpnEvent::LogLine(line));
            }
            ProcessEvent::InterfaceAttached(name) => {
                debug!("Tunnel interface attached: {}", name);
                self.session.interface = Some(name);
            }
            ProcessEvent::LocalAddressAssigned(ip) => self.session.local_ip = Some(ip),
            ProcessEvent::RemoteAddressAssigned(ip) => self.session.remote_ip = Some(ip),
            ProcessEvent::TunnelUp => {
                if self.user_disconnected || self.cert_pending {
                    return;
                }
                self.set_state(ConnectionState::Connected);
                let _ = self
                    .out
                    .send(VpnEvent::SessionEstablished(self.session.clone()));
                match self.session.interface.clone() {
                    Some(interface) => self.attach_stats(interface),
                    None => warn!("Tunnel reported up without an interface, no traffic stats"),
                }
            }
            ProcessEvent::UntrustedCertificate(hash) => {
                info!("Gateway presented an untrusted certificate");
                // Suppresses failover: this is a user decision checkpoint,
                // and it wins over the exit event of the same attempt
                self.cert_pending = true;
                if let Some(attempt) = self.active.as_mut() {
                    attempt.handle.stop();
                    if let Some(staged) = attempt.staged.take() {
                        staged.dispose();
                    }
                }
                self.detach_stats();
                self.set_state(ConnectionState::Disconnected);
                let _ = self.out.send(VpnEvent::CertificateTrustRequired(hash));
            }
            ProcessEvent::Finished(outcome) => self.handle_finished(outcome),
        }
    }

    fn handle_finished(&mut self, outcome: ExitOutcome) {
        self.detach_stats();
        if let Some(staged) = self.active.take().and_then(|mut a| a.staged.take()) {
            staged.dispose();
        }

        if self.user_disconnected || self.cert_pending {
            self.set_state(ConnectionState::Disconnected);
            return;
        }

        match outcome {
            ExitOutcome::Exited(0) => {
                // A clean exit is a normal disconnect, never failed over
                info!("VPN client exited cleanly");
                self.set_state(ConnectionState::Disconnected);
            }
            outcome => {
                let code = match outcome {
                    ExitOutcome::Exited(code) => code,
                    // Killed from outside the supervisor counts as failure
                    ExitOutcome::Killed => -1,
                };
                warn!(
                    "Gateway #{} failed with code {}, trying next",
                    self.current_index + 1,
                    code
                );
                self.current_index += 1;
                if self.current_index >= self.queue.len() {
                    let attempts = self.queue.len();
                    self.fail(ConnectError::QueueExhausted { attempts });
                } else {
                    self.set_state(ConnectionState::Failover);
                    self.backoff_until = Some(Instant::now() + self.backoff);
                }
            }
        }
    }

    fn fail(&mut self, error: ConnectError) {
        warn!("Connection sequence failed: {}", error);
        self.set_state(ConnectionState::Disconnected);
        let _ = self.out.send(VpnEvent::ConnectionFailed(error));
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        self.state = state;
        let _ = self.out.send(VpnEvent::StateChanged(state));
    }

    fn attach_stats(&mut self, interface: String) {
        self.detach_stats();
        self.stats_task = Some(stats::spawn_poller(
            interface,
            Arc::clone(&self.stats_reader),
            self.poll_interval,
            self.out.clone(),
        ));
    }

    fn detach_stats(&mut self) {
        if let Some(task) = self.stats_task.take() {
            task.abort();
            // Counters reset when the interface detaches
            let _ = self.out.send(VpnEvent::Traffic(TrafficSample::default()));
        }
    }

    fn teardown(&mut self) {
        self.user_disconnected = true;
        self.backoff_until = None;
        self.detach_stats();
        if let Some(mut attempt) = self.active.take() {
            attempt.handle.stop();
            if let Some(staged) = attempt.staged.take() {
                staged.dispose();
            }
        }
    }
}

async fn next_attempt_event(active: &mut Option<ActiveAttempt>) -> Option<ProcessEvent> {
    match active {
        Some(attempt) => attempt.handle.next_event().await,
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
