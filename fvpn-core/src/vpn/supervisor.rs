//! openfortivpn process supervision
//!
//! Launches the external client against one staged config, streams its
//! combined output as structured events, and terminates the whole process
//! group on request with SIGTERM-then-SIGKILL escalation.

use crate::error::LaunchError;
use crate::vpn::{ExitOutcome, OutputParser, ProcessEvent};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Grace period between SIGTERM and SIGKILL
const TERM_GRACE: Duration = Duration::from_secs(5);

/// Seam between the sequencer and the real openfortivpn process
///
/// Tests provide a scripted implementation; production uses
/// [`OpenfortivpnLauncher`].
pub trait VpnLauncher: Send + Sync {
    fn launch(&self, config: &Path) -> Result<SupervisorHandle, LaunchError>;
}

/// Handle to one supervised process
///
/// Events arrive in emission order; `Finished` is delivered exactly once,
/// after the output stream has been fully drained.
pub struct SupervisorHandle {
    events: mpsc::UnboundedReceiver<ProcessEvent>,
    stop: mpsc::Sender<()>,
}

impl SupervisorHandle {
    pub fn new(events: mpsc::UnboundedReceiver<ProcessEvent>, stop: mpsc::Sender<()>) -> Self {
        Self { events, stop }
    }

    /// Receive the next process event; None once the channel is drained
    pub async fn next_event(&mut self) -> Option<ProcessEvent> {
        self.events.recv().await
    }

    /// Request termination of the process group
    ///
    /// Idempotent: calling on an already-finished process is a no-op.
    pub fn stop(&self) {
        let _ = self.stop.try_send(());
    }
}

/// Launches openfortivpn, through pkexec when not running as root
pub struct OpenfortivpnLauncher {
    binary: String,
}

impl OpenfortivpnLauncher {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for OpenfortivpnLauncher {
    fn default() -> Self {
        Self::new("openfortivpn")
    }
}

impl VpnLauncher for OpenfortivpnLauncher {
    fn launch(&self, config: &Path) -> Result<SupervisorHandle, LaunchError> {
        let binary = which::which(&self.binary).map_err(|_| LaunchError::BinaryNotFound {
            binary: self.binary.clone(),
        })?;

        // openfortivpn needs root for ppp/route setup; elevate through
        // pkexec when the current privilege level is insufficient
        let mut cmd = if nix::unistd::geteuid().is_root() {
            let mut cmd = Command::new(binary);
            cmd.arg("-c").arg(config);
            cmd
        } else {
            let pkexec = which::which("pkexec").map_err(|_| LaunchError::BinaryNotFound {
                binary: "pkexec".to_string(),
            })?;
            let mut cmd = Command::new(pkexec);
            cmd.arg(binary).arg("-c").arg(config);
            cmd
        };

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group so elevation children are killed with the
        // client on stop
        unsafe {
            cmd.pre_exec(|| {
                nix::unistd::setsid()
                    .map(|_| ())
                    .map_err(|e| std::io::Error::from_raw_os_error(e as i32))
            });
        }

        let mut child = cmd.spawn().map_err(|e| LaunchError::SpawnFailed {
            reason: e.to_string(),
        })?;

        let pid = child.id().ok_or_else(|| LaunchError::SpawnFailed {
            reason: "process exited before supervision began".to_string(),
        })?;
        info!("Spawned VPN client with PID {}", pid);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = mpsc::channel(1);

        let parser = Arc::new(OutputParser::new());
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let out_task = stdout.map(|s| spawn_reader(s, Arc::clone(&parser), events_tx.clone()));
        let err_task = stderr.map(|s| spawn_reader(s, Arc::clone(&parser), events_tx.clone()));

        tokio::spawn(supervise(child, pid, stop_rx, out_task, err_task, events_tx));

        Ok(SupervisorHandle::new(events_rx, stop_tx))
    }
}

/// Read one output stream line-by-line, forwarding each line verbatim
/// and additionally as a classified event when a pattern matches
fn spawn_reader<R>(
    stream: R,
    parser: Arc<OutputParser>,
    events: mpsc::UnboundedSender<ProcessEvent>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("openfortivpn: {}", line);
            let parsed = parser.parse_line(&line);
            if events.send(ProcessEvent::LogLine(line)).is_err() {
                break;
            }
            if let Some(event) = parsed {
                if events.send(event).is_err() {
                    break;
                }
            }
        }
    })
}

/// Wait for process exit, handling stop requests with signal escalation;
/// the finish event goes out only after both readers hit EOF
async fn supervise(
    mut child: Child,
    pid: u32,
    mut stop_rx: mpsc::Receiver<()>,
    out_task: Option<JoinHandle<()>>,
    err_task: Option<JoinHandle<()>>,
    events: mpsc::UnboundedSender<ProcessEvent>,
) {
    let mut stop_requested = false;

    let status = tokio::select! {
        status = child.wait() => status,
        _ = stop_rx.recv() => {
            stop_requested = true;
            terminate_group(pid, &mut child).await
        }
    };

    // Drain order guarantee: the exit notification must never overtake
    // the process's last log line
    if let Some(task) = out_task {
        let _ = task.await;
    }
    if let Some(task) = err_task {
        let _ = task.await;
    }

    let outcome = match status {
        _ if stop_requested => ExitOutcome::Killed,
        Ok(status) => ExitOutcome::Exited(status.code().unwrap_or(1)),
        Err(e) => {
            warn!("Failed to reap VPN client: {}", e);
            ExitOutcome::Exited(1)
        }
    };
    let _ = events.send(ProcessEvent::Finished(outcome));
}

/// Graceful-then-forceful termination of the client's process group
///
/// The process was put in its own session, so the group id equals the
/// child pid and the kill reaches any privilege-elevation children.
async fn terminate_group(pid: u32, child: &mut Child) -> std::io::Result<std::process::ExitStatus> {
    let pgid = Pid::from_raw(pid as i32);

    info!("Sending SIGTERM to VPN client process group {}", pgid);
    if let Err(e) = killpg(pgid, Signal::SIGTERM) {
        warn!("Failed to send SIGTERM: {}", e);
    }

    match tokio::time::timeout(TERM_GRACE, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            warn!("Graceful shutdown timed out, sending SIGKILL");
            if let Err(e) = killpg(pgid, Signal::SIGKILL) {
                warn!("Failed to send SIGKILL: {}", e);
            }
            child.wait().await
        }
    }
}
