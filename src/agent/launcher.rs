//! Agent process lifecycle management
//!
//! Owns the single agent process: spawn, kill, relaunch ("wake") and health
//! probing. State moves `Down -> Starting -> Up`, and to `Exited` when the
//! process terminates on its own.
//!
//! Each spawned process gets a monitor task that owns the `Child`. The monitor
//! either observes a natural exit (recording the exit code) or receives a kill
//! request, in which case it sends SIGTERM, waits a grace period and then
//! kills. Starting a replacement always waits for the previous monitor to
//! finish, so at most one agent process is alive at a time.

use super::client::{AgentApi, PROBE_TIMEOUT};
use super::types::{AgentProcessInfo, AgentProcessState};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Delay between health probes while waking
pub const WAKE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Health probes attempted before a wake is reported as failed
pub const WAKE_MAX_ATTEMPTS: u32 = 10;

/// Time a process gets to exit after SIGTERM before it is killed
const KILL_GRACE: Duration = Duration::from_secs(5);

/// Spawns agent processes
pub trait ProcessSpawner: Send + Sync {
    fn spawn(&self, working_dir: &Path, port: u16) -> Result<Child>;
}

/// Runs `<executable> serve --port <port>` in the working directory
pub struct CommandSpawner {
    executable: PathBuf,
}

impl CommandSpawner {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }
}

impl ProcessSpawner for CommandSpawner {
    fn spawn(&self, working_dir: &Path, port: u16) -> Result<Child> {
        Command::new(&self.executable)
            .arg("serve")
            .arg("--port")
            .arg(port.to_string())
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Process(format!(
                    "Failed to spawn agent at {}: {}",
                    self.executable.display(),
                    e
                ))
            })
    }
}

/// Live process: the channel that asks its monitor to kill it, and the
/// monitor itself.
struct ProcessHandle {
    pid: Option<u32>,
    kill_tx: oneshot::Sender<()>,
    monitor: JoinHandle<()>,
}

impl ProcessHandle {
    /// Ask the monitor to terminate the process and wait until it has.
    async fn shutdown(self) {
        // Err means the monitor already saw the process exit
        let _ = self.kill_tx.send(());
        let deadline = KILL_GRACE + Duration::from_secs(2);
        match tokio::time::timeout(deadline, self.monitor).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(pid = ?self.pid, "Agent monitor task failed: {}", e),
            Err(_) => tracing::warn!(pid = ?self.pid, "Timed out waiting for agent to terminate"),
        }
    }
}

#[derive(Default)]
struct LauncherInner {
    handle: Option<ProcessHandle>,
    info: Option<AgentProcessInfo>,
    /// Bumped on every start/stop so a stale monitor cannot touch newer state
    generation: u64,
}

impl LauncherInner {
    fn state(&self) -> AgentProcessState {
        self.info
            .as_ref()
            .map(|info| info.state)
            .unwrap_or(AgentProcessState::Down)
    }
}

/// Manages the agent process lifecycle
pub struct AgentLauncher {
    spawner: Arc<dyn ProcessSpawner>,
    api: Arc<dyn AgentApi>,
    port: u16,
    /// Process state; never held across an await
    inner: Arc<Mutex<LauncherInner>>,
    /// Serializes start/stop
    lifecycle: tokio::sync::Mutex<()>,
}

impl AgentLauncher {
    /// Create a new launcher
    pub fn new(spawner: Arc<dyn ProcessSpawner>, api: Arc<dyn AgentApi>, port: u16) -> Self {
        Self {
            spawner,
            api,
            port,
            inner: Arc::new(Mutex::new(LauncherInner::default())),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Current lifecycle state
    pub fn state(&self) -> AgentProcessState {
        lock(&self.inner).state()
    }

    /// Snapshot of the current (or last) process
    pub fn info(&self) -> Option<AgentProcessInfo> {
        lock(&self.inner).info.clone()
    }

    /// Replace the running agent (if any) with a new one in `working_dir`.
    ///
    /// Termination problems with the old process are logged and ignored. A
    /// spawn failure leaves the launcher `Down` and is returned.
    pub async fn start(&self, working_dir: &Path) -> Result<AgentProcessInfo> {
        let _guard = self.lifecycle.lock().await;

        let (old, generation) = {
            let mut inner = lock(&self.inner);
            inner.generation += 1;
            (inner.handle.take(), inner.generation)
        };
        if let Some(old) = old {
            tracing::info!(pid = ?old.pid, "Stopping previous agent process");
            old.shutdown().await;
        }

        tracing::info!(
            cwd = %working_dir.display(),
            port = self.port,
            "Spawning agent"
        );

        let mut child = match self.spawner.spawn(working_dir, self.port) {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(cwd = %working_dir.display(), "{}", e);
                lock(&self.inner).info = None;
                return Err(e);
            }
        };

        let pid = child.id();
        forward_output(child.stdout.take(), pid, "stdout");
        forward_output(child.stderr.take(), pid, "stderr");

        let info = AgentProcessInfo {
            pid,
            working_dir: working_dir.to_path_buf(),
            state: AgentProcessState::Starting,
            exit_code: None,
            started_at: chrono::Utc::now().timestamp_millis(),
        };

        // Publish the handle before the monitor can observe an early exit
        let mut inner = lock(&self.inner);
        let (kill_tx, kill_rx) = oneshot::channel();
        let monitor = tokio::spawn(monitor_process(
            child,
            kill_rx,
            self.inner.clone(),
            generation,
        ));
        inner.handle = Some(ProcessHandle {
            pid,
            kill_tx,
            monitor,
        });
        inner.info = Some(info.clone());

        Ok(info)
    }

    /// Terminate the agent process, if any.
    pub async fn stop(&self) {
        let _guard = self.lifecycle.lock().await;

        let old = {
            let mut inner = lock(&self.inner);
            inner.generation += 1;
            if let Some(info) = inner.info.as_mut() {
                info.state = AgentProcessState::Down;
            }
            inner.handle.take()
        };
        if let Some(old) = old {
            tracing::info!(pid = ?old.pid, "Stopping agent process");
            old.shutdown().await;
        }
    }

    /// Single liveness check against the agent's listing endpoint. Does not
    /// change the process state; see [`AgentLauncher::observe`].
    pub async fn probe(&self) -> bool {
        tokio::time::timeout(PROBE_TIMEOUT, self.api.probe())
            .await
            .unwrap_or(false)
    }

    /// Restart the agent in `working_dir` and wait for it to become healthy.
    ///
    /// Probes every [`WAKE_POLL_INTERVAL`], at most [`WAKE_MAX_ATTEMPTS`] times.
    /// A spawn failure does not abort the wait: an agent started outside the
    /// bridge on the same port still counts.
    pub async fn wake(&self, working_dir: &Path) -> Result<()> {
        if let Err(e) = self.start(working_dir).await {
            tracing::warn!("Wake: spawn failed, polling anyway: {}", e);
        }

        for attempt in 1..=WAKE_MAX_ATTEMPTS {
            tokio::time::sleep(WAKE_POLL_INTERVAL).await;
            if self.probe().await {
                self.observe(true);
                tracing::info!(attempt, "Agent is awake");
                return Ok(());
            }
            tracing::debug!(attempt, "Agent not healthy yet");
        }

        tracing::warn!(attempts = WAKE_MAX_ATTEMPTS, "Agent did not become healthy");
        Err(Error::Process(format!(
            "agent did not answer after {} health checks",
            WAKE_MAX_ATTEMPTS
        )))
    }

    /// Record the outcome of a health probe. A live process moves to `Up`
    /// when it answered and back to `Starting` when it did not; `Down` and
    /// `Exited` are left alone.
    pub fn observe(&self, reachable: bool) {
        let mut inner = lock(&self.inner);
        let Some(info) = inner.info.as_mut() else {
            return;
        };
        let next = match (info.state, reachable) {
            (AgentProcessState::Starting, true) => AgentProcessState::Up,
            (AgentProcessState::Up, false) => AgentProcessState::Starting,
            _ => return,
        };
        tracing::debug!(from = %info.state, to = %next, "Agent liveness changed");
        info.state = next;
    }
}

fn lock(inner: &Mutex<LauncherInner>) -> MutexGuard<'_, LauncherInner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Own the child until it exits or a kill is requested.
async fn monitor_process(
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
    inner: Arc<Mutex<LauncherInner>>,
    generation: u64,
) {
    let pid = child.id();
    let started = tokio::time::Instant::now();

    tokio::select! {
        status = child.wait() => {
            let exit_code = match status {
                Ok(status) => status.code(),
                Err(e) => {
                    tracing::warn!(pid = ?pid, "Failed to wait for agent: {}", e);
                    None
                }
            };
            tracing::warn!(
                pid = ?pid,
                exit_code = ?exit_code,
                uptime_ms = started.elapsed().as_millis() as u64,
                "Agent process exited"
            );

            let mut inner = lock(&inner);
            if inner.generation == generation {
                inner.handle = None;
                if let Some(info) = inner.info.as_mut() {
                    info.state = AgentProcessState::Exited;
                    info.exit_code = exit_code;
                }
            }
        }
        _ = kill_rx => {
            terminate(&mut child, pid).await;
        }
    }
}

/// SIGTERM, then SIGKILL after [`KILL_GRACE`].
async fn terminate(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    {
        // No pid means the child has already been reaped
        let Some(raw_pid) = pid else { return };
        // SAFETY: plain signal delivery to a child we spawned and have not reaped
        unsafe {
            libc::kill(raw_pid as libc::pid_t, libc::SIGTERM);
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = child.start_kill() {
            tracing::warn!(pid = ?pid, "Failed to kill agent: {}", e);
        }
    }

    match tokio::time::timeout(KILL_GRACE, child.wait()).await {
        Ok(Ok(status)) => {
            tracing::info!(pid = ?pid, exit_code = ?status.code(), "Agent process stopped")
        }
        Ok(Err(e)) => tracing::warn!(pid = ?pid, "Failed to wait for agent: {}", e),
        Err(_) => {
            tracing::warn!(pid = ?pid, "Agent ignored SIGTERM, killing");
            if let Err(e) = child.kill().await {
                tracing::warn!(pid = ?pid, "Failed to kill agent: {}", e);
            }
        }
    }
}

/// Relay the agent's output lines into the log.
fn forward_output<R>(reader: Option<R>, pid: Option<u32>, stream: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let Some(reader) = reader else { return };
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(target: "frostty::agent_output", pid = ?pid, stream, "{}", line);
        }
    });
}
