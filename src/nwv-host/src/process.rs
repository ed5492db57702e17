//! Spawning of the renderer process and the capability a session drives it through.

use crate::error::SessionError;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Something that happened to the remote process, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// A chunk of standard output.
    Stdout(Vec<u8>),
    /// A chunk of standard error.
    Stderr(Vec<u8>),
    /// Reading or writing one of the pipes failed.
    StreamError(String),
    /// The process exited and its output has been drained. `None` when
    /// killed by a signal.
    Exited(Option<i32>),
}

/// Handle to a running renderer, owned by the session's lifecycle.
pub trait RemoteProcess: Send {
    /// Queue one complete frame for the process input.
    fn write_line(&mut self, line: String) -> Result<(), SessionError>;
    /// Ask the process to terminate. Safe to call more than once.
    fn kill(&mut self);
}

/// A freshly spawned process and the stream of its events.
pub struct Spawned {
    pub process: Box<dyn RemoteProcess>,
    pub events: mpsc::UnboundedReceiver<ProcessEvent>,
}

/// Starts renderer processes.
pub trait Launcher: Send + Sync {
    /// Spawn with the given extra arguments. Fails with
    /// [`SessionError::NoRuntime`] outside a Tokio runtime.
    fn launch(&self, args: &[String]) -> Result<Spawned, SessionError>;
}

/// Configuration for the native renderer binary.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Path to the renderer executable.
    pub executable: PathBuf,
    /// Arguments placed before the session's own arguments.
    pub args: Vec<String>,
    /// Working directory for the process.
    pub working_dir: Option<PathBuf>,
    /// Environment variables to set for the process.
    pub env: Vec<(String, String)>,
}

impl LaunchConfig {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
            working_dir: None,
            env: Vec::new(),
        }
    }
}

/// Launches the renderer as a child process talking over stdio.
#[derive(Debug, Clone)]
pub struct NativeLauncher {
    config: LaunchConfig,
}

impl NativeLauncher {
    pub fn new(config: LaunchConfig) -> Self {
        Self { config }
    }
}

impl Launcher for NativeLauncher {
    fn launch(&self, args: &[String]) -> Result<Spawned, SessionError> {
        let runtime = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;

        let mut cmd = Command::new(&self.config.executable);
        cmd.args(&self.config.args)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = self.config.working_dir {
            cmd.current_dir(dir);
        }

        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(SessionError::SpawnFailed)?;
        let stdin = child.stdin.take().ok_or(SessionError::MissingPipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(SessionError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(SessionError::MissingPipe("stderr"))?;

        tracing::info!(
            executable = %self.config.executable.display(),
            pid = ?child.id(),
            "Spawned webview process"
        );

        let (events_tx, events) = mpsc::unbounded_channel();
        let (lines_tx, lines_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = oneshot::channel();

        runtime.spawn(write_lines(stdin, lines_rx, events_tx.clone()));
        let readers = [
            runtime.spawn(forward(stdout, ProcessEvent::Stdout, events_tx.clone())),
            runtime.spawn(forward(stderr, ProcessEvent::Stderr, events_tx.clone())),
        ];
        runtime.spawn(supervise(child, kill_rx, readers, events_tx));

        Ok(Spawned {
            process: Box::new(NativeProcess {
                lines: lines_tx,
                kill: Some(kill_tx),
            }),
            events,
        })
    }
}

struct NativeProcess {
    lines: mpsc::UnboundedSender<String>,
    kill: Option<oneshot::Sender<()>>,
}

impl RemoteProcess for NativeProcess {
    fn write_line(&mut self, line: String) -> Result<(), SessionError> {
        self.lines
            .send(line)
            .map_err(|_| SessionError::ChannelClosed)
    }

    fn kill(&mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}

async fn write_lines(
    mut stdin: ChildStdin,
    mut lines: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<ProcessEvent>,
) {
    while let Some(line) = lines.recv().await {
        let written = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.flush().await
        }
        .await;
        if let Err(err) = written {
            let _ = events.send(ProcessEvent::StreamError(format!("stdin: {err}")));
            break;
        }
    }
}

async fn forward<R>(
    mut reader: R,
    wrap: fn(Vec<u8>) -> ProcessEvent,
    events: mpsc::UnboundedSender<ProcessEvent>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if events.send(wrap(buf[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(err) => {
                let _ = events.send(ProcessEvent::StreamError(err.to_string()));
                break;
            }
        }
    }
}

/// Wait for exit (or a kill request), drain the readers, then report the exit.
async fn supervise(
    mut child: Child,
    mut kill: oneshot::Receiver<()>,
    readers: [JoinHandle<()>; 2],
    events: mpsc::UnboundedSender<ProcessEvent>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = &mut kill => {
            // Also reached when the handle is dropped without an explicit kill.
            if let Err(err) = child.start_kill() {
                tracing::debug!(error = %err, "Webview process already gone");
            }
            child.wait().await
        }
    };

    for reader in readers {
        let _ = reader.await;
    }

    match status {
        Ok(status) => {
            tracing::info!(code = ?status.code(), "Webview process exited");
            let _ = events.send(ProcessEvent::Exited(status.code()));
        }
        Err(err) => {
            let _ = events.send(ProcessEvent::StreamError(format!("wait: {err}")));
        }
    }
}
