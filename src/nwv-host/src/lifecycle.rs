//! Session state machine and ownership of the renderer process handle.

use crate::error::SessionError;
use crate::process::RemoteProcess;
use std::fmt;
use tokio::sync::watch;

/// Where a session is in its life.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Constructed; settings accumulate until `start`.
    #[default]
    Idle,
    /// Process spawned, channel open.
    Running,
    /// Close requested; waiting for the process to go away.
    Closing,
    /// Terminated normally.
    Closed,
    /// Terminated by a process or stream error.
    Failed(String),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed(_))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => f.write_str("idle"),
            SessionState::Running => f.write_str("running"),
            SessionState::Closing => f.write_str("closing"),
            SessionState::Closed => f.write_str("closed"),
            SessionState::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// How a session ended, as seen by close observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    Closed,
    Failed(String),
}

impl Termination {
    pub fn into_result(self) -> Result<(), SessionError> {
        match self {
            Termination::Closed => Ok(()),
            Termination::Failed(reason) => Err(SessionError::Failed(reason)),
        }
    }
}

/// Observer side of the one-shot close broadcast.
pub type CloseWatch = watch::Receiver<Option<Termination>>;

/// Owns the process handle and applies every state transition.
///
/// Termination happens exactly once: observers are notified, then the
/// process handle is killed and released. Later triggers are no-ops.
pub struct LifecycleController {
    state: SessionState,
    ready: bool,
    process: Option<Box<dyn RemoteProcess>>,
    closed: watch::Sender<Option<Termination>>,
}

impl Default for LifecycleController {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleController {
    pub fn new() -> Self {
        let (closed, _) = watch::channel(None);
        Self {
            state: SessionState::Idle,
            ready: false,
            process: None,
            closed,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Whether the renderer has announced `start`.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn subscribe(&self) -> CloseWatch {
        self.closed.subscribe()
    }

    /// Fail fast before spawning anything.
    pub fn ensure_idle(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Idle => Ok(()),
            SessionState::Running | SessionState::Closing => Err(SessionError::AlreadyRunning),
            SessionState::Closed | SessionState::Failed(_) => Err(SessionError::ChannelClosed),
        }
    }

    /// Take ownership of a freshly spawned process: `Idle -> Running`.
    pub fn attach(&mut self, process: Box<dyn RemoteProcess>) -> Result<(), SessionError> {
        if let Err(err) = self.ensure_idle() {
            let mut process = process;
            process.kill();
            return Err(err);
        }
        self.process = Some(process);
        self.state = SessionState::Running;
        Ok(())
    }

    pub fn mark_ready(&mut self) {
        if self.state == SessionState::Running && !self.ready {
            self.ready = true;
            tracing::debug!("Webview channel ready");
        }
    }

    /// Write an encoded frame while the process handle is held.
    pub fn write_line(&mut self, line: String) -> Result<(), SessionError> {
        match self.process.as_mut() {
            Some(process) => process.write_line(line),
            None if self.state == SessionState::Idle => Err(SessionError::NotRunning),
            None => Err(SessionError::ChannelClosed),
        }
    }

    /// Begin closing. Returns `true` when this call initiated the close and
    /// the caller should send the close frame (`close_line`).
    ///
    /// An idle session has no process and goes straight to `Closed`.
    pub fn request_close(&mut self, close_line: String) -> bool {
        match self.state {
            SessionState::Idle => {
                self.finish(Termination::Closed);
                false
            }
            SessionState::Running => {
                self.state = SessionState::Closing;
                if let Err(err) = self.write_line(close_line) {
                    tracing::warn!(error = %err, "Failed to send close, killing webview");
                    self.kill();
                }
                true
            }
            _ => false,
        }
    }

    /// Ask the process to die without releasing the handle; the exit event
    /// completes the transition.
    pub fn kill(&mut self) {
        if let Some(process) = self.process.as_mut() {
            process.kill();
        }
    }

    /// The renderer said `end`: `Closing -> Closed`.
    pub fn on_end(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = SessionState::Closing;
        self.finish(Termination::Closed)
    }

    /// The process exited. Expected exits (we were closing, or status 0)
    /// close the session; anything else fails it.
    pub fn on_exit(&mut self, code: Option<i32>) -> bool {
        let termination = match (&self.state, code) {
            (SessionState::Closing, _) | (_, Some(0)) => Termination::Closed,
            (_, Some(code)) => Termination::Failed(format!("process exited with status {code}")),
            (_, None) => Termination::Failed("process was terminated by a signal".to_string()),
        };
        self.finish(termination)
    }

    /// Error output or a broken pipe.
    pub fn on_error(&mut self, reason: impl Into<String>) -> bool {
        self.finish(Termination::Failed(reason.into()))
    }

    /// Enter a terminal state. Returns `false` if already terminal.
    pub fn finish(&mut self, termination: Termination) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = match &termination {
            Termination::Closed => SessionState::Closed,
            Termination::Failed(reason) => SessionState::Failed(reason.clone()),
        };
        match &termination {
            Termination::Closed => tracing::info!("Webview session closed"),
            Termination::Failed(reason) => tracing::error!(%reason, "Webview session failed"),
        }

        self.closed.send_replace(Some(termination));
        if let Some(mut process) = self.process.take() {
            process.kill();
        }
        true
    }
}
