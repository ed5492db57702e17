//! A supervised renderer session: the public surface of this crate.

use crate::codec::{CodecError, Decoded, FrameCodec};
use crate::content::{ContentResolver, DirectoryResolver};
use crate::error::SessionError;
use crate::lifecycle::{CloseWatch, LifecycleController, SessionState, Termination};
use crate::process::{Launcher, ProcessEvent, Spawned};
use crate::protocol::{Command, DropEvent, Inbound, Position, Setting, Size};
use crate::router::{MessageRouter, Routed};
use crate::settings::{Applied, SettingsStore};
use nwv_core::{WebViewConfig, CONSOLE_TARGET, REMOTE_TARGET};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

const DEFAULT_SCHEME: &str = "nwv";
const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

pub type MessageCallback = Box<dyn FnMut(Value) + Send>;
pub type DropCallback = Box<dyn FnMut(DropEvent) + Send>;

struct Callbacks {
    on_message: MessageCallback,
    on_drop: DropCallback,
}

impl Default for Callbacks {
    fn default() -> Self {
        Self {
            on_message: Box::new(|message| {
                tracing::info!(%message, "Message from webview");
            }),
            on_drop: Box::new(|_| {}),
        }
    }
}

/// Work that must run outside the session lock.
enum Notice {
    Message(Value),
    Drop(DropEvent),
}

impl Callbacks {
    fn deliver(&mut self, notice: Notice) {
        match notice {
            Notice::Message(message) => (self.on_message)(message),
            Notice::Drop(event) => (self.on_drop)(event),
        }
    }
}

/// State shared between the caller and the event pump.
struct Inner {
    lifecycle: LifecycleController,
    settings: SettingsStore,
    codec: FrameCodec,
    router: MessageRouter,
    callbacks: Option<Callbacks>,
}

impl Inner {
    fn apply(&mut self, setting: Setting) -> Result<(), SessionError> {
        let line = self.codec.encode(&setting)?;
        let state = self.lifecycle.state().clone();
        match self.settings.apply(setting, &state)? {
            Applied::Deferred => Ok(()),
            Applied::Immediate => self.lifecycle.write_line(line),
        }
    }

    fn send_command(&mut self, command: Command) -> Result<(), SessionError> {
        match self.lifecycle.state() {
            SessionState::Running => {}
            SessionState::Idle => return Err(SessionError::NotRunning),
            _ => return Err(SessionError::ChannelClosed),
        }
        let line = self.codec.encode(&command)?;
        self.lifecycle.write_line(line)
    }

    /// Send every recorded setting in the order it was first applied.
    fn replay(&mut self) {
        let Inner {
            lifecycle,
            settings,
            codec,
            ..
        } = self;
        for setting in settings.replay() {
            let sent = codec
                .encode(setting)
                .map_err(SessionError::from)
                .and_then(|line| lifecycle.write_line(line));
            if let Err(err) = sent {
                tracing::warn!(setting = %setting.kind(), error = %err, "Failed to replay setting");
                break;
            }
        }
    }

    fn handle_event(&mut self, event: ProcessEvent) -> Vec<Notice> {
        let mut notices = Vec::new();
        match event {
            ProcessEvent::Stdout(chunk) => {
                for decoded in self.codec.decode::<Inbound>(&chunk) {
                    if self.lifecycle.state().is_terminal() {
                        break;
                    }
                    let routed = match decoded {
                        Decoded::Message(message) => self.router.route(message),
                        Decoded::Unrecognized(frame) => self.router.unrecognized(&frame),
                        Decoded::Text(text) => {
                            tracing::info!(target: REMOTE_TARGET, "{text}");
                            continue;
                        }
                    };
                    self.apply_routed(routed, &mut notices);
                }
            }
            ProcessEvent::Stderr(chunk) => {
                let text = String::from_utf8_lossy(&chunk);
                let text = text.trim();
                if !text.is_empty() {
                    self.lifecycle.on_error(text);
                }
            }
            ProcessEvent::StreamError(reason) => {
                self.lifecycle.on_error(reason);
            }
            ProcessEvent::Exited(code) => {
                self.lifecycle.on_exit(code);
            }
        }
        notices
    }

    fn apply_routed(&mut self, routed: Routed, notices: &mut Vec<Notice>) {
        match routed {
            Routed::Ready => self.lifecycle.mark_ready(),
            Routed::Ended => {
                self.lifecycle.on_end();
            }
            Routed::Reply(command) => {
                let sent = self
                    .codec
                    .encode(&command)
                    .map_err(SessionError::from)
                    .and_then(|line| self.lifecycle.write_line(line));
                if let Err(err) = sent {
                    tracing::warn!(error = %err, "Dropping reply to webview");
                }
            }
            Routed::Message(message) => notices.push(Notice::Message(message)),
            Routed::Drop(event) => notices.push(Notice::Drop(event)),
            Routed::Console(args) => {
                tracing::info!(target: CONSOLE_TARGET, "{}", render_console(&args));
            }
            Routed::ScriptError(err) => {
                tracing::error!(
                    target: CONSOLE_TARGET,
                    source = %err.source,
                    line = err.line,
                    column = err.column,
                    stack = %err.stack,
                    "{}",
                    err.message
                );
            }
            Routed::Ignored => {}
        }
    }
}

/// `console.log` style rendering: strings bare, everything else as JSON.
fn render_console(args: &[Value]) -> String {
    args.iter()
        .map(|arg| match arg {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn lock(shared: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn wait_terminal(closed: &mut CloseWatch) -> Result<Termination, SessionError> {
    let termination = closed
        .wait_for(Option::is_some)
        .await
        .map_err(|_| SessionError::Abandoned)?;
    Ok((*termination).clone().unwrap_or(Termination::Closed))
}

/// Drain process events one at a time until the session terminates.
async fn pump(
    shared: Arc<Mutex<Inner>>,
    mut events: mpsc::UnboundedReceiver<ProcessEvent>,
    mut callbacks: Callbacks,
) {
    while let Some(event) = events.recv().await {
        let (notices, terminal) = {
            let mut inner = lock(&shared);
            let notices = inner.handle_event(event);
            (notices, inner.lifecycle.state().is_terminal())
        };
        for notice in notices {
            callbacks.deliver(notice);
        }
        if terminal {
            return;
        }
    }

    let mut inner = lock(&shared);
    if inner.lifecycle.state() == &SessionState::Closing {
        inner.lifecycle.finish(Termination::Closed);
    } else {
        inner
            .lifecycle
            .on_error("webview event stream ended without an exit status");
    }
}

/// Configures a [`Session`] before launch.
pub struct SessionBuilder {
    title: String,
    transparent: bool,
    inner_size: Option<Size>,
    outer_position: Option<Position>,
    scheme: String,
    close_timeout: Duration,
    resolver: Option<Box<dyn ContentResolver>>,
    callbacks: Callbacks,
}

impl SessionBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            transparent: false,
            inner_size: None,
            outer_position: None,
            scheme: DEFAULT_SCHEME.to_string(),
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            resolver: None,
            callbacks: Callbacks::default(),
        }
    }

    /// Take scheme, timeout, transparency and content root from configuration.
    pub fn with_config(mut self, config: &WebViewConfig) -> Self {
        self.scheme = config.scheme.clone();
        self.close_timeout = Duration::from_millis(config.close_timeout_ms);
        self.transparent = config.transparent;
        if let Some(root) = &config.content_root {
            self.resolver = Some(Box::new(DirectoryResolver::new(root.clone())));
        }
        self
    }

    /// Request a transparent window. Only negotiable at launch.
    pub fn transparent(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    pub fn inner_size(mut self, width: f64, height: f64) -> Self {
        self.inner_size = Some(Size { width, height });
        self
    }

    pub fn outer_position(mut self, top: f64, left: f64) -> Self {
        self.outer_position = Some(Position { top, left });
        self
    }

    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// How long `close` waits for the renderer before killing it.
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Resolve content requests with `resolver` instead of the working directory.
    pub fn resolver(mut self, resolver: impl ContentResolver + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    pub fn on_message(mut self, callback: impl FnMut(Value) + Send + 'static) -> Self {
        self.callbacks.on_message = Box::new(callback);
        self
    }

    pub fn on_drop(mut self, callback: impl FnMut(DropEvent) + Send + 'static) -> Self {
        self.callbacks.on_drop = Box::new(callback);
        self
    }

    /// Create the session. Nothing is spawned until [`Session::start`].
    pub fn build(self, launcher: impl Launcher + 'static) -> Result<Session, SessionError> {
        let resolver = match self.resolver {
            Some(resolver) => resolver,
            None => Box::new(
                DirectoryResolver::current_dir().unwrap_or_else(|_| DirectoryResolver::new(".")),
            ),
        };

        let mut settings = SettingsStore::new();
        let idle = SessionState::Idle;
        settings.apply(Setting::Title { title: self.title }, &idle)?;
        if let Some(size) = self.inner_size {
            settings.apply(Setting::InnerSize(size), &idle)?;
        }
        if let Some(position) = self.outer_position {
            settings.apply(Setting::OuterPosition(position), &idle)?;
        }

        let lifecycle = LifecycleController::new();
        let closed = lifecycle.subscribe();
        let inner = Inner {
            lifecycle,
            settings,
            codec: FrameCodec::new(),
            router: MessageRouter::new(self.scheme, resolver),
            callbacks: Some(self.callbacks),
        };

        Ok(Session {
            inner: Arc::new(Mutex::new(inner)),
            closed,
            launcher: Arc::new(launcher),
            transparent: self.transparent,
            close_timeout: self.close_timeout,
        })
    }
}

/// One renderer process and everything the host knows about it.
///
/// Settings applied before [`start`](Session::start) are recorded and
/// replayed once the process is up; afterwards they are sent immediately.
/// Callbacks run on the Tokio runtime that started the session, outside any
/// internal lock.
pub struct Session {
    inner: Arc<Mutex<Inner>>,
    closed: CloseWatch,
    launcher: Arc<dyn Launcher>,
    transparent: bool,
    close_timeout: Duration,
}

impl Session {
    pub fn builder(title: impl Into<String>) -> SessionBuilder {
        SessionBuilder::new(title)
    }

    pub fn state(&self) -> SessionState {
        lock(&self.inner).lifecycle.state().clone()
    }

    /// Whether the renderer has sent `start`.
    pub fn is_ready(&self) -> bool {
        lock(&self.inner).lifecycle.is_ready()
    }

    /// Record a setting and send it if the renderer is running.
    pub fn apply(&self, setting: Setting) -> Result<(), SessionError> {
        lock(&self.inner).apply(setting)
    }

    pub fn set_title(&self, title: impl Into<String>) -> Result<(), SessionError> {
        self.apply(Setting::Title {
            title: title.into(),
        })
    }

    /// Evaluate `js` in the page.
    pub fn eval(&self, js: impl Into<String>) -> Result<(), SessionError> {
        lock(&self.inner).send_command(Command::Eval { js: js.into() })
    }

    pub fn focus(&self) -> Result<(), SessionError> {
        lock(&self.inner).send_command(Command::Focus)
    }

    /// Spawn the renderer, replay settings and start processing its output.
    ///
    /// Fails with [`SessionError::NoRuntime`] outside a Tokio runtime.
    pub fn start(&self) -> Result<(), SessionError> {
        let (runtime, events, callbacks) = {
            let mut inner = lock(&self.inner);
            inner.lifecycle.ensure_idle()?;
            let runtime = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;

            let args = self.launch_args(inner.settings.title().unwrap_or_default())?;
            let Spawned { process, events } = self.launcher.launch(&args)?;
            inner.lifecycle.attach(process)?;
            inner.replay();
            (runtime, events, inner.callbacks.take().unwrap_or_default())
        };

        runtime.spawn(pump(Arc::clone(&self.inner), events, callbacks));
        Ok(())
    }

    /// Start the renderer and wait until it is gone.
    pub async fn run(&self) -> Result<(), SessionError> {
        self.start()?;
        self.wait_closed().await
    }

    /// Ask the renderer to close and wait for it to terminate.
    ///
    /// Safe to call in any state and any number of times. If the renderer
    /// ignores the request for longer than the close timeout it is killed.
    /// How the session ended is reported by [`wait_closed`](Session::wait_closed).
    pub async fn close(&self) -> Result<(), SessionError> {
        let initiated = {
            let mut inner = lock(&self.inner);
            let line = inner.codec.encode(&Command::Close)?;
            inner.lifecycle.request_close(line)
        };
        if initiated {
            self.spawn_close_deadline();
        }

        let mut closed = self.closed.clone();
        wait_terminal(&mut closed).await.map(|_| ())
    }

    /// Kill the renderer if it is still alive once the close timeout expires.
    /// Runs detached so the deadline holds even if the caller of `close` goes away.
    fn spawn_close_deadline(&self) {
        let shared = Arc::clone(&self.inner);
        let mut closed = self.closed.clone();
        let timeout = self.close_timeout;

        let deadline = async move {
            if tokio::time::timeout(timeout, wait_terminal(&mut closed))
                .await
                .is_ok()
            {
                return;
            }
            let mut inner = lock(&shared);
            if !inner.lifecycle.state().is_terminal() {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Webview ignored close request, killing it"
                );
                inner.lifecycle.finish(Termination::Closed);
            }
        };

        match Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(deadline);
            }
            Err(_) => {
                tracing::warn!("No runtime for the close deadline, killing webview now");
                lock(&self.inner).lifecycle.finish(Termination::Closed);
            }
        }
    }

    /// Wait for the session to terminate; returns the failure reason if it failed.
    pub async fn wait_closed(&self) -> Result<(), SessionError> {
        let mut closed = self.closed.clone();
        wait_terminal(&mut closed).await?.into_result()
    }

    fn launch_args(&self, title: &str) -> Result<Vec<String>, SessionError> {
        let title = serde_json::to_string(title).map_err(CodecError::from)?;
        let mut args = vec!["--title".to_string(), title];
        if self.transparent {
            args.push("--transparent".to_string());
        }
        Ok(args)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let mut inner = lock(&self.inner);
        if !inner.lifecycle.state().is_terminal() && inner.lifecycle.state() != &SessionState::Idle {
            tracing::debug!("Session dropped while webview running, terminating it");
            inner.lifecycle.finish(Termination::Closed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::RemoteProcess;
    use crate::protocol::MARKER;
    use serde_json::json;
    use std::path::PathBuf;

    /// In-memory stand-in for the renderer.
    #[derive(Clone, Default)]
    struct FakeRemote {
        lines: Arc<Mutex<Vec<String>>>,
        args: Arc<Mutex<Vec<String>>>,
        kills: Arc<Mutex<usize>>,
        events: Arc<Mutex<Option<mpsc::UnboundedSender<ProcessEvent>>>>,
        exit_on_kill: bool,
    }

    struct FakeProcess(FakeRemote);

    impl RemoteProcess for FakeProcess {
        fn write_line(&mut self, line: String) -> Result<(), SessionError> {
            self.0.lines.lock().unwrap().push(line);
            Ok(())
        }

        fn kill(&mut self) {
            *self.0.kills.lock().unwrap() += 1;
            if self.0.exit_on_kill {
                self.0.emit(ProcessEvent::Exited(None));
            }
        }
    }

    impl Launcher for FakeRemote {
        fn launch(&self, args: &[String]) -> Result<Spawned, SessionError> {
            let (tx, events) = mpsc::unbounded_channel();
            *self.events.lock().unwrap() = Some(tx);
            *self.args.lock().unwrap() = args.to_vec();
            Ok(Spawned {
                process: Box::new(FakeProcess(self.clone())),
                events,
            })
        }
    }

    impl FakeRemote {
        fn emit(&self, event: ProcessEvent) {
            if let Some(tx) = self.events.lock().unwrap().as_ref() {
                let _ = tx.send(event);
            }
        }

        fn stdout(&self, text: &str) {
            self.emit(ProcessEvent::Stdout(text.as_bytes().to_vec()));
        }

        fn frames(&self) -> Vec<Value> {
            self.lines
                .lock()
                .unwrap()
                .iter()
                .map(|line| {
                    let body = line.strip_prefix(MARKER).expect("marker");
                    assert!(body.ends_with('\n'));
                    serde_json::from_str(body.trim_end()).expect("json")
                })
                .collect()
        }

        fn kills(&self) -> usize {
            *self.kills.lock().unwrap()
        }
    }

    async fn settle(mut done: impl FnMut() -> bool) {
        for _ in 0..400 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn settings_replay_in_order_then_send_immediately() {
        let remote = FakeRemote::default();
        let session = Session::builder("Hello")
            .inner_size(640.0, 420.0)
            .outer_position(10.0, 20.0)
            .build(remote.clone())
            .unwrap();
        session
            .apply(Setting::Resizable { resizable: false })
            .unwrap();
        assert!(remote.frames().is_empty());

        session.start().unwrap();
        assert_eq!(
            *remote.args.lock().unwrap(),
            vec!["--title".to_string(), "\"Hello\"".to_string()]
        );
        assert_eq!(
            remote.frames(),
            vec![
                json!({"type": "title", "title": "Hello"}),
                json!({"type": "innerSize", "width": 640.0, "height": 420.0}),
                json!({"type": "outerPosition", "top": 10.0, "left": 20.0}),
                json!({"type": "resizable", "resizable": false}),
            ]
        );

        session.set_title("Nový nadpis").unwrap();
        assert_eq!(
            remote.frames().last(),
            Some(&json!({"type": "title", "title": "Nový nadpis"}))
        );
        assert_eq!(remote.frames().len(), 5);
    }

    #[tokio::test]
    async fn transparent_flag_is_passed_at_launch() {
        let remote = FakeRemote::default();
        let session = Session::builder("Glass")
            .transparent(true)
            .build(remote.clone())
            .unwrap();
        session.start().unwrap();
        assert_eq!(
            remote.args.lock().unwrap().last().map(String::as_str),
            Some("--transparent")
        );
    }

    #[tokio::test]
    async fn starting_twice_fails() {
        let remote = FakeRemote::default();
        let session = Session::builder("Twice").build(remote.clone()).unwrap();
        session.start().unwrap();
        assert!(matches!(
            session.start(),
            Err(SessionError::AlreadyRunning)
        ));
    }

    #[tokio::test]
    async fn commands_require_a_running_renderer() {
        let remote = FakeRemote::default();
        let session = Session::builder("Eval").build(remote.clone()).unwrap();
        assert!(matches!(
            session.eval("1 + 1"),
            Err(SessionError::NotRunning)
        ));

        session.start().unwrap();
        session.eval("sendMessage('I am here!');").unwrap();
        session.focus().unwrap();
        let frames = remote.frames();
        assert_eq!(
            frames[frames.len() - 2..],
            [
                json!({"type": "eval", "js": "sendMessage('I am here!');"}),
                json!({"type": "focus"}),
            ]
        );
    }

    #[tokio::test]
    async fn content_request_round_trip() {
        let remote = FakeRemote::default();
        let session = Session::builder("Hello")
            .resolver(|file: &str| PathBuf::from("path/to").join(file))
            .build(remote.clone())
            .unwrap();
        session.start().unwrap();
        assert_eq!(
            remote.frames(),
            vec![json!({"type": "title", "title": "Hello"})]
        );

        remote.stdout("_ioc:{\"type\":\"start\"}\n_ioc:{\"type\":\"path\",\"url\":\"nwv://index.html\"}\n");
        settle(|| remote.frames().len() == 2).await;

        assert!(session.is_ready());
        assert_eq!(
            remote.frames()[1],
            json!({"type": "path", "url": "nwv://index.html", "path": "path/to/index.html", "mimetype": "text/html"})
        );
    }

    #[tokio::test]
    async fn end_without_newline_then_exit_closes_once() {
        let remote = FakeRemote::default();
        let session = Session::builder("Bye").build(remote.clone()).unwrap();
        session.start().unwrap();

        remote.stdout("_ioc:{\"type\":\"end\"}");
        remote.emit(ProcessEvent::Exited(Some(0)));

        let (first, second) = tokio::join!(session.wait_closed(), session.wait_closed());
        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(remote.kills(), 1);
        assert!(matches!(
            session.apply(Setting::Maximized { maximized: true }),
            Err(SessionError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn end_message_closes_session() {
        let remote = FakeRemote::default();
        let session = Session::builder("End").build(remote.clone()).unwrap();
        session.start().unwrap();

        remote.stdout("_ioc:{\"type\":\"end\"}\n");
        session.wait_closed().await.unwrap();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn concurrent_close_sends_one_close_frame() {
        let remote = FakeRemote::default();
        let session = Session::builder("Close").build(remote.clone()).unwrap();
        session.start().unwrap();

        let renderer = async {
            settle(|| remote.frames().contains(&json!({"type": "close"}))).await;
            remote.emit(ProcessEvent::Exited(Some(0)));
        };
        let (a, b, c, ()) = tokio::join!(
            session.close(),
            session.close(),
            session.wait_closed(),
            renderer
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());

        let closes = remote
            .frames()
            .iter()
            .filter(|f| **f == json!({"type": "close"}))
            .count();
        assert_eq!(closes, 1);
        assert_eq!(session.state(), SessionState::Closed);
        session.close().await.unwrap();
        assert_eq!(remote.kills(), 1);
    }

    #[tokio::test]
    async fn close_kills_unresponsive_renderer() {
        let remote = FakeRemote::default();
        let session = Session::builder("Stuck")
            .close_timeout(Duration::from_millis(30))
            .build(remote.clone())
            .unwrap();
        session.start().unwrap();

        session.close().await.unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(remote.kills(), 1);
    }

    #[tokio::test]
    async fn abandoned_close_still_kills_after_timeout() {
        let remote = FakeRemote::default();
        let session = Session::builder("Cancelled")
            .close_timeout(Duration::from_millis(30))
            .build(remote.clone())
            .unwrap();
        session.start().unwrap();

        let first = tokio::time::timeout(Duration::from_millis(5), session.close()).await;
        assert!(first.is_err());
        assert_eq!(session.state(), SessionState::Closing);

        tokio::time::timeout(Duration::from_secs(2), session.close())
            .await
            .expect("close should finish once the deadline passes")
            .unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(remote.kills(), 1);
        let closes = remote
            .frames()
            .iter()
            .filter(|f| **f == json!({"type": "close"}))
            .count();
        assert_eq!(closes, 1);
    }

    #[test]
    fn starting_outside_a_runtime_fails() {
        let remote = FakeRemote::default();
        let session = Session::builder("Sync").build(remote.clone()).unwrap();
        assert!(matches!(session.start(), Err(SessionError::NoRuntime)));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(remote.args.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn closing_idle_session_never_spawns() {
        let remote = FakeRemote::default();
        let session = Session::builder("Idle").build(remote.clone()).unwrap();
        session.close().await.unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(session.start(), Err(SessionError::ChannelClosed)));
        assert!(remote.args.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stderr_output_fails_session() {
        let remote = FakeRemote {
            exit_on_kill: true,
            ..FakeRemote::default()
        };
        let session = Session::builder("Broken").build(remote.clone()).unwrap();
        session.start().unwrap();

        remote.emit(ProcessEvent::Stderr(b"GLib-CRITICAL: no display\n".to_vec()));
        let err = session.wait_closed().await.unwrap_err();
        assert!(matches!(err, SessionError::Failed(ref reason) if reason == "GLib-CRITICAL: no display"));
        assert!(matches!(
            session.state(),
            SessionState::Failed(_)
        ));
    }

    #[tokio::test]
    async fn crash_fails_session() {
        let remote = FakeRemote::default();
        let session = Session::builder("Crash").build(remote.clone()).unwrap();
        session.start().unwrap();

        remote.emit(ProcessEvent::Exited(Some(139)));
        assert!(matches!(
            session.run().await,
            Err(SessionError::AlreadyRunning)
        ));
        let err = session.wait_closed().await.unwrap_err();
        assert_eq!(err.to_string(), "webview error: process exited with status 139");
    }

    #[tokio::test]
    async fn callbacks_receive_messages_and_drops() {
        let remote = FakeRemote::default();
        let messages = Arc::new(Mutex::new(Vec::new()));
        let drops = Arc::new(Mutex::new(Vec::new()));
        let session = {
            let messages = Arc::clone(&messages);
            let drops = Arc::clone(&drops);
            Session::builder("Callbacks")
                .on_message(move |m| messages.lock().unwrap().push(m))
                .on_drop(move |d| drops.lock().unwrap().push(d))
                .build(remote.clone())
                .unwrap()
        };
        session.start().unwrap();

        remote.stdout("_ioc:{\"type\":\"message\",\"message\":\"%7B%22n%22%3A1%7D\"}\n");
        remote.stdout("_ioc:{\"type\":\"fileDropDropped\",\"paths\":[\"/tmp/a.txt\"]}\n");
        settle(|| !drops.lock().unwrap().is_empty()).await;

        assert_eq!(*messages.lock().unwrap(), vec![json!({"n": 1})]);
        assert_eq!(
            *drops.lock().unwrap(),
            vec![DropEvent::Dropped {
                paths: vec![PathBuf::from("/tmp/a.txt")]
            }]
        );
    }

    #[tokio::test]
    async fn noise_and_unknown_frames_do_not_disturb_session() {
        let remote = FakeRemote::default();
        let session = Session::builder("Noise").build(remote.clone()).unwrap();
        session.start().unwrap();

        remote.stdout("Native WebView has started!\n_ioc:{\"type\":\"teleport\"}\n_ioc:{broken\n");
        remote.stdout("_ioc:{\"type\":\"log\",\"log\":\"%5B%22hi%22%5D\"}\n_ioc:{\"type\":\"start\"}\n");
        settle(|| session.is_ready()).await;
        assert_eq!(session.state(), SessionState::Running);
    }

    #[test]
    fn console_rendering() {
        let args = vec![json!("count:"), json!(3), json!({"a": true})];
        assert_eq!(render_console(&args), "count: 3 {\"a\":true}");
    }
}
