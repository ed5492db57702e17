use crate::codec::CodecError;
use crate::protocol::SettingKind;
use thiserror::Error;

/// Errors surfaced to callers of a [`Session`](crate::Session).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("webview is already running")]
    AlreadyRunning,
    #[error("webview is not running")]
    NotRunning,
    #[error("webview channel is closed")]
    ChannelClosed,
    #[error("invalid {kind} setting: {reason}")]
    InvalidSetting { kind: SettingKind, reason: String },
    #[error("failed to spawn webview process: {0}")]
    SpawnFailed(std::io::Error),
    #[error("webview process has no {0}")]
    MissingPipe(&'static str),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("webview error: {0}")]
    Failed(String),
    #[error("session was dropped before the webview terminated")]
    Abandoned,
    #[error("no Tokio runtime is running; start the webview from within async code")]
    NoRuntime,
}
