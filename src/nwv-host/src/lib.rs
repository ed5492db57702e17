//! Host-side supervisor for an external native webview renderer.
//!
//! This crate provides:
//! - A line-based protocol for talking to the renderer over its stdin/stdout
//! - A session that launches the renderer, keeps its window settings in sync
//!   and tracks whether it is still alive
//! - Resolution of the renderer's virtual URLs to files on disk
//!
//! # Channel Protocol
//!
//! Each frame is one line, `_ioc:` followed by a JSON object tagged by `type`:
//! - The host writes [`Command`] and [`Setting`] frames to the renderer's stdin
//! - The renderer writes [`Inbound`] frames to stdout, interleaved with any
//!   other text it prints (which is logged, not interpreted)
//! - Anything on stderr is treated as a fatal renderer error
//!
//! ```text
//! host     -> _ioc:{"type":"title","title":"Hello"}
//! renderer <- _ioc:{"type":"start"}
//! renderer <- _ioc:{"type":"path","url":"nwv://index.html"}
//! host     -> _ioc:{"type":"path","url":"nwv://index.html","path":"/srv/site/index.html","mimetype":"text/html"}
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use nwv_host::{DirectoryResolver, LaunchConfig, NativeLauncher, Session};
//!
//! let launcher = NativeLauncher::new(LaunchConfig::new("/path/to/linux-x86-64-webview"));
//! let session = Session::builder("Hello")
//!     .inner_size(640.0, 420.0)
//!     .resolver(DirectoryResolver::new("./site"))
//!     .on_message(|message| println!("page says {message}"))
//!     .build(launcher)?;
//!
//! session.start()?;
//! session.eval("sendMessage('I am here!');")?;
//! session.wait_closed().await?;
//! ```

pub mod codec;
pub mod content;
mod error;
pub mod lifecycle;
pub mod process;
pub mod protocol;
pub mod router;
mod session;
pub mod settings;

pub use codec::{CodecError, Decoded, FrameCodec};
pub use content::{mime_type, ContentResolver, DirectoryResolver};
pub use error::SessionError;
pub use lifecycle::{SessionState, Termination};
pub use process::{LaunchConfig, Launcher, NativeLauncher, ProcessEvent, RemoteProcess, Spawned};
pub use protocol::{
    Command, DropEvent, Inbound, Outbound, Position, Setting, SettingKind, Size, MARKER,
};
pub use router::{MessageRouter, Routed, ScriptError};
pub use session::{DropCallback, MessageCallback, Session, SessionBuilder};
pub use settings::{Applied, SettingsStore};
