//! Message types exchanged with the renderer process.
//!
//! Every frame is a JSON object whose `type` field names the variant. The
//! host sends [`Outbound`] messages (split into one-shot [`Command`]s and
//! replayable [`Setting`]s) and receives [`Inbound`] messages.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Prefix distinguishing protocol frames from other output on the same stream.
pub const MARKER: &str = "_ioc:";

/// One-shot instructions for the renderer. Never recorded or replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    /// Close the window and exit.
    Close,
    /// Bring the window to the front.
    Focus,
    /// Evaluate a script in the page.
    Eval { js: String },
    /// Answer to an [`Inbound::ContentRequest`], echoing its URL.
    #[serde(rename = "path")]
    ContentResponse {
        url: String,
        path: PathBuf,
        mimetype: String,
    },
}

/// Window configuration. The latest value per [`SettingKind`] is kept and
/// replayed when the renderer starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Setting {
    Title { title: String },
    /// Small title-bar icon. Ignored by the renderer on macOS.
    WindowIcon { path: PathBuf },
    Resizable { resizable: bool },
    InnerSize(Size),
    MinInnerSize(Size),
    MaxInnerSize(Size),
    OuterPosition(Position),
    AlwaysOnTop { always: bool },
    Decorations { decorations: bool },
    Fullscreen { fullscreen: bool },
    Maximized { maximized: bool },
    Minimized { minimized: bool },
}

/// Logical window size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Logical position of the window's outer frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub top: f64,
    pub left: f64,
}

/// Identity of a setting, independent of its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKind {
    Title,
    WindowIcon,
    Resizable,
    InnerSize,
    MinInnerSize,
    MaxInnerSize,
    OuterPosition,
    AlwaysOnTop,
    Decorations,
    Fullscreen,
    Maximized,
    Minimized,
}

impl Setting {
    pub fn kind(&self) -> SettingKind {
        match self {
            Setting::Title { .. } => SettingKind::Title,
            Setting::WindowIcon { .. } => SettingKind::WindowIcon,
            Setting::Resizable { .. } => SettingKind::Resizable,
            Setting::InnerSize(_) => SettingKind::InnerSize,
            Setting::MinInnerSize(_) => SettingKind::MinInnerSize,
            Setting::MaxInnerSize(_) => SettingKind::MaxInnerSize,
            Setting::OuterPosition(_) => SettingKind::OuterPosition,
            Setting::AlwaysOnTop { .. } => SettingKind::AlwaysOnTop,
            Setting::Decorations { .. } => SettingKind::Decorations,
            Setting::Fullscreen { .. } => SettingKind::Fullscreen,
            Setting::Maximized { .. } => SettingKind::Maximized,
            Setting::Minimized { .. } => SettingKind::Minimized,
        }
    }

    /// Reject values the renderer cannot represent.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Setting::InnerSize(size) | Setting::MinInnerSize(size) | Setting::MaxInnerSize(size) => {
                if !(size.width.is_finite() && size.height.is_finite()) {
                    return Err("size must be finite".to_string());
                }
                if size.width < 0.0 || size.height < 0.0 {
                    return Err(format!(
                        "size must not be negative (got {}x{})",
                        size.width, size.height
                    ));
                }
                Ok(())
            }
            Setting::OuterPosition(pos) if !(pos.top.is_finite() && pos.left.is_finite()) => {
                Err("position must be finite".to_string())
            }
            Setting::WindowIcon { path } if path.as_os_str().is_empty() => {
                Err("icon path is empty".to_string())
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for SettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            SettingKind::Title => "title",
            SettingKind::WindowIcon => "windowIcon",
            SettingKind::Resizable => "resizable",
            SettingKind::InnerSize => "innerSize",
            SettingKind::MinInnerSize => "minInnerSize",
            SettingKind::MaxInnerSize => "maxInnerSize",
            SettingKind::OuterPosition => "outerPosition",
            SettingKind::AlwaysOnTop => "alwaysOnTop",
            SettingKind::Decorations => "decorations",
            SettingKind::Fullscreen => "fullscreen",
            SettingKind::Maximized => "maximized",
            SettingKind::Minimized => "minimized",
        };
        f.write_str(tag)
    }
}

/// Anything the host writes to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outbound {
    Command(Command),
    Setting(Setting),
}

impl From<Command> for Outbound {
    fn from(command: Command) -> Self {
        Outbound::Command(command)
    }
}

impl From<Setting> for Outbound {
    fn from(setting: Setting) -> Self {
        Outbound::Setting(setting)
    }
}

/// Messages the renderer sends to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Inbound {
    /// The window is up and the channel is ready.
    Start,
    /// The window was closed; the renderer is about to exit.
    End,
    /// Percent-encoded JSON posted by the page.
    #[serde(rename = "message")]
    UserMessage { message: String },
    /// Percent-encoded JSON array of `console.log` arguments.
    Log { log: String },
    /// Uncaught script error in the page.
    #[serde(rename = "error")]
    ScriptError(RawScriptError),
    /// The renderer needs a file for a virtual URL.
    #[serde(rename = "path")]
    ContentRequest { url: String },
    #[serde(rename = "fileDropHovered")]
    DropHovered { paths: Vec<PathBuf> },
    #[serde(rename = "fileDropDropped")]
    DropDropped { paths: Vec<PathBuf> },
    #[serde(rename = "fileDropCancelled")]
    DropCancelled,
}

/// Script error as sent on the wire; text fields are percent-encoded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawScriptError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub line: u64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub column: u64,
    #[serde(default)]
    pub stack: String,
}

/// Drag-and-drop notification handed to the drop callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DropEvent {
    #[serde(rename = "fileDropHovered")]
    Hovered { paths: Vec<PathBuf> },
    #[serde(rename = "fileDropDropped")]
    Dropped { paths: Vec<PathBuf> },
    #[serde(rename = "fileDropCancelled")]
    Cancelled,
}

/// Line and column arrive as numbers from some engines and strings from others.
fn lenient_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Integer(u64),
        Float(f64),
        Text(String),
    }

    fn truncate(f: f64) -> Option<u64> {
        (f.is_finite() && f >= 0.0).then_some(f as u64)
    }

    Ok(match Option::<NumberOrText>::deserialize(deserializer)? {
        Some(NumberOrText::Integer(n)) => n,
        Some(NumberOrText::Float(f)) => truncate(f).unwrap_or(0),
        Some(NumberOrText::Text(text)) => {
            let text = text.trim();
            text.parse::<u64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(truncate))
                .unwrap_or(0)
        }
        None => 0,
    })
}
