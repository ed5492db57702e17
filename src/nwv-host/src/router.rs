//! Dispatch of inbound renderer messages.

use crate::content::{mime_type, requested_file, ContentResolver};
use crate::protocol::{Command, DropEvent, Inbound, RawScriptError};
use percent_encoding::percent_decode_str;
use serde_json::Value;

/// Script error with its text fields decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    pub message: String,
    pub source: String,
    pub line: u64,
    pub column: u64,
    pub stack: String,
}

/// What the session has to do with a routed message.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    /// The renderer signalled that the channel is ready.
    Ready,
    /// The renderer is going away.
    Ended,
    /// A frame to write back to the renderer.
    Reply(Command),
    /// Decoded payload for the message callback.
    Message(Value),
    /// Drag-and-drop notification for the drop callback.
    Drop(DropEvent),
    /// `console.log` arguments from the page.
    Console(Vec<Value>),
    ScriptError(ScriptError),
    /// Nothing further to do (already logged).
    Ignored,
}

/// Maps inbound messages to their handlers.
pub struct MessageRouter {
    scheme: String,
    resolver: Box<dyn ContentResolver>,
}

impl MessageRouter {
    pub fn new(scheme: impl Into<String>, resolver: Box<dyn ContentResolver>) -> Self {
        Self {
            scheme: scheme.into(),
            resolver,
        }
    }

    pub fn route(&self, message: Inbound) -> Routed {
        match message {
            Inbound::Start => Routed::Ready,
            Inbound::End => Routed::Ended,
            Inbound::UserMessage { message } => match decode_json(&message) {
                Ok(value) => Routed::Message(value),
                Err(reason) => {
                    tracing::warn!(%reason, "Failed to decode message from webview");
                    Routed::Ignored
                }
            },
            Inbound::Log { log } => match decode_json(&log) {
                Ok(Value::Array(args)) => Routed::Console(args),
                Ok(other) => Routed::Console(vec![other]),
                Err(reason) => {
                    tracing::warn!(%reason, "Failed to decode console log from webview");
                    Routed::Ignored
                }
            },
            Inbound::ScriptError(raw) => Routed::ScriptError(decode_script_error(raw)),
            Inbound::ContentRequest { url } => Routed::Reply(self.resolve_content(url)),
            Inbound::DropHovered { paths } => Routed::Drop(DropEvent::Hovered { paths }),
            Inbound::DropDropped { paths } => Routed::Drop(DropEvent::Dropped { paths }),
            Inbound::DropCancelled => Routed::Drop(DropEvent::Cancelled),
        }
    }

    /// Log a frame that matched no known message; the channel carries on.
    pub fn unrecognized(&self, frame: &Value) -> Routed {
        let tag = frame.get("type").and_then(Value::as_str).unwrap_or("<none>");
        tracing::warn!(tag, frame = %frame, "Unknown message type from webview");
        Routed::Ignored
    }

    fn resolve_content(&self, url: String) -> Command {
        let file = requested_file(&url, &self.scheme);
        let path = self.resolver.resolve(&file);
        let mimetype = mime_type(&path).to_string();
        tracing::debug!(%url, path = %path.display(), %mimetype, "Resolved content request");
        Command::ContentResponse {
            url,
            path,
            mimetype,
        }
    }
}

fn decode_text(encoded: &str) -> String {
    percent_decode_str(encoded).decode_utf8_lossy().into_owned()
}

fn decode_json(encoded: &str) -> Result<Value, String> {
    let text = percent_decode_str(encoded)
        .decode_utf8()
        .map_err(|err| err.to_string())?;
    serde_json::from_str(&text).map_err(|err| err.to_string())
}

fn decode_script_error(raw: RawScriptError) -> ScriptError {
    ScriptError {
        message: decode_text(&raw.message),
        source: decode_text(&raw.source),
        line: raw.line,
        column: raw.column,
        stack: decode_text(&raw.stack),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn router() -> MessageRouter {
        MessageRouter::new(
            "nwv",
            Box::new(|file: &str| PathBuf::from("path/to").join(file)),
        )
    }

    #[test]
    fn start_and_end() {
        assert_eq!(router().route(Inbound::Start), Routed::Ready);
        assert_eq!(router().route(Inbound::End), Routed::Ended);
    }

    #[test]
    fn root_content_request_replies_with_echoed_url() {
        let routed = router().route(Inbound::ContentRequest {
            url: "nwv://index.html".into(),
        });
        assert_eq!(
            routed,
            Routed::Reply(Command::ContentResponse {
                url: "nwv://index.html".into(),
                path: PathBuf::from("path/to/index.html"),
                mimetype: "text/html".into(),
            })
        );
    }

    #[test]
    fn nested_content_request() {
        let routed = router().route(Inbound::ContentRequest {
            url: "nwv://index.html/sub/file.js".into(),
        });
        assert_eq!(
            routed,
            Routed::Reply(Command::ContentResponse {
                url: "nwv://index.html/sub/file.js".into(),
                path: PathBuf::from("path/to/sub/file.js"),
                mimetype: "text/javascript".into(),
            })
        );
    }

    #[test]
    fn user_message_is_percent_decoded_json() {
        let routed = router().route(Inbound::UserMessage {
            message: "%7B%22type%22%3A%22title%22%2C%22title%22%3A%22Ahoj%20sv%C4%9Bte%22%7D".into(),
        });
        assert_eq!(
            routed,
            Routed::Message(json!({"type": "title", "title": "Ahoj světe"}))
        );
    }

    #[test]
    fn broken_user_message_is_ignored() {
        let routed = router().route(Inbound::UserMessage {
            message: "%7Bnot-json".into(),
        });
        assert_eq!(routed, Routed::Ignored);
    }

    #[test]
    fn log_arguments_are_forwarded() {
        let routed = router().route(Inbound::Log {
            log: "%5B%22hello%22%2C42%5D".into(),
        });
        assert_eq!(routed, Routed::Console(vec![json!("hello"), json!(42)]));
    }

    #[test]
    fn script_error_fields_are_decoded() {
        let routed = router().route(Inbound::ScriptError(RawScriptError {
            message: "Uncaught%20TypeError".into(),
            source: "nwv%3A%2F%2Findex.html%2Fapp.js".into(),
            line: 3,
            column: 14,
            stack: "at%20main".into(),
        }));
        assert_eq!(
            routed,
            Routed::ScriptError(ScriptError {
                message: "Uncaught TypeError".into(),
                source: "nwv://index.html/app.js".into(),
                line: 3,
                column: 14,
                stack: "at main".into(),
            })
        );
    }

    #[test]
    fn drops_are_forwarded() {
        let paths = vec![PathBuf::from("/home/me/photo.jpg")];
        assert_eq!(
            router().route(Inbound::DropDropped {
                paths: paths.clone()
            }),
            Routed::Drop(DropEvent::Dropped { paths })
        );
        assert_eq!(
            router().route(Inbound::DropCancelled),
            Routed::Drop(DropEvent::Cancelled)
        );
    }

    #[test]
    fn unknown_frames_are_ignored() {
        let routed = router().unrecognized(&json!({"type": "teleport"}));
        assert_eq!(routed, Routed::Ignored);
    }
}
