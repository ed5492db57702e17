pub mod binary;
pub mod config;
pub mod logging;
pub mod paths;

pub use binary::{binary_name, Platform};
pub use config::{Config, ConfigError, LogLevel, LoggingConfig, ValidationError, WebViewConfig};
pub use logging::{init_logging, LoggingError, LoggingGuard};
pub use paths::{AppDirs, DirsError};

pub const APP_NAME: &str = "native-webview";
pub const APP_AUTHOR: &str = "NativeWebView";
pub const APP_QUALIFIER: &str = "io";

/// Tracing target for text the renderer prints outside the protocol.
pub const REMOTE_TARGET: &str = "nwv::remote";
/// Tracing target for console output and script errors forwarded by the page.
pub const CONSOLE_TARGET: &str = "nwv::console";
