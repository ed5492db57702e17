//! Mapping of the renderer's virtual URLs onto files on disk.

use path_clean::PathClean;
use percent_encoding::percent_decode_str;
use std::path::{Component, Path, PathBuf};

/// Document served for the bare `scheme://index.html` URL.
pub const ROOT_DOCUMENT: &str = "index.html";

/// Hook turning a relative file reference into a real path.
pub trait ContentResolver: Send {
    fn resolve(&self, file: &str) -> PathBuf;
}

impl<F> ContentResolver for F
where
    F: Fn(&str) -> PathBuf + Send,
{
    fn resolve(&self, file: &str) -> PathBuf {
        self(file)
    }
}

/// Serves files from one directory. `..` segments cannot climb above it.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
}

impl DirectoryResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn current_dir() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ContentResolver for DirectoryResolver {
    fn resolve(&self, file: &str) -> PathBuf {
        let cleaned = Path::new(file).clean();
        let relative: PathBuf = cleaned
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect();
        self.root.join(relative)
    }
}

/// Relative file reference for a virtual URL such as `nwv://index.html/app.js`.
pub fn requested_file(url: &str, scheme: &str) -> String {
    let rest = url
        .strip_prefix(scheme)
        .and_then(|r| r.strip_prefix("://"))
        .unwrap_or(url);
    let rest = rest.split(['?', '#']).next().unwrap_or_default();

    if rest.is_empty() || rest == ROOT_DOCUMENT || rest == "index.html/" {
        return ROOT_DOCUMENT.to_string();
    }
    let rest = rest.strip_prefix("index.html/").unwrap_or(rest);
    percent_decode_str(rest).decode_utf8_lossy().into_owned()
}

/// Media type for the common web asset extensions.
pub fn mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("htm" | "html") => "text/html",
        Some("js" | "mjs") => "text/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/vnd.microsoft.icon",
        Some("webp") => "image/webp",
        Some("wasm") => "application/wasm",
        Some("woff2") => "font/woff2",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}
