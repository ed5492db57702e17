use anyhow::Result;
use clap::{Parser, Subcommand};
use nwv_core::{init_logging, AppDirs, Config, WebViewConfig};
use nwv_host::{DirectoryResolver, DropEvent, LaunchConfig, NativeLauncher, Session, SessionBuilder};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(name = "nwv", version, about = "Native webview host")]
struct Cli {
    /// Renderer binary override (takes precedence over config)
    #[arg(long, global = true)]
    executable: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Open a window serving a directory
    Open(OpenCommand),
    /// Print the renderer binary that would be launched
    Binary,
}

#[derive(Debug, Parser, Clone)]
struct OpenCommand {
    /// Window title
    #[arg(long, default_value = "Native WebView")]
    title: String,
    /// Directory served to the page (defaults to config, then the working dir)
    #[arg(long)]
    root: Option<PathBuf>,
    /// Initial inner width in logical pixels
    #[arg(long, requires = "height")]
    width: Option<f64>,
    /// Initial inner height in logical pixels
    #[arg(long, requires = "width")]
    height: Option<f64>,
    /// Initial distance of the window from the top of the screen
    #[arg(long, requires = "left")]
    top: Option<f64>,
    /// Initial distance of the window from the left of the screen
    #[arg(long, requires = "top")]
    left: Option<f64>,
    /// Request a transparent window
    #[arg(long)]
    transparent: bool,
    /// Script evaluated in the page once the renderer is running
    #[arg(long)]
    eval: Option<String>,
}

#[derive(Debug, Error)]
enum OpenError {
    #[error("content root {0} is not a directory")]
    MissingRoot(PathBuf),
    #[error("renderer binary not found at {0}; install it or pass --executable")]
    MissingBinary(PathBuf),
}

impl OpenCommand {
    /// Builder with configuration defaults, overridden by command-line flags.
    fn builder(&self, config: &WebViewConfig) -> Result<SessionBuilder, OpenError> {
        let mut builder = Session::builder(self.title.clone()).with_config(config);

        if let Some(root) = &self.root {
            if !root.is_dir() {
                return Err(OpenError::MissingRoot(root.clone()));
            }
            builder = builder.resolver(DirectoryResolver::new(root.clone()));
        }
        if let (Some(width), Some(height)) = (self.width, self.height) {
            builder = builder.inner_size(width, height);
        }
        if let (Some(top), Some(left)) = (self.top, self.left) {
            builder = builder.outer_position(top, left);
        }
        if self.transparent {
            builder = builder.transparent(true);
        }

        Ok(builder)
    }
}

fn webview_config(config: &Config, executable: Option<PathBuf>) -> WebViewConfig {
    let mut webview = config.webview.clone();
    if executable.is_some() {
        webview.executable = executable;
    }
    webview
}

fn describe_drop(event: &DropEvent) -> String {
    let paths = |paths: &[PathBuf]| {
        paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    match event {
        DropEvent::Hovered { paths: hovered } => format!("hovered: {}", paths(hovered)),
        DropEvent::Dropped { paths: dropped } => format!("dropped: {}", paths(dropped)),
        DropEvent::Cancelled => "cancelled".to_string(),
    }
}

async fn open(open: OpenCommand, webview: WebViewConfig, dirs: &AppDirs) -> Result<()> {
    let executable = webview.resolve_executable(dirs);
    if !executable.is_file() {
        return Err(OpenError::MissingBinary(executable).into());
    }

    let session = open
        .builder(&webview)?
        .on_message(|message| println!("{message}"))
        .on_drop(|event| tracing::info!("File drop {}", describe_drop(&event)))
        .build(NativeLauncher::new(LaunchConfig::new(executable)))?;

    session.start()?;
    if let Some(js) = open.eval {
        session.eval(js)?;
    }

    tokio::select! {
        result = session.wait_closed() => result?,
        interrupted = tokio::signal::ctrl_c() => {
            interrupted?;
            tracing::info!("Interrupted, closing webview");
            session.close().await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let dirs = AppDirs::discover()?;
    let config = Config::load_or_default(&dirs)?;
    let _logging = init_logging(&config.logging, &dirs)?;
    let webview = webview_config(&config, cli.executable);

    match cli.command {
        Command::Binary => {
            let path = webview.resolve_executable(&dirs);
            let status = if path.is_file() { "present" } else { "missing" };
            println!("{} ({status})", path.display());
        }
        Command::Open(command) => {
            tracing::info!(
                "Opening '{}' (config dir: {})",
                command.title,
                dirs.config_dir().display()
            );
            open(command, webview, &dirs).await?;
        }
    }

    Ok(())
}
