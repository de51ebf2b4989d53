//! flowls binary entry point.
//!
//! Stdin/stdout carry the LSP protocol, so all logging goes to stderr.
//! CLI flags provide the session defaults; a client can override them with
//! `initializationOptions` in its initialize request.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use flowls_types::FlowOptions;

/// Flow language server speaking LSP over stdio.
#[derive(Debug, Parser)]
#[command(name = "flowls", version, about)]
struct Args {
    /// Absolute path to a flow binary to use instead of automatic
    /// management.
    #[arg(long, value_name = "PATH")]
    flow_path: Option<PathBuf>,

    /// Never download a flow release, even when nothing usable is installed.
    #[arg(long)]
    no_auto_download: bool,

    /// Probe node_modules/.bin/flow under the project root.
    #[arg(long)]
    try_flow_bin: bool,
}

impl Args {
    fn into_options(self) -> FlowOptions {
        FlowOptions {
            path_to_flow: self.flow_path,
            auto_download_flow: !self.no_auto_download,
            try_flow_bin: self.try_flow_bin,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = Args::parse().into_options();
    tracing::info!("starting flowls");

    if let Err(e) = flowls_server::run_server(options).await {
        tracing::error!("server error: {e:#}");
        std::process::exit(1);
    }

    tracing::info!("flowls stopped");
}
