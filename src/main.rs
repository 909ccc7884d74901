//! GitLab MCP server - main entry point.
//!
//! ```bash
//! gitlab-mcp [--transport stdio|http] [--host 127.0.0.1] [--port 8000] \
//!            [--mode full|slim] [--config gitlab-mcp.json]
//! ```
//!
//! Configuration layers: defaults, then `--config`, then environment
//! (`GITLAB_URL`, `GITLAB_TOKEN`, `GITLAB_MCP_MODE`, ...), then flags.
//! Logs go to stderr; stdout carries the stdio protocol.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use gitlab_mcp::mcp::{http, stdio};
use gitlab_mcp::types::{ToolMode, TransportKind};
use gitlab_mcp::Config;
use tokio_util::sync::CancellationToken;

/// GitLab REST API as MCP tools
#[derive(Parser, Debug)]
#[command(name = "gitlab-mcp")]
#[command(about = "MCP server exposing the GitLab REST API as tools")]
#[command(version)]
struct Args {
    /// Wire transport
    #[arg(long, value_enum)]
    transport: Option<TransportKind>,

    /// Bind host for the HTTP transport
    #[arg(long)]
    host: Option<String>,

    /// Bind port for the HTTP transport
    #[arg(long)]
    port: Option<u16>,

    /// Tool surface: every tool, or three meta-tools
    #[arg(long, value_enum)]
    mode: Option<ToolMode>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Args {
    fn load_config(&self) -> gitlab_mcp::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env()?;
        if let Some(transport) = self.transport {
            config.server.transport = transport;
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(mode) = self.mode {
            config.server.mode = mode;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = args.load_config()?;
    gitlab_mcp::observability::init_tracing(&config.observability);

    tracing::info!(
        gitlab = %config.gitlab.url,
        transport = ?config.server.transport,
        mode = ?config.server.mode,
        "gitlab-mcp starting"
    );

    let server = Arc::new(gitlab_mcp::build_server(&config)?);
    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    match config.server.transport {
        TransportKind::Stdio => stdio::serve_stdio(server, &config.transport, shutdown).await?,
        TransportKind::Http => {
            http::serve_http(
                server,
                &config.server.host,
                config.server.port,
                &config.transport,
                shutdown,
            )
            .await?
        }
    }

    tracing::info!("gitlab-mcp stopped");
    Ok(())
}

async fn shutdown_on_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("cannot listen for ctrl-c: {}", e);
        return;
    }
    tracing::info!("shutdown requested");
    shutdown.cancel();
}
