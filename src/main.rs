//! Dual-protocol proxy.
//!
//! ```text
//!                         ┌──────────────────────────────────────────┐
//!   client ──TCP :3000───▶│ listener → sniff first bytes             │
//!                         │              │                           │
//!                         │      HTTP ◀──┴──▶ RESP                   │
//!                         │       │             │                    │
//!                         │  health router   transparent pipe ───────┼──▶ store (:6379)
//!                         │  (PING probe) ───────────────────────────┼──▶
//!                         └──────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use dual_protocol_proxy::backend::BackendProcess;
use dual_protocol_proxy::config::{self, ConfigError, ProxyConfig};
use dual_protocol_proxy::lifecycle::signals::wait_for_termination;
use dual_protocol_proxy::observability::{logging, metrics};
use dual_protocol_proxy::{Gateway, Listener, Shutdown};

#[derive(Debug, Parser)]
#[command(name = "dual-protocol-proxy")]
#[command(about = "Serve HTTP health checks and pipe Redis traffic on one port", long_about = None)]
struct Args {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:3000.
    #[arg(long)]
    listen: Option<String>,

    /// Port to listen on; keeps the configured host.
    #[arg(short, long)]
    port: Option<u16>,

    /// Backend store address (host:port).
    #[arg(short, long)]
    backend: Option<String>,

    /// Launch the backend store as a child process.
    #[arg(long)]
    spawn_backend: bool,

    /// Log level for the proxy (ignored when RUST_LOG is set).
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut ProxyConfig) {
        if let Some(listen) = &self.listen {
            config.listener.bind_address = listen.clone();
        }
        if let Some(port) = self.port {
            // An unparsable address is left alone for validation to report.
            if let Ok(mut addr) = config.listener.bind_address.parse::<SocketAddr>() {
                addr.set_port(port);
                config.listener.bind_address = addr.to_string();
            }
        }
        if let Some(backend) = &self.backend {
            config.backend.address = backend.clone();
        }
        if self.spawn_backend {
            config.backend.spawn = true;
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }
}

fn load(args: &Args) -> Result<ProxyConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => ProxyConfig::default(),
    };
    args.apply(&mut config);
    config::validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load(&args)?;

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "dual-protocol-proxy starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend = %config.backend.address,
        health_path = %config.http.health_path,
        max_connections = config.listener.max_connections,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let backend_process = if config.backend.spawn {
        Some(BackendProcess::spawn(&config.backend)?)
    } else {
        None
    };

    let listener = match Listener::bind(&config.listener).await {
        Ok(listener) => listener,
        Err(e) => {
            if let Some(process) = backend_process {
                let _ = process.stop().await;
            }
            return Err(e.into());
        }
    };

    let shutdown = Shutdown::new();
    let gateway = Gateway::new(&config);
    let mut gateway_task = tokio::spawn(gateway.run(listener, shutdown.subscribe()));

    let result = tokio::select! {
        joined = &mut gateway_task => joined,
        signal = wait_for_termination() => {
            match signal {
                Ok(name) => {
                    tracing::info!(signal = name, "Termination signal received");
                    shutdown.trigger();
                }
                Err(e) => tracing::error!(error = %e, "Failed to listen for signals"),
            }

            tokio::select! {
                joined = &mut gateway_task => joined,
                Ok(_) = wait_for_termination(), if shutdown.is_triggered() => {
                    tracing::warn!("Second signal received, exiting without drain");
                    gateway_task.abort();
                    Ok(Ok(()))
                }
            }
        }
    };

    if let Some(process) = backend_process {
        if let Err(e) = process.stop().await {
            tracing::warn!(error = %e, "Failed to stop backend process");
        }
    }

    result??;
    tracing::info!("Shutdown complete");
    Ok(())
}
