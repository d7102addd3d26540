//! Sangha Daemon
//!
//! Serves the group membership and moderation API.
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults
//! sangha
//!
//! # Start with custom config
//! sangha --config /path/to/config.toml
//!
//! # Start with custom HTTP port and storage directory
//! sangha --http-port 9000 --storage-dir /data/sangha
//!
//! # Throwaway database (nothing written to disk)
//! sangha --in-memory
//! ```

use anyhow::Context;
use clap::Parser;
use sangha::services::events::spawn_logging_listener;
use sangha::{Config, GroupDb, HttpServer, Services};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sangha")]
#[command(about = "Group membership and moderation service")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "SANGHA_CONFIG")]
    config: Option<PathBuf>,

    /// Storage directory
    #[arg(long, env = "SANGHA_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// HTTP API port
    #[arg(long, env = "SANGHA_HTTP_PORT")]
    http_port: Option<u16>,

    /// Keep all state in memory
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sangha=info".parse()?))
        .init();

    let args = Args::parse();

    let mut config = if let Some(config_path) = &args.config {
        Config::load(config_path)
            .with_context(|| format!("loading config from {}", config_path.display()))?
    } else {
        Config::default()
    };

    // CLI overrides
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    config.validate()?;

    info!(
        storage_dir = %config.storage_dir.display(),
        http_port = config.http_port,
        in_memory = args.in_memory,
        "Starting sangha"
    );

    let db = if args.in_memory {
        GroupDb::open_in_memory()?
    } else {
        tokio::fs::create_dir_all(&config.storage_dir).await?;

        let config_path = config.config_path();
        if !config_path.exists() {
            config.save(&config_path)?;
            info!(path = %config_path.display(), "Created default config");
        }

        GroupDb::open(&config.storage_dir)
            .with_context(|| format!("opening database in {}", config.storage_dir.display()))?
    };
    let db = Arc::new(db);

    let services = Arc::new(Services::new(db.clone(), &config));
    let audit = spawn_logging_listener(services.events.clone());

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let http_server = Arc::new(HttpServer::new(services.clone(), http_addr));

    info!("HTTP API available at http://{}", http_addr);
    info!("Press Ctrl+C to stop.");

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    };

    tokio::select! {
        result = http_server.run() => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        _ = shutdown => {}
    }

    audit.abort();

    if let Ok(stats) = db.stats() {
        info!(
            groups = stats.group_count,
            memberships = stats.membership_count,
            posts = stats.post_count,
            "Final stats"
        );
    }

    Ok(())
}
