//! Live event wall server
//!
//! Usage: event-wall [CONFIG]
//!
//! The configuration path defaults to `$WALL_CONFIG`, then `config.json`.
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::sync::Arc;

use anyhow::{bail, Context};
use tracing_subscriber::{fmt, EnvFilter};

use event_wall::{
    Broadcaster, FilterParams, Schedule, SessionClock, StreamSupervisor, SystemClock,
    TcpJsonConnector, UpdateLog, WallConfig, WallServer,
};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(env_filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("WALL_CONFIG").ok())
        .unwrap_or_else(|| "config.json".to_string());

    let config = WallConfig::from_file(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path))?;

    if config.upstream.credentials.is_incomplete() {
        bail!("upstream credentials are incomplete in {}", config_path);
    }

    let schedule = Schedule::from_file(&config.schedule.path).with_context(|| {
        format!("failed to load schedule from {}", config.schedule.path.display())
    })?;
    tracing::info!(slots = schedule.len(), "Schedule loaded");

    let clock = SessionClock::new(Arc::new(schedule), config.schedule.announcements.clone());
    let updates = Arc::new(UpdateLog::open(&config.updates).context("failed to open update log")?);

    let (broadcaster, commands) = Broadcaster::new(
        config.registry.clone(),
        clock,
        Arc::new(SystemClock),
        updates,
    );

    let supervisor = StreamSupervisor::new(
        TcpJsonConnector::new(config.upstream.clone()),
        FilterParams::new(config.upstream.track.iter().cloned()),
        config.reconnect.clone(),
        Arc::clone(&broadcaster),
        commands,
    )
    .spawn();

    let server = WallServer::new(config.server.clone(), broadcaster);
    tracing::info!(addr = %server.bind_addr(), "Starting event wall");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    supervisor.abort();
    tracing::info!("Event wall stopped");

    Ok(())
}
