use anyhow::Result;
use clap::Parser;
use dhcpd_dashboard::*;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(long)]
    verbose: bool,

    /// Port to bind (overrides server.port from the config file)
    #[arg(long)]
    port: Option<u16>,
}

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let mut app_config = config::AppConfig::load()?;
    if let Some(port) = cli.port {
        app_config.server.port = port;
        app_config.validate()?;
    }
    let upstreams: Arc<[models::Upstream]> = app_config.upstreams()?.into();
    tracing::info!(
        upstreams = upstreams.len(),
        interval_ms = app_config.polling.interval_ms,
        "polling dhcpd status endpoints"
    );

    let (hub_shutdown_tx, hub_shutdown_rx) = tokio::sync::oneshot::channel();
    let (hub, hub_handle) =
        hub::spawn::<routes::WsConnection>(app_config.hub_config(), hub_shutdown_rx);

    let (scheduler_shutdown_tx, scheduler_shutdown_rx) = tokio::sync::oneshot::channel();
    let scheduler_handle = scheduler::spawn(
        scheduler::SchedulerDeps {
            prober: prober::Prober::new(Duration::from_millis(app_config.polling.timeout_ms))?,
            upstreams,
            records: hub.records(),
            shutdown_rx: scheduler_shutdown_rx,
        },
        Duration::from_millis(app_config.polling.interval_ms),
    );

    let app = routes::app(hub, &app_config);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("http server started on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal");
            let _ = scheduler_shutdown_tx.send(());
            let _ = scheduler_handle.await;
            let _ = hub_shutdown_tx.send(());
            let _ = hub_handle.await;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
