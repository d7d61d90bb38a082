use clap::Parser;
use tracing::info;

use subcontrol::config::Config;
use subcontrol::engine::Engine;
use subcontrol::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    let _log_guard = logging::init(&config.root)?;

    info!(root = %config.root.display(), host = %config.host, port = config.port, "starting subcontrold");

    let engine = Engine::bootstrap(config.clone())?;
    let router = engine.router();

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(engine))
        .await?;

    info!("shut down cleanly");
    Ok(())
}

/// Resolves on whichever comes first: Ctrl-C, or the engine's own
/// heartbeat-grace-window drain condition (spec.md §4.10).
async fn shutdown_signal(engine: Engine) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl-C handler");
    };

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl-C, draining"),
        _ = engine.shutdown_signal() => {},
    }
}
