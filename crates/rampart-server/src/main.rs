use std::sync::Arc;

use tokio::net::TcpListener;

use rampart_core::{BattleConfig, Catalog};
use rampart_room::{LoggingSink, ResultSink};
use rampart_server::{router, AppState, DEFAULT_PORT};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);

    let catalog = Arc::new(Catalog::embedded()?);
    tracing::info!(units = catalog.len(), "unit catalog loaded");

    let state = AppState::new(catalog, BattleConfig::default(), LoggingSink);
    let app = router(state.clone());

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "rampart server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    tracing::info!("server drained, exiting");
    Ok(())
}

/// Resolves on SIGTERM or SIGINT, then drains the rooms so axum can
/// finish open connections and exit.
async fn shutdown_signal<S: ResultSink>(state: AppState<S>) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining rooms");
    state.rooms.lock().await.shutdown_all().await;
}
