use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use crate::error::{LeaderboardError, LeaderboardResult};

pub async fn serve(address: &str, router: Router) -> LeaderboardResult<()> {
    let listener = TcpListener::bind(address)
        .await
        .map_err(|e| LeaderboardError::Network(format!("could not bind {address}: {e}")))?;
    info!("Server running on {address}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| LeaderboardError::Network(e.to_string()))?;

    info!("Server shutting down...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
