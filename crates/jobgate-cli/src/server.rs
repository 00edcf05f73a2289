use std::sync::Arc;

use jobgate_server::{AppState, CancellationToken, Server, ServerConfig};

pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_config(&config)?);
    let server = Server::builder()
        .with_listen_address(config.listen_address)
        .with_state(state)
        .build()?;

    let cancel_token = CancellationToken::new();
    let mut server_handle = tokio::spawn(server.run(cancel_token.clone()));

    tokio::select! {
        _ = wait_for_shutdown_signal() => {
            tracing::info!("Shutdown signal received, gracefully shutting down...");
        }
        result = &mut server_handle => {
            result??;
            return Ok(());
        }
    }
    cancel_token.cancel();

    let shutdown_timeout = tokio::time::Duration::from_secs(30);
    tokio::select! {
        result = server_handle => {
            result??;
            tracing::info!("HTTP API server stopped");
        }
        _ = tokio::time::sleep(shutdown_timeout) => {
            tracing::warn!("HTTP API server shutdown timed out");
        }
    }

    Ok(())
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }
}
