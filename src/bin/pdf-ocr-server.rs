//! pdf-ocr-server: browser upload form over the OCR pipeline.

use anyhow::{Context, Result};
use pdf_vision_ocr::server::{create_router, AppState, ServerSettings};
use std::net::SocketAddr;
use tokio::signal;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive(Level::INFO.into())
                .add_directive(
                    "pdf_vision_ocr=debug"
                        .parse()
                        .context("Invalid log directive")?,
                ),
        )
        .init();

    let settings = ServerSettings::from_env().context("Invalid server configuration")?;
    let addr: SocketAddr = settings
        .bind_addr()
        .parse()
        .with_context(|| format!("Invalid bind address {}", settings.bind_addr()))?;
    info!(
        "Upload limit {} MB, PDF backend '{}', default key {}",
        settings.max_upload_bytes / (1024 * 1024),
        settings.pdf.backend,
        if settings.default_api_key.is_some() {
            "configured"
        } else {
            "not set"
        }
    );

    let app = create_router(AppState::new(settings));

    info!("Starting pdf-ocr-server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            info!("Shutdown signal received");
        })
        .await
        .context("Server error")?;

    info!("Server stopped cleanly");
    Ok(())
}
