// HTTP bridge exposing local printers to network clients.

use actix_web::{middleware, web, App, HttpServer};
use tracing::{error, info};

use print_bridge::config::Config;
use print_bridge::routes;
use print_bridge::PrintServer;

// ============================================================================
// Shutdown Handling
// ============================================================================

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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

    info!("Shutdown signal received");
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting print bridge");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("Failed to load configuration: {}", e),
        )
    })?;
    let socket_addr = config.socket_addr().map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    info!("Configuration loaded successfully");
    info!("Server will bind to: {}", socket_addr);

    let print_server = web::Data::new(PrintServer::from_config(&config).map_err(|e| {
        error!("Print server initialization error: {}", e);
        std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("Failed to initialize print server: {}", e),
        )
    })?);
    info!("Printer backend: {}", print_server.backend_name());

    let cors = config.cors.clone();
    let app_server = print_server.clone();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(routes::cors_headers(&cors))
            .wrap(middleware::Logger::default())
            .app_data(app_server.clone())
            .configure(routes::configure)
    })
    .bind(socket_addr)?
    .shutdown_timeout(5)
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(async move { server.await });

    info!("Print bridge listening on {}", socket_addr);

    shutdown_signal().await;

    info!("Initiating graceful shutdown...");

    // Stop accepting new connections and wait for in-flight jobs
    server_handle.stop(true).await;
    print_server.stop();

    server_task.await.map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("Server task error: {}", e),
        )
    })??;

    info!("Graceful shutdown complete");
    Ok(())
}
