use qr_service::config::QrServiceConfig;
use qr_service::services::init_metrics;
use qr_service::Application;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize metrics recorder (must be before any metrics are recorded)
    init_metrics();

    let config = QrServiceConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    init_tracing(
        "qr-service",
        &config.common.log_level,
        config.common.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        media_root = %config.storage.media_root,
        media_url = %config.storage.media_url,
        error_correction = ?config.qr.error_correction,
        box_size = config.qr.box_size,
        border = config.qr.border,
        "Starting qr-service"
    );

    let application = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to start application: {}", e);
        std::io::Error::other(format!("Startup error: {}", e))
    })?;

    application.run_until_stopped().await?;

    tracing::info!("qr-service stopped");
    Ok(())
}
