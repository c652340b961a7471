use crate::config::QrServiceConfig;
use crate::handlers;
use crate::services::{LocalQrStore, QrGenerator, QrStore, RegistrationIndex, RegistrationService};
use axum::middleware::from_fn;
use axum::{
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{metrics::metrics_middleware, tracing::request_id_middleware};
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: QrServiceConfig,
    pub registrations: RegistrationService,
}

impl AppState {
    /// Open the store under the configured media root and prime the index
    /// from whatever images are already there.
    pub async fn from_config(config: QrServiceConfig) -> Result<Self, AppError> {
        let store = LocalQrStore::new(&config.storage.media_root, &config.storage.media_url)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to initialize QR storage at {}: {}",
                    config.storage.media_root,
                    e
                );
                e
            })?;
        let store: Arc<dyn QrStore> = Arc::new(store);

        let index = RegistrationIndex::prime(store.as_ref()).await.map_err(|e| {
            tracing::error!("Failed to build registration index: {}", e);
            e
        })?;

        let registrations = RegistrationService::new(
            QrGenerator::new(config.qr.clone()),
            store,
            Arc::new(index),
        );

        Ok(Self {
            config,
            registrations,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .route("/api/generate", post(handlers::generate_qr))
        .route("/api/generate/", post(handlers::generate_qr))
        .route("/api/qr/:event_id/:user_id", get(handlers::get_qr))
        .route("/api/qr/:event_id/:user_id/", get(handlers::get_qr))
        .route("/api/validate", post(handlers::validate_qr))
        .route("/api/validate/", post(handlers::validate_qr));

    if let Some(mount) = media_mount(&state.config) {
        tracing::info!(
            mount = %mount,
            root = %state.config.storage.media_root,
            "Serving media files"
        );
        router = router.nest_service(&mount, ServeDir::new(&state.config.storage.media_root));
    }

    router
        .route_layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        // Outermost, so the trace span sees a generated id too.
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Path the media root is mounted at, when it can be served locally.
///
/// Absolute URLs point at some other host, and `/` would shadow the API.
fn media_mount(config: &QrServiceConfig) -> Option<String> {
    if !config.storage.serve_media {
        return None;
    }
    let mount = config.storage.media_url.trim_end_matches('/');
    if !mount.starts_with('/') || mount.is_empty() {
        return None;
    }
    Some(mount.to_string())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
}

impl Application {
    pub async fn build(config: QrServiceConfig) -> Result<Self, AppError> {
        let state = AppState::from_config(config.clone()).await?;
        let app = build_router(state);

        let addr = config.common.socket_addr();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}
