//! File storage service: upload, list, download and delete files in a single
//! server-local directory, with size and MIME-type validation on upload.

pub mod config;
pub mod error;
pub mod files;
pub mod handlers;
pub mod metrics;
pub mod middleware;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use files::{AllowedMimeTypes, FileStore, FileStoreConfig, FileUpload, StoredFile};
pub use handlers::routes::create_routes;
pub use metrics::MetricsCollector;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::{self as axum_middleware, Next},
    response::Response,
    Router,
};
use std::net::SocketAddr;
use tokio::signal;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub app_name: String,
    pub version: String,
    pub file_store: FileStore,
    pub metrics: MetricsCollector,
}

impl AppState {
    pub fn new(file_store: FileStore) -> Self {
        Self {
            app_name: "FileStore".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            file_store,
            metrics: MetricsCollector::new(),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    create_app_with_config(state, &AppConfig::default())
}

pub fn create_app_with_config(state: AppState, config: &AppConfig) -> Router {
    let mut router = create_routes(&config.storage.route_prefix, state.file_store.max_file_size());

    router = router.layer(middleware::cors::cors_layer_from_config(&config.cors));

    router = router.layer(axum_middleware::from_fn_with_state(
        state.clone(),
        metrics_middleware,
    ));

    router = middleware::logging::with_logging(router);

    router.with_state(state)
}

async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    state.metrics.record_request(request.method().as_str());

    let response = next.run(request).await;

    state.metrics.record_response(response.status().as_u16());

    response
}

pub async fn run_server(app: Router, addr: SocketAddr) -> Result<()> {
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
