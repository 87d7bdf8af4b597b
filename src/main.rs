//! Assistant Files Backend
//!
//! HTTP front-end for the OpenAI Assistants API: accepts chat messages and
//! uploaded files, forwards them to the provider, polls the resulting run
//! until completion, and returns the latest assistant reply.

mod api;
mod config;
mod error;
mod orchestrator;
mod provider;
mod services;
mod state;

use axum::{extract::Request, middleware::Next, response::Response};
use config::Config;
use orchestrator::{AssistantRequestHandler, PollPolicy};
use provider::ProviderClient;
use services::uploads::UploadStore;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Request ID middleware - adds unique ID to each request for tracing
async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    let response = next.run(request).instrument(span).await;

    let duration = start.elapsed();
    info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %response.status().as_u16(),
        duration_ms = duration.as_millis(),
        "Request completed"
    );

    response
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        addr = %config.server_addr(),
        model = %config.provider.model,
        "Configuration loaded"
    );

    // Wire the orchestrator from explicit configuration
    let client = ProviderClient::new(
        reqwest::Client::new(),
        config.provider.base_url.clone(),
        config.provider.api_key.clone(),
    );
    let poll = PollPolicy {
        interval: Duration::from_millis(config.poll.interval_ms),
        max_attempts: config.poll.max_attempts,
        fail_on_terminal: config.poll.fail_on_terminal,
    };
    let handler = AssistantRequestHandler::new(client, config.provider.model.clone(), poll);

    let uploads = UploadStore::new(&config.storage.upload_dir);
    uploads.ensure_dir().await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to create upload directory {}: {}",
            config.storage.upload_dir,
            e
        )
    })?;

    let app_state = Arc::new(AppState { handler, uploads });

    // Static assets: the chat page at / plus everything else in the public dir
    let public_dir = PathBuf::from(&config.storage.public_dir);
    let chat_page = ServeFile::new(public_dir.join("chat.html"));

    let app = api::router(app_state)
        .route_service("/", chat_page)
        .fallback_service(ServeDir::new(&public_dir))
        // Middleware (order matters - request_id should be first)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid server address: {}", e))?;

    info!("Server is running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Handle graceful shutdown signals (Ctrl+C, SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
