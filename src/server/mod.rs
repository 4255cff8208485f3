use crate::config::Config;
use crate::library::Library;
use crate::lock::ReadLockManager;
use crate::streaming::{self, StreamManager};
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use streamforge_av::tools::get_tool_path;
use streamforge_av::{FFMpeg, FfprobeProber};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// Catalogued source files
    pub library: Arc<Library>,
    /// Running streams and their transcodes
    pub streams: Arc<StreamManager>,
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::RANGE]);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/sources", get(list_sources))
        .route("/api/streams", get(list_streams))
        .nest("/api/stream", streaming::stream_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn list_sources(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(ctx.library.entries())
}

async fn list_streams(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(ctx.streams.status())
}

/// Wire up the library and stream manager described by `config`.
pub fn build_context(config: Config) -> Result<AppContext> {
    let ffmpeg = FFMpeg::locate(config.transcode.ffmpeg_path.as_deref())
        .context("ffmpeg is required for streaming")?;
    let ffprobe = get_tool_path("ffprobe", config.transcode.ffprobe_path.as_deref())
        .context("ffprobe is required for streaming")?;

    tracing::info!(ffmpeg = %ffmpeg.path().display(), ffprobe = %ffprobe.display(), "Using tools");

    let library = Library::new(
        config.library.paths.clone(),
        Arc::new(FfprobeProber::new(ffprobe)),
    );
    let found = library.scan();
    tracing::info!("Catalogued {} source files", found);

    let streams = StreamManager::new(
        config.library.cache_dir.clone(),
        ffmpeg,
        Arc::new(config.transcode.clone()),
        ReadLockManager::new(),
        config.streaming.tuning(),
    );

    Ok(AppContext {
        config: Arc::new(config),
        library: Arc::new(library),
        streams: Arc::new(streams),
    })
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let ctx = build_context(config)?;
    start_server_with_options(ctx).await
}

/// Serve an already wired context until a shutdown signal arrives
pub async fn start_server_with_options(ctx: AppContext) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", ctx.config.server.host, ctx.config.server.port)
        .parse()
        .context("Invalid server address")?;

    std::fs::create_dir_all(&ctx.config.library.cache_dir).with_context(|| {
        format!(
            "Failed to create cache directory: {:?}",
            ctx.config.library.cache_dir
        )
    })?;

    let streams = Arc::clone(&ctx.streams);
    streams.start();

    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    // Streams shut down before the server drains, so waiting segment
    // requests are answered instead of holding the shutdown up.
    let stopping = Arc::clone(&streams);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            stopping.shutdown().await;
        })
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
