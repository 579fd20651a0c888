//! sf-server: HTTP front end of the streaming server.
//!
//! This crate ties the other sf-* crates into a running server:
//!
//! - Axum routes for DASH manifests, segments and subtitle tracks
//! - Session listing and teardown, plus the idle-session cleanup task
//! - Series metadata registration backed by TMDB
//! - Graceful shutdown via signal handling, destroying every session

pub mod context;
pub mod error;
pub mod file_id;
pub mod middleware;
pub mod router;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use sf_av::{FfprobeProber, ToolRegistry};
use sf_core::config::Config;
use sf_metadata::{MetadataAgent, NullAgent, TmdbAgent};
use sf_probe::Prober;
use sf_stream::start_cleanup_task;
use tokio_util::sync::CancellationToken;

use crate::context::AppContext;

pub use file_id::{decode_file_id, encode_file_id};

/// Start the streaming server.
///
/// Discovers ffmpeg and ffprobe, builds the [`AppContext`] and serves until
/// a shutdown signal is received.
pub async fn start(config: Config) -> sf_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let tools = ToolRegistry::discover(&config.tools);
    for info in tools.check_all() {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::warn!("Tool not found: {}", info.name);
        }
    }
    let ffmpeg = tools.require("ffmpeg")?.to_path_buf();
    let ffprobe = tools.require("ffprobe")?.to_path_buf();

    let prober: Arc<dyn Prober> = Arc::new(FfprobeProber::new(ffprobe));
    let agent: Arc<dyn MetadataAgent> = match TmdbAgent::from_config(&config.metadata) {
        Some(tmdb) => Arc::new(tmdb),
        None => Arc::new(NullAgent),
    };
    tracing::info!(prober = prober.name(), "Prober ready");
    tracing::info!(agent = agent.name(), "Metadata agent ready");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| sf_core::Error::Internal(format!("Invalid server address: {e}")))?;

    let ctx = AppContext::new(config, prober, agent, ffmpeg);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| sf_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;
    tracing::info!("Starting server on {addr}");

    let cancel = CancellationToken::new();
    serve(listener, ctx, cancel).await
}

/// Serve `ctx` on `listener` until a shutdown signal arrives or `cancel`
/// is triggered, then destroy every session.
pub async fn serve(
    listener: tokio::net::TcpListener,
    ctx: AppContext,
    cancel: CancellationToken,
) -> sf_core::Result<()> {
    let cleanup_handle = start_cleanup_task(ctx.sessions.clone(), ctx.cleanup_interval());
    let app = router::build_router(ctx.clone());

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await;

    cleanup_handle.abort();
    let destroyed = ctx.sessions.shutdown().await;
    tracing::info!(destroyed, "Server shutdown complete");

    result.map_err(|e| sf_core::Error::Io { source: e })
}

/// Wait for a shutdown signal (SIGINT or SIGTERM) or cancellation.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
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
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
        _ = cancel.cancelled() => tracing::info!("Shutdown requested"),
    }
}
