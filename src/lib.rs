pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod reorder;
pub mod routes;
pub mod state;
pub mod store;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use config::Args;
use identity::HeaderIdentityProvider;
use rate_limit::RateLimiter;
use state::AppState;
use store::MemoryPageStore;

pub async fn run(args: Args) -> std::io::Result<()> {
    let rate_limiter = RateLimiter::in_memory(args.rate_limit_policy());
    let state = AppState::new(
        Arc::new(MemoryPageStore::new()),
        rate_limiter.clone(),
        Arc::new(HeaderIdentityProvider::new(args.user_header.clone())),
        args.secure_cookies,
    );

    let shutdown = CancellationToken::new();
    let sweeper = rate_limiter.spawn_sweeper(args.sweep_interval(), shutdown.clone());

    let app = routes::router(state);
    let addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Linkhub running on http://localhost:{}", args.port);
    info!(
        "General API rate limit: {} requests per {} seconds",
        args.rate_limit, args.rate_window
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    let _ = sweeper.await;
    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = shutdown.cancelled() => {},
    }
    info!("Shutdown signal received");
}
