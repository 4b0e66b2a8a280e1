use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

mod config;
mod rate_limiter;
mod routes;
mod store;
mod verifier;

use config::Config;
use rate_limiter::RateLimiter;
use routes::AppState;
use store::Store;
use verifier::{RemoteVerifier, Verifier};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("idgated starting");

    let config = Config::from_env();
    if config.verifier_url.is_empty() {
        tracing::warn!("IDGATE_VERIFIER_URL is unset; submissions will fail with 502");
    }

    let store = Store::open(&config.db_path)
        .await
        .with_context(|| format!("opening database at {}", config.db_path.display()))?;
    let verifier = Verifier::Remote(RemoteVerifier::new(&config)?);

    let addr: std::net::SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen address {}", config.listen_addr))?;

    let state = Arc::new(AppState {
        config,
        store,
        verifier,
        rate_limiter: tokio::sync::Mutex::new(RateLimiter::new()),
    });
    let app = routes::build_router(state);

    tracing::info!(%addr, "idgated ready");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("idgated shutting down");
        })
        .await?;

    Ok(())
}
