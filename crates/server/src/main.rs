//! Pincer registry daemon.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Serialized};
use pincer_core::config::AppConfig;
use pincer_mapping::MappingStore;
use pincer_remote::{PinningBackend, RpcBackend};
use pincer_server::sessions::spawn_eviction_task;
use pincer_server::{AppState, create_router};
use pincer_storage::LocalStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pincer - an OCI registry backed by content-addressed remote pinning.
#[derive(Parser, Debug)]
#[command(name = "pincerd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Bind address override (host:port).
    #[arg(short, long, env = "PINCER_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("pincer v{}", env!("CARGO_PKG_VERSION"));

    // Defaults merged with PINCER_-prefixed environment variables,
    // e.g. PINCER_SERVER__PORT=5002, PINCER_MAPPING__FILE=/data/mapping.json.
    let mut config: AppConfig = Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Env::prefixed("PINCER_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    if let Some(bind) = args.bind {
        let addr: SocketAddr = bind.parse().context("invalid --bind address")?;
        config.server.host = addr.ip().to_string();
        config.server.port = addr.port();
    }

    let local = Arc::new(
        LocalStore::new(&config.storage.dir)
            .await
            .context("failed to create storage directories")?,
    );
    tracing::info!(dir = %config.storage.dir.display(), "local store ready");

    let mapping = Arc::new(
        MappingStore::load(&config.mapping.file, config.mapping.strict)
            .await
            .context("failed to load mapping index")?,
    );
    tracing::info!(file = %config.mapping.file.display(), "mapping index loaded");

    let backend: Arc<dyn PinningBackend> = Arc::new(
        RpcBackend::new(&config.remote).context("failed to initialize pinning backend client")?,
    );

    let idle_timeout = config.server.session_idle_timeout();
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid bind address")?;

    let state = AppState::new(config, local, mapping, backend);
    spawn_eviction_task(state.sessions.clone(), idle_timeout);

    let app = create_router(state.clone());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // In-flight pins are lost here; pushes are idempotent and clients re-push.
    state.services.shutdown().await;
    tracing::info!("shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to install SIGINT handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => tracing::error!(%error, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
