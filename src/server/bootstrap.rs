//! Process lifecycle: tracing init → access log → bind → serve → signal
//! driven shutdown.

use crate::access_log::AccessLog;
use crate::config::ProxyConfig;
use crate::server::{self, ProxyState};
use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub async fn run(config: ProxyConfig) -> Result<()> {
    init_tracing();

    let access_log = match AccessLog::open(&config.log_file) {
        Ok(log) => Arc::new(log),
        Err(e) => {
            tracing::warn!(
                "log: cannot open {}, falling back to stdout, error={}",
                config.log_file.display(),
                e
            );
            Arc::new(AccessLog::stdout())
        }
    };

    // Port 0 binds an ephemeral port; report the resolved address.
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!("server: proxy listening, addr={}", listener.local_addr()?);

    let state = ProxyState::new(config, access_log);
    let shutdown = Arc::new(Notify::new());

    let server_handle = tokio::spawn({
        let state = state.clone();
        let shutdown = shutdown.clone();
        async move { server::run_proxy_server(listener, state, shutdown).await }
    });

    // Block until a signal, then stop accepting. In-flight connections and
    // tunnels are aborted with the runtime; the signal path does not drain.
    wait_for_shutdown().await;
    shutdown.notify_waiters();

    if let Err(e) = server_handle.await {
        tracing::error!("server: proxy task error: {}", e);
    }

    tracing::info!("server: shutdown complete");
    Ok(())
}

fn init_tracing() {
    let (non_blocking, guard) = tracing_appender::non_blocking::NonBlockingBuilder::default()
        .lossy(true)
        .finish(std::io::stdout());

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false),
        )
        .init();

    std::mem::forget(guard);
}

async fn wait_for_shutdown() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("server: received SIGINT, shutting down"),
        _ = terminate => tracing::info!("server: received SIGTERM, shutting down"),
    }
}
