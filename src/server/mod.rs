pub mod bootstrap;
mod conn;
mod state;
mod tunnel;

pub use state::ProxyState;

use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{error, info};

/// Accept loop: one spawned task per client connection, each handling
/// exactly one request or tunnel end-to-end, until `shutdown` is notified.
pub async fn run_proxy_server(
    listener: TcpListener,
    state: Arc<ProxyState>,
    shutdown: Arc<Notify>,
) -> Result<()> {
    loop {
        let accepted = tokio::select! {
            result = listener.accept() => result,
            _ = shutdown.notified() => {
                info!("server: stop accepting new connections");
                return Ok(());
            }
        };

        let (stream, peer) = match accepted {
            Ok(v) => v,
            Err(e) => {
                error!("server: accept failed, error={}", e);
                continue;
            }
        };

        let state = state.clone();
        tokio::spawn(async move {
            conn::handle(stream, peer, state).await;
        });
    }
}
