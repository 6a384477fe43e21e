//! Per-connection driver: frame exactly one request off the client
//! socket, dispatch it by method, write the reply, and close.

use crate::framing;
use crate::http::Request;
use crate::proxy;
use crate::server::{tunnel, ProxyState};
use crate::upstream;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Default origin port for CONNECT targets without an explicit port.
const CONNECT_PORT: u16 = 443;

pub async fn handle(mut client: TcpStream, peer: SocketAddr, state: Arc<ProxyState>) {
    let id = state.next_request_id();
    let log = state.access_log.clone();

    let req = match framing::read_request(&mut client).await {
        Ok(req) => req,
        Err(e) => {
            tracing::debug!("conn: rejecting request, peer={}, error={}", peer, e);
            let _ = client.write_all(proxy::BAD_REQUEST).await;
            log.responding(id, proxy::BAD_REQUEST_LINE);
            return;
        }
    };

    log.new_request(id, &req.request_line(), &peer.ip().to_string());

    match req.method.as_str() {
        "GET" => {
            let reply = state.engine().handle_get(&req, id).await;
            let _ = client.write_all(&reply).await;
        }
        "POST" => {
            let reply = state.engine().handle_post(&req, id).await;
            let _ = client.write_all(&reply).await;
        }
        "CONNECT" => connect_flow(client, &req, id, &state).await,
        _ => {
            let _ = client.write_all(proxy::NOT_IMPLEMENTED).await;
            log.responding(id, proxy::NOT_IMPLEMENTED_LINE);
        }
    }
}

/// CONNECT: acknowledge the client, dial the origin, then hand both
/// sockets to the tunnel loop until either side closes.
async fn connect_flow(mut client: TcpStream, req: &Request, id: u64, state: &Arc<ProxyState>) {
    let log = &state.access_log;

    if client.write_all(&proxy::connect_established()).await.is_err() {
        return;
    }
    log.responding(id, proxy::CONNECT_ESTABLISHED_LINE);

    let (host, port) = upstream::split_host_port(&req.target, CONNECT_PORT);
    let mut origin = match upstream::connect(&host, port).await {
        Ok(origin) => origin,
        Err(e) => {
            log.error(id, &format!("tunnel dial failed: {}", e));
            let _ = client.write_all(proxy::BAD_GATEWAY).await;
            log.responding(id, proxy::BAD_GATEWAY_LINE);
            return;
        }
    };

    tunnel::run(&mut client, &mut origin).await;
    log.tunnel_closed(id);
}
