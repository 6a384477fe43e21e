//! Origin connections: `host[:port]` splitting and IPv4 dialing.

use crate::error::ProxyError;
use tokio::net::TcpStream;

/// Split `host[:port]` at the last colon, falling back to `default_port`
/// when the port is absent or non-numeric. Bare IPv6 literals are not
/// handled.
pub fn split_host_port(target: &str, default_port: u16) -> (String, u16) {
    match target.rfind(':') {
        Some(at) => {
            let port = target[at + 1..].parse().unwrap_or(default_port);
            (target[..at].to_string(), port)
        }
        None => (target.to_string(), default_port),
    }
}

/// Dial the origin over IPv4, trying each resolved address until one
/// accepts the connection.
pub async fn connect(host: &str, port: u16) -> Result<TcpStream, ProxyError> {
    if host.is_empty() {
        return Err(ProxyError::UpstreamConnect("empty origin host".to_string()));
    }

    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| ProxyError::UpstreamConnect(format!("resolve {}:{}: {}", host, port, e)))?;

    let mut last_error = None;
    for addr in addrs.filter(|a| a.is_ipv4()) {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }

    Err(ProxyError::UpstreamConnect(match last_error {
        Some(e) => format!("connect {}:{}: {}", host, port, e),
        None => format!("no IPv4 address for {}:{}", host, port),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_explicit_port() {
        assert_eq!(split_host_port("example.com:8080", 80), ("example.com".to_string(), 8080));
    }

    #[test]
    fn defaults_when_port_is_absent() {
        assert_eq!(split_host_port("example.com", 80), ("example.com".to_string(), 80));
        assert_eq!(split_host_port("example.com", 443), ("example.com".to_string(), 443));
    }

    #[test]
    fn non_numeric_port_falls_back_to_the_default() {
        assert_eq!(split_host_port("example.com:http", 80), ("example.com".to_string(), 80));
    }

    #[test]
    fn splits_at_the_last_colon() {
        assert_eq!(split_host_port("a:b:443", 80), ("a:b".to_string(), 443));
    }

    #[tokio::test]
    async fn dialing_a_closed_port_is_an_upstream_error() {
        // Bind and immediately drop a listener to find a closed port.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = connect("127.0.0.1", port).await.unwrap_err();
        assert!(matches!(err, ProxyError::UpstreamConnect(_)));
    }
}
