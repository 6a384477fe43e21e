//! Blind bidirectional byte relay for established CONNECT tunnels.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Relay buffer per direction per iteration.
const TUNNEL_BUF: usize = 8 * 1024;

/// Copy bytes between the two sockets until either side closes or a write
/// fails. Both directions are multiplexed on one task; whichever socket
/// becomes readable first is drained into the other side.
pub async fn run<C, O>(client: &mut C, origin: &mut O)
where
    C: AsyncRead + AsyncWrite + Unpin,
    O: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_rd, mut client_wr) = tokio::io::split(client);
    let (mut origin_rd, mut origin_wr) = tokio::io::split(origin);
    let mut from_client = [0u8; TUNNEL_BUF];
    let mut from_origin = [0u8; TUNNEL_BUF];

    loop {
        tokio::select! {
            read = client_rd.read(&mut from_client) => match read {
                Ok(n) if n > 0 => {
                    if origin_wr.write_all(&from_client[..n]).await.is_err() {
                        break;
                    }
                }
                _ => break,
            },
            read = origin_rd.read(&mut from_origin) => match read {
                Ok(n) if n > 0 => {
                    if client_wr.write_all(&from_origin[..n]).await.is_err() {
                        break;
                    }
                }
                _ => break,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn relays_bytes_in_both_directions() {
        let (mut client, mut client_peer) = duplex(1024);
        let (mut origin, mut origin_peer) = duplex(1024);

        let relay = tokio::spawn(async move { run(&mut client_peer, &mut origin_peer).await });

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        origin.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        origin.write_all(b"pong").await.unwrap();
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");

        // Closing the client side ends the loop.
        drop(client);
        relay.await.unwrap();
    }

    #[tokio::test]
    async fn origin_close_ends_the_loop() {
        let (client, mut client_peer) = duplex(1024);
        let (origin, mut origin_peer) = duplex(1024);

        let relay = tokio::spawn(async move { run(&mut client_peer, &mut origin_peer).await });
        drop(origin);
        relay.await.unwrap();
        drop(client);
    }
}
