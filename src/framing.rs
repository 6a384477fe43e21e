//! Stream framing: read exactly one complete HTTP message off a stream
//! socket, using Content-Length, chunked encoding, or peer close to find
//! the message boundary. The accumulated blob is handed to the wire codec.

use crate::error::ProxyError;
use crate::http::codec;
use crate::http::{Request, Response};
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Cap on the header block of a single message.
pub const MAX_HEADER_BYTES: usize = 1024 * 1024;
/// Cap on a response body, whatever its framing.
pub const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;
/// Initial read buffer capacity.
const READ_CHUNK: usize = 64 * 1024;

/// Read one request: header block up to the blank line, then exactly the
/// declared `Content-Length` body bytes.
pub async fn read_request<S>(stream: &mut S) -> Result<Request, ProxyError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    let header_end = read_header_block(stream, &mut buf).await?;

    let body_len = content_length_of(&buf[..header_end])?.unwrap_or(0);
    let total = header_end
        .checked_add(body_len)
        .ok_or_else(|| ProxyError::Framing("declared Content-Length overflows".to_string()))?;
    while buf.len() < total {
        if stream.read_buf(&mut buf).await? == 0 {
            return Err(ProxyError::Framing("peer closed before request body was complete".to_string()));
        }
    }

    codec::parse_request(&buf[..total])
}

/// Read one response. Framing priority: chunked terminator, then
/// `Content-Length`, then read-until-close; bodies are capped at 50 MiB.
pub async fn read_response<S>(stream: &mut S) -> Result<Response, ProxyError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    let header_end = read_header_block(stream, &mut buf).await?;

    if is_chunked_head(&buf[..header_end])? {
        // The terminator spans the CRLF before the zero chunk, so the
        // search starts two bytes inside the header block.
        let from = header_end.saturating_sub(2);
        while find(&buf, b"\r\n0\r\n\r\n", from).is_none() {
            if buf.len() - header_end > MAX_BODY_BYTES {
                return Err(ProxyError::Framing("chunked response body exceeds 50 MiB cap".to_string()));
            }
            if stream.read_buf(&mut buf).await? == 0 {
                return Err(ProxyError::Framing("peer closed before the final chunk".to_string()));
            }
        }
    } else if let Some(body_len) = content_length_of(&buf[..header_end])? {
        if body_len > MAX_BODY_BYTES {
            return Err(ProxyError::Framing("response body exceeds 50 MiB cap".to_string()));
        }
        let total = header_end + body_len;
        while buf.len() < total {
            if stream.read_buf(&mut buf).await? == 0 {
                return Err(ProxyError::Framing("peer closed before response body was complete".to_string()));
            }
        }
    } else {
        // No framing headers: the body extends until the peer closes.
        loop {
            if buf.len() - header_end > MAX_BODY_BYTES {
                return Err(ProxyError::Framing("response body exceeds 50 MiB cap".to_string()));
            }
            if stream.read_buf(&mut buf).await? == 0 {
                break;
            }
        }
    }

    codec::parse_response(&buf)
}

/// Accumulate reads until the blank line terminating the header block
/// appears. Returns the offset just past it.
async fn read_header_block<S>(stream: &mut S, buf: &mut BytesMut) -> Result<usize, ProxyError>
where
    S: AsyncRead + Unpin,
{
    loop {
        if let Some(at) = find(buf, b"\r\n\r\n", 0) {
            return Ok(at + 4);
        }
        if buf.len() > MAX_HEADER_BYTES {
            return Err(ProxyError::Framing("header block exceeds 1 MiB cap".to_string()));
        }
        if stream.read_buf(buf).await? == 0 {
            return Err(ProxyError::Framing("peer closed before a complete header block".to_string()));
        }
    }
}

/// `Content-Length` of a raw header block, before the full message is
/// available for the codec.
fn content_length_of(head: &[u8]) -> Result<Option<usize>, ProxyError> {
    for line in header_lines(head)? {
        if let Some((name, value)) = line.split_once(':') {
            if name == "Content-Length" {
                let len = value.trim().parse().map_err(|_| {
                    ProxyError::Malformed(format!("invalid Content-Length {:?}", value.trim()))
                })?;
                return Ok(Some(len));
            }
        }
    }
    Ok(None)
}

fn is_chunked_head(head: &[u8]) -> Result<bool, ProxyError> {
    for line in header_lines(head)? {
        if let Some((name, value)) = line.split_once(':') {
            if name == "Transfer-Encoding" && value.trim().eq_ignore_ascii_case("chunked") {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn header_lines<'a>(head: &'a [u8]) -> Result<impl Iterator<Item = &'a str> + 'a, ProxyError> {
    let head = std::str::from_utf8(head)
        .map_err(|_| ProxyError::Malformed("header block is not valid UTF-8".to_string()))?;
    Ok(head.split("\r\n").skip(1))
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if haystack.len() < from + needle.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}
