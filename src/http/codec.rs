//! Wire codec: parse and serialize HTTP/1.1 messages on complete byte
//! blobs. Determining where a message ends on a live socket is the framing
//! layer's job; everything here assumes the blob is already complete.

use super::{Headers, Request, Response};
use crate::error::ProxyError;
use bytes::{BufMut, Bytes, BytesMut};

/// Parse one request blob: start line, header lines, blank line, optional
/// `Content-Length`-framed body. Trailing bytes beyond the declared body
/// are ignored.
pub fn parse_request(blob: &[u8]) -> Result<Request, ProxyError> {
    let (head, rest) = split_head(blob)?;
    let mut lines = head.split("\r\n");

    let start = lines.next().unwrap_or("");
    let tokens: Vec<&str> = start.split_whitespace().collect();
    if tokens.len() != 3 {
        return Err(ProxyError::Malformed(format!("invalid request line {:?}", start)));
    }
    let (method, target, version) = (tokens[0], tokens[1], tokens[2]);

    let headers = parse_header_lines(lines)?;
    let body = content_length_body(&headers, rest)?;

    Ok(Request {
        method: method.to_string(),
        target: target.to_string(),
        version: version.to_string(),
        headers,
        body,
    })
}

/// Parse one response blob. Body framing priority: chunked
/// `Transfer-Encoding` (decoded here), then `Content-Length`, then empty —
/// a close-delimited body is not recovered at this level.
pub fn parse_response(blob: &[u8]) -> Result<Response, ProxyError> {
    let (head, rest) = split_head(blob)?;
    let mut lines = head.split("\r\n");

    let start = lines.next().unwrap_or("");
    let mut parts = start.splitn(3, ' ');
    let version = match parts.next() {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => return Err(ProxyError::Malformed(format!("invalid status line {:?}", start))),
    };
    let status: u16 = parts
        .next()
        .and_then(|c| c.parse().ok())
        .ok_or_else(|| ProxyError::Malformed(format!("invalid status line {:?}", start)))?;
    // The status message is everything after the code, spaces included.
    let reason = parts.next().unwrap_or("").trim_start_matches(' ').to_string();

    let headers = parse_header_lines(lines)?;

    let body = if is_chunked(&headers) {
        decode_chunked(rest)?
    } else {
        content_length_body(&headers, rest)?
    };

    Ok(Response {
        version,
        status,
        reason,
        headers,
        body,
    })
}

/// Decode a chunked body: `hex-size CRLF data CRLF` repeated, terminated by
/// a zero-size chunk. Trailers after the zero chunk are discarded.
pub fn decode_chunked(data: &[u8]) -> Result<Bytes, ProxyError> {
    let mut out = BytesMut::new();
    let mut at = 0;

    loop {
        let line_end = find(data, b"\r\n", at)
            .ok_or_else(|| ProxyError::Malformed("chunk size line missing CRLF".to_string()))?;
        let line = std::str::from_utf8(&data[at..line_end])
            .map_err(|_| ProxyError::Malformed("chunk size line is not valid UTF-8".to_string()))?;

        // Hex digits only; a chunk extension after `;` is ignored.
        let digits_end = line
            .find(|c: char| !c.is_ascii_hexdigit())
            .unwrap_or(line.len());
        let size = usize::from_str_radix(&line[..digits_end], 16)
            .map_err(|_| ProxyError::Malformed(format!("invalid chunk size {:?}", line)))?;
        at = line_end + 2;

        if size == 0 {
            return Ok(out.freeze());
        }
        if data.len().saturating_sub(at) < size {
            return Err(ProxyError::Malformed("chunk data shorter than declared size".to_string()));
        }
        out.extend_from_slice(&data[at..at + size]);
        at += size;

        if data.len() < at + 2 || &data[at..at + 2] != b"\r\n" {
            return Err(ProxyError::Malformed("missing CRLF after chunk data".to_string()));
        }
        at += 2;
    }
}

/// Serialize a request for the origin: start line, headers, an optional
/// extra-header block (complete CRLF-terminated lines, used to inject
/// `If-None-Match`), blank line, body verbatim.
pub fn serialize_request(req: &Request, extra_headers: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(256 + req.body.len());
    buf.put_slice(req.request_line().as_bytes());
    buf.put_slice(b"\r\n");
    for (name, value) in &req.headers {
        put_header(&mut buf, name, value);
    }
    buf.put_slice(extra_headers.as_bytes());
    buf.put_slice(b"\r\n");
    buf.put_slice(&req.body);
    buf.freeze()
}

/// Serialize a response for the client. A response still marked chunked
/// has that header stripped and `Content-Length` set to the decoded body
/// length; everything else is emitted verbatim. Binary-safe.
pub fn serialize_response(resp: &Response) -> Bytes {
    let mut headers = resp.headers.clone();
    if resp.is_chunked() {
        headers.remove("Transfer-Encoding");
        headers.insert("Content-Length".to_string(), resp.body.len().to_string());
    }

    let mut buf = BytesMut::with_capacity(256 + resp.body.len());
    buf.put_slice(resp.status_line().as_bytes());
    buf.put_slice(b"\r\n");
    for (name, value) in &headers {
        put_header(&mut buf, name, value);
    }
    buf.put_slice(b"\r\n");
    buf.put_slice(&resp.body);
    buf.freeze()
}

fn put_header(buf: &mut BytesMut, name: &str, value: &str) {
    buf.put_slice(name.as_bytes());
    buf.put_slice(b": ");
    buf.put_slice(value.as_bytes());
    buf.put_slice(b"\r\n");
}

/// Split a blob at the first blank line into (header block, body bytes).
fn split_head(blob: &[u8]) -> Result<(&str, &[u8]), ProxyError> {
    let at = find(blob, b"\r\n\r\n", 0)
        .ok_or_else(|| ProxyError::Malformed("message has no header terminator".to_string()))?;
    let head = std::str::from_utf8(&blob[..at])
        .map_err(|_| ProxyError::Malformed("header block is not valid UTF-8".to_string()))?;
    Ok((head, &blob[at + 4..]))
}

fn parse_header_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Result<Headers, ProxyError> {
    let mut headers = Headers::new();
    for line in lines {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ProxyError::Malformed(format!("header line without colon {:?}", line)))?;
        // A single leading space on the value is trimmed.
        let value = value.strip_prefix(' ').unwrap_or(value);
        headers.insert(name.to_string(), value.to_string());
    }
    Ok(headers)
}

fn is_chunked(headers: &Headers) -> bool {
    headers
        .get("Transfer-Encoding")
        .map(|v| v.trim().eq_ignore_ascii_case("chunked"))
        .unwrap_or(false)
}

fn content_length_body(headers: &Headers, rest: &[u8]) -> Result<Bytes, ProxyError> {
    let Some(raw) = headers.get("Content-Length") else {
        return Ok(Bytes::new());
    };
    let len: usize = raw
        .trim()
        .parse()
        .map_err(|_| ProxyError::Malformed(format!("invalid Content-Length {:?}", raw)))?;
    if rest.len() < len {
        return Err(ProxyError::Malformed("body shorter than Content-Length".to_string()));
    }
    Ok(Bytes::copy_from_slice(&rest[..len]))
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

#[cfg(test)]
mod tests {
    use super::*;

    fn req(blob: &[u8]) -> Request {
        parse_request(blob).unwrap()
    }

    fn resp(blob: &[u8]) -> Response {
        parse_response(blob).unwrap()
    }

    #[test]
    fn parses_request_without_body() {
        let r = req(b"GET http://example.com/a HTTP/1.1\r\nHost: example.com\r\n\r\n");
        assert_eq!(r.method, "GET");
        assert_eq!(r.target, "http://example.com/a");
        assert_eq!(r.version, "HTTP/1.1");
        assert_eq!(r.header("Host"), Some("example.com"));
        assert!(r.body.is_empty());
    }

    #[test]
    fn parses_request_with_content_length_body() {
        let r = req(b"POST /login HTTP/1.1\r\nHost: x\r\nContent-Length: 4\r\n\r\ndata");
        assert_eq!(&r.body[..], b"data");
    }

    #[test]
    fn zero_content_length_parses_to_empty_body() {
        let r = req(b"POST / HTTP/1.1\r\nContent-Length: 0\r\n\r\n");
        assert!(r.body.is_empty());
    }

    #[test]
    fn duplicate_headers_keep_the_last_value() {
        let r = req(b"GET / HTTP/1.1\r\nX-A: one\r\nX-A: two\r\n\r\n");
        assert_eq!(r.header("X-A"), Some("two"));
    }

    #[test]
    fn rejects_request_line_without_three_tokens() {
        assert!(parse_request(b"GARBAGE\r\n\r\n").is_err());
        assert!(parse_request(b"GET /\r\n\r\n").is_err());
    }

    #[test]
    fn rejects_header_line_without_colon() {
        assert!(parse_request(b"GET / HTTP/1.1\r\nbroken header\r\n\r\n").is_err());
    }

    #[test]
    fn rejects_short_body() {
        assert!(parse_request(b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nhi").is_err());
    }

    #[test]
    fn rejects_non_numeric_content_length() {
        assert!(parse_request(b"POST / HTTP/1.1\r\nContent-Length: ten\r\n\r\n").is_err());
        assert!(parse_request(b"POST / HTTP/1.1\r\nContent-Length: -1\r\n\r\n").is_err());
    }

    #[test]
    fn parses_response_reason_with_spaces() {
        let r = resp(b"HTTP/1.1 404 Not Found\r\n\r\n");
        assert_eq!(r.status, 404);
        assert_eq!(r.reason, "Not Found");
        assert!(r.body.is_empty());
    }

    #[test]
    fn response_without_framing_headers_has_empty_body() {
        let r = resp(b"HTTP/1.1 200 OK\r\n\r\nclose-delimited remainder");
        assert!(r.body.is_empty());
    }

    #[test]
    fn decodes_chunked_response_body() {
        let r = resp(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n");
        assert_eq!(&r.body[..], b"hello world");
        // The header survives the parse; the serializer converts it.
        assert!(r.is_chunked());
    }

    #[test]
    fn chunked_matches_case_insensitively() {
        let r = resp(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: Chunked\r\n\r\n2\r\nok\r\n0\r\n\r\n");
        assert_eq!(&r.body[..], b"ok");
    }

    #[test]
    fn decode_chunked_round_trips_arbitrary_partitions() {
        let body = b"the quick brown fox jumps over the lazy dog";
        for sizes in [vec![43], vec![1, 42], vec![10, 10, 10, 13], vec![21, 22]] {
            let mut encoded = Vec::new();
            let mut at = 0;
            for size in sizes {
                encoded.extend_from_slice(format!("{:x}\r\n", size).as_bytes());
                encoded.extend_from_slice(&body[at..at + size]);
                encoded.extend_from_slice(b"\r\n");
                at += size;
            }
            encoded.extend_from_slice(b"0\r\n\r\n");
            assert_eq!(&decode_chunked(&encoded).unwrap()[..], body);
        }
    }

    #[test]
    fn decode_chunked_rejects_size_mismatch() {
        // Declares 0xa bytes but delivers five.
        assert!(decode_chunked(b"a\r\nshort\r\n").is_err());
    }

    #[test]
    fn decode_chunked_rejects_missing_crlf_after_data() {
        assert!(decode_chunked(b"5\r\nhelloXX0\r\n\r\n").is_err());
    }

    #[test]
    fn decode_chunked_discards_trailers() {
        let decoded = decode_chunked(b"2\r\nhi\r\n0\r\nX-Trailer: ignored\r\n\r\n").unwrap();
        assert_eq!(&decoded[..], b"hi");
    }

    #[test]
    fn serialize_request_round_trips() {
        let original = req(b"POST /submit HTTP/1.1\r\nContent-Length: 5\r\nHost: example.com\r\n\r\nhello");
        let reparsed = req(&serialize_request(&original, ""));
        assert_eq!(reparsed, original);
    }

    #[test]
    fn serialize_request_injects_extra_header_block() {
        let original = req(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n");
        let wire = serialize_request(&original, "If-None-Match: W/\"abc\"\r\n");
        let reparsed = req(&wire);
        assert_eq!(reparsed.header("If-None-Match"), Some("W/\"abc\""));
    }

    #[test]
    fn serialize_response_round_trips_identity_body() {
        let original = resp(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nContent-Type: text/plain\r\n\r\nhello");
        let reparsed = resp(&serialize_response(&original));
        assert_eq!(reparsed, original);
    }

    #[test]
    fn serialize_response_converts_chunked_to_content_length() {
        let original = resp(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n");
        let reparsed = resp(&serialize_response(&original));
        assert_eq!(reparsed.header("Transfer-Encoding"), None);
        assert_eq!(reparsed.header("Content-Length"), Some("5"));
        assert_eq!(&reparsed.body[..], b"hello");
    }

    #[test]
    fn serialize_response_is_binary_safe() {
        let body: Vec<u8> = (0..=255u8).collect();
        let mut blob = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", body.len()).into_bytes();
        blob.extend_from_slice(&body);
        let r = resp(&blob);
        assert_eq!(&r.body[..], &body[..]);
        let reparsed = resp(&serialize_response(&r));
        assert_eq!(&reparsed.body[..], &body[..]);
    }
}
