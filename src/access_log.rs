//! Per-request access log: one serialized line per event, every line
//! prefixed with the request id. Diagnostic logging goes through
//! `tracing`; this sink only carries the canonical per-request records.

use crate::http::date;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;

/// Append-only event sink shared by every connection. The exclusive mutex
/// serializes appends so each event lands as one complete line.
pub struct AccessLog {
    sink: Mutex<Box<dyn Write + Send>>,
}

impl AccessLog {
    /// Open the log file in append mode, creating parent directories as
    /// needed.
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::from_writer(Box::new(file)))
    }

    pub fn stdout() -> Self {
        Self::from_writer(Box::new(io::stdout()))
    }

    pub fn from_writer(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }

    fn write(&self, id: u64, message: &str) {
        if let Ok(mut sink) = self.sink.lock() {
            let _ = writeln!(sink, "{}: {}", id, message);
            let _ = sink.flush();
        }
    }

    pub fn new_request(&self, id: u64, request_line: &str, client_ip: &str) {
        self.write(
            id,
            &format!(
                "\"{}\" from {} @ {}",
                request_line,
                client_ip,
                date::format_http_date(SystemTime::now())
            ),
        );
    }

    pub fn cache_miss(&self, id: u64) {
        self.write(id, "not in cache");
    }

    pub fn cache_valid(&self, id: u64) {
        self.write(id, "in cache, valid");
    }

    pub fn cache_revalidate(&self, id: u64) {
        self.write(id, "in cache, requires validation");
    }

    pub fn cache_expired(&self, id: u64, expired_at: &str) {
        self.write(id, &format!("in cache, but expired at {}", expired_at));
    }

    pub fn requesting(&self, id: u64, request_line: &str, server: &str) {
        self.write(id, &format!("Requesting \"{}\" from {}", request_line, server));
    }

    pub fn received(&self, id: u64, status_line: &str, server: &str) {
        self.write(id, &format!("Received \"{}\" from {}", status_line, server));
    }

    pub fn responding(&self, id: u64, status_line: &str) {
        self.write(id, &format!("Responding \"{}\"", status_line));
    }

    pub fn cached_expires(&self, id: u64, expires_at: &str) {
        self.write(id, &format!("cached, expires at {}", expires_at));
    }

    pub fn cached_revalidate(&self, id: u64) {
        self.write(id, "cached, but requires re-validation");
    }

    pub fn not_cacheable(&self, id: u64, reason: &str) {
        self.write(id, &format!("not cacheable because {}", reason));
    }

    pub fn tunnel_closed(&self, id: u64) {
        self.write(id, "Tunnel closed");
    }

    pub fn note(&self, id: u64, message: &str) {
        self.write(id, &format!("NOTE {}", message));
    }

    pub fn error(&self, id: u64, message: &str) {
        self.write(id, &format!("ERROR {}", message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    #[test]
    fn lines_carry_the_request_id_prefix() {
        let buffer = Buffer::default();
        let log = AccessLog::from_writer(Box::new(buffer.clone()));

        log.cache_miss(7);
        log.requesting(7, "GET http://example.com/a HTTP/1.1", "example.com");
        log.responding(7, "HTTP/1.1 200 OK");
        log.tunnel_closed(8);
        log.note(9, "ETag: \"abc\"");
        log.error(9, "upstream failure: timed out");

        assert_eq!(
            buffer.lines(),
            vec![
                "7: not in cache",
                "7: Requesting \"GET http://example.com/a HTTP/1.1\" from example.com",
                "7: Responding \"HTTP/1.1 200 OK\"",
                "8: Tunnel closed",
                "9: NOTE ETag: \"abc\"",
                "9: ERROR upstream failure: timed out",
            ]
        );
    }

    #[test]
    fn new_request_embeds_line_ip_and_timestamp() {
        let buffer = Buffer::default();
        let log = AccessLog::from_writer(Box::new(buffer.clone()));

        log.new_request(1, "GET / HTTP/1.1", "192.0.2.7");
        let lines = buffer.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("1: \"GET / HTTP/1.1\" from 192.0.2.7 @ "));
        assert!(lines[0].ends_with("GMT"));
    }

    #[test]
    fn open_creates_parent_directories_and_appends() {
        let dir = std::env::temp_dir().join(format!("iris-log-test-{}", std::process::id()));
        let path = dir.join("nested").join("proxy.log");

        let log = AccessLog::open(&path).unwrap();
        log.cache_valid(3);
        drop(log);
        let log = AccessLog::open(&path).unwrap();
        log.cache_miss(4);
        drop(log);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "3: in cache, valid\n4: not in cache\n");
        fs::remove_dir_all(&dir).ok();
    }
}
