use std::fmt;

#[derive(Debug)]
pub enum ProxyError {
    /// A byte blob could not be parsed as an HTTP message.
    Malformed(String),
    /// A stream violated the framing rules: size cap exceeded, peer closed
    /// early, or a declared length was not delivered.
    Framing(String),
    /// The origin could not be resolved or dialed.
    UpstreamConnect(String),
    /// Socket-level failure while talking to a peer.
    Io(std::io::Error),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::Malformed(msg) => write!(f, "malformed message: {}", msg),
            ProxyError::Framing(msg) => write!(f, "framing error: {}", msg),
            ProxyError::UpstreamConnect(msg) => write!(f, "upstream connect error: {}", msg),
            ProxyError::Io(e) => write!(f, "i/o error: {}", e),
        }
    }
}

impl std::error::Error for ProxyError {}

impl From<std::io::Error> for ProxyError {
    fn from(e: std::io::Error) -> Self {
        ProxyError::Io(e)
    }
}
