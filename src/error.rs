use std::fmt;

/// Errors that can occur while relaying a conversation
#[derive(Debug, Clone)]
pub enum RelayError {
    /// Uploaded artifact could not be parsed
    ContextRead(String),

    /// Endpoint answered with a non-success status
    HttpStatus { status: u16, body: String },

    /// Exchange exceeded the configured deadline
    Timeout,

    /// Transport-level failure before a response arrived
    Connection(String),

    /// Transport broke in the middle of a streamed response
    Stream(String),

    /// Renderer subprocess failed or produced no output
    Render(String),

    /// Raster bytes could not be decoded into an image
    Decode(String),

    /// Required configuration is missing or invalid
    Config(String),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::ContextRead(msg) => write!(f, "could not read uploaded context: {}", msg),
            RelayError::HttpStatus { status, body } => {
                write!(f, "endpoint returned status {}: {}", status, body)
            }
            RelayError::Timeout => write!(f, "request timed out"),
            RelayError::Connection(msg) => write!(f, "connection failed: {}", msg),
            RelayError::Stream(msg) => write!(f, "stream failed: {}", msg),
            RelayError::Render(msg) => write!(f, "diagram render failed: {}", msg),
            RelayError::Decode(msg) => write!(f, "image decode failed: {}", msg),
            RelayError::Config(msg) => write!(f, "configuration error: {}", msg),
        }
    }
}

impl std::error::Error for RelayError {}
