/// Error hierarchy for the relay.
/// Classifies errors as fatal (terminate the process) or local to one subscriber.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    // Local: tears down a single subscriber
    #[error("connection error: {0}")]
    Connection(String),
    #[error("protocol error: {0}")]
    Protocol(String),

    // Fatal at startup
    #[error("registration failed: {0}")]
    Registration(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("credential store error: {0}")]
    Store(String),
}

impl RelayError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Registration(_) | Self::Config(_) | Self::Store(_)
        )
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Protocol(_) => "protocol",
            Self::Registration(_) => "registration",
            Self::Config(_) => "config",
            Self::Store(_) => "store",
        }
    }
}

/// Failures reported by the device registrar or the push listener.
#[derive(Clone, Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("failed to start {program}: {reason}")]
    Spawn { program: String, reason: String },
    #[error("{program} exited with {status}: {stderr}")]
    Exited {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("invalid output: {0}")]
    InvalidOutput(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("rejected by push service: {0}")]
    Rejected(String),
}

impl From<UpstreamError> for RelayError {
    fn from(e: UpstreamError) -> Self {
        RelayError::Registration(e.to_string())
    }
}

impl From<std::io::Error> for UpstreamError {
    fn from(e: std::io::Error) -> Self {
        UpstreamError::Io(e.to_string())
    }
}
