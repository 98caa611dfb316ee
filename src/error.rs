use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Errors that can occur in the party playback system
#[derive(Debug, Error)]
pub enum PartyBoxError {
    // ===== Startup Errors =====
    /// The control server could not bind its listening socket
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// The address that could not be bound
        address: SocketAddr,
        /// The underlying socket error
        #[source]
        source: io::Error,
    },

    // ===== Connection Errors =====
    /// A client connection was closed or failed
    #[error("client disconnected: {address}")]
    ClientDisconnected {
        /// The remote address of the client
        address: SocketAddr,
    },

    /// Connecting to a control server failed
    #[error("connection failed to {address}: {message}")]
    ConnectionFailed {
        /// The server address
        address: SocketAddr,
        /// Description of the failure
        message: String,
        /// The underlying source of the error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // ===== Protocol Errors =====
    /// Discovery or control payload could not be decoded
    #[error("decode error: {message}")]
    Decode {
        /// Description of the error
        message: String,
    },

    /// Payload could not be encoded
    #[error("encode error: {message}")]
    Encode {
        /// Description of the error
        message: String,
    },

    // ===== Playback Errors =====
    /// The playback engine reported a failure
    #[error("engine error: {message}")]
    Engine {
        /// Description of the failure
        message: String,
    },

    /// Seek position out of range
    #[error("seek position {percent} out of range (0-100)")]
    SeekOutOfRange {
        /// The requested position in percent
        percent: f32,
    },

    // ===== I/O Errors =====
    /// Network I/O error
    #[error("network error: {0}")]
    NetworkError(#[from] io::Error),

    /// Operation timed out
    #[error("operation timed out")]
    Timeout,

    // ===== State Errors =====
    /// Operation not valid in current state
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of why the state is invalid
        message: String,
        /// The current state
        current_state: String,
    },

    /// Component has been shut down or was never started
    #[error("not running: {component}")]
    NotRunning {
        /// The component that is not running
        component: &'static str,
    },

    /// Invalid parameter provided
    #[error("invalid parameter: {name} - {message}")]
    InvalidParameter {
        /// The name of the parameter
        name: String,
        /// Description of the error
        message: String,
    },
}

impl PartyBoxError {
    /// Check if this error is recoverable by retrying
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::NetworkError(_) | Self::ClientDisconnected { .. }
        )
    }

    /// Check if this error must stop the process rather than be retried
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Bind { .. })
    }

    /// Check if this error indicates connection loss
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            Self::ClientDisconnected { .. } | Self::ConnectionFailed { .. }
        )
    }
}

impl From<serde_json::Error> for PartyBoxError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Self::NetworkError(e.into())
        } else {
            Self::Decode {
                message: e.to_string(),
            }
        }
    }
}

/// Result type alias for party playback operations
pub type Result<T> = std::result::Result<T, PartyBoxError>;
