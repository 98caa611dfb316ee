//! Control server events

use std::net::SocketAddr;

/// Events emitted by the control server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Server is accepting connections
    Started {
        /// Bound address
        address: SocketAddr,
    },

    /// Server stopped accepting connections
    Stopped,

    /// A client connected and was registered
    ClientJoined {
        /// Client address
        address: SocketAddr,
    },

    /// A client was removed from the registry
    ClientLeft {
        /// Client address
        address: SocketAddr,
        /// Disconnect reason
        reason: String,
    },
}
