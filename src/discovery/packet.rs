//! Presence announcement datagram

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::PartyBoxError;

/// Marker in the `type` field of a discovery datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacketKind {
    /// Server presence
    Announce,
}

/// Identity of a server instance, fixed for its lifetime
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerIdentity(String);

impl ServerIdentity {
    /// Create a new random identity
    #[must_use]
    pub fn new() -> Self {
        let id: u128 = rand::thread_rng().r#gen();
        Self(format!("{id:032X}"))
    }

    /// Create from string
    #[must_use]
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get as string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ServerIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ServerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Presence packet broadcast by a server
///
/// On the wire:
///
/// ```text
/// {"type":"Announce","id":"5F0C...","host":"192.168.1.20","controlPort":8234,
///  "issuedAt":"2024-05-01T20:15:00Z","name":"Living Room","mediaPort":8234}
/// ```
///
/// Unknown fields are ignored when decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncePacket {
    #[serde(rename = "type")]
    kind: PacketKind,
    id: ServerIdentity,
    host: IpAddr,
    control_port: u16,
    issued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    media_port: Option<u16>,
}

impl AnnouncePacket {
    /// Create a packet issued now
    #[must_use]
    pub fn new(id: ServerIdentity, host: IpAddr, control_port: u16) -> Self {
        Self {
            kind: PacketKind::Announce,
            id,
            host,
            control_port,
            issued_at: Utc::now(),
            name: None,
            media_port: None,
        }
    }

    /// Set the server name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the port media is streamed on
    #[must_use]
    pub fn with_media_port(mut self, port: u16) -> Self {
        self.media_port = Some(port);
        self
    }

    /// Same announcement with a fresh `issuedAt`
    #[must_use]
    pub fn reissue(&self) -> Self {
        Self {
            issued_at: Utc::now(),
            ..self.clone()
        }
    }

    /// Server identity
    #[must_use]
    pub fn id(&self) -> &ServerIdentity {
        &self.id
    }

    /// Host the server claims to run on
    #[must_use]
    pub fn host(&self) -> IpAddr {
        self.host
    }

    /// Control channel port
    #[must_use]
    pub fn control_port(&self) -> u16 {
        self.control_port
    }

    /// When the packet was issued
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Server name, if announced
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Media port, if announced
    #[must_use]
    pub fn media_port(&self) -> Option<u16> {
        self.media_port
    }

    /// Control address built from the announced host
    #[must_use]
    pub fn control_address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.control_port)
    }

    /// Serialize for one datagram
    ///
    /// # Errors
    ///
    /// Returns `Encode` if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, PartyBoxError> {
        serde_json::to_vec(self).map_err(|e| PartyBoxError::Encode {
            message: e.to_string(),
        })
    }

    /// Parse one datagram
    ///
    /// # Errors
    ///
    /// Returns `Decode` if the payload is not an announce packet.
    pub fn decode(payload: &[u8]) -> Result<Self, PartyBoxError> {
        serde_json::from_slice(payload).map_err(|e| PartyBoxError::Decode {
            message: e.to_string(),
        })
    }
}
