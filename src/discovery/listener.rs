//! Waiting for a server announcement

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::Instant;

use super::packet::AnnouncePacket;
use crate::error::PartyBoxError;
use crate::types::DiscoveryConfig;

/// Largest datagram read
const MAX_DATAGRAM: usize = 2048;

/// A server found by the listener
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredServer {
    /// Address the datagram came from
    pub sender: SocketAddr,
    /// The announcement
    pub packet: AnnouncePacket,
}

impl DiscoveredServer {
    /// Control channel address: sender IP with the announced port
    #[must_use]
    pub fn control_address(&self) -> SocketAddr {
        SocketAddr::new(self.sender.ip(), self.packet.control_port())
    }
}

/// Receives announcements on the discovery port
pub struct Listener {
    socket: UdpSocket,
}

impl Listener {
    /// Bind the discovery socket, joining the multicast group if configured
    ///
    /// # Errors
    ///
    /// Returns `Bind` if the socket cannot be bound.
    pub async fn bind(config: &DiscoveryConfig) -> Result<Self, PartyBoxError> {
        let socket = UdpSocket::bind(config.bind_addr)
            .await
            .map_err(|source| PartyBoxError::Bind {
                address: config.bind_addr,
                source,
            })?;

        if let Some(group) = config.multicast_group {
            if let Err(e) = socket.join_multicast_v4(group, Ipv4Addr::UNSPECIFIED) {
                tracing::warn!("Could not join {}: {}", group, e);
            }
        }

        Ok(Self { socket })
    }

    /// Bound address
    ///
    /// # Errors
    ///
    /// Returns error if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr, PartyBoxError> {
        Ok(self.socket.local_addr()?)
    }

    /// Wait up to `timeout` for a well-formed announcement
    ///
    /// Malformed datagrams are skipped without ending the wait. Returns
    /// `None` once the deadline passes.
    pub async fn listen(&self, timeout: Duration) -> Option<DiscoveredServer> {
        let deadline = Instant::now() + timeout;
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            let Ok(received) =
                tokio::time::timeout_at(deadline, self.socket.recv_from(&mut buf)).await
            else {
                tracing::debug!("No server announced within {:?}", timeout);
                return None;
            };

            let (len, sender) = match received {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("Discovery receive failed: {}", e);
                    continue;
                }
            };

            match AnnouncePacket::decode(&buf[..len]) {
                Ok(packet) => {
                    tracing::info!(
                        "Found server {} at {}",
                        packet.id(),
                        sender.ip()
                    );
                    return Some(DiscoveredServer { sender, packet });
                }
                Err(e) => {
                    tracing::warn!("Ignoring malformed datagram from {}: {}", sender, e);
                }
            }
        }
    }
}
