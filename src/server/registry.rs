//! Registry of connected clients

use std::collections::{BTreeSet, HashMap};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{RwLock, mpsc};

use super::message::Notification;

/// Outbound side of one registered connection
#[derive(Debug, Clone)]
pub struct ClientHandle {
    address: SocketAddr,
    tx: mpsc::UnboundedSender<Notification>,
    connected_at: Instant,
}

impl ClientHandle {
    /// Remote address of the client
    #[must_use]
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// When the client registered
    #[must_use]
    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    /// Queue a notification; false if the connection is gone
    pub fn send(&self, notification: Notification) -> bool {
        self.tx.send(notification).is_ok()
    }

    /// Whether the connection's sender loop has ended
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Registered connections keyed by remote address
///
/// Cloning yields another handle to the same registry.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<RwLock<HashMap<SocketAddr, ClientHandle>>>,
}

impl ClientRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and return the receiving end of its queue
    pub async fn register(&self, address: SocketAddr) -> mpsc::UnboundedReceiver<Notification> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ClientHandle {
            address,
            tx,
            connected_at: Instant::now(),
        };

        if self.clients.write().await.insert(address, handle).is_some() {
            tracing::warn!("Replaced existing registration for {}", address);
        }
        rx
    }

    /// Remove a connection; removing an unknown address is a no-op
    pub async fn remove(&self, address: &SocketAddr) -> Option<ClientHandle> {
        self.clients.write().await.remove(address)
    }

    /// Drop every registration, which ends all sender loops
    pub async fn clear(&self) {
        self.clients.write().await.clear();
    }

    /// Queue a notification for every registered connection
    ///
    /// Does not wait for delivery. Connections whose sender loop has already
    /// ended are reaped. Returns how many connections it was queued for.
    pub async fn broadcast(&self, notification: &Notification) -> usize {
        let handles: Vec<ClientHandle> = self.clients.read().await.values().cloned().collect();

        let mut delivered = 0;
        let mut stale = Vec::new();
        for handle in &handles {
            if handle.send(notification.clone()) {
                delivered += 1;
            } else {
                stale.push(handle.address);
            }
        }

        if !stale.is_empty() {
            let mut clients = self.clients.write().await;
            for address in stale {
                // A reconnect may have taken the slot meanwhile
                if clients.get(&address).is_some_and(ClientHandle::is_closed) {
                    clients.remove(&address);
                    tracing::debug!("Reaped stale client {}", address);
                }
            }
        }

        tracing::debug!(
            "Broadcast {} to {} client(s)",
            notification.kind(),
            delivered
        );
        delivered
    }

    /// Queue a notification for one connection
    pub async fn send_to(&self, address: &SocketAddr, notification: Notification) -> bool {
        self.clients
            .read()
            .await
            .get(address)
            .is_some_and(|h| h.send(notification))
    }

    /// Addresses of the registered connections
    pub async fn members(&self) -> Vec<SocketAddr> {
        self.clients.read().await.keys().copied().collect()
    }

    /// Distinct client hosts, in address order
    ///
    /// One machine with several connections appears once.
    pub async fn client_hosts(&self) -> Vec<IpAddr> {
        let hosts: BTreeSet<IpAddr> = self
            .clients
            .read()
            .await
            .keys()
            .map(SocketAddr::ip)
            .collect();
        hosts.into_iter().collect()
    }

    /// Whether the address is registered
    pub async fn contains(&self, address: &SocketAddr) -> bool {
        self.clients.read().await.contains_key(address)
    }

    /// Number of registered connections
    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Whether no connection is registered
    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}
