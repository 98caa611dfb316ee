//! Control channel server

use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

use super::events::ServerEvent;
use super::message::Notification;
use super::registry::ClientRegistry;
use crate::error::PartyBoxError;

/// Longest line accepted from a client
const MAX_LINE_LENGTH: usize = 8 * 1024;

/// Persistent-connection publish/subscribe server
///
/// Every accepted connection is registered with its own outbound queue and
/// a sender task that writes queued notifications in order. Clients are
/// passive; anything they send is read and discarded, which is also how a
/// closed socket is noticed.
pub struct ControlServer {
    address: SocketAddr,
    local_addr: Option<SocketAddr>,
    registry: ClientRegistry,
    event_tx: broadcast::Sender<ServerEvent>,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl ControlServer {
    /// Create a server that will listen on `address`
    #[must_use]
    pub fn new(address: SocketAddr) -> Self {
        let (event_tx, _) = broadcast::channel(64);

        Self {
            address,
            local_addr: None,
            registry: ClientRegistry::new(),
            event_tx,
            shutdown_tx: None,
        }
    }

    /// Subscribe to server events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.event_tx.subscribe()
    }

    /// The client registry
    #[must_use]
    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Address actually bound, once started
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Whether the accept loop is running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }

    /// Bind the listener and start accepting connections
    ///
    /// # Errors
    ///
    /// Returns `Bind` if the address cannot be bound, or `InvalidState` if
    /// the server is already running.
    pub async fn start(&mut self) -> Result<SocketAddr, PartyBoxError> {
        if self.is_running() {
            return Err(PartyBoxError::InvalidState {
                message: "control server already running".to_string(),
                current_state: "running".to_string(),
            });
        }

        let listener = TcpListener::bind(self.address)
            .await
            .map_err(|source| PartyBoxError::Bind {
                address: self.address,
                source,
            })?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Control server listening on {}", local_addr);

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        self.shutdown_tx = Some(shutdown_tx);
        self.local_addr = Some(local_addr);

        let _ = self.event_tx.send(ServerEvent::Started {
            address: local_addr,
        });

        let registry = self.registry.clone();
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, addr)) => {
                                let registry = registry.clone();
                                let event_tx = event_tx.clone();
                                tokio::spawn(handle_connection(stream, addr, registry, event_tx));
                            }
                            Err(e) => {
                                tracing::warn!("Accept error: {}", e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            // Ends every sender loop; each one reports its own departure
            registry.clear().await;
            tracing::info!("Control server on {} stopped", local_addr);
            let _ = event_tx.send(ServerEvent::Stopped);
        });

        Ok(local_addr)
    }

    /// Queue a notification for every registered client
    pub async fn broadcast(&self, notification: &Notification) -> usize {
        self.registry.broadcast(notification).await
    }

    /// Queue a notification for one client
    ///
    /// # Errors
    ///
    /// Returns `NotRunning` if the server is stopped, or
    /// `ClientDisconnected` if the client is not registered.
    pub async fn send_to(
        &self,
        address: SocketAddr,
        notification: Notification,
    ) -> Result<(), PartyBoxError> {
        if !self.is_running() {
            return Err(PartyBoxError::NotRunning {
                component: "control server",
            });
        }
        if self.registry.send_to(&address, notification).await {
            Ok(())
        } else {
            Err(PartyBoxError::ClientDisconnected { address })
        }
    }

    /// Stop accepting and disconnect every client
    ///
    /// Calling this on a stopped server does nothing.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
    }
}

/// Register one connection and serve it until either side closes
async fn handle_connection(
    stream: TcpStream,
    address: SocketAddr,
    registry: ClientRegistry,
    event_tx: broadcast::Sender<ServerEvent>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!("Could not disable Nagle for {}: {}", address, e);
    }

    let rx = registry.register(address).await;
    tracing::info!("Client {} registered", address);
    let _ = event_tx.send(ServerEvent::ClientJoined { address });

    let (read_half, write_half) = stream.into_split();
    let reason = serve(address, read_half, write_half, rx).await;

    registry.remove(&address).await;
    tracing::info!("Client {} removed: {}", address, reason);
    let _ = event_tx.send(ServerEvent::ClientLeft { address, reason });
}

/// Sender loop; returns why the connection ended
async fn serve(
    address: SocketAddr,
    read_half: OwnedReadHalf,
    write_half: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<Notification>,
) -> String {
    let mut sink = FramedWrite::new(write_half, LinesCodec::new());
    let mut source = FramedRead::new(read_half, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    loop {
        tokio::select! {
            message = rx.recv() => {
                let Some(notification) = message else {
                    return "server closed the connection".to_string();
                };
                let line = match notification.encode() {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!("Dropping unencodable notification: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(line).await {
                    return format!("write failed: {e}");
                }
            }
            incoming = source.next() => {
                match incoming {
                    None => return "closed by peer".to_string(),
                    Some(Err(e)) => return format!("read failed: {e}"),
                    Some(Ok(line)) => {
                        tracing::debug!("Ignoring message from {}: {}", address, line);
                    }
                }
            }
        }
    }
}
