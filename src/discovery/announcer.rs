//! Periodic presence broadcast

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;

use super::packet::AnnouncePacket;
use crate::error::PartyBoxError;
use crate::types::DiscoveryConfig;

#[derive(Debug, Clone, Copy)]
struct Schedule {
    destination: SocketAddr,
    interval: Duration,
}

struct Worker {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Broadcasts an [`AnnouncePacket`] on a timer
///
/// Start and stop are idempotent. Destination and interval may change while
/// running and apply from the next tick. A failed send is logged and the
/// next tick goes ahead.
pub struct Announcer {
    packet: AnnouncePacket,
    schedule: Arc<RwLock<Schedule>>,
    worker: Mutex<Option<Worker>>,
    sent: Arc<AtomicU64>,
}

impl Announcer {
    /// Create a stopped announcer for `packet`
    #[must_use]
    pub fn new(packet: AnnouncePacket, config: &DiscoveryConfig) -> Self {
        Self {
            packet,
            schedule: Arc::new(RwLock::new(Schedule {
                destination: config.destination,
                interval: config.interval,
            })),
            worker: Mutex::new(None),
            sent: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The announced packet
    #[must_use]
    pub fn packet(&self) -> &AnnouncePacket {
        &self.packet
    }

    /// Datagrams sent so far
    #[must_use]
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Whether the timer is running
    pub async fn is_running(&self) -> bool {
        self.worker.lock().await.is_some()
    }

    /// Current destination
    pub async fn destination(&self) -> SocketAddr {
        self.schedule.read().await.destination
    }

    /// Change the destination from the next tick on
    ///
    /// Switching between IPv4 and IPv6 rebinds the sending socket.
    pub async fn set_destination(&self, destination: SocketAddr) {
        self.schedule.write().await.destination = destination;
        tracing::debug!("Announce destination set to {}", destination);
    }

    /// Current interval
    pub async fn interval(&self) -> Duration {
        self.schedule.read().await.interval
    }

    /// Change the interval from the next tick on
    pub async fn set_interval(&self, interval: Duration) {
        self.schedule.write().await.interval = interval;
    }

    /// Start broadcasting; a no-op while running
    ///
    /// # Errors
    ///
    /// Returns error if the sending socket cannot be created.
    pub async fn start(&self) -> Result<(), PartyBoxError> {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            return Ok(());
        }

        let destination = self.schedule.read().await.destination;
        let socket = bind_sender(destination).await?;

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let handle = tokio::spawn(announce_loop(
            socket,
            self.packet.clone(),
            Arc::clone(&self.schedule),
            Arc::clone(&self.sent),
            shutdown_rx,
        ));

        tracing::info!(
            "Announcing {} to {}",
            self.packet.control_address(),
            destination
        );
        *worker = Some(Worker {
            shutdown_tx,
            handle,
        });
        Ok(())
    }

    /// Stop broadcasting; a no-op while stopped
    pub async fn stop(&self) {
        let Some(worker) = self.worker.lock().await.take() else {
            return;
        };

        let _ = worker.shutdown_tx.send(()).await;
        if let Err(e) = worker.handle.await {
            tracing::warn!("Announcer task ended abnormally: {}", e);
        }
        tracing::info!("Announcer stopped");
    }
}

/// Bind a broadcast-capable socket of the destination's address family
async fn bind_sender(destination: SocketAddr) -> Result<UdpSocket, PartyBoxError> {
    let bind_addr = if destination.is_ipv4() {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
    } else {
        SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
    };
    let socket = UdpSocket::bind(bind_addr).await?;
    socket.set_broadcast(true)?;
    Ok(socket)
}

/// Send one announcement, rebinding first if the destination changed family
async fn announce_once(
    socket: &mut Option<UdpSocket>,
    packet: &AnnouncePacket,
    destination: SocketAddr,
) -> Result<(), PartyBoxError> {
    let payload = packet.reissue().encode()?;

    let sender = match socket.take() {
        Some(s)
            if s
                .local_addr()
                .is_ok_and(|local| local.is_ipv4() == destination.is_ipv4()) =>
        {
            s
        }
        _ => {
            tracing::debug!("Rebinding announce socket for {}", destination);
            bind_sender(destination).await?
        }
    };

    let result = sender.send_to(&payload, destination).await;
    *socket = Some(sender);
    result?;
    Ok(())
}

async fn announce_loop(
    socket: UdpSocket,
    packet: AnnouncePacket,
    schedule: Arc<RwLock<Schedule>>,
    sent: Arc<AtomicU64>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    let mut socket = Some(socket);

    loop {
        let Schedule {
            destination,
            interval,
        } = *schedule.read().await;

        match announce_once(&mut socket, &packet, destination).await {
            Ok(()) => {
                sent.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Announced to {}", destination);
            }
            Err(e) if e.is_recoverable() => {
                tracing::warn!("Announce to {} failed: {}", destination, e);
            }
            Err(e) => tracing::error!("Announce to {} failed: {}", destination, e),
        }

        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            _ = shutdown_rx.recv() => break,
        }
    }
}
