//! Subscriber side of the control channel
//!
//! A client finds a server with [`discover_server`], connects with
//! [`ControlClient::connect`] and applies the server's notifications to its
//! local playback engine.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use partybox::client::{ControlClient, discover_server};
//! use partybox::engine::engine_channel;
//! use partybox::testing::MockEngine;
//! use partybox::types::DiscoveryConfig;
//!
//! # async fn example() -> Result<(), partybox::PartyBoxError> {
//! let config = DiscoveryConfig::default();
//! if let Some(server) = discover_server(&config, Duration::from_secs(2)).await? {
//!     let (events_tx, _events_rx) = engine_channel();
//!     let engine = Arc::new(MockEngine::new(events_tx));
//!     ControlClient::connect(server).await?.run(engine.as_ref()).await;
//! }
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, LinesCodec};

use crate::discovery::Listener;
use crate::engine::PlaybackEngine;
use crate::error::PartyBoxError;
use crate::server::Notification;
use crate::types::DiscoveryConfig;

#[cfg(test)]
mod tests;

/// Longest notification line accepted
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Wait for a server announcement and return its control address
///
/// # Errors
///
/// Returns `Bind` if the discovery socket cannot be bound.
pub async fn discover_server(
    config: &DiscoveryConfig,
    timeout: Duration,
) -> Result<Option<SocketAddr>, PartyBoxError> {
    let listener = Listener::bind(config).await?;
    Ok(listener
        .listen(timeout)
        .await
        .map(|server| server.control_address()))
}

/// Connection to a server's control channel
pub struct ControlClient {
    server: SocketAddr,
    local_addr: SocketAddr,
    lines: FramedRead<TcpStream, LinesCodec>,
}

impl ControlClient {
    /// Connect to a control server
    ///
    /// # Errors
    ///
    /// Returns `ConnectionFailed` if the server cannot be reached.
    pub async fn connect(server: SocketAddr) -> Result<Self, PartyBoxError> {
        let stream = TcpStream::connect(server)
            .await
            .map_err(|e| PartyBoxError::ConnectionFailed {
                address: server,
                message: e.to_string(),
                source: Some(Box::new(e)),
            })?;
        let local_addr = stream.local_addr()?;
        tracing::info!("Connected to control server {}", server);

        Ok(Self {
            server,
            local_addr,
            lines: FramedRead::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH)),
        })
    }

    /// Connect, giving up after `timeout`
    ///
    /// # Errors
    ///
    /// Returns `Timeout` if the server does not accept in time, or
    /// `ConnectionFailed` if it refuses.
    pub async fn connect_timeout(
        server: SocketAddr,
        timeout: Duration,
    ) -> Result<Self, PartyBoxError> {
        tokio::time::timeout(timeout, Self::connect(server))
            .await
            .map_err(|_| PartyBoxError::Timeout)?
    }

    /// Server address
    #[must_use]
    pub fn server_addr(&self) -> SocketAddr {
        self.server
    }

    /// Local end of the connection, as the server sees it
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Next notification, or `None` once the server closed the connection
    ///
    /// Lines that do not decode are skipped.
    pub async fn next_notification(&mut self) -> Option<Notification> {
        loop {
            match self.lines.next().await? {
                Ok(line) => match Notification::decode(&line) {
                    Ok(notification) => return Some(notification),
                    Err(e) => tracing::warn!("Skipping malformed notification: {}", e),
                },
                Err(e) => {
                    tracing::warn!("Control connection to {} failed: {}", self.server, e);
                    return None;
                }
            }
        }
    }

    /// Apply notifications to `engine` until the server goes away
    pub async fn run(mut self, engine: &dyn PlaybackEngine) {
        while let Some(notification) = self.next_notification().await {
            if let Err(e) = apply(engine, &notification).await {
                tracing::warn!("Could not apply {}: {}", notification.kind(), e);
            }
        }
        tracing::info!("Control server {} closed the connection", self.server);
    }
}

/// Apply one notification to a local engine
///
/// # Errors
///
/// Returns error if the engine rejects the resulting call.
pub async fn apply(
    engine: &dyn PlaybackEngine,
    notification: &Notification,
) -> Result<(), PartyBoxError> {
    match notification {
        Notification::OutputReconfigured { descriptor } => {
            tracing::info!("Output now {}", descriptor);
            engine.play().await
        }
        Notification::Restart => {
            tracing::info!("Restarting stream");
            engine.stop().await?;
            engine.play().await
        }
        Notification::Volume { percent } => engine.set_volume(*percent).await,
        Notification::NowPlaying { media } => {
            match media {
                Some(media) => tracing::info!("Now playing: {}", media.display_name()),
                None => tracing::info!("Nothing playing"),
            }
            Ok(())
        }
        Notification::PlaybackState { state } => {
            tracing::debug!("Server playback state: {}", state);
            Ok(())
        }
    }
}
