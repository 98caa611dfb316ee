//! Output fan-out for the connected clients

use std::collections::BTreeSet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::control::PlaybackSession;
use crate::error::PartyBoxError;
use crate::server::{ClientRegistry, ServerEvent};
use crate::types::{DEFAULT_GROUP, DEFAULT_PORT, ServerConfig};

/// Role of a stream target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// Unicast stream to a registered client
    Client,
    /// Multicast stream for listeners that never registered
    Fallback,
}

/// One destination the engine streams to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTarget {
    /// Destination address
    pub address: IpAddr,
    /// Destination port
    pub port: u16,
    /// Target role
    pub kind: TargetKind,
}

/// The set of stream targets for the engine
///
/// Derived from client membership, never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDescriptor {
    targets: Vec<OutputTarget>,
    bitrate_kbps: u32,
}

impl OutputDescriptor {
    /// All targets, clients first, fallback last
    #[must_use]
    pub fn targets(&self) -> &[OutputTarget] {
        &self.targets
    }

    /// Stream bitrate in kbit/s
    #[must_use]
    pub fn bitrate_kbps(&self) -> u32 {
        self.bitrate_kbps
    }

    /// Addresses of the client targets
    pub fn client_addresses(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.targets
            .iter()
            .filter(|t| t.kind == TargetKind::Client)
            .map(|t| t.address)
    }

    /// Number of client targets
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.client_addresses().count()
    }

    /// The multicast fallback target
    #[must_use]
    pub fn fallback(&self) -> Option<&OutputTarget> {
        self.targets.iter().find(|t| t.kind == TargetKind::Fallback)
    }

    /// Whether the descriptor streams to this client
    #[must_use]
    pub fn targets_client(&self, address: IpAddr) -> bool {
        self.client_addresses().any(|a| a == address)
    }
}

impl Default for OutputDescriptor {
    fn default() -> Self {
        regenerate(std::iter::empty(), &OutputSettings::default())
    }
}

impl fmt::Display for OutputDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, target) in self.targets.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "rtp://{}:{}", target.address, target.port)?;
        }
        write!(f, " @{}kbps", self.bitrate_kbps)
    }
}

/// Parameters of the fan-out that do not depend on membership
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSettings {
    /// Port clients receive the stream on
    pub media_port: u16,
    /// Stream bitrate in kbit/s
    pub bitrate_kbps: u32,
    /// Multicast group of the fallback target; it streams on `media_port + 1`
    pub fallback_group: Ipv4Addr,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            media_port: DEFAULT_PORT,
            bitrate_kbps: 320,
            fallback_group: DEFAULT_GROUP,
        }
    }
}

impl From<&ServerConfig> for OutputSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            media_port: config.media_port,
            bitrate_kbps: config.bitrate_kbps,
            fallback_group: config.fallback_group,
        }
    }
}

/// Build the descriptor for a membership snapshot
///
/// One target per distinct client address plus the multicast fallback.
/// Client targets are sorted, so equal membership yields equal descriptors.
pub fn regenerate<I>(clients: I, settings: &OutputSettings) -> OutputDescriptor
where
    I: IntoIterator<Item = IpAddr>,
{
    let distinct: BTreeSet<IpAddr> = clients.into_iter().collect();

    let mut targets: Vec<OutputTarget> = distinct
        .into_iter()
        .map(|address| OutputTarget {
            address,
            port: settings.media_port,
            kind: TargetKind::Client,
        })
        .collect();

    targets.push(OutputTarget {
        address: IpAddr::V4(settings.fallback_group),
        port: settings.media_port.wrapping_add(1),
        kind: TargetKind::Fallback,
    });

    OutputDescriptor {
        targets,
        bitrate_kbps: settings.bitrate_kbps,
    }
}

/// Keeps the engine's output in line with client membership
pub struct OutputRouter {
    settings: OutputSettings,
    session: Arc<PlaybackSession>,
    reconfigurations: AtomicU64,
}

impl OutputRouter {
    /// Create a router driving the given session
    #[must_use]
    pub fn new(settings: OutputSettings, session: Arc<PlaybackSession>) -> Self {
        Self {
            settings,
            session,
            reconfigurations: AtomicU64::new(0),
        }
    }

    /// Fan-out settings
    #[must_use]
    pub fn settings(&self) -> &OutputSettings {
        &self.settings
    }

    /// Number of reconfigurations applied so far
    #[must_use]
    pub fn reconfiguration_count(&self) -> u64 {
        self.reconfigurations.load(Ordering::Relaxed)
    }

    /// Regenerate the descriptor for `clients` and apply it to the session
    ///
    /// # Errors
    ///
    /// Returns error if the engine fails to reload the current media.
    pub async fn reconfigure<I>(&self, clients: I) -> Result<OutputDescriptor, PartyBoxError>
    where
        I: IntoIterator<Item = IpAddr>,
    {
        let descriptor = regenerate(clients, &self.settings);
        tracing::info!("Reconfiguring output: {}", descriptor);

        self.session.apply_output(descriptor.clone()).await?;
        self.reconfigurations.fetch_add(1, Ordering::Relaxed);
        Ok(descriptor)
    }

    /// Reconfigure on every membership change until the server goes away
    pub async fn run(
        self: Arc<Self>,
        registry: ClientRegistry,
        mut events: broadcast::Receiver<ServerEvent>,
    ) {
        loop {
            match events.recv().await {
                Ok(ServerEvent::ClientJoined { .. } | ServerEvent::ClientLeft { .. })
                | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }

            let clients = registry.client_hosts().await;
            if let Err(e) = self.reconfigure(clients).await {
                tracing::error!("Output reconfiguration failed: {}", e);
            }
        }
        tracing::debug!("Output router stopped");
    }
}
