use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use super::track::MediaRef;
use crate::error::PartyBoxError;

/// Well-known port shared by the control channel and discovery
pub const DEFAULT_PORT: u16 = 8234;

/// Multicast group used for announcements and the fallback stream target
pub const DEFAULT_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 1);

/// How new entries are placed in the queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueMode {
    /// Entries are appended in order
    #[default]
    Ordered,
    /// Appended entries land at a random position
    Shuffled,
}

/// Configuration for presence announcement and discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Where the announcer sends its datagrams
    pub destination: SocketAddr,

    /// Time between two announcements (default: 1 second)
    pub interval: Duration,

    /// Address the listener binds to
    pub bind_addr: SocketAddr,

    /// Multicast group the listener joins, if any
    pub multicast_group: Option<Ipv4Addr>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            destination: SocketAddr::from((DEFAULT_GROUP, DEFAULT_PORT)),
            interval: Duration::from_secs(1),
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            multicast_group: Some(DEFAULT_GROUP),
        }
    }
}

/// Configuration for a party host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Human readable server name (default: host name)
    pub name: String,

    /// Address of the control channel listener
    pub control_addr: SocketAddr,

    /// Port the engine streams media to
    pub media_port: u16,

    /// Stream bitrate in kbit/s (default: 320)
    pub bitrate_kbps: u32,

    /// Multicast group for the fallback stream target
    pub fallback_group: Ipv4Addr,

    /// Queue placement policy
    pub queue_mode: QueueMode,

    /// Media enqueued when the host starts
    pub initial_playlist: Vec<MediaRef>,

    /// Initial volume in percent (default: 75)
    pub initial_volume: u8,

    /// Announcement settings
    pub discovery: DiscoveryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            control_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            media_port: DEFAULT_PORT,
            bitrate_kbps: 320,
            fallback_group: DEFAULT_GROUP,
            queue_mode: QueueMode::Ordered,
            initial_playlist: Vec::new(),
            initial_volume: 75,
            discovery: DiscoveryConfig::default(),
        }
    }
}

fn default_name() -> String {
    hostname::get().map_or_else(
        |_| "PartyBox".to_string(),
        |h| h.to_string_lossy().into_owned(),
    )
}

impl ServerConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Parse a configuration from JSON, filling missing fields with defaults
    ///
    /// # Errors
    ///
    /// Returns `Decode` if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, PartyBoxError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Builder for `ServerConfig`
#[derive(Debug, Clone, Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Set server name
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set control channel address
    #[must_use]
    pub fn control_addr(mut self, addr: SocketAddr) -> Self {
        self.config.control_addr = addr;
        self
    }

    /// Set media port
    #[must_use]
    pub fn media_port(mut self, port: u16) -> Self {
        self.config.media_port = port;
        self
    }

    /// Set stream bitrate in kbit/s
    #[must_use]
    pub fn bitrate_kbps(mut self, bitrate: u32) -> Self {
        self.config.bitrate_kbps = bitrate;
        self
    }

    /// Set fallback multicast group
    #[must_use]
    pub fn fallback_group(mut self, group: Ipv4Addr) -> Self {
        self.config.fallback_group = group;
        self
    }

    /// Set queue mode
    #[must_use]
    pub fn queue_mode(mut self, mode: QueueMode) -> Self {
        self.config.queue_mode = mode;
        self
    }

    /// Set the playlist loaded on start
    #[must_use]
    pub fn initial_playlist(mut self, playlist: Vec<MediaRef>) -> Self {
        self.config.initial_playlist = playlist;
        self
    }

    /// Set initial volume in percent
    #[must_use]
    pub fn initial_volume(mut self, percent: u8) -> Self {
        self.config.initial_volume = percent.min(100);
        self
    }

    /// Set announcement settings
    #[must_use]
    pub fn discovery(mut self, discovery: DiscoveryConfig) -> Self {
        self.config.discovery = discovery;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> ServerConfig {
        self.config
    }
}
