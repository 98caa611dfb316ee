//! Test doubles for driving a session without a real engine

pub mod mock_engine;

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

pub use mock_engine::{EngineCall, MockEngine};

use crate::types::{DiscoveryConfig, ServerConfig};

/// Server configuration that only touches the loopback interface
///
/// The control channel binds an ephemeral port and announcements go to a
/// unicast loopback destination, so tests can run side by side.
#[must_use]
pub fn loopback_config(discovery_port: u16) -> ServerConfig {
    ServerConfig::builder()
        .name("Test Party")
        .control_addr(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .discovery(DiscoveryConfig {
            destination: SocketAddr::from((Ipv4Addr::LOCALHOST, discovery_port)),
            interval: Duration::from_millis(50),
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, discovery_port)),
            multicast_group: None,
        })
        .build()
}
