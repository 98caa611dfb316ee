//! Common test utilities and fixtures
#![allow(dead_code)]

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Once};
use std::time::Duration;

use partybox::engine::engine_channel;
use partybox::testing::{MockEngine, loopback_config};
use partybox::types::DiscoveryConfig;
use partybox::{Listener, PartyHost, ServerConfig};
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialize test logging (call once per test module)
pub fn init_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::from_default_env().add_directive("partybox=debug".parse().unwrap());

        fmt().with_env_filter(filter).with_test_writer().init();
    });
}

/// Discovery settings that stay on loopback and pick a free port
pub fn loopback_discovery() -> DiscoveryConfig {
    DiscoveryConfig {
        destination: SocketAddr::from((Ipv4Addr::LOCALHOST, 9)),
        interval: Duration::from_millis(25),
        bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
        multicast_group: None,
    }
}

/// A listener on an ephemeral loopback port and a host config announcing to it
pub async fn listener_and_config() -> (Listener, ServerConfig) {
    let listener = Listener::bind(&loopback_discovery()).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, loopback_config(port))
}

/// Start a host on loopback with a mock engine
pub async fn start_host(config: ServerConfig) -> (PartyHost, Arc<MockEngine>) {
    let (tx, rx) = engine_channel();
    let engine = Arc::new(MockEngine::new(tx));
    let host = PartyHost::builder(config)
        .engine(engine.clone(), rx)
        .start()
        .await
        .unwrap();
    (host, engine)
}

/// Poll until `check` holds or two seconds pass
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
