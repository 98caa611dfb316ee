//! A complete party host
//!
//! [`PartyHost`] ties the pieces together: the control server accepts
//! clients, membership changes drive the output router, session events are
//! fanned out to every client as notifications, and the announcer advertises
//! the control port.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::control::PlaybackSession;
use crate::discovery::{AnnouncePacket, Announcer, ServerIdentity};
use crate::engine::{EngineEventReceiver, PlaybackEngine};
use crate::error::PartyBoxError;
use crate::output::{OutputRouter, OutputSettings, regenerate};
use crate::server::{ClientRegistry, ControlServer, Notification, ServerEvent};
use crate::state::{EventFilter, SessionEvent};
use crate::types::ServerConfig;


/// Builder for [`PartyHost`]
pub struct HostBuilder {
    config: ServerConfig,
    engine: Option<(Arc<dyn PlaybackEngine>, EngineEventReceiver)>,
    identity: Option<ServerIdentity>,
    advertised_host: Option<IpAddr>,
}

impl HostBuilder {
    /// Start from a configuration
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            engine: None,
            identity: None,
            advertised_host: None,
        }
    }

    /// Engine to drive and the channel it reports on
    #[must_use]
    pub fn engine(mut self, engine: Arc<dyn PlaybackEngine>, events: EngineEventReceiver) -> Self {
        self.engine = Some((engine, events));
        self
    }

    /// Fixed server identity instead of a random one
    #[must_use]
    pub fn identity(mut self, identity: ServerIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Host address put in announcements (default: the control address)
    #[must_use]
    pub fn advertised_host(mut self, host: IpAddr) -> Self {
        self.advertised_host = Some(host);
        self
    }

    /// Start the host
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` without an engine, `Bind` if the control
    /// address is taken, or the engine's error if the initial volume is
    /// rejected.
    pub async fn start(self) -> Result<PartyHost, PartyBoxError> {
        let Some((engine, engine_events)) = self.engine else {
            return Err(PartyBoxError::InvalidParameter {
                name: "engine".to_string(),
                message: "a playback engine is required".to_string(),
            });
        };
        let config = self.config;
        let settings = OutputSettings::from(&config);

        let session = Arc::new(PlaybackSession::new(
            engine,
            config.queue_mode,
            regenerate(std::iter::empty(), &settings),
        ));
        session.set_volume(config.initial_volume).await?;
        if !config.initial_playlist.is_empty() {
            session.load_playlist(config.initial_playlist.clone()).await;
        }

        let mut server = ControlServer::new(config.control_addr);
        let membership = server.subscribe();
        let notifications = EventFilter::client_facing(session.event_bus());
        let control_addr = server.start().await?;

        // Engine events queue up until the loop runs; nothing is playing yet
        let mut tasks = vec![session.spawn_event_loop(engine_events)];

        let router = Arc::new(OutputRouter::new(settings, Arc::clone(&session)));
        tasks.push(tokio::spawn(
            Arc::clone(&router).run(server.registry().clone(), membership),
        ));
        tasks.push(tokio::spawn(forward_notifications(
            notifications,
            server.registry().clone(),
        )));

        let host = self.advertised_host.unwrap_or_else(|| control_addr.ip());
        let packet = AnnouncePacket::new(
            self.identity.unwrap_or_default(),
            host,
            control_addr.port(),
        )
        .with_name(config.name.clone())
        .with_media_port(config.media_port);
        let announcer = Announcer::new(packet, &config.discovery);

        if let Err(e) = announcer.start().await {
            server.shutdown().await;
            for task in &tasks {
                task.abort();
            }
            return Err(e);
        }

        tracing::info!("Party host '{}' running on {}", config.name, control_addr);

        Ok(PartyHost {
            config,
            session,
            router,
            server,
            announcer,
            control_addr,
            tasks,
        })
    }
}

/// A running party host
pub struct PartyHost {
    config: ServerConfig,
    session: Arc<PlaybackSession>,
    router: Arc<OutputRouter>,
    server: ControlServer,
    announcer: Announcer,
    control_addr: SocketAddr,
    tasks: Vec<JoinHandle<()>>,
}

impl PartyHost {
    /// Create a builder
    #[must_use]
    pub fn builder(config: ServerConfig) -> HostBuilder {
        HostBuilder::new(config)
    }

    /// Configuration the host was started with
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The playback session
    #[must_use]
    pub fn session(&self) -> &Arc<PlaybackSession> {
        &self.session
    }

    /// The output router
    #[must_use]
    pub fn router(&self) -> &Arc<OutputRouter> {
        &self.router
    }

    /// The connected clients
    #[must_use]
    pub fn registry(&self) -> &ClientRegistry {
        self.server.registry()
    }

    /// The presence announcer
    #[must_use]
    pub fn announcer(&self) -> &Announcer {
        &self.announcer
    }

    /// Bound control channel address
    #[must_use]
    pub fn control_addr(&self) -> SocketAddr {
        self.control_addr
    }

    /// Subscribe to control server events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.server.subscribe()
    }

    /// Whether the host is still accepting clients
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.server.is_running()
    }

    /// Ask every client to restart its stream; returns how many were asked
    pub async fn restart_clients(&self) -> usize {
        tracing::info!("Restarting clients");
        self.server.broadcast(&Notification::Restart).await
    }

    /// Stop announcing, disconnect all clients and stop playback
    ///
    /// Calling this again does nothing.
    pub async fn shutdown(&mut self) {
        if !self.server.is_running() {
            return;
        }

        self.announcer.stop().await;
        self.server.shutdown().await;
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Err(e) = self.session.stop().await {
            tracing::warn!("Engine failed to stop: {}", e);
        }
        tracing::info!("Party host '{}' shut down", self.config.name);
    }
}

/// Relay client-facing session events to every registered client
async fn forward_notifications(mut events: EventFilter, registry: ClientRegistry) {
    while let Some(event) = events.recv().await {
        let notification = match event {
            SessionEvent::StateChanged { new, .. } => Notification::PlaybackState { state: new },
            SessionEvent::NowPlayingChanged { media } => Notification::NowPlaying { media },
            SessionEvent::VolumeChanged { percent } => Notification::Volume { percent },
            SessionEvent::OutputReconfigured { descriptor } => {
                Notification::OutputReconfigured { descriptor }
            }
            SessionEvent::TrackFailed { .. } | SessionEvent::QueueUpdated { .. } => continue,
        };
        registry.broadcast(&notification).await;
    }
}
