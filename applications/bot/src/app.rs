//! Process wiring
//!
//! Loads the state file, builds the stores and the session registry on top of
//! one saver, starts the background tasks, and restores the sessions that
//! were live at the last shutdown.

use crate::commands::CommandSurface;
use crate::config::BotConfig;
use crate::error::Result;
use crate::hotkeys::HotkeyDispatcher;
use crate::resolver::{LibraryConfig, LibraryResolver};
use crate::transport::SimulatedTransport;
use async_trait::async_trait;
use jukebox_playback::{AutoAdvanceCoordinator, CloseReason, SessionEvent, SessionRegistry};
use jukebox_storage::{
    PersistedState, PersistenceManager, PlaylistStore, SaveHandle, Saver, StateSource,
    UsageTracker, UserFlags, STATE_VERSION,
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Shared handles every input surface works through
#[derive(Clone)]
pub struct Services {
    pub config: Arc<BotConfig>,
    pub registry: SessionRegistry,
    pub playlists: Arc<PlaylistStore>,
    pub users: Arc<UserFlags>,
    pub usage: Arc<UsageTracker>,
    /// Notified once when an owner asks the bot to stop
    pub shutdown: Arc<Notify>,
}

/// Assembles the state file contents from the live stores
struct StateCollector {
    services: Services,
}

#[async_trait]
impl StateSource for StateCollector {
    async fn snapshot(&self) -> PersistedState {
        let services = &self.services;
        PersistedState {
            version: STATE_VERSION,
            playlists: services.playlists.snapshot(),
            sessions: services.registry.snapshot_all().await,
            disabled_users: services.users.disabled_users(),
            music_enabled: services.users.music_enabled(),
            stats: services.usage.snapshot(),
        }
    }
}

/// Running bot
pub struct App {
    services: Services,
    surface: Arc<CommandSurface>,
    hotkeys: HotkeyDispatcher,
    resolver: Arc<LibraryResolver>,
    transport: Arc<SimulatedTransport>,
    saver: SaveHandle,
    announcements: Option<mpsc::UnboundedReceiver<String>>,
    tasks: Vec<JoinHandle<()>>,
}

impl App {
    /// Load state and start every background task
    pub async fn start(config: BotConfig) -> Result<Self> {
        let config = Arc::new(config);

        let manager = Arc::new(PersistenceManager::new(&config.persistence.state_file));
        let state = manager.load_or_default().await;
        info!(
            path = %manager.path().display(),
            playlists = state.playlists.len(),
            sessions = state.sessions.len(),
            "State loaded"
        );

        let (saver, requests) = SaveHandle::channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(SimulatedTransport::new(
            event_tx,
            config.default_track_length(),
        ));

        let registry = SessionRegistry::new(
            Arc::clone(&transport) as _,
            saver.clone(),
            config.playback_config(),
        );

        let services = Services {
            config: Arc::clone(&config),
            registry: registry.clone(),
            playlists: Arc::new(PlaylistStore::new(state.playlists, saver.clone())),
            // Config can keep music off; the persisted switch cannot turn it on
            users: Arc::new(UserFlags::new(
                state.disabled_users,
                state.music_enabled && config.music.enabled,
                saver.clone(),
            )),
            usage: Arc::new(UsageTracker::new(state.stats)),
            shutdown: Arc::new(Notify::new()),
        };

        let mut tasks = Vec::new();
        tasks.push(
            Saver::new(
                manager,
                Arc::new(StateCollector {
                    services: services.clone(),
                }),
                config.saver_config(),
            )
            .spawn(requests),
        );
        tasks.push(AutoAdvanceCoordinator::new(registry.clone(), event_rx).spawn());

        // Subscribe before resuming so restored starts are announced too
        let (announce_tx, announce_rx) = mpsc::unbounded_channel();
        if config.music.announce_songs {
            tasks.push(tokio::spawn(announce(registry.subscribe(), announce_tx)));
        }

        let resolver = Arc::new(LibraryResolver::new(LibraryConfig {
            root: config.music.location.clone(),
            extensions: config.music.supported_formats.clone(),
            normalize: config.music.normalize_local,
        }));
        if services.users.music_enabled() {
            if let Err(e) = resolver.scan().await {
                warn!(error = %e, "Music library scan failed, local search disabled");
            }
        }

        let restored = registry.restore(state.sessions);
        if restored > 0 && config.persistence.resume_on_startup && services.users.music_enabled()
        {
            let resumed = registry.resume_all().await;
            info!(restored, resumed, "Restored sessions resumed");
        }

        let surface = Arc::new(CommandSurface::new(
            services.clone(),
            Arc::clone(&resolver) as _,
        ));
        let hotkeys = HotkeyDispatcher::new(services.clone());
        for (action, key) in hotkeys.bindings() {
            info!(action = %action, key = %key, "Hotkey registered");
        }

        Ok(Self {
            services,
            surface,
            hotkeys,
            resolver,
            transport,
            saver,
            announcements: Some(announce_rx),
            tasks,
        })
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn surface(&self) -> Arc<CommandSurface> {
        Arc::clone(&self.surface)
    }

    pub fn hotkeys(&self) -> HotkeyDispatcher {
        self.hotkeys.clone()
    }

    pub fn resolver(&self) -> &Arc<LibraryResolver> {
        &self.resolver
    }

    pub fn transport(&self) -> &Arc<SimulatedTransport> {
        &self.transport
    }

    /// Song announcements; `None` once taken
    pub fn take_announcements(&mut self) -> Option<mpsc::UnboundedReceiver<String>> {
        self.announcements.take()
    }

    /// Close every session and write the final state
    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down");
        self.services.registry.shutdown_all().await;

        let flushed = self.saver.flush().await;
        if let Err(e) = &flushed {
            error!(error = %e, "Final save failed");
        }

        for task in &self.tasks {
            task.abort();
        }
        flushed.map_err(Into::into)
    }
}

async fn announce(
    mut events: broadcast::Receiver<SessionEvent>,
    out: mpsc::UnboundedSender<String>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                debug!(missed, "Announcer lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let message = match event {
            SessionEvent::TrackStarted { channel, track, .. } => {
                format!("[{}] Now playing: {}", channel, track.title())
            }
            SessionEvent::TrackFailed {
                channel,
                track,
                reason,
            } => format!("[{}] Could not play {}: {}", channel, track.title(), reason),
            SessionEvent::Closed {
                channel,
                reason: CloseReason::Exhausted,
            } => format!("[{}] Queue finished.", channel),
            _ => continue,
        };

        if out.send(message).is_err() {
            break;
        }
    }
}
