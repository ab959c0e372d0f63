//! Contrôleur de lecture
//!
//! Machine à états d'une session de lecture unique :
//!
//! ```text
//! Idle ─assign_source─▶ Loading ─metadata─▶ Paused ⇄ Playing ─ended─▶ Ended
//!                          ▲                                            │
//!                          └──────────── assign_source ─────────────────┤
//!                                               Paused ◀──── seek ──────┘
//! ```
//!
//! Le contrôleur est mono-thread : les événements du moteur s'accumulent
//! dans l'abonnement de la source courante et sont appliqués par
//! [`PlaybackController::pump_events`] sur le contexte de l'appelant.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::engine::{AudioEngine, EngineEvent, EngineFactory, EngineSubscription};
use crate::errors::{PlayerError, Result};
use crate::session::{DEFAULT_VOLUME, PlaybackSession, PlayerState, SessionConfig, sanitize_volume};
use crate::time_utils::format_clock;

/// Résultat d'une commande utilisateur
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    Applied,
    /// Contrôle désactivé dans l'état courant, rien n'a été fait
    Disabled,
}

/// Contrôles activés dans l'état courant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlAvailability {
    pub play_pause: bool,
    pub seek: bool,
    pub jump_to_start: bool,
    pub jump_to_end: bool,
    pub volume: bool,
    pub mute: bool,
}

/// Vue sérialisable de l'état du lecteur
#[derive(Debug, Clone, Serialize)]
pub struct PlayerSnapshot {
    pub state: PlayerState,
    pub source_url: Option<String>,
    pub track_title: String,
    pub artist_name: String,
    pub album_name: String,
    pub is_playing: bool,
    pub is_loading: bool,
    pub current_position: f64,
    pub duration: f64,
    pub volume: f64,
    pub is_muted: bool,
    pub position_label: String,
    pub duration_label: String,
    pub controls: ControlAvailability,
}

/// Moteur lié à la source courante et son abonnement
struct Binding {
    engine: Box<dyn AudioEngine>,
    events: EngineSubscription,
}

impl Binding {
    /// Désabonnement, pause puis libération du moteur
    fn teardown(self) {
        let Binding { engine, events } = self;
        drop(events);
        if let Err(e) = engine.pause() {
            warn!("Failed to pause engine during teardown: {}", e);
        }
        engine.release();
    }
}

pub struct PlaybackController {
    factory: Box<dyn EngineFactory>,
    binding: Option<Binding>,
    session: PlaybackSession,
}

impl PlaybackController {
    pub fn new(factory: impl EngineFactory + 'static) -> Self {
        Self::with_volume(factory, DEFAULT_VOLUME)
    }

    pub fn with_volume(factory: impl EngineFactory + 'static, volume: f64) -> Self {
        Self {
            factory: Box::new(factory),
            binding: None,
            session: PlaybackSession::idle(volume),
        }
    }

    /// Volume initial lu dans `player.default_volume`
    pub fn from_config(factory: impl EngineFactory + 'static) -> Result<Self> {
        let volume = pmoconfig::get_config().get_player_default_volume()?;
        Ok(Self::with_volume(factory, volume))
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn state(&self) -> PlayerState {
        self.session.state()
    }

    /// Lie une nouvelle source au contrôleur
    ///
    /// La source précédente est détachée avant la création du nouveau
    /// moteur : aucun de ses événements ne peut plus atteindre la session.
    /// En cas d'échec du nouveau moteur, le contrôleur revient à `Idle`.
    /// Une URL vide est refusée et la session courante reste intacte.
    pub fn assign_source(&mut self, config: SessionConfig, volume: f64) -> Result<()> {
        if config.source_url.trim().is_empty() {
            return Err(PlayerError::InvalidSource(config.source_url));
        }
        self.detach();
        self.session.reset_for(config, volume);

        match self.bind() {
            Ok(binding) => {
                info!(
                    "Source assigned: {} ({} - {})",
                    self.session.source_url().unwrap_or_default(),
                    self.session.artist_name(),
                    self.session.track_title()
                );
                self.binding = Some(binding);
                Ok(())
            }
            Err(e) => {
                warn!("Cannot bind source: {}", e);
                self.session.clear();
                Err(e)
            }
        }
    }

    /// [`assign_source`](Self::assign_source) avec le volume courant
    pub fn start_session(&mut self, config: SessionConfig) -> Result<()> {
        let volume = self.session.volume();
        self.assign_source(config, volume)
    }

    fn bind(&self) -> Result<Binding> {
        let url = self.session.source_url().ok_or(PlayerError::NoSession)?;
        let engine = self.factory.create()?;
        let events = engine.subscribe();
        let binding = Binding { engine, events };

        let configured = binding
            .engine
            .set_source(url)
            .and_then(|_| binding.engine.set_volume(self.session.volume()))
            .and_then(|_| binding.engine.set_muted(self.session.is_muted()));

        match configured {
            Ok(()) => Ok(binding),
            Err(e) => {
                binding.engine.release();
                Err(e)
            }
        }
    }

    fn detach(&mut self) {
        if let Some(binding) = self.binding.take() {
            debug!("Detaching previous source");
            binding.teardown();
        }
    }

    /// Applique les événements en attente de la source courante
    ///
    /// Retourne le nombre d'événements traités.
    pub fn pump_events(&mut self) -> usize {
        let events = match &self.binding {
            Some(binding) => binding.events.drain(),
            None => return 0,
        };

        let count = events.len();
        for event in events {
            match event {
                EngineEvent::MetadataLoaded { duration } => self.on_metadata_available(duration),
                EngineEvent::TimeUpdate { position } => self.on_position_update(position),
                EngineEvent::Ended => self.on_playback_ended(),
            }
        }
        count
    }

    pub fn on_metadata_available(&mut self, duration: f64) {
        if self.binding.is_none() {
            return;
        }
        let duration = if duration.is_finite() && duration > 0.0 {
            duration
        } else {
            0.0
        };
        debug!("Metadata loaded, duration {}", format_clock(duration));

        self.session.duration = duration;
        self.session.is_loading = false;
        self.session.position = self.session.clamp_position(self.session.position);
    }

    pub fn on_position_update(&mut self, position: f64) {
        if self.binding.is_none() || !position.is_finite() {
            return;
        }
        self.session.position = self.session.clamp_position(position);
    }

    pub fn on_playback_ended(&mut self) {
        if self.binding.is_none() {
            return;
        }
        debug!("Playback ended");
        self.session.is_playing = false;
        self.session.position = 0.0;
        self.session.ended = true;
    }

    pub fn controls(&self) -> ControlAvailability {
        let state = self.state();
        let ready = !matches!(state, PlayerState::Idle | PlayerState::Loading);
        let bound = state != PlayerState::Idle;

        ControlAvailability {
            play_pause: ready,
            seek: ready,
            jump_to_start: ready,
            jump_to_end: ready && self.session.duration() > 0.0,
            volume: bound,
            mute: bound,
        }
    }

    fn engine(&self) -> Result<&dyn AudioEngine> {
        self.binding
            .as_ref()
            .map(|b| b.engine.as_ref())
            .ok_or(PlayerError::NoSession)
    }

    pub fn toggle_play_pause(&mut self) -> Result<ControlOutcome> {
        if !self.controls().play_pause {
            return Ok(ControlOutcome::Disabled);
        }

        if self.session.is_playing() {
            self.engine()?.pause()?;
            self.session.is_playing = false;
        } else {
            self.engine()?.play()?;
            self.session.is_playing = true;
            self.session.ended = false;
        }
        Ok(ControlOutcome::Applied)
    }

    /// Déplace la tête de lecture ; la position est mise à jour sans attendre
    /// le moteur
    pub fn seek(&mut self, position: f64) -> Result<ControlOutcome> {
        if !self.controls().seek {
            return Ok(ControlOutcome::Disabled);
        }
        if !position.is_finite() {
            return Err(PlayerError::InvalidPosition(position));
        }

        let position = self.session.clamp_position(position);
        self.engine()?.seek(position)?;
        self.session.position = position;
        self.session.ended = false;
        Ok(ControlOutcome::Applied)
    }

    pub fn jump_to_start(&mut self) -> Result<ControlOutcome> {
        if !self.controls().jump_to_start {
            return Ok(ControlOutcome::Disabled);
        }
        self.seek(0.0)
    }

    pub fn jump_to_end(&mut self) -> Result<ControlOutcome> {
        if !self.controls().jump_to_end {
            return Ok(ControlOutcome::Disabled);
        }
        let duration = self.session.duration();
        self.seek(duration)
    }

    /// Change le volume ; un volume non nul lève le mute
    pub fn set_volume(&mut self, volume: f64) -> Result<ControlOutcome> {
        if !self.controls().volume {
            return Ok(ControlOutcome::Disabled);
        }
        let volume = sanitize_volume(volume, self.session.volume());

        self.engine()?.set_volume(volume)?;
        self.session.volume = volume;

        if volume > 0.0 && self.session.is_muted() {
            self.engine()?.set_muted(false)?;
            self.session.is_muted = false;
        }
        Ok(ControlOutcome::Applied)
    }

    /// Bascule le mute sans modifier le volume
    pub fn toggle_mute(&mut self) -> Result<ControlOutcome> {
        if !self.controls().mute {
            return Ok(ControlOutcome::Disabled);
        }
        let muted = !self.session.is_muted();
        self.engine()?.set_muted(muted)?;
        self.session.is_muted = muted;
        Ok(ControlOutcome::Applied)
    }

    /// Détache la source courante et revient à `Idle`
    pub fn close(&mut self) {
        if self.binding.is_some() {
            info!("Closing player");
        }
        self.detach();
        self.session.clear();
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        let s = &self.session;
        PlayerSnapshot {
            state: s.state(),
            source_url: s.source_url.clone(),
            track_title: s.track_title.clone(),
            artist_name: s.artist_name.clone(),
            album_name: s.album_name.clone(),
            is_playing: s.is_playing,
            is_loading: s.is_loading,
            current_position: s.position,
            duration: s.duration,
            volume: s.volume,
            is_muted: s.is_muted,
            position_label: format_clock(s.position),
            duration_label: format_clock(s.duration),
            controls: self.controls(),
        }
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.detach();
    }
}
