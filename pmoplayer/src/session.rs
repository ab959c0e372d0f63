//! Session de lecture : état observable d'une source liée au contrôleur

use serde::Serialize;

pub const UNKNOWN_TRACK: &str = "Unknown Track";
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Volume d'une session quand la configuration n'en fournit pas
pub const DEFAULT_VOLUME: f64 = 0.8;

/// Source à lire et libellés affichés
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub source_url: String,
    pub track_title: Option<String>,
    pub artist_name: Option<String>,
    pub album_name: Option<String>,
}

impl SessionConfig {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            track_title: None,
            artist_name: None,
            album_name: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.track_title = Some(title.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist_name = Some(artist.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album_name = Some(album.into());
        self
    }
}

/// État dérivé de la session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    Idle,
    Loading,
    Paused,
    Playing,
    Ended,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    pub(crate) source_url: Option<String>,
    pub(crate) track_title: String,
    pub(crate) artist_name: String,
    pub(crate) album_name: String,
    pub(crate) is_playing: bool,
    pub(crate) is_loading: bool,
    pub(crate) ended: bool,
    pub(crate) position: f64,
    pub(crate) duration: f64,
    pub(crate) volume: f64,
    pub(crate) is_muted: bool,
}

impl PlaybackSession {
    pub(crate) fn idle(volume: f64) -> Self {
        Self {
            source_url: None,
            track_title: UNKNOWN_TRACK.to_string(),
            artist_name: UNKNOWN_ARTIST.to_string(),
            album_name: UNKNOWN_ALBUM.to_string(),
            is_playing: false,
            is_loading: false,
            ended: false,
            position: 0.0,
            duration: 0.0,
            volume: sanitize_volume(volume, DEFAULT_VOLUME),
            is_muted: false,
        }
    }

    /// Réinitialise la session pour une nouvelle source (mute conservé)
    pub(crate) fn reset_for(&mut self, config: SessionConfig, volume: f64) {
        let label = |value: Option<String>, default: &str| {
            value
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        self.track_title = label(config.track_title, UNKNOWN_TRACK);
        self.artist_name = label(config.artist_name, UNKNOWN_ARTIST);
        self.album_name = label(config.album_name, UNKNOWN_ALBUM);
        self.source_url = Some(config.source_url);
        self.is_playing = false;
        self.is_loading = true;
        self.ended = false;
        self.position = 0.0;
        self.duration = 0.0;
        self.volume = sanitize_volume(volume, self.volume);
    }

    /// Retour à l'état sans source ; volume et mute sont conservés
    pub(crate) fn clear(&mut self) {
        let (volume, muted) = (self.volume, self.is_muted);
        *self = Self::idle(volume);
        self.is_muted = muted;
    }

    pub fn state(&self) -> PlayerState {
        if self.source_url.is_none() {
            PlayerState::Idle
        } else if self.is_loading {
            PlayerState::Loading
        } else if self.ended {
            PlayerState::Ended
        } else if self.is_playing {
            PlayerState::Playing
        } else {
            PlayerState::Paused
        }
    }

    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    pub fn track_title(&self) -> &str {
        &self.track_title
    }

    pub fn artist_name(&self) -> &str {
        &self.artist_name
    }

    pub fn album_name(&self) -> &str {
        &self.album_name
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn current_position(&self) -> f64 {
        self.position
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.is_muted
    }

    /// Borne `t` à `[0, duration]` une fois la durée connue
    pub(crate) fn clamp_position(&self, t: f64) -> f64 {
        let t = t.max(0.0);
        if self.duration > 0.0 {
            t.min(self.duration)
        } else {
            t
        }
    }
}

/// Volume dans `[0, 1]`, `fallback` si la valeur n'est pas finie
pub(crate) fn sanitize_volume(volume: f64, fallback: f64) -> f64 {
    if volume.is_finite() {
        volume.clamp(0.0, 1.0)
    } else {
        fallback
    }
}
