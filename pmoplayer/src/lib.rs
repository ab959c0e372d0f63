//! # pmoplayer - Contrôleur de lecture pour PMOPreview
//!
//! Modélise une session de lecture (source, libellés, position, durée,
//! volume, mute) au-dessus d'un moteur audio abstrait. Le moteur réel
//! (élément média, pipeline natif) implémente [`AudioEngine`] ; le
//! contrôleur applique les règles d'activation des contrôles et la machine
//! à états `Idle → Loading → Paused ⇄ Playing → Ended`.
//!
//! ```rust,no_run
//! use pmoplayer::{PlaybackController, SessionConfig};
//! # fn engine() -> pmoplayer::Result<Box<dyn pmoplayer::AudioEngine>> { unimplemented!() }
//!
//! # fn main() -> pmoplayer::Result<()> {
//! let mut player = PlaybackController::from_config(engine)?;
//! player.start_session(
//!     SessionConfig::new("http://localhost:8080/api/relay/stream?url=https://cdn/track.flac")
//!         .with_title("So What")
//!         .with_artist("Miles Davis"),
//! )?;
//!
//! // boucle de l'hôte
//! player.pump_events();
//! player.toggle_play_pause()?;
//! # Ok(())
//! # }
//! ```

pub mod controller;
pub mod engine;
pub mod errors;
pub mod session;
pub mod time_utils;

pub use controller::{ControlAvailability, ControlOutcome, PlaybackController, PlayerSnapshot};
pub use engine::{AudioEngine, EngineEvent, EngineEventBus, EngineFactory, EngineSubscription};
pub use errors::{PlayerError, Result};
pub use session::{PlaybackSession, PlayerState, SessionConfig};
pub use time_utils::format_clock;
