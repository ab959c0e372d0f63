use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlayerError>;

#[derive(Error, Debug)]
pub enum PlayerError {
    // Remontée par les implémentations d'AudioEngine
    #[error("Audio engine error: {0}")]
    Engine(String),
    #[error("Cannot create audio engine: {0}")]
    EngineCreation(String),
    #[error("Invalid source URL: {0:?}")]
    InvalidSource(String),
    #[error("No source is bound to the player")]
    NoSession,
    #[error("Invalid playback position: {0}")]
    InvalidPosition(f64),
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}

impl PlayerError {
    pub fn engine(message: impl Into<String>) -> Self {
        PlayerError::Engine(message.into())
    }
}
