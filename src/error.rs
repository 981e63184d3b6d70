/// Errors surfaced to the serving layer.
#[derive(thiserror::Error, Debug)]
pub enum TtsError {
    #[error("Voice '{0}' is not configured")]
    VoiceNotFound(String),
    #[error("Synthesis failed: {0}")]
    Synthesis(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TtsError {
    pub(crate) fn synthesis(msg: impl Into<String>) -> Self {
        Self::Synthesis(msg.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Errors raised while constructing or invoking a native speech model.
///
/// This is the only error type that crosses the boundary between the engine
/// and a backend; the engine re-expresses it as [`TtsError::Synthesis`].
#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("{0}")]
    Backend(Box<dyn std::error::Error + Send + Sync>),
    #[error("{0}")]
    Message(String),
}

/// Failure reported by the external model resync collaborator.
#[derive(thiserror::Error, Debug)]
#[error("{0}")]
pub struct SyncError(pub String);
