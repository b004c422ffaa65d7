use thiserror::Error;

#[derive(Debug, Error)]
pub enum MayaError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Language error: {0}")]
    Language(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Reply generation error: {0}")]
    Reply(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Viseme error: {0}")]
    Viseme(String),

    #[error("Document error: {0}")]
    Document(String),

    #[error("Email error: {0}")]
    Email(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MayaError>;
