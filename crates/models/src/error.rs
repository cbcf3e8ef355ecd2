use thiserror::Error;

#[derive(Error, Debug)]
pub enum TunesError {
    #[error("Invalid tempo: {bpm} bpm, must be greater than zero")]
    InvalidTempo { bpm: u32 },

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Unknown payload format: {0}")]
    UnknownFormat(String),

    #[error("Unknown mode: {0}")]
    UnknownMode(String),

    #[error("No valid notes found in score")]
    EmptyScore,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Binary encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Audio output error: {0}")]
    Audio(String),
}

impl TunesError {
    /// True when the error means the Redis server could not be reached.
    pub fn is_connection_error(&self) -> bool {
        match self {
            TunesError::Redis(e) => e.is_connection_refusal() || e.is_io_error() || e.is_timeout(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TunesError>;
