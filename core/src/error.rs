use thiserror::Error;

/// Errors outside the normal rejection channel: boot-time configuration
/// problems and caller-contract violations (asking for a zone that does
/// not exist). Policy rejections use `SpawnRejection` / `MineRejection`.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Zone '{zone_id}' not found")]
    ZoneNotFound { zone_id: String },

    #[error("Zone '{zone_id}' lost its tick source; build a new scheduler")]
    TickSourceLost { zone_id: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SimError {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig { reason: reason.into() }
    }
}

pub type SimResult<T> = Result<T, SimError>;
