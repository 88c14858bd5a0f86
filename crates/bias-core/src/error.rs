use thiserror::Error;

#[derive(Error, Debug)]
pub enum BiasError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Source error: {0}")]
    SourceError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("State conflict: {0}")]
    StateConflict(String),

    #[error("Unknown circuit breaker trigger: {0}")]
    UnknownTrigger(String),

    #[error("Unknown bias level: {0}")]
    UnknownBiasLevel(String),
}
