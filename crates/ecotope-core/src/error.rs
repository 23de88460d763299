//! Error types for Ecotope operations.
//!
//! Only genuine failures live here. A denied spawn, an agent that cannot
//! breed, or a profile key that falls back to its default are ordinary
//! results and never surface as an `EcotopeError`.

use thiserror::Error;

/// Result type for Ecotope operations.
pub type Result<T> = std::result::Result<T, EcotopeError>;

/// Errors that can occur during Ecotope operations.
#[derive(Debug, Error)]
pub enum EcotopeError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// Persistence errors (records, sessions, databases).
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    /// A handle failed while running.
    #[error("handle error: {0}")]
    Handle(#[from] HandleError),
    /// Species registry errors.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Invalid value.
    #[error("invalid value for {field}: {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
    /// Missing required field.
    #[error("missing required field: {0}")]
    MissingField(String),
    /// Out of range.
    #[error("{field} out of range: {value} (must be {min}-{max})")]
    OutOfRange {
        field: String,
        min: f64,
        max: f64,
        value: f64,
    },
    /// The document could not be parsed at all.
    #[error("parse error: {0}")]
    Parse(String),
}

/// Failures raised by a single handle. The engine logs these and skips the
/// handle for the current step only.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HandleError {
    /// The handle reported a failure.
    #[error("handle `{handle}` failed: {message}")]
    Failed { handle: String, message: String },
    /// The handle panicked; the payload message is captured.
    #[error("handle `{handle}` panicked: {message}")]
    Panicked { handle: String, message: String },
    /// The handle's state could not be encoded into its blob.
    #[error("could not encode state for handle `{handle}`: {message}")]
    Encode { handle: String, message: String },
}

/// Persistence errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PersistenceError {
    /// Stored data could not be decoded.
    #[error("record corrupt: {0}")]
    Corrupt(String),
    /// Backing database failure.
    #[error("database error: {0}")]
    Database(String),
    /// Format version mismatch.
    #[error("version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Species registry errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    /// No entry for this species.
    #[error("unknown species: {0}")]
    UnknownSpecies(String),
    /// A profile named a handle that no catalog provides.
    #[error("unknown handle: {0}")]
    UnknownHandle(String),
}

// Convenience constructors
impl EcotopeError {
    pub fn invalid_config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        EcotopeError::Config(ConfigError::InvalidValue {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        })
    }

    pub fn unknown_species(species: impl Into<String>) -> Self {
        EcotopeError::Registry(RegistryError::UnknownSpecies(species.into()))
    }

    pub fn corrupt(msg: impl Into<String>) -> Self {
        EcotopeError::Persistence(PersistenceError::Corrupt(msg.into()))
    }
}

impl HandleError {
    pub fn failed(handle: impl Into<String>, message: impl Into<String>) -> Self {
        HandleError::Failed {
            handle: handle.into(),
            message: message.into(),
        }
    }

    /// Name of the handle that produced this error.
    pub fn handle(&self) -> &str {
        match self {
            HandleError::Failed { handle, .. }
            | HandleError::Panicked { handle, .. }
            | HandleError::Encode { handle, .. } => handle,
        }
    }
}
