use thiserror::Error;

/// Top-level error type for the printqc system.
///
/// Each subsystem crate defines its own error type and implements
/// `From<SubsystemError> for PrintQcError` so that the `?` operator works
/// across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PrintQcError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Batch error: {0}")]
    Batch(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Listener error: {0}")]
    Listener(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for PrintQcError {
    fn from(err: toml::de::Error) -> Self {
        PrintQcError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for PrintQcError {
    fn from(err: toml::ser::Error) -> Self {
        PrintQcError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for PrintQcError {
    fn from(err: serde_json::Error) -> Self {
        PrintQcError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for printqc operations.
pub type Result<T> = std::result::Result<T, PrintQcError>;
