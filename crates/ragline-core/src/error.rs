//! Error taxonomy shared by every ragline component.
//!
//! Only one failure is tolerated locally: a single file failing during a
//! directory scan. Everything else propagates to the pipeline boundary,
//! where hosts map the variant to a status code or exit message.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A file extension or source shape no loader handles.
    #[error("unsupported source kind: {0}")]
    UnsupportedSourceKind(String),

    /// Underlying loader failure (I/O, parse, fetch).
    #[error("failed to load {location}: {message}")]
    LoadFailure { location: String, message: String },

    /// Search was requested but no collection exists to load.
    #[error("vector store not initialized: no persisted collection found")]
    StoreNotInitialized,

    #[error("configuration error: {0}")]
    Configuration(String),

    /// Embedding or generation call failed. Never retried.
    #[error("provider error: {0}")]
    Provider(String),

    #[error("embedding dimension mismatch: collection expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn load_failure(location: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::LoadFailure {
            location: location.into(),
            message: message.to_string(),
        }
    }

    pub fn provider(err: impl std::fmt::Display) -> Self {
        Error::Provider(err.to_string())
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        Error::Storage(err.to_string())
    }

    /// Machine-readable error code. The HTTP API returns it verbatim and
    /// derives the response status from it.
    ///
    /// | Code | Variants |
    /// |------|----------|
    /// | `bad_request` | `UnsupportedSourceKind` |
    /// | `not_initialized` | `StoreNotInitialized` |
    /// | `load_failure` | `LoadFailure`, `Io` |
    /// | `provider_error` | `Provider` |
    /// | `internal` | `Configuration`, `DimensionMismatch`, `Storage` |
    pub fn code(&self) -> &'static str {
        match self {
            Error::UnsupportedSourceKind(_) => "bad_request",
            Error::LoadFailure { .. } | Error::Io(_) => "load_failure",
            Error::StoreNotInitialized => "not_initialized",
            Error::Provider(_) => "provider_error",
            Error::Configuration(_) | Error::DimensionMismatch { .. } | Error::Storage(_) => {
                "internal"
            }
        }
    }
}
