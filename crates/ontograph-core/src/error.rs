use thiserror::Error;

pub type Result<T> = std::result::Result<T, OntographError>;

#[derive(Debug, Error)]
pub enum OntographError {
    /// Filesystem failure. Fatal when raised from a store save: silently
    /// losing already-computed graph state is unacceptable.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Capability call failed (transport error, timeout, unparseable
    /// response). Absorbed by the engine: the affected node is finalized
    /// and the run continues.
    #[error("Expander error: {0}")]
    Expander(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Validation error: {0}")]
    Validation(String),
}
