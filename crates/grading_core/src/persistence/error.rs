use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),

    #[error("Decompression error")]
    Decompression,

    #[error("Corrupted data: {0}")]
    Corrupted(String),

    #[error("Version mismatch: found {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("Checksum mismatch")]
    ChecksumMismatch,

    #[error("Write rejected: {0}")]
    Rejected(String),
}

impl PersistenceError {
    /// Transient failures a caller may retry. Damaged or incompatible data is not.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PersistenceError::Io(_) | PersistenceError::Rejected(_))
    }
}
