//! Error types for the cipher engine

use thiserror::Error;

/// Errors from cipher engine construction and transforms
#[derive(Debug, Error)]
pub enum CipherError {
    /// Key is not one of the AES key sizes (16, 24, or 32 bytes)
    #[error("unsupported key length: {len} bytes (expected 16, 24, or 32)")]
    UnsupportedKeyLength {
        /// Length of the rejected key in bytes
        len: usize,
    },

    /// Transform length is not a whole number of cipher blocks
    #[error("length {len} is not a multiple of the cipher block size")]
    UnalignedLength {
        /// Length of the rejected request in bytes
        len: usize,
    },

    /// Source and destination buffers differ in length
    #[error("source length {src} does not match destination length {dest}")]
    LengthMismatch {
        /// Source buffer length
        src: usize,
        /// Destination buffer length
        dest: usize,
    },

    /// Explicit engine geometry failed validation
    #[error("invalid engine geometry: {reason}")]
    InvalidGeometry {
        /// What was wrong with the requested geometry
        reason: String,
    },

    /// A producer thread could not be spawned; the engine refuses to run
    /// under-provisioned and construction fails as a whole
    #[error("failed to spawn keystream producer {worker}: {source}")]
    WorkerSpawn {
        /// Index of the worker that failed to spawn
        worker: usize,
        /// Underlying OS error
        source: std::io::Error,
    },
}

impl CipherError {
    /// Returns true if this error is fatal (unrecoverable)
    ///
    /// Fatal errors mean no usable cipher context exists or can exist.
    /// Non-fatal errors are caller mistakes on an otherwise healthy engine.
    pub fn is_fatal(&self) -> bool {
        match self {
            // No context can be constructed - fatal
            Self::UnsupportedKeyLength { .. } => true,
            Self::InvalidGeometry { .. } => true,
            Self::WorkerSpawn { .. } => true,

            // Bad call arguments - the engine state is untouched
            Self::UnalignedLength { .. } => false,
            Self::LengthMismatch { .. } => false,
        }
    }
}
