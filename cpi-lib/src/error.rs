use std::array::TryFromSliceError;
use std::io;
use thiserror::Error;

/// The primary error type for the `cpi-lib` library.
///
/// Malformed or truncated input containers are not errors: the chunk
/// decoder stops early and returns what it found.
#[derive(Error, Debug)]
pub enum CpiError {
    /// Device-lock key derivation was given an empty identifier.
    #[error("Device identifier is empty; cannot derive device-lock key")]
    EmptyDeviceId,

    #[error("Cipher input is not a multiple of the 8-byte block size: {len} bytes")]
    Unaligned { len: usize },

    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid container: {0}")]
    InvalidContainer(String),

    #[error("Random source error: {0}")]
    Random(#[from] rand::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<TryFromSliceError> for CpiError {
    fn from(_: TryFromSliceError) -> Self {
        CpiError::InvalidContainer("Failed to convert slice to array".to_string())
    }
}
