//! Error taxonomy for opening and reading WAV streams.
//!
//! All of these are file-level failures: the engine logs them and moves on,
//! they never stop the background worker.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WavError {
    /// The requested file does not exist.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Header magic mismatch, unsupported encoding or layout, or no data chunk.
    #[error("invalid WAV format: {0}")]
    InvalidFormat(&'static str),

    /// The storage device reported an I/O failure.
    #[error("storage fault: {0}")]
    StorageFault(#[from] io::Error),
}

impl WavError {
    /// Map an `open()` failure, keeping "missing file" distinct from other I/O errors.
    pub(crate) fn from_open(path: PathBuf, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            WavError::NotFound(path)
        } else {
            WavError::StorageFault(err)
        }
    }
}

pub type WavResult<T> = std::result::Result<T, WavError>;
