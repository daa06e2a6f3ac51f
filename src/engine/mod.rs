pub mod ffmpeg;
pub mod locate;

pub use ffmpeg::FfmpegEngine;

use thiserror::Error;

/// Errors from the transcoding engine boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("ffmpeg binary not found in the app bin directory or on PATH")]
    BinaryNotFound,
    #[error("ffmpeg verification failed: {0}")]
    Verification(String),
    #[error("engine is not loaded")]
    NotLoaded,
    #[error("invalid scratch file name '{0}'")]
    InvalidName(String),
    #[error("scratch file '{0}' not found")]
    MissingFile(String),
    #[error("ffmpeg exited with {status}: {detail}")]
    CommandFailed { status: String, detail: String },
    #[error("ffmpeg produced an empty '{0}'")]
    EmptyOutput(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The boundary to the transcoding capability: a flat name-to-bytes scratch
/// namespace plus command execution. Fractional progress is delivered through
/// the handler registered on the concrete engine.
pub trait MediaEngine: Send {
    fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError>;
    fn exec(&self, args: &[String]) -> Result<(), EngineError>;
    fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError>;
}
