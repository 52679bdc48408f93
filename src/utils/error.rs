use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ApngError {
    NotFound(PathBuf),
    IoError(io::Error),
    UnexpectedEnd { needed: usize, remaining: u64 },
    NotAPng,
    MalformedStream(String),
    InvalidDimensions { width: u32, height: u32 },
    CorruptChunk { chunk: String, expected: u32, actual: u32 },
    SequenceOrderError { expected: u32, found: u32 },
    DecompressionError(String),
    FilterReconstructionError(String),
    NoMoreFrames,
}

/// Coarse classification of an [`ApngError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input could not be read at all.
    Input,
    /// The stream is rejected as a whole.
    Structural,
    /// The frame being assembled could not be rebuilt.
    Reconstruction,
    /// `next_frame` was called after the last frame.
    Exhausted,
}

impl ApngError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApngError::NotFound(_) | ApngError::IoError(_) => ErrorKind::Input,
            ApngError::UnexpectedEnd { .. }
            | ApngError::NotAPng
            | ApngError::MalformedStream(_)
            | ApngError::InvalidDimensions { .. }
            | ApngError::CorruptChunk { .. }
            | ApngError::SequenceOrderError { .. } => ErrorKind::Structural,
            ApngError::DecompressionError(_) | ApngError::FilterReconstructionError(_) => {
                ErrorKind::Reconstruction
            }
            ApngError::NoMoreFrames => ErrorKind::Exhausted,
        }
    }
}

impl Error for ApngError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ApngError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for ApngError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ApngError::NotFound(path) => write!(f, "File not found: {}", path.display()),
            ApngError::IoError(err) => write!(f, "I/O error: {}", err),
            ApngError::UnexpectedEnd { needed, remaining } => {
                write!(f, "Unexpected end of input: needed {} bytes, {} remaining", needed, remaining)
            }
            ApngError::NotAPng => write!(f, "Not a PNG stream: signature mismatch"),
            ApngError::MalformedStream(msg) => write!(f, "Malformed stream: {}", msg),
            ApngError::InvalidDimensions { width, height } => {
                write!(f, "Invalid image dimensions: {}x{}", width, height)
            }
            ApngError::CorruptChunk { chunk, expected, actual } => write!(
                f,
                "CRC mismatch in chunk {}: expected 0x{:08x}, calculated 0x{:08x}",
                chunk, expected, actual
            ),
            ApngError::SequenceOrderError { expected, found } => {
                write!(f, "Sequence number out of order: expected {}, found {}", expected, found)
            }
            ApngError::DecompressionError(msg) => write!(f, "Decompression failed: {}", msg),
            ApngError::FilterReconstructionError(msg) => write!(f, "Scanline reconstruction failed: {}", msg),
            ApngError::NoMoreFrames => write!(f, "No more frames"),
        }
    }
}

impl From<io::Error> for ApngError {
    fn from(error: io::Error) -> Self {
        ApngError::IoError(error)
    }
}

// Result type alias for loader operations
pub type ApngResult<T> = Result<T, ApngError>;
