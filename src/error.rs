use thiserror::Error;

/// Pipeline-wide error type.
///
/// Failures in the matrix kernel, preprocessor, deskewer and line detector
/// are fatal to the current image. `EmptyAfterStrip` is special: when it
/// hits a single letter tile the caller degrades to `'?'` for that position
/// instead of aborting the whole page.
#[derive(Debug, Error)]
pub enum Error {
    /// Unreadable file, unsupported channel count, even kernel size,
    /// non-positive sigma, shape mismatch.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The detected lines do not form two orthogonal pencils, or their
    /// intersections are degenerate.
    #[error("grid geometry failure: {0}")]
    Geometry(String),

    /// A letter tile became empty after outer zero rows/columns were
    /// removed.
    #[error("tile is empty after margin stripping")]
    EmptyAfterStrip,

    /// Truncated model file or unexpected layer geometry.
    #[error("model load failed: {0}")]
    ModelLoad(String),

    /// A requested buffer is too large to address.
    #[error("resource exhaustion: {0}")]
    ResourceExhaustion(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, Error>;
