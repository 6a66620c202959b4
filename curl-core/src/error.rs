//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug)]
pub enum CurlError {
    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// The crop window does not fit into the image.
    #[error("Crop size {size} exceeds image size {height}x{width}")]
    InvalidCropSize {
        /// Requested side length of the crop.
        size: usize,
        /// Height of the image.
        height: usize,
        /// Width of the image.
        width: usize,
    },
}
