//! Convolutional encoder for pixel observations.
mod base;
mod config;
pub use base::PixelEncoder;
pub use config::PixelEncoderConfig;
