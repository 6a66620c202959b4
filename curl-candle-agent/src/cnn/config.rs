use crate::util::OutDim;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`PixelEncoder`](super::PixelEncoder).
pub struct PixelEncoderConfig {
    /// Number of input channels, e.g. `3 * frame_stack`.
    pub in_channels: i64,

    /// Side length of the (square) input image.
    pub image_size: i64,

    /// Number of convolutional layers. The first one has stride 2.
    pub num_layers: usize,

    /// Number of filters of every convolutional layer.
    pub num_filters: i64,

    /// Dimension of the output features.
    pub feature_dim: i64,

    /// If `true`, pixel values are divided by 255.
    pub normalize: bool,
}

impl Default for PixelEncoderConfig {
    fn default() -> Self {
        Self {
            in_channels: 9,
            image_size: 84,
            num_layers: 4,
            num_filters: 32,
            feature_dim: 50,
            normalize: true,
        }
    }
}

impl PixelEncoderConfig {
    /// Creates configuration of the encoder.
    pub fn new(in_channels: i64, image_size: i64, feature_dim: i64) -> Self {
        Self {
            in_channels,
            image_size,
            feature_dim,
            ..Default::default()
        }
    }

    /// Sets the number of convolutional layers.
    pub fn num_layers(mut self, v: usize) -> Self {
        self.num_layers = v;
        self
    }

    /// Sets the number of filters.
    pub fn num_filters(mut self, v: i64) -> Self {
        self.num_filters = v;
        self
    }

    /// Sets if pixel values are scaled into `[0, 1]`.
    pub fn normalize(mut self, v: bool) -> Self {
        self.normalize = v;
        self
    }

    /// Side length of the feature map after the last convolution.
    ///
    /// All kernels are 3x3 without padding, the first layer has stride 2.
    pub fn conv_out_size(&self) -> i64 {
        let first = (self.image_size - 3) / 2 + 1;
        first - 2 * (self.num_layers as i64 - 1)
    }
}

impl OutDim for PixelEncoderConfig {
    fn get_out_dim(&self) -> i64 {
        self.feature_dim
    }

    fn set_out_dim(&mut self, v: i64) {
        self.feature_dim = v;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_conv_out_size() {
        // 84 -> 41 -> 39 -> 37 -> 35
        assert_eq!(PixelEncoderConfig::default().conv_out_size(), 35);
        assert_eq!(
            PixelEncoderConfig::new(3, 16, 8).num_layers(2).conv_out_size(),
            5
        );
    }
}
