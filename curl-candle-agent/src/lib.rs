//! CURL agent implemented with [candle](https://crates.io/crates/candle-core).
//!
//! [`Curl`] trains a soft actor-critic on pixel observations together with a
//! contrastive objective on the shared image encoder.
pub mod cnn;
pub mod curl;
pub mod mlp;
pub mod model;
pub mod opt;
pub mod util;
use candle_core::DeviceLocation;
pub use curl::{Curl, CurlConfig};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// GPU device with the given ordinal.
    Cuda(usize),

    /// Metal device with the given ordinal.
    Metal(usize),
}

impl From<candle_core::Device> for Device {
    fn from(device: candle_core::Device) -> Self {
        match device.location() {
            DeviceLocation::Cpu => Self::Cpu,
            DeviceLocation::Cuda { gpu_id } => Self::Cuda(gpu_id),
            DeviceLocation::Metal { gpu_id } => Self::Metal(gpu_id),
        }
    }
}

impl TryFrom<Device> for candle_core::Device {
    type Error = candle_core::Error;

    fn try_from(device: Device) -> Result<Self, Self::Error> {
        match device {
            Device::Cpu => Ok(candle_core::Device::Cpu),
            Device::Cuda(n) => candle_core::Device::new_cuda(n),
            Device::Metal(n) => candle_core::Device::new_metal(n),
        }
    }
}
