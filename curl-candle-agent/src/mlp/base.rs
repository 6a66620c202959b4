use super::{create_linear_layers, mlp_forward, MlpConfig};
use crate::model::SubModel2;
use anyhow::Result;
use candle_core::{Device, Tensor, D};
use candle_nn::{Linear, VarBuilder};

/// Multilayer perceptron with ReLU activation function.
///
/// As a [`SubModel2`] it concatenates its two inputs along the last axis, which
/// makes it a Q head taking `(features, action)`.
pub struct Mlp {
    config: MlpConfig,
    device: Device,
    layers: Vec<Linear>,
}

impl SubModel2 for Mlp {
    type Config = MlpConfig;
    type Input1 = Tensor;
    type Input2 = Tensor;
    type Output = Tensor;

    fn forward(&self, input1: &Self::Input1, input2: &Self::Input2) -> Result<Tensor> {
        let input1 = input1.to_device(&self.device)?;
        let input2 = input2.to_device(&self.device)?;
        let input = Tensor::cat(&[input1, input2], D::Minus1)?;
        let xs = mlp_forward(input, &self.layers)?;

        match self.config.activation_out {
            false => Ok(xs),
            true => Ok(xs.relu()?),
        }
    }

    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self> {
        let device = vb.device().clone();
        let mut dims = vec![config.in_dim];
        dims.extend(&config.units);
        dims.push(config.out_dim);
        let layers = create_linear_layers("mlp", &vb, &dims)?;

        Ok(Self {
            config,
            device,
            layers,
        })
    }
}
