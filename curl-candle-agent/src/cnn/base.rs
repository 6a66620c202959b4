use super::PixelEncoderConfig;
use crate::model::SubModel1;
use anyhow::{ensure, Result};
use candle_core::{DType::F32, Device, Tensor, D};
use candle_nn::{
    conv::Conv2dConfig,
    conv2d, linear,
    sequential::{seq, Sequential},
    Init, Module, VarBuilder,
};

const LN_EPS: f64 = 1e-5;

/// Layer normalization over the last axis, built from tracked ops.
///
/// The fused kernel behind `candle_nn::LayerNorm` has no backward pass.
fn layer_norm(xs: &Tensor, weight: &Tensor, bias: &Tensor) -> candle_core::Result<Tensor> {
    let mean = xs.mean_keepdim(D::Minus1)?;
    let xs = xs.broadcast_sub(&mean)?;
    let var = xs.sqr()?.mean_keepdim(D::Minus1)?;
    xs.broadcast_div(&(var + LN_EPS)?.sqrt()?)?
        .broadcast_mul(weight)?
        .broadcast_add(bias)
}

/// Convolutional encoder mapping images `(B, C, H, W)` to features `(B, F)`.
///
/// A stack of 3x3 convolutions is followed by a linear projection, layer
/// normalization and `tanh`, so features lie in `(-1, 1)`.
pub struct PixelEncoder {
    device: Device,
    seq: Sequential,
}

impl PixelEncoder {
    fn stride(s: usize) -> Conv2dConfig {
        Conv2dConfig {
            stride: s,
            ..Default::default()
        }
    }

    fn create_net(vb: &VarBuilder, config: &PixelEncoderConfig) -> Result<Sequential> {
        let n_filters = config.num_filters as usize;
        let normalize = config.normalize;
        let mut net = seq().add_fn(move |xs| match normalize {
            true => xs.to_dtype(F32)? / 255.0,
            false => xs.to_dtype(F32),
        });

        net = net
            .add(conv2d(
                config.in_channels as _,
                n_filters,
                3,
                Self::stride(2),
                vb.pp("c0"),
            )?)
            .add_fn(|xs| xs.relu());
        for i in 1..config.num_layers {
            net = net
                .add(conv2d(
                    n_filters,
                    n_filters,
                    3,
                    Self::stride(1),
                    vb.pp(format!("c{}", i)),
                )?)
                .add_fn(|xs| xs.relu());
        }

        let size = config.conv_out_size() as usize;
        let feature_dim = config.feature_dim as usize;
        let ln_weight = vb
            .pp("ln")
            .get_with_hints(feature_dim, "weight", Init::Const(1.0))?;
        let ln_bias = vb
            .pp("ln")
            .get_with_hints(feature_dim, "bias", Init::Const(0.0))?;
        let net = net
            .add_fn(|xs| xs.flatten_from(1))
            .add(linear(
                n_filters * size * size,
                feature_dim,
                vb.pp("fc"),
            )?)
            .add_fn(move |xs| layer_norm(xs, &ln_weight, &ln_bias))
            .add_fn(|xs| xs.tanh());

        Ok(net)
    }
}

impl SubModel1 for PixelEncoder {
    type Config = PixelEncoderConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, x: &Self::Input) -> Result<Tensor> {
        Ok(self.seq.forward(&x.to_device(&self.device)?)?)
    }

    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self> {
        ensure!(config.num_layers > 0, "num_layers must be positive");
        ensure!(
            config.conv_out_size() > 0,
            "image size {} is too small for {} layers",
            config.image_size,
            config.num_layers
        );
        let device = vb.device().clone();
        let seq = Self::create_net(&vb, &config)?;

        Ok(Self { device, seq })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_nn::VarMap;

    #[test]
    fn test_output_shape_and_range() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, F32, &Device::Cpu);
        let config = PixelEncoderConfig::new(3, 16, 8).num_layers(2).num_filters(4);
        let enc = PixelEncoder::build(vb.pp("encoder"), config)?;

        let obs = Tensor::rand(0f32, 255f32, (5, 3, 16, 16), &Device::Cpu)?;
        let z = enc.forward(&obs)?;
        assert_eq!(z.dims(), &[5, 8]);

        let z = z.flatten_all()?.to_vec1::<f32>()?;
        assert!(z.iter().all(|v| v.abs() <= 1.0));
        Ok(())
    }

    #[test]
    fn test_gradient_reaches_all_layers() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, F32, &Device::Cpu);
        let config = PixelEncoderConfig::new(3, 16, 8).num_layers(2).num_filters(4);
        let enc = PixelEncoder::build(vb.pp("encoder"), config)?;

        let obs = Tensor::rand(0f32, 255f32, (5, 3, 16, 16), &Device::Cpu)?;
        let grads = enc.forward(&obs)?.sqr()?.sum_all()?.backward()?;

        let data = varmap.data().lock().unwrap();
        assert_eq!(data.len(), 8);
        for (name, var) in data.iter() {
            assert!(grads.get(var.as_tensor()).is_some(), "no gradient: {}", name);
        }
        assert!(data.contains_key("encoder.c0.weight"));
        Ok(())
    }

    #[test]
    fn test_layer_norm_standardizes_rows() -> Result<()> {
        let xs = Tensor::new(&[[1f32, 2., 3., 4.], [-2., 0., 2., 8.]], &Device::Cpu)?;
        let ones = Tensor::ones(4, F32, &Device::Cpu)?;
        let zeros = Tensor::zeros(4, F32, &Device::Cpu)?;
        let ys = layer_norm(&xs, &ones, &zeros)?;

        let mean = ys.mean(D::Minus1)?.to_vec1::<f32>()?;
        let var = ys.sqr()?.mean(D::Minus1)?.to_vec1::<f32>()?;
        assert!(mean.iter().all(|m| m.abs() < 1e-5));
        assert!(var.iter().all(|v| (v - 1.0).abs() < 1e-3));

        let shifted = layer_norm(&xs, &(&ones * 2.0)?, &(&zeros + 1.0)?)?;
        let diff = ((&ys * 2.0)? + 1.0)?
            .sub(&shifted)?
            .abs()?
            .sum_all()?
            .to_scalar::<f32>()?;
        assert!(diff < 1e-5);
        Ok(())
    }

    #[test]
    fn test_too_small_image_fails() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, F32, &Device::Cpu);
        let config = PixelEncoderConfig::new(3, 8, 8).num_layers(4);
        assert!(PixelEncoder::build(vb, config).is_err());
    }
}
