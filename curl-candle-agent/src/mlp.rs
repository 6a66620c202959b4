//! Multilayer perceptron.
mod base;
mod config;
mod mlp2;
use anyhow::Result;
pub use base::Mlp;
use candle_core::Tensor;
use candle_nn::{linear, Linear, Module, VarBuilder};
pub use config::MlpConfig;
pub use mlp2::Mlp2;

/// Applies `layers` with ReLU between them. No activation follows the last layer.
fn mlp_forward(xs: Tensor, layers: &[Linear]) -> Result<Tensor> {
    let mut xs = xs;
    for (i, layer) in layers.iter().enumerate() {
        xs = layer.forward(&xs)?;
        if i + 1 < layers.len() {
            xs = xs.relu()?;
        }
    }
    Ok(xs)
}

/// Linear layers `dims[0] -> dims[1] -> ...` named `{prefix}.ln{i}`.
fn create_linear_layers(prefix: &str, vb: &VarBuilder, dims: &[i64]) -> Result<Vec<Linear>> {
    let vb = vb.pp(prefix);
    dims.windows(2)
        .enumerate()
        .map(|(i, w)| -> Result<Linear> {
            Ok(linear(w[0] as _, w[1] as _, vb.pp(format!("ln{}", i)))?)
        })
        .collect()
}
