//! Contrastive objective with a bilinear similarity.
use crate::opt::{Optimizer, OptimizerConfig};
use anyhow::Result;
use candle_core::{DType, Device, Tensor, Var, D};
use candle_nn::{init::Init, loss::cross_entropy, VarBuilder, VarMap};

/// Learnable bilinear similarity `W` and its optimizer.
///
/// The optimizer also covers the online encoder, whose variables are given at
/// construction.
pub struct Contrastive {
    device: Device,
    varmap: VarMap,
    w: Tensor,
    opt: Optimizer,
}

impl Contrastive {
    /// Constructs `W` of shape `(z_dim, z_dim)`, initialized uniformly in `[0, 1)`.
    pub fn build(
        z_dim: usize,
        encoder_vars: Vec<Var>,
        opt_config: &OptimizerConfig,
        device: &Device,
    ) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let w = vb.pp("curl").get_with_hints(
            (z_dim, z_dim),
            "W",
            Init::Uniform { lo: 0.0, up: 1.0 },
        )?;
        let mut vars = varmap.all_vars();
        vars.extend(encoder_vars);
        let opt = opt_config.build(vars)?;

        Ok(Self {
            device: device.clone(),
            varmap,
            w,
            opt,
        })
    }

    /// Logits `z_a W z_pos^T` of shape `(B, B)`, each row shifted so its maximum is zero.
    pub fn compute_logits(&self, z_a: &Tensor, z_pos: &Tensor) -> Result<Tensor> {
        let w_z = self.w.matmul(&z_pos.t()?.contiguous()?)?;
        let logits = z_a.matmul(&w_z)?;
        Ok(logits.broadcast_sub(&logits.max_keepdim(D::Minus1)?)?)
    }

    /// Cross entropy of `logits` against labels `0..B`, the matching pair of each row.
    pub fn loss(&self, logits: &Tensor) -> Result<Tensor> {
        let b = logits.dim(0)?;
        let labels = Tensor::arange(0u32, b as u32, &self.device)?;
        Ok(cross_entropy(logits, &labels)?)
    }

    /// Takes an optimization step on `W` and the online encoder.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        self.opt.backward_step(loss)
    }

    /// Variable store holding `W`.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }
}
