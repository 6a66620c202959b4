//! Entropy temperature, optimized in log-space.
use crate::opt::{Optimizer, OptimizerConfig};
use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::{init::Init, VarBuilder, VarMap};
use log::info;

/// The entropy temperature `alpha = exp(log_alpha)`.
pub struct Temperature {
    varmap: VarMap,
    log_alpha: Tensor,
    target_entropy: f64,
    opt: Optimizer,
}

impl Temperature {
    /// Constructs the temperature with `log_alpha = ln(init_temperature)`.
    pub fn new(
        init_temperature: f64,
        target_entropy: f64,
        opt_config: &OptimizerConfig,
        device: &Device,
    ) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let log_alpha = vb.get_with_hints(1, "log_alpha", Init::Const(init_temperature.ln()))?;
        let opt = opt_config.build(varmap.all_vars())?;
        info!(
            "Initial temperature {}, target entropy {}",
            init_temperature, target_entropy
        );

        Ok(Self {
            varmap,
            log_alpha,
            target_entropy,
            opt,
        })
    }

    /// Returns the temperature with shape `(1,)`, without gradient.
    pub fn alpha(&self) -> Result<Tensor> {
        Ok(self.log_alpha.detach().exp()?)
    }

    /// Returns the temperature as a scalar.
    pub fn alpha_value(&self) -> Result<f32> {
        Ok(self.alpha()?.squeeze(0)?.to_scalar::<f32>()?)
    }

    /// Target of the policy entropy.
    pub fn target_entropy(&self) -> f64 {
        self.target_entropy
    }

    /// `mean(alpha * (-log_pi - target_entropy))`, the gradient only flows into
    /// `log_alpha`.
    pub fn loss(&self, log_pi: &Tensor) -> Result<Tensor> {
        let gap = ((log_pi.detach() * -1f64)? - self.target_entropy)?;
        Ok(self.log_alpha.exp()?.broadcast_mul(&gap)?.mean_all()?)
    }

    /// Takes an optimization step on `log_alpha` and returns the loss.
    pub fn update(&mut self, log_pi: &Tensor) -> Result<f32> {
        let loss = self.loss(log_pi)?;
        self.opt.backward_step(&loss)?;
        Ok(loss.to_scalar::<f32>()?)
    }

    /// Variable store holding `log_alpha`.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }
}
