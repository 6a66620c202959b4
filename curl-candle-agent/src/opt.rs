//! Optimizers.
use anyhow::Result;
use candle_core::{Tensor, Var};
use candle_nn::Optimizer as _;
use candle_optimisers::adam::{Adam, ParamsAdam};
use serde::{Deserialize, Serialize};

/// Configuration of optimizer for training neural networks in an RL agent.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum OptimizerConfig {
    /// Adam optimizer.
    Adam {
        /// Learning rate.
        lr: f64,

        /// Coefficient of the running average of the gradient.
        #[serde(default = "default_beta1")]
        beta1: f64,

        /// Coefficient of the running average of the squared gradient.
        #[serde(default = "default_beta2")]
        beta2: f64,
    },
}

fn default_beta1() -> f64 {
    ParamsAdam::default().beta_1
}

fn default_beta2() -> f64 {
    ParamsAdam::default().beta_2
}

impl OptimizerConfig {
    /// Adam with the given learning rate and `beta1`, `beta2 = 0.999`.
    pub fn adam(lr: f64, beta1: f64) -> Self {
        Self::Adam {
            lr,
            beta1,
            beta2: default_beta2(),
        }
    }

    /// Constructs the optimizer over the given variables.
    pub fn build(&self, vars: Vec<Var>) -> Result<Optimizer> {
        match &self {
            OptimizerConfig::Adam { lr, beta1, beta2 } => {
                let params = ParamsAdam {
                    lr: *lr,
                    beta_1: *beta1,
                    beta_2: *beta2,
                    ..ParamsAdam::default()
                };
                let opt = Adam::new(vars, params)?;
                Ok(Optimizer::Adam(opt))
            }
        }
    }

    /// Override learning rate.
    pub fn learning_rate(self, lr: f64) -> Self {
        match self {
            Self::Adam { beta1, beta2, .. } => Self::Adam { lr, beta1, beta2 },
        }
    }

    /// Override `beta1`.
    pub fn beta1(self, beta1: f64) -> Self {
        match self {
            Self::Adam { lr, beta2, .. } => Self::Adam { lr, beta1, beta2 },
        }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::adam(1e-3, default_beta1())
    }
}

/// Optimizers.
///
/// A fresh gradient store is built by every backward pass, so there is no
/// gradient to zero between steps. An optimizer only updates the variables it
/// was built with, even if the loss depends on others.
pub enum Optimizer {
    /// Adam optimizer.
    Adam(Adam),
}

impl Optimizer {
    /// Applies a backward step pass.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        match self {
            Self::Adam(opt) => Ok(opt.backward_step(loss)?),
        }
    }
}
