//! Squashed Gaussian policy on encoder features.
use crate::{
    model::SubModel1,
    opt::{Optimizer, OptimizerConfig},
    util::OutDim,
};
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor, D};
use candle_nn::{VarBuilder, VarMap};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

const LOG_2PI: f64 = 1.8378770664093453;

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`GaussianActor`].
pub struct GaussianActorConfig<P: OutDim> {
    /// Configuration of the policy head.
    pub policy_config: Option<P>,

    /// Configuration of the optimizer.
    pub opt_config: OptimizerConfig,

    /// Lower bound of log std.
    pub min_log_std: f64,

    /// Upper bound of log std.
    pub max_log_std: f64,
}

impl<P: OutDim> Default for GaussianActorConfig<P> {
    fn default() -> Self {
        Self {
            policy_config: None,
            opt_config: OptimizerConfig::adam(1e-3, 0.9),
            min_log_std: -10.0,
            max_log_std: 2.0,
        }
    }
}

impl<P> GaussianActorConfig<P>
where
    P: DeserializeOwned + Serialize + OutDim,
{
    /// Sets the minimum value of log std.
    pub fn min_log_std(mut self, v: f64) -> Self {
        self.min_log_std = v;
        self
    }

    /// Sets the maximum value of log std.
    pub fn max_log_std(mut self, v: f64) -> Self {
        self.max_log_std = v;
        self
    }

    /// Sets configurations for policy function.
    pub fn policy_config(mut self, v: P) -> Self {
        self.policy_config = Some(v);
        self
    }

    /// Sets output dimension of the model.
    pub fn out_dim(mut self, v: i64) -> Self {
        match &mut self.policy_config {
            None => {}
            Some(pi_config) => pi_config.set_out_dim(v),
        };
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }
}

/// Output of [`GaussianActor::forward`].
pub struct ActorOutput {
    /// Squashed mean `tanh(mu)`.
    pub mu: Tensor,

    /// Squashed sample, if requested.
    pub pi: Option<Tensor>,

    /// Log density of `pi` with shape `(B,)`, if requested.
    pub log_pi: Option<Tensor>,

    /// Bounded log std with shape `(B, A)`.
    pub log_std: Tensor,
}

/// Actor with Gaussian policy squashed by `tanh`.
///
/// The policy head maps encoder features `(B, F)` to `(mean, log_std)`. The
/// actor does not own an encoder, features are computed by the caller.
pub struct GaussianActor<P>
where
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    device: Device,
    varmap: VarMap,

    // Dimension of the action vector.
    out_dim: i64,

    policy: P,
    opt: Optimizer,

    min_log_std: f64,
    max_log_std: f64,
}

impl<P> GaussianActor<P>
where
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Constructs [`GaussianActor`].
    pub fn build(config: GaussianActorConfig<P::Config>, device: Device) -> Result<Self> {
        let min_log_std = config.min_log_std;
        let max_log_std = config.max_log_std;
        let policy_config = config.policy_config.context("policy_config is not set.")?;
        let out_dim = policy_config.get_out_dim();
        let varmap = VarMap::new();
        let policy = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            P::build(vb.pp("actor"), policy_config)?
        };
        let opt = config.opt_config.build(varmap.all_vars())?;

        Ok(Self {
            device,
            varmap,
            out_dim,
            policy,
            opt,
            min_log_std,
            max_log_std,
        })
    }

    /// Dimension of the action.
    pub fn action_dim(&self) -> i64 {
        self.out_dim
    }

    /// Maps `tanh` of the raw log std onto `[min_log_std, max_log_std]`.
    fn bound_log_std(&self, log_std: &Tensor) -> Result<Tensor> {
        let half_range = 0.5 * (self.max_log_std - self.min_log_std);
        Ok(log_std
            .tanh()?
            .affine(half_range, half_range + self.min_log_std)?)
    }

    /// Returns the squashed mean and, optionally, a squashed sample and its log density.
    ///
    /// `log_pi` needs a sample, so it is only computed when both flags are set.
    pub fn forward(
        &self,
        features: &Tensor,
        compute_pi: bool,
        compute_log_pi: bool,
    ) -> Result<ActorOutput> {
        let (mean, log_std) = self.policy.forward(features)?;
        debug_assert_eq!(mean.dims()[1], self.out_dim as usize);
        let log_std = self.bound_log_std(&log_std)?;

        let (pi, log_pi) = match compute_pi {
            false => (None, None),
            true => {
                let noise = Tensor::randn(0f32, 1f32, mean.dims(), &self.device)?;
                let pi = (&mean + (&noise * log_std.exp()?)?)?;
                let log_pi = match compute_log_pi {
                    true => Some(gaussian_logprob(&noise, &log_std)?),
                    false => None,
                };
                (Some(pi), log_pi)
            }
        };
        let (mu, pi, log_pi) = squash(&mean, pi, log_pi)?;

        Ok(ActorOutput {
            mu,
            pi,
            log_pi,
            log_std,
        })
    }

    /// Takes an optimization step on the policy head.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        self.opt.backward_step(loss)
    }

    /// Variables of the policy head.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }
}

/// Log density of `mean + noise * exp(log_std)` under the Gaussian, summed over actions.
pub fn gaussian_logprob(noise: &Tensor, log_std: &Tensor) -> Result<Tensor> {
    let d = noise.dim(D::Minus1)? as f64;
    let residual = ((noise.sqr()? * -0.5)? - log_std)?.sum(D::Minus1)?;
    Ok((residual - 0.5 * LOG_2PI * d)?)
}

/// Applies `tanh` to the mean and the sample and corrects the log density for it.
fn squash(
    mu: &Tensor,
    pi: Option<Tensor>,
    log_pi: Option<Tensor>,
) -> Result<(Tensor, Option<Tensor>, Option<Tensor>)> {
    let mu = mu.tanh()?;
    let pi = match pi {
        Some(pi) => Some(pi.tanh()?),
        None => None,
    };
    let log_pi = match (log_pi, &pi) {
        (Some(log_pi), Some(pi)) => {
            let jacobian = ((1f64 - pi.sqr()?)?.relu()? + 1e-6)?.log()?.sum(D::Minus1)?;
            Some((log_pi - jacobian)?)
        }
        _ => None,
    };
    Ok((mu, pi, log_pi))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mlp::{Mlp2, MlpConfig};

    fn actor(min_log_std: f64, max_log_std: f64) -> Result<GaussianActor<Mlp2>> {
        let config = GaussianActorConfig::default()
            .policy_config(MlpConfig::new(6, vec![16], 3, false))
            .min_log_std(min_log_std)
            .max_log_std(max_log_std);
        GaussianActor::build(config, Device::Cpu)
    }

    #[test]
    fn test_output_shapes() -> Result<()> {
        let actor = actor(-10.0, 2.0)?;
        let feat = Tensor::randn(0f32, 1f32, (5, 6), &Device::Cpu)?;

        let out = actor.forward(&feat, true, true)?;
        assert_eq!(out.mu.dims(), &[5, 3]);
        assert_eq!(out.log_std.dims(), &[5, 3]);
        assert_eq!(out.pi.unwrap().dims(), &[5, 3]);
        assert_eq!(out.log_pi.unwrap().dims(), &[5]);

        let out = actor.forward(&feat, false, true)?;
        assert!(out.pi.is_none());
        assert!(out.log_pi.is_none());

        let out = actor.forward(&feat, true, false)?;
        assert!(out.pi.is_some());
        assert!(out.log_pi.is_none());
        Ok(())
    }

    #[test]
    fn test_actions_and_log_std_are_bounded() -> Result<()> {
        let actor = actor(-3.0, 1.0)?;
        let feat = Tensor::randn(0f32, 10f32, (64, 6), &Device::Cpu)?;
        let out = actor.forward(&feat, true, false)?;

        let pi = out.pi.unwrap().flatten_all()?.to_vec1::<f32>()?;
        assert!(pi.iter().all(|a| a.abs() <= 1.0));
        let log_std = out.log_std.flatten_all()?.to_vec1::<f32>()?;
        assert!(log_std.iter().all(|v| *v >= -3.0 && *v <= 1.0));
        Ok(())
    }

    #[test]
    fn test_gaussian_logprob_at_zero_noise() -> Result<()> {
        // log N(0 | 0, 1) = -0.5 ln(2 pi) per dimension
        let noise = Tensor::zeros((1, 2), DType::F32, &Device::Cpu)?;
        let log_std = Tensor::zeros((1, 2), DType::F32, &Device::Cpu)?;
        let logp = gaussian_logprob(&noise, &log_std)?.to_vec1::<f32>()?;
        assert!((logp[0] + LOG_2PI as f32).abs() < 1e-5);
        Ok(())
    }
}
