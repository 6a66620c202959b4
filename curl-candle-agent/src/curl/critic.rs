//! Twin Q heads and their targets.
use crate::{
    model::SubModel2,
    opt::{Optimizer, OptimizerConfig},
    util::track,
};
use anyhow::{Context, Result};
use candle_core::{DType::F32, Device, Tensor, Var, D};
use candle_nn::{VarBuilder, VarMap};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`TwinCritic`].
pub struct TwinCriticConfig<Q> {
    /// Configuration of the Q heads.
    pub q_config: Option<Q>,

    /// Configuration of the optimizer.
    pub opt_config: OptimizerConfig,
}

impl<Q> Default for TwinCriticConfig<Q> {
    fn default() -> Self {
        Self {
            q_config: None,
            opt_config: OptimizerConfig::adam(1e-3, 0.9),
        }
    }
}

impl<Q> TwinCriticConfig<Q>
where
    Q: DeserializeOwned + Serialize,
{
    /// Sets configurations for action-value function.
    pub fn q_config(mut self, v: Q) -> Self {
        self.q_config = Some(v);
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }
}

/// Two Q heads on encoder features, with target copies.
///
/// The optimizer covers the heads and the encoder variables passed to
/// [`TwinCritic::build`]. Encoder variables only move when the features the
/// loss is computed from were not detached.
pub struct TwinCritic<Q>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Clone,
{
    varmap: VarMap,
    varmap_tgt: VarMap,
    qs: [Q; 2],
    qs_tgt: [Q; 2],
    opt: Optimizer,
}

impl<Q> TwinCritic<Q>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Clone,
{
    /// Constructs [`TwinCritic`] and synchronizes the target heads.
    pub fn build(
        config: TwinCriticConfig<Q::Config>,
        encoder_vars: Vec<Var>,
        device: &Device,
    ) -> Result<Self> {
        let q_config = config.q_config.context("q_config is not set.")?;
        let (varmap, qs) = Self::build_heads(&q_config, device)?;
        let (varmap_tgt, qs_tgt) = Self::build_heads(&q_config, device)?;

        let mut vars = varmap.all_vars();
        vars.extend(encoder_vars);
        let opt = config.opt_config.build(vars)?;

        track(&varmap_tgt, &varmap, 1.0)?;

        Ok(Self {
            varmap,
            varmap_tgt,
            qs,
            qs_tgt,
            opt,
        })
    }

    fn build_heads(q_config: &Q::Config, device: &Device) -> Result<(VarMap, [Q; 2])> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, F32, device).pp("critic");
        let q1 = Q::build(vb.pp("q1"), q_config.clone())?;
        let q2 = Q::build(vb.pp("q2"), q_config.clone())?;
        Ok((varmap, [q1, q2]))
    }

    fn forward(qs: &[Q; 2], features: &Tensor, act: &Tensor) -> Result<(Tensor, Tensor)> {
        let q1 = qs[0].forward(features, act)?.squeeze(D::Minus1)?;
        let q2 = qs[1].forward(features, act)?.squeeze(D::Minus1)?;
        Ok((q1, q2))
    }

    /// Action values `(Q1, Q2)` of the online heads, each `(B,)`.
    pub fn qvals(&self, features: &Tensor, act: &Tensor) -> Result<(Tensor, Tensor)> {
        Self::forward(&self.qs, features, act)
    }

    /// Action values `(Q1, Q2)` of the target heads, each `(B,)`.
    pub fn qvals_tgt(&self, features: &Tensor, act: &Tensor) -> Result<(Tensor, Tensor)> {
        Self::forward(&self.qs_tgt, features, act)
    }

    /// Takes an optimization step on the heads (and the encoder, see [`TwinCritic`]).
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        self.opt.backward_step(loss)
    }

    /// Moves the target heads towards the online heads.
    pub fn soft_update(&self, tau: f64) -> Result<()> {
        track(&self.varmap_tgt, &self.varmap, tau)
    }

    /// Variables of the online heads.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Variables of the target heads.
    pub fn varmap_tgt(&self) -> &VarMap {
        &self.varmap_tgt
    }
}

/// Entropy-adjusted state value `min(Q1, Q2) - alpha * log_pi`.
pub fn soft_value(q1: &Tensor, q2: &Tensor, alpha: &Tensor, log_pi: &Tensor) -> Result<Tensor> {
    Ok((q1.minimum(q2)? - alpha.broadcast_mul(log_pi)?)?)
}

/// TD target `reward + not_done * discount * value`, detached.
pub fn td_target(
    reward: &Tensor,
    not_done: &Tensor,
    value: &Tensor,
    discount: f64,
) -> Result<Tensor> {
    let bootstrap = ((not_done * value)? * discount)?;
    Ok((reward + bootstrap)?.detach())
}
