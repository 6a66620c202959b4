//! Encoder shared by the critic, the actor and the contrastive objective.
use crate::{model::SubModel1, util::track};
use anyhow::Result;
use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{VarBuilder, VarMap};
use log::info;

/// The online encoder and its momentum (target) copy.
///
/// Both copies live in their own [`VarMap`] under the prefix `encoder`, so a
/// soft update matches variables by name. The momentum copy is the encoder of
/// the target critic as well as the key encoder of the contrastive objective.
pub struct SharedEncoder<E>
where
    E: SubModel1<Input = Tensor, Output = Tensor>,
    E::Config: Clone,
{
    varmap: VarMap,
    varmap_tgt: VarMap,
    enc: E,
    enc_tgt: E,
}

impl<E> SharedEncoder<E>
where
    E: SubModel1<Input = Tensor, Output = Tensor>,
    E::Config: Clone,
{
    /// Builds the encoder and a synchronized momentum copy.
    pub fn build(config: E::Config, device: &Device) -> Result<Self> {
        let varmap = VarMap::new();
        let enc = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
            E::build(vb.pp("encoder"), config.clone())?
        };
        let varmap_tgt = VarMap::new();
        let enc_tgt = {
            let vb = VarBuilder::from_varmap(&varmap_tgt, DType::F32, device);
            E::build(vb.pp("encoder"), config)?
        };
        track(&varmap_tgt, &varmap, 1.0)?;
        info!("Built encoder with {} variables", varmap.all_vars().len());

        Ok(Self {
            varmap,
            varmap_tgt,
            enc,
            enc_tgt,
        })
    }

    /// Features of the online encoder, cut from the graph if `detach` is `true`.
    pub fn forward(&self, obs: &Tensor, detach: bool) -> Result<Tensor> {
        let z = self.enc.forward(obs)?;
        match detach {
            true => Ok(z.detach()),
            false => Ok(z),
        }
    }

    /// Features of the momentum encoder. They never carry a gradient.
    pub fn forward_target(&self, obs: &Tensor) -> Result<Tensor> {
        Ok(self.enc_tgt.forward(obs)?.detach())
    }

    /// Encodes `obs` with the momentum encoder if `ema`, otherwise with the
    /// online encoder keeping the gradient.
    pub fn encode(&self, obs: &Tensor, ema: bool) -> Result<Tensor> {
        match ema {
            true => self.forward_target(obs),
            false => self.forward(obs, false),
        }
    }

    /// Moves the momentum encoder towards the online encoder.
    pub fn soft_update(&self, tau: f64) -> Result<()> {
        track(&self.varmap_tgt, &self.varmap, tau)
    }

    /// Variables of the online encoder.
    pub fn vars(&self) -> Vec<Var> {
        self.varmap.all_vars()
    }

    /// Variables of the online encoder.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Variables of the momentum encoder.
    pub fn varmap_tgt(&self) -> &VarMap {
        &self.varmap_tgt
    }
}
