//! Configuration of the CURL agent.
use super::{GaussianActorConfig, TwinCriticConfig};
use crate::{opt::OptimizerConfig, util::OutDim, Device};
use anyhow::Result;
use curl_core::UpdateSchedule;
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Curl`](super::Curl).
///
/// `EC`, `QC` and `PC` are the configurations of the encoder, the Q heads and
/// the policy head.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct CurlConfig<EC, QC, PC: OutDim> {
    /// Configuration of the shared encoder.
    pub encoder_config: Option<EC>,

    /// Configuration of the actor.
    pub actor_config: GaussianActorConfig<PC>,

    /// Configuration of the critic.
    pub critic_config: TwinCriticConfig<QC>,

    /// Optimizer of the log temperature.
    pub alpha_opt_config: OptimizerConfig,

    /// Optimizer of the contrastive objective, over `W` and the encoder.
    pub encoder_opt_config: OptimizerConfig,

    /// Update frequencies.
    pub schedule: UpdateSchedule,

    /// Soft update coefficient of the Q heads.
    pub critic_tau: f64,

    /// Soft update coefficient of the encoder.
    pub encoder_tau: f64,

    /// Discount factor.
    pub discount: f64,

    /// Initial value of the temperature.
    pub init_temperature: f64,

    /// Side length of the observations fed to the encoder.
    pub image_size: usize,

    /// If `true`, the critic loss does not update the encoder.
    pub detach_encoder: bool,

    /// Batch size for training.
    pub batch_size: usize,

    /// If `true`, mean and std of the actor and critic parameters are recorded.
    pub param_stats: bool,

    /// Device for the models.
    pub device: Option<Device>,
}

impl<EC, QC, PC: OutDim> Default for CurlConfig<EC, QC, PC> {
    fn default() -> Self {
        Self {
            encoder_config: None,
            actor_config: GaussianActorConfig::default(),
            critic_config: TwinCriticConfig::default(),
            alpha_opt_config: OptimizerConfig::adam(1e-4, 0.5),
            encoder_opt_config: OptimizerConfig::adam(1e-3, 0.9),
            schedule: UpdateSchedule::default(),
            critic_tau: 0.01,
            encoder_tau: 0.05,
            discount: 0.99,
            init_temperature: 0.1,
            image_size: 84,
            detach_encoder: false,
            batch_size: 32,
            param_stats: false,
            device: None,
        }
    }
}

impl<EC, QC, PC> CurlConfig<EC, QC, PC>
where
    EC: DeserializeOwned + Serialize,
    QC: DeserializeOwned + Serialize,
    PC: DeserializeOwned + Serialize + OutDim,
{
    /// Configuration of the encoder.
    pub fn encoder_config(mut self, v: EC) -> Self {
        self.encoder_config = Some(v);
        self
    }

    /// Configuration of the actor.
    pub fn actor_config(mut self, v: GaussianActorConfig<PC>) -> Self {
        self.actor_config = v;
        self
    }

    /// Configuration of the critic.
    pub fn critic_config(mut self, v: TwinCriticConfig<QC>) -> Self {
        self.critic_config = v;
        self
    }

    /// Optimizer of the log temperature.
    pub fn alpha_opt_config(mut self, v: OptimizerConfig) -> Self {
        self.alpha_opt_config = v;
        self
    }

    /// Optimizer of the contrastive objective.
    pub fn encoder_opt_config(mut self, v: OptimizerConfig) -> Self {
        self.encoder_opt_config = v;
        self
    }

    /// Update frequencies.
    pub fn schedule(mut self, v: UpdateSchedule) -> Self {
        self.schedule = v;
        self
    }

    /// Soft update coefficient of the Q heads.
    pub fn critic_tau(mut self, v: f64) -> Self {
        self.critic_tau = v;
        self
    }

    /// Soft update coefficient of the encoder.
    pub fn encoder_tau(mut self, v: f64) -> Self {
        self.encoder_tau = v;
        self
    }

    /// Discount factor.
    pub fn discount(mut self, v: f64) -> Self {
        self.discount = v;
        self
    }

    /// Initial temperature.
    pub fn init_temperature(mut self, v: f64) -> Self {
        self.init_temperature = v;
        self
    }

    /// Side length of the observations fed to the encoder.
    pub fn image_size(mut self, v: usize) -> Self {
        self.image_size = v;
        self
    }

    /// Cut the encoder from the critic loss.
    pub fn detach_encoder(mut self, v: bool) -> Self {
        self.detach_encoder = v;
        self
    }

    /// Batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Record parameter statistics.
    pub fn param_stats(mut self, v: bool) -> Self {
        self.param_stats = v;
        self
    }

    /// Device.
    pub fn device(mut self, device: candle_core::Device) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Constructs [`CurlConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of CURL agent from {}", path_.to_str().unwrap_or("?"));
        Ok(b)
    }

    /// Saves [`CurlConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of CURL agent into {}", path_.to_str().unwrap_or("?"));
        Ok(())
    }
}
