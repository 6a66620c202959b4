use super::{
    critic::{soft_value, td_target},
    Contrastive, CurlConfig, GaussianActor, SharedEncoder, Temperature, TwinCritic,
};
use crate::{
    model::{SubModel1, SubModel2},
    util::{self, center_crop, param_stats, OutDim},
};
use anyhow::{Context, Result};
use candle_core::{Device, Tensor, D};
use candle_nn::loss::mse;
use curl_core::{
    record::{Record, RecordValue, Recorder, STEP_KEY},
    Agent, ReplayBufferBase, TransitionBatch, UpdateSchedule,
};
use log::{debug, info, trace};
use serde::{de::DeserializeOwned, Serialize};
use std::{convert::TryFrom, f64::consts::PI, marker::PhantomData};

/// Metrics of an actor and temperature update.
#[derive(Debug, Clone, Copy)]
pub struct ActorStats {
    /// Actor loss.
    pub loss: f32,

    /// Mean entropy estimate of the policy.
    pub entropy: f32,

    /// Temperature loss.
    pub alpha_loss: f32,

    /// Temperature after the update.
    pub alpha: f32,
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Soft actor-critic with a contrastive objective on the image encoder (CURL).
///
/// The agent owns a single [`SharedEncoder`]. Each updater reads features from
/// it and decides whether the gradient reaches the encoder:
///
/// ```mermaid
/// graph LR
///     B[ReplayBuffer] -->|obs, act, next_obs, reward, is_done| C[update_critic]
///     B -->|obs| A[update_actor_and_alpha]
///     B -->|obs_anchor, obs_pos| K[update_curl]
///     E[SharedEncoder] -->|features unless detach_encoder| C
///     E -->|detached features| A
///     E -->|features| K
///     T[momentum encoder] -->|detached| C
///     T -->|detached z_pos| K
///     S[soft_update] --> T
/// ```
///
/// The actor sees the whole feature vector detached, so the actor loss trains
/// the policy head only. Convolutions, projection and layer norm of the encoder
/// are shaped by the critic and contrastive losses.
///
/// [`Curl::update`] runs the critic update on every step and the other updaters
/// at the cadence of [`UpdateSchedule`], in the order critic, actor and
/// temperature, target networks, contrastive objective.
pub struct Curl<E, Q, P, R>
where
    E: SubModel1<Input = Tensor, Output = Tensor>,
    E::Config: DeserializeOwned + Serialize + OutDim + Clone,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Clone,
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
    R: ReplayBufferBase,
{
    pub(super) encoder: SharedEncoder<E>,
    pub(super) actor: GaussianActor<P>,
    pub(super) critic: TwinCritic<Q>,
    pub(super) temperature: Temperature,
    pub(super) contrastive: Contrastive,
    pub(super) schedule: UpdateSchedule,
    pub(super) critic_tau: f64,
    pub(super) encoder_tau: f64,
    pub(super) discount: f64,
    pub(super) image_size: usize,
    pub(super) detach_encoder: bool,
    pub(super) batch_size: usize,
    pub(super) param_stats: bool,
    pub(super) train: bool,
    pub(super) device: Device,
    pub(super) phantom: PhantomData<R>,
}

impl<E, Q, P, R> Curl<E, Q, P, R>
where
    E: SubModel1<Input = Tensor, Output = Tensor>,
    E::Config: DeserializeOwned + Serialize + OutDim + Clone,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Clone,
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
    R: ReplayBufferBase,
    R::Batch: TransitionBatch,
    <R::Batch as TransitionBatch>::ObsBatch: Into<Tensor>,
    <R::Batch as TransitionBatch>::ActBatch: Into<Tensor>,
{
    /// Constructs [`Curl`] agent.
    ///
    /// Target networks start as exact copies of the online networks.
    pub fn build(config: CurlConfig<E::Config, Q::Config, P::Config>) -> Result<Self> {
        let device = config.device.context("No device is given for CURL agent")?;
        let device = candle_core::Device::try_from(device)?;
        let encoder_config = config
            .encoder_config
            .context("encoder_config is not set.")?;
        let z_dim = encoder_config.get_out_dim() as usize;

        let encoder = SharedEncoder::build(encoder_config, &device)?;
        let actor = GaussianActor::build(config.actor_config, device.clone())?;
        let critic = TwinCritic::build(config.critic_config, encoder.vars(), &device)?;
        let contrastive =
            Contrastive::build(z_dim, encoder.vars(), &config.encoder_opt_config, &device)?;
        let target_entropy = -(actor.action_dim() as f64);
        let temperature = Temperature::new(
            config.init_temperature,
            target_entropy,
            &config.alpha_opt_config,
            &device,
        )?;
        info!(
            "Built CURL agent, z_dim = {}, action_dim = {}",
            z_dim,
            actor.action_dim()
        );

        Ok(Self {
            encoder,
            actor,
            critic,
            temperature,
            contrastive,
            schedule: config.schedule,
            critic_tau: config.critic_tau,
            encoder_tau: config.encoder_tau,
            discount: config.discount,
            image_size: config.image_size,
            detach_encoder: config.detach_encoder,
            batch_size: config.batch_size,
            param_stats: config.param_stats,
            train: true,
            device,
            phantom: PhantomData,
        })
    }

    /// Current temperature.
    pub fn alpha(&self) -> Result<f32> {
        self.temperature.alpha_value()
    }

    /// Target entropy, `-action_dim`.
    pub fn target_entropy(&self) -> f64 {
        self.temperature.target_entropy()
    }

    /// The shared encoder.
    pub fn encoder(&self) -> &SharedEncoder<E> {
        &self.encoder
    }

    /// The actor.
    pub fn actor(&self) -> &GaussianActor<P> {
        &self.actor
    }

    /// The critic.
    pub fn critic(&self) -> &TwinCritic<Q> {
        &self.critic
    }

    /// The contrastive objective.
    pub fn contrastive(&self) -> &Contrastive {
        &self.contrastive
    }

    /// Deterministic action, the squashed mean, for a single observation `(C, H, W)`.
    pub fn select_action(&self, obs: &Tensor) -> Result<Vec<f32>> {
        let obs = obs.to_device(&self.device)?.unsqueeze(0)?;
        let z = self.encoder.forward(&obs, true)?;
        let out = self.actor.forward(&z, false, false)?;
        Ok(out.mu.detach().flatten_all()?.to_vec1::<f32>()?)
    }

    /// Stochastic action for a single observation `(C, H, W)`.
    ///
    /// The observation is center-cropped to `image_size` unless its width already
    /// matches. In evaluation mode the squashed mean is returned instead of a sample.
    pub fn sample_action(&self, obs: &Tensor) -> Result<Vec<f32>> {
        let obs = match obs.dim(D::Minus1)? == self.image_size {
            true => obs.clone(),
            false => center_crop(obs, self.image_size)?,
        };
        let obs = obs.to_device(&self.device)?.unsqueeze(0)?;
        let z = self.encoder.forward(&obs, true)?;
        let out = self.actor.forward(&z, self.train, false)?;
        let act = match self.train {
            true => out.pi.context("No sampled action")?,
            false => out.mu,
        };
        Ok(act.detach().flatten_all()?.to_vec1::<f32>()?)
    }

    /// Regresses both Q heads onto the entropy-adjusted TD target.
    ///
    /// Returns the critic loss.
    pub fn update_critic(
        &mut self,
        obs: &Tensor,
        act: &Tensor,
        reward: &Tensor,
        next_obs: &Tensor,
        not_done: &Tensor,
    ) -> Result<f32> {
        let target = {
            let z_next = self.encoder.forward(next_obs, true)?;
            let out = self.actor.forward(&z_next, true, true)?;
            let next_act = out.pi.context("No sampled action")?.detach();
            let next_log_pi = out.log_pi.context("No log probability")?.detach();
            let z_next_tgt = self.encoder.forward_target(next_obs)?;
            let (q1_tgt, q2_tgt) = self.critic.qvals_tgt(&z_next_tgt, &next_act)?;
            let alpha = self.temperature.alpha()?;
            let value = soft_value(&q1_tgt, &q2_tgt, &alpha, &next_log_pi)?;
            td_target(reward, not_done, &value, self.discount)?
        };

        let z = self.encoder.forward(obs, self.detach_encoder)?;
        let (q1, q2) = self.critic.qvals(&z, act)?;
        let loss = (mse(&q1, &target)? + mse(&q2, &target)?)?;
        self.critic.backward_step(&loss)?;

        Ok(loss.to_scalar::<f32>()?)
    }

    /// Updates the policy head on detached features, then the temperature.
    pub fn update_actor_and_alpha(&mut self, obs: &Tensor) -> Result<ActorStats> {
        let z = self.encoder.forward(obs, true)?;
        let out = self.actor.forward(&z, true, true)?;
        let pi = out.pi.context("No sampled action")?;
        let log_pi = out.log_pi.context("No log probability")?;

        let (q1, q2) = self.critic.qvals(&z, &pi)?;
        let actor_q = q1.minimum(&q2)?;
        let alpha = self.temperature.alpha()?;
        let loss = (alpha.broadcast_mul(&log_pi)? - actor_q)?.mean_all()?;

        let entropy = {
            let d = out.log_std.dim(D::Minus1)? as f64;
            let h = (out.log_std.sum(D::Minus1)? + 0.5 * d * (1.0 + (2.0 * PI).ln()))?;
            h.mean_all()?.to_scalar::<f32>()?
        };

        self.actor.backward_step(&loss)?;
        let alpha_loss = self.temperature.update(&log_pi)?;

        Ok(ActorStats {
            loss: loss.to_scalar::<f32>()?,
            entropy,
            alpha_loss,
            alpha: self.temperature.alpha_value()?,
        })
    }

    /// Optimizes the contrastive loss over `W` and the online encoder.
    ///
    /// The `B` pairs are assumed to come from distinct observations; duplicates
    /// are treated as negatives of each other.
    pub fn update_curl(&mut self, obs_anchor: &Tensor, obs_pos: &Tensor) -> Result<f32> {
        let z_a = self.encoder.encode(obs_anchor, false)?;
        let z_pos = self.encoder.encode(obs_pos, true)?;
        let logits = self.contrastive.compute_logits(&z_a, &z_pos)?;
        let loss = self.contrastive.loss(&logits)?;
        self.contrastive.backward_step(&loss)?;

        Ok(loss.to_scalar::<f32>()?)
    }

    /// Polyak averaging of the target heads and the momentum encoder.
    pub fn soft_update(&mut self) -> Result<()> {
        self.critic.soft_update(self.critic_tau)?;
        self.encoder.soft_update(self.encoder_tau)
    }

    /// Runs one training step and returns the metrics logged at `step`.
    ///
    /// The record is empty unless `step` is a multiple of the log interval.
    pub fn update(&mut self, buffer: &mut R, step: usize) -> Result<Record> {
        trace!("batch()");
        let batch = buffer.batch(self.batch_size)?;
        let (obs, act, next_obs, reward, is_done, pair) = batch.unpack();
        let obs = Into::<Tensor>::into(obs).to_device(&self.device)?;
        let act = Into::<Tensor>::into(act).to_device(&self.device)?;
        let next_obs = Into::<Tensor>::into(next_obs).to_device(&self.device)?;
        let reward = util::reward(&reward, &self.device)?;
        let not_done = util::not_done(&is_done, &self.device)?;

        let is_log_step = self.schedule.is_log_step(step);
        let mut record = Record::empty();
        if is_log_step {
            let batch_reward = reward.mean_all()?.to_scalar::<f32>()?;
            record.insert("train/batch_reward", RecordValue::Scalar(batch_reward));
        }

        trace!("update_critic()");
        let critic_loss = self.update_critic(&obs, &act, &reward, &next_obs, &not_done)?;
        if is_log_step {
            record.insert("train_critic/loss", RecordValue::Scalar(critic_loss));
            if self.param_stats {
                record.merge_inplace(param_stats(self.critic.varmap(), "critic")?);
            }
        }

        if self.schedule.is_actor_step(step) {
            trace!("update_actor_and_alpha()");
            let stats = self.update_actor_and_alpha(&obs)?;
            if is_log_step {
                let target_entropy = self.target_entropy() as f32;
                record.merge_inplace(Record::from_slice(&[
                    ("train_actor/loss", RecordValue::Scalar(stats.loss)),
                    (
                        "train_actor/target_entropy",
                        RecordValue::Scalar(target_entropy),
                    ),
                    ("train_actor/entropy", RecordValue::Scalar(stats.entropy)),
                    ("train_alpha/loss", RecordValue::Scalar(stats.alpha_loss)),
                    ("train_alpha/value", RecordValue::Scalar(stats.alpha)),
                ]));
                if self.param_stats {
                    record.merge_inplace(param_stats(self.actor.varmap(), "actor")?);
                }
            }
        }

        if self.schedule.is_target_step(step) {
            trace!("soft_update()");
            self.soft_update()?;
        }

        if self.schedule.is_curl_step(step) {
            trace!("update_curl()");
            let obs_anchor = Into::<Tensor>::into(pair.obs_anchor).to_device(&self.device)?;
            let obs_pos = Into::<Tensor>::into(pair.obs_pos).to_device(&self.device)?;
            let curl_loss = self.update_curl(&obs_anchor, &obs_pos)?;
            if is_log_step {
                record.insert("train/curl_loss", RecordValue::Scalar(curl_loss));
            }
        }

        if !record.is_empty() {
            debug!("step {}: critic loss {}", step, critic_loss);
            record.insert(STEP_KEY, RecordValue::Scalar(step as f32));
        }

        Ok(record)
    }

    /// Runs [`Curl::update`] and writes the record to `recorder` if it is not empty.
    pub fn update_with_recorder(
        &mut self,
        buffer: &mut R,
        recorder: &mut impl Recorder,
        step: usize,
    ) -> Result<()> {
        let record = self.update(buffer, step)?;
        if !record.is_empty() {
            recorder.write(record);
        }
        Ok(())
    }
}

impl<E, Q, P, R> Agent<R> for Curl<E, Q, P, R>
where
    E: SubModel1<Input = Tensor, Output = Tensor>,
    E::Config: DeserializeOwned + Serialize + OutDim + Clone,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Clone,
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
    R: ReplayBufferBase,
    R::Batch: TransitionBatch,
    <R::Batch as TransitionBatch>::ObsBatch: Into<Tensor>,
    <R::Batch as TransitionBatch>::ActBatch: Into<Tensor>,
{
    fn train(&mut self) {
        self.train = true;
    }

    fn eval(&mut self) {
        self.train = false;
    }

    fn is_train(&self) -> bool {
        self.train
    }

    fn opt_with_record(&mut self, buffer: &mut R, step: usize) -> Result<Record> {
        self.update(buffer, step)
    }
}
