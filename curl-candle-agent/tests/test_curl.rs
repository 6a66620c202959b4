use anyhow::Result;
use candle_core::{Device, Tensor};
use candle_nn::VarMap;
use curl_candle_agent::{
    cnn::{PixelEncoder, PixelEncoderConfig},
    curl::{GaussianActorConfig, TwinCriticConfig},
    mlp::{Mlp, Mlp2, MlpConfig},
    opt::OptimizerConfig,
    util::{center_crop, not_done},
    Curl, CurlConfig,
};
use curl_core::{
    record::{BufferedRecorder, STEP_KEY},
    Agent, ContrastivePair, GenericTransitionBatch, ReplayBufferBase, UpdateSchedule,
};

const BATCH_SIZE: usize = 8;
const ACTION_DIM: i64 = 4;
const IMAGE_SIZE: usize = 16;
const FEATURE_DIM: i64 = 16;

type Batch = GenericTransitionBatch<Tensor, Tensor>;
type CurlAgent = Curl<PixelEncoder, Mlp, Mlp2, FixedSampler>;
type Config = CurlConfig<PixelEncoderConfig, MlpConfig, MlpConfig>;

/// Returns the same batch on every call.
struct FixedSampler {
    batch: Batch,
}

impl ReplayBufferBase for FixedSampler {
    type Config = Batch;
    type Batch = Batch;

    fn build(config: &Self::Config) -> Self {
        Self {
            batch: config.clone(),
        }
    }

    fn batch(&mut self, size: usize) -> Result<Self::Batch> {
        assert_eq!(size, BATCH_SIZE);
        Ok(self.batch.clone())
    }
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn images() -> Result<Tensor> {
    let shape = (BATCH_SIZE, 3, IMAGE_SIZE, IMAGE_SIZE);
    Ok(Tensor::rand(0f32, 255f32, shape, &Device::Cpu)?)
}

fn sampler(is_done: Vec<i8>) -> Result<FixedSampler> {
    let batch = GenericTransitionBatch {
        obs: images()?,
        act: Tensor::rand(-1f32, 1f32, (BATCH_SIZE, ACTION_DIM as usize), &Device::Cpu)?,
        next_obs: images()?,
        reward: vec![1.0; BATCH_SIZE],
        is_done,
        pair: ContrastivePair {
            obs_anchor: images()?,
            obs_pos: images()?,
        },
    };
    Ok(FixedSampler::build(&batch))
}

fn config() -> Config {
    let encoder_config = PixelEncoderConfig::new(3, IMAGE_SIZE as _, FEATURE_DIM)
        .num_layers(2)
        .num_filters(8);
    let actor_config = GaussianActorConfig::default().policy_config(MlpConfig::new(
        FEATURE_DIM,
        vec![32, 32],
        ACTION_DIM,
        false,
    ));
    let critic_config = TwinCriticConfig::default().q_config(MlpConfig::new(
        FEATURE_DIM + ACTION_DIM,
        vec![32, 32],
        1,
        false,
    ));

    Config::default()
        .encoder_config(encoder_config)
        .actor_config(actor_config)
        .critic_config(critic_config)
        .schedule(UpdateSchedule::default().log_interval(1))
        .image_size(IMAGE_SIZE)
        .batch_size(BATCH_SIZE)
        .device(Device::Cpu)
}

/// Values of all variables, sorted by name.
fn snapshot(varmap: &VarMap) -> Result<Vec<(String, Vec<f32>)>> {
    let data = varmap.data().lock().unwrap();
    let mut vars = data
        .iter()
        .map(|(k, v)| -> Result<(String, Vec<f32>)> {
            Ok((k.clone(), v.as_tensor().flatten_all()?.to_vec1::<f32>()?))
        })
        .collect::<Result<Vec<_>>>()?;
    vars.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(vars)
}

fn tensors(buffer: &FixedSampler) -> Result<(Tensor, Tensor, Tensor, Tensor, Tensor)> {
    let b = &buffer.batch;
    let reward = Tensor::from_slice(&b.reward[..], (BATCH_SIZE,), &Device::Cpu)?;
    let not_done = not_done(&b.is_done, &Device::Cpu)?;
    Ok((b.obs.clone(), b.act.clone(), reward, b.next_obs.clone(), not_done))
}

#[test]
fn test_update_loop() -> Result<()> {
    init_logger();
    let mut buffer = sampler(vec![0, 0, 0, 1, 0, 0, 0, 1])?;
    let mut agent = CurlAgent::build(config())?;
    let mut recorder = BufferedRecorder::new();

    for step in 0..10 {
        agent.update_with_recorder(&mut buffer, &mut recorder, step)?;
    }
    assert_eq!(recorder.len(), 10);

    let first = recorder.iter().next().unwrap();
    for key in &[
        "train/batch_reward",
        "train_critic/loss",
        "train_actor/loss",
        "train_actor/target_entropy",
        "train_actor/entropy",
        "train_alpha/loss",
        "train_alpha/value",
        "train/curl_loss",
        STEP_KEY,
    ] {
        assert!(first.contains_key(key), "{} is not recorded", key);
    }
    assert_eq!(first.get_scalar("train/batch_reward")?, 1.0);
    assert_eq!(first.get_scalar("train_actor/target_entropy")?, -4.0);

    // The actor is updated on even steps only
    let steps: Vec<usize> = recorder
        .scalars("train_actor/loss")
        .into_iter()
        .map(|(s, _)| s)
        .collect();
    assert_eq!(steps, vec![0, 2, 4, 6, 8]);
    assert_eq!(recorder.scalars("train_critic/loss").len(), 10);
    assert_eq!(recorder.scalars("train/curl_loss").len(), 10);

    assert!(agent.alpha()? > 0.0);
    Ok(())
}

#[test]
fn test_record_is_empty_between_log_steps() -> Result<()> {
    let mut buffer = sampler(vec![0; BATCH_SIZE])?;
    let config = config().schedule(UpdateSchedule::default().log_interval(3));
    let mut agent = CurlAgent::build(config)?;

    let recorded: Vec<bool> = (0..6)
        .map(|step| -> Result<bool> { Ok(!agent.update(&mut buffer, step)?.is_empty()) })
        .collect::<Result<_>>()?;
    assert_eq!(recorded, vec![true, false, false, true, false, false]);
    Ok(())
}

#[test]
fn test_critic_loss_with_constant_target() -> Result<()> {
    init_logger();
    // Every transition is terminal, so the TD target is the reward
    let mut buffer = sampler(vec![1; BATCH_SIZE])?;
    // The shared encoder is trained by the critic loss alone: contrastive updates
    // would move the features under the critic. With lr 1e-4 each Adam step stays
    // small against the curvature of the loss on a fixed batch.
    let critic_config = config()
        .critic_config
        .opt_config(OptimizerConfig::adam(1e-4, 0.9));
    let config = config()
        .critic_config(critic_config)
        .detach_encoder(false)
        .schedule(UpdateSchedule::default().curl_update_freq(0).log_interval(1));
    let mut agent = CurlAgent::build(config)?;
    let encoder = snapshot(agent.encoder().varmap())?;

    let mut losses = vec![];
    for step in 1..=10 {
        let record = agent.update(&mut buffer, step)?;
        losses.push(record.get_scalar("train_critic/loss")?);
    }
    for w in losses.windows(2) {
        assert!(w[1] <= w[0] + 1e-6, "critic loss increased: {:?}", losses);
    }
    assert!(losses[9] < losses[0]);
    assert_ne!(encoder, snapshot(agent.encoder().varmap())?);
    Ok(())
}

#[test]
fn test_actor_update_keeps_encoder_and_critic() -> Result<()> {
    let buffer = sampler(vec![0; BATCH_SIZE])?;
    let mut agent = CurlAgent::build(config())?;
    let (obs, ..) = tensors(&buffer)?;

    let encoder = snapshot(agent.encoder().varmap())?;
    let critic = snapshot(agent.critic().varmap())?;
    let actor = snapshot(agent.actor().varmap())?;
    let alpha = agent.alpha()?;

    agent.update_actor_and_alpha(&obs)?;

    assert_eq!(encoder, snapshot(agent.encoder().varmap())?);
    assert_eq!(critic, snapshot(agent.critic().varmap())?);
    assert_ne!(actor, snapshot(agent.actor().varmap())?);
    assert_ne!(alpha, agent.alpha()?);
    Ok(())
}

#[test]
fn test_detached_critic_update_keeps_encoder() -> Result<()> {
    let buffer = sampler(vec![0; BATCH_SIZE])?;
    let (obs, act, reward, next_obs, not_done) = tensors(&buffer)?;

    let mut agent = CurlAgent::build(config().detach_encoder(true))?;
    let encoder = snapshot(agent.encoder().varmap())?;
    let critic = snapshot(agent.critic().varmap())?;
    agent.update_critic(&obs, &act, &reward, &next_obs, &not_done)?;
    assert_eq!(encoder, snapshot(agent.encoder().varmap())?);
    assert_ne!(critic, snapshot(agent.critic().varmap())?);

    let mut agent = CurlAgent::build(config().detach_encoder(false))?;
    let encoder = snapshot(agent.encoder().varmap())?;
    agent.update_critic(&obs, &act, &reward, &next_obs, &not_done)?;
    assert_ne!(encoder, snapshot(agent.encoder().varmap())?);
    Ok(())
}

#[test]
fn test_curl_update_moves_online_encoder_only() -> Result<()> {
    let buffer = sampler(vec![0; BATCH_SIZE])?;
    let mut agent = CurlAgent::build(config())?;
    let pair = buffer.batch.pair.clone();

    let encoder = snapshot(agent.encoder().varmap())?;
    let encoder_tgt = snapshot(agent.encoder().varmap_tgt())?;
    let critic = snapshot(agent.critic().varmap())?;
    let w = snapshot(agent.contrastive().varmap())?;

    let loss = agent.update_curl(&pair.obs_anchor, &pair.obs_pos)?;
    assert!(loss.is_finite());

    assert_ne!(encoder, snapshot(agent.encoder().varmap())?);
    assert_ne!(w, snapshot(agent.contrastive().varmap())?);
    assert_eq!(encoder_tgt, snapshot(agent.encoder().varmap_tgt())?);
    assert_eq!(critic, snapshot(agent.critic().varmap())?);
    Ok(())
}

#[test]
fn test_soft_update_uses_separate_coefficients() -> Result<()> {
    let buffer = sampler(vec![0; BATCH_SIZE])?;
    let (obs, act, reward, next_obs, not_done) = tensors(&buffer)?;
    let mut agent = CurlAgent::build(config().critic_tau(1.0).encoder_tau(0.0))?;

    let encoder_tgt = snapshot(agent.encoder().varmap_tgt())?;
    agent.update_critic(&obs, &act, &reward, &next_obs, &not_done)?;
    assert_ne!(
        snapshot(agent.critic().varmap())?,
        snapshot(agent.critic().varmap_tgt())?
    );

    agent.soft_update()?;
    assert_eq!(
        snapshot(agent.critic().varmap())?,
        snapshot(agent.critic().varmap_tgt())?
    );
    assert_eq!(encoder_tgt, snapshot(agent.encoder().varmap_tgt())?);
    Ok(())
}

#[test]
fn test_action_selection() -> Result<()> {
    let mut agent = CurlAgent::build(config())?;
    let obs = Tensor::rand(0f32, 255f32, (3, IMAGE_SIZE, IMAGE_SIZE), &Device::Cpu)?;

    let act = agent.select_action(&obs)?;
    assert_eq!(act.len(), ACTION_DIM as usize);
    assert!(act.iter().all(|a| a.abs() <= 1.0));
    assert_eq!(act, agent.select_action(&obs)?);

    // Larger observations are center-cropped
    let obs = Tensor::rand(0f32, 255f32, (3, 20, 20), &Device::Cpu)?;
    let act = agent.sample_action(&obs)?;
    assert_eq!(act.len(), ACTION_DIM as usize);

    let obs = Tensor::rand(0f32, 255f32, (3, 12, 12), &Device::Cpu)?;
    assert!(agent.sample_action(&obs).is_err());

    agent.eval();
    assert!(!agent.is_train());
    agent.train();
    assert!(agent.is_train());
    Ok(())
}

#[test]
fn test_sample_action_in_eval_mode_is_mean() -> Result<()> {
    let mut agent = CurlAgent::build(config())?;
    let obs = Tensor::rand(0f32, 255f32, (3, 20, 20), &Device::Cpu)?;
    let mean = agent.select_action(&center_crop(&obs, IMAGE_SIZE)?)?;

    agent.eval();
    assert_eq!(agent.sample_action(&obs)?, mean);
    assert_eq!(agent.sample_action(&obs)?, mean);

    agent.train();
    assert_ne!(agent.sample_action(&obs)?, mean);
    Ok(())
}

#[test]
fn test_build_without_encoder_config_fails() {
    let mut config = config();
    config.encoder_config = None;
    assert!(CurlAgent::build(config).is_err());
}
