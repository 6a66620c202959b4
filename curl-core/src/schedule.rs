//! Update cadence of the agent.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Frequencies of the individual updaters, in optimization steps.
///
/// A frequency `n` fires on every step with `step % n == 0`. Steps are 0-indexed,
/// so step 0 triggers every updater. A frequency of `0` never fires.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct UpdateSchedule {
    /// Interval of actor and temperature updates.
    pub actor_update_freq: usize,

    /// Interval of soft updates of the target networks.
    pub critic_target_update_freq: usize,

    /// Interval of contrastive updates.
    pub curl_update_freq: usize,

    /// Interval of recording metrics.
    pub log_interval: usize,
}

impl Default for UpdateSchedule {
    fn default() -> Self {
        Self {
            actor_update_freq: 2,
            critic_target_update_freq: 2,
            curl_update_freq: 1,
            log_interval: 100,
        }
    }
}

fn fires(step: usize, freq: usize) -> bool {
    freq != 0 && step % freq == 0
}

impl UpdateSchedule {
    /// Sets the interval of actor updates.
    pub fn actor_update_freq(mut self, v: usize) -> Self {
        self.actor_update_freq = v;
        self
    }

    /// Sets the interval of target network updates.
    pub fn critic_target_update_freq(mut self, v: usize) -> Self {
        self.critic_target_update_freq = v;
        self
    }

    /// Sets the interval of contrastive updates.
    pub fn curl_update_freq(mut self, v: usize) -> Self {
        self.curl_update_freq = v;
        self
    }

    /// Sets the interval of recording metrics.
    pub fn log_interval(mut self, v: usize) -> Self {
        self.log_interval = v;
        self
    }

    /// Returns `true` if the actor and the temperature are updated at `step`.
    pub fn is_actor_step(&self, step: usize) -> bool {
        fires(step, self.actor_update_freq)
    }

    /// Returns `true` if the target networks are synchronized at `step`.
    pub fn is_target_step(&self, step: usize) -> bool {
        fires(step, self.critic_target_update_freq)
    }

    /// Returns `true` if the contrastive objective is optimized at `step`.
    pub fn is_curl_step(&self, step: usize) -> bool {
        fires(step, self.curl_update_freq)
    }

    /// Returns `true` if metrics are recorded at `step`.
    pub fn is_log_step(&self, step: usize) -> bool {
        fires(step, self.log_interval)
    }

    /// Constructs [`UpdateSchedule`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`UpdateSchedule`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
