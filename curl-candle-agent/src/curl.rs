//! CURL agent.
mod actor;
mod base;
mod config;
mod contrastive;
mod critic;
mod encoder;
mod temperature;
pub use actor::{gaussian_logprob, ActorOutput, GaussianActor, GaussianActorConfig};
pub use base::{ActorStats, Curl};
pub use config::CurlConfig;
pub use contrastive::Contrastive;
pub use critic::{soft_value, td_target, TwinCritic, TwinCriticConfig};
pub use encoder::SharedEncoder;
pub use temperature::Temperature;
