//! Core functionalities.
mod agent;
mod batch;
mod replay_buffer;
pub use agent::Agent;
pub use batch::{ContrastivePair, GenericTransitionBatch, TransitionBatch};
pub use replay_buffer::ReplayBufferBase;
