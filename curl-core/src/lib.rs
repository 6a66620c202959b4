#![warn(missing_docs)]
//! Backend-independent building blocks of the CURL agent.
//!
//! The crate defines the interfaces the update loop talks to:
//! * [`ReplayBufferBase`] and [`TransitionBatch`], the sampler producing mini-batches
//!   together with a [`ContrastivePair`] of augmented views,
//! * [`record`], the scalar-metric sink,
//! * [`UpdateSchedule`], the frequency gating of the individual updaters,
//! * [`Agent`], the trainable agent.
pub mod error;
pub mod record;

mod base;
pub use base::{Agent, ContrastivePair, GenericTransitionBatch, ReplayBufferBase, TransitionBatch};

mod schedule;
pub use schedule::UpdateSchedule;
