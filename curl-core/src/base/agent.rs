//! Agent.
use super::ReplayBufferBase;
use crate::record::Record;
use anyhow::Result;

/// Represents a trainable agent.
pub trait Agent<R: ReplayBufferBase> {
    /// Set the agent to training mode.
    fn train(&mut self);

    /// Set the agent to evaluation mode.
    fn eval(&mut self);

    /// Return if it is in training mode.
    fn is_train(&self) -> bool;

    /// Performs an optimization step.
    ///
    /// `step` is the optimization step counter maintained by the caller. It is
    /// advanced by one between successive calls and drives the update cadence.
    fn opt(&mut self, buffer: &mut R, step: usize) -> Result<()> {
        self.opt_with_record(buffer, step).map(|_| ())
    }

    /// Performs an optimization step and returns the metrics logged at `step`.
    ///
    /// The returned record is empty on steps where nothing is logged.
    fn opt_with_record(&mut self, buffer: &mut R, step: usize) -> Result<Record>;
}
