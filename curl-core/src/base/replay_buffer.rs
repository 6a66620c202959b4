//! Replay buffer interface.
//!
//! The agent only consumes batches: how transitions are stored, sampled and
//! augmented is up to the implementation.
use anyhow::Result;

/// Interface for replay buffers that generate batches for training.
///
/// # Examples
///
/// ```ignore
/// struct FixedSampler {
///     batch: GenericTransitionBatch<Tensor, Tensor>,
/// }
///
/// impl ReplayBufferBase for FixedSampler {
///     type Config = GenericTransitionBatch<Tensor, Tensor>;
///     type Batch = GenericTransitionBatch<Tensor, Tensor>;
///
///     fn build(config: &Self::Config) -> Self {
///         Self { batch: config.clone() }
///     }
///
///     fn batch(&mut self, _size: usize) -> Result<Self::Batch> {
///         Ok(self.batch.clone())
///     }
/// }
/// ```
pub trait ReplayBufferBase {
    /// Configuration parameters for the replay buffer.
    type Config: Clone;

    /// The type of batch generated for training.
    type Batch;

    /// Builds a new replay buffer from the given configuration.
    fn build(config: &Self::Config) -> Self;

    /// Constructs a batch of `size` transitions for training.
    ///
    /// The batch also carries the anchor/positive views used by the contrastive
    /// objective, see [`TransitionBatch::unpack`](crate::TransitionBatch::unpack).
    fn batch(&mut self, size: usize) -> Result<Self::Batch>;
}
