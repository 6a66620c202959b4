//! Batch.

/// Two independently augmented views of the same observations.
///
/// Index `i` of `obs_anchor` and index `i` of `obs_pos` must come from the same
/// underlying observation. The contrastive loss assigns its labels from this
/// alignment.
#[derive(Clone, Debug)]
pub struct ContrastivePair<O> {
    /// Anchor views, encoded by the online encoder.
    pub obs_anchor: O,

    /// Positive views, encoded by the momentum encoder.
    pub obs_pos: O,
}

/// A batch of transitions `(o_t, a_t, o_t+1, r_t, is_done_t)`.
pub trait TransitionBatch {
    /// A set of observations in a batch.
    type ObsBatch;

    /// A set of actions in a batch.
    type ActBatch;

    /// Unpacks the data `(o_t, a_t, o_t+1, r_t, is_done_t, aux)`.
    ///
    /// `is_done_t` is the raw termination flag, `1` if the episode ended with this
    /// transition. Consumers derive `not_done = 1 - is_done` from it.
    #[allow(clippy::type_complexity)]
    fn unpack(
        self,
    ) -> (
        Self::ObsBatch,
        Self::ActBatch,
        Self::ObsBatch,
        Vec<f32>,
        Vec<i8>,
        ContrastivePair<Self::ObsBatch>,
    );

    /// Returns the number of transitions.
    fn len(&self) -> usize;

    /// Returns `r_t`.
    fn reward(&self) -> &[f32];
}

/// A batch holding its fields directly.
#[derive(Clone, Debug)]
pub struct GenericTransitionBatch<O, A> {
    /// Observations.
    pub obs: O,

    /// Actions.
    pub act: A,

    /// Next observations.
    pub next_obs: O,

    /// Rewards.
    pub reward: Vec<f32>,

    /// Termination flags.
    pub is_done: Vec<i8>,

    /// Augmented views for the contrastive objective.
    pub pair: ContrastivePair<O>,
}

impl<O, A> TransitionBatch for GenericTransitionBatch<O, A> {
    type ObsBatch = O;
    type ActBatch = A;

    fn unpack(self) -> (O, A, O, Vec<f32>, Vec<i8>, ContrastivePair<O>) {
        (
            self.obs,
            self.act,
            self.next_obs,
            self.reward,
            self.is_done,
            self.pair,
        )
    }

    fn len(&self) -> usize {
        self.reward.len()
    }

    fn reward(&self) -> &[f32] {
        &self.reward
    }
}
