//! Records of training metrics and the sinks receiving them.
//!
//! An update step of the agent produces a [`Record`], a map from metric names
//! such as `"train_critic/loss"` to [`RecordValue`]s. The optimization step the
//! record belongs to is stored under [`STEP_KEY`]. Records are handed to a
//! [`Recorder`], which decides where they go:
//!
//! * [`NullRecorder`] discards them,
//! * [`BufferedRecorder`] keeps them in memory,
//! * `TensorboardRecorder` in the `curl-tensorboard` crate writes event files.
//!
//! ```rust
//! use curl_core::record::{BufferedRecorder, Record, RecordValue, Recorder, STEP_KEY};
//!
//! let mut record = Record::from_scalar("train_critic/loss", 0.25);
//! record.insert(STEP_KEY, RecordValue::Scalar(100.0));
//!
//! let mut recorder = BufferedRecorder::new();
//! recorder.write(record);
//! recorder.log("train/curl_loss", 1.5, 100);
//! assert_eq!(recorder.scalars("train/curl_loss"), vec![(100, 1.5)]);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;

/// Key under which the optimization step of a record is stored.
///
/// The step is a [`RecordValue::Scalar`], an `f32`. Steps are exact up to
/// `2^24` (16,777,216); beyond that neighboring steps may read back equal.
pub const STEP_KEY: &str = "opt_steps";
