//! TensorBoard recorder for the CURL agent.
use curl_core::record::{Record, RecordValue, Recorder, STEP_KEY};
use log::warn;
use std::path::Path;
use tensorboard_rs::summary_writer::SummaryWriter;

/// Write records to TFRecord.
pub struct TensorboardRecorder {
    writer: SummaryWriter,
    step_key: String,
}

impl TensorboardRecorder {
    /// Construct a [`TensorboardRecorder`].
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            writer: SummaryWriter::new(logdir),
            step_key: STEP_KEY.to_string(),
        }
    }

    /// Flushes pending events to the file.
    pub fn flush(&mut self) {
        self.writer.flush();
    }
}

impl Recorder for TensorboardRecorder {
    /// Write a given [`Record`] into a TFRecord.
    ///
    /// Scalars are written at the step stored under [`STEP_KEY`]. A record
    /// without step is skipped.
    fn write(&mut self, record: Record) {
        let step = match record.get_scalar(&self.step_key) {
            Ok(v) => v as usize,
            Err(e) => {
                warn!("Skip record without step: {}", e);
                return;
            }
        };

        for (k, v) in record.iter() {
            if *k == self.step_key {
                continue;
            }
            match v {
                RecordValue::Scalar(v) => self.writer.add_scalar(k, *v, step),
            };
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_write_event_file() {
        let dir = TempDir::new("tensorboard_recorder").unwrap();
        let mut recorder = TensorboardRecorder::new(dir.path());
        recorder.log("train_critic/loss", 0.5, 1);
        recorder.write(Record::from_scalar("no_step", 1.0));
        recorder.flush();

        let n_files = std::fs::read_dir(dir.path()).unwrap().count();
        assert!(n_files > 0);
    }
}
